//! Simulated print controller for tests.
//!
//! Subscribes to one device's upload and command topics on a
//! [`MemoryBroker`], reassembles uploads with a [`ChunkAssembler`] and
//! answers on the result topic according to its [`Behavior`]. Inbound
//! traffic is recorded synchronously, replies are published from a task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use printlink_protocol::{
    ChunkEnvelope, CommandMessage, CommandProgress, CommandResult, CommitMessage, MessageType,
    Topics, UploadProgressReport, UploadResult,
};
use printlink_transfer::{Accepted, AssembledFile, ChunkAssembler};
use printlink_transport::{MemoryBroker, MemoryTransport, Transport};

#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Accept,
    Reject(String),
    /// Never answers.
    Silent,
    /// Reports 50% progress, then accepts.
    ProgressThenAccept,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inbound {
    Chunk { index: u32, len: u64 },
    Commit,
    Command { kind: MessageType, job_id: String },
}

#[derive(Default)]
struct State {
    inbound: Vec<Inbound>,
    assemblers: HashMap<String, ChunkAssembler>,
    files: Vec<AssembledFile>,
}

pub(crate) struct SimController {
    state: Arc<Mutex<State>>,
    task: JoinHandle<()>,
}

impl SimController {
    pub(crate) async fn spawn(broker: &MemoryBroker, device_id: &str, behavior: Behavior) -> Self {
        let topics = Topics::default();
        let client = Arc::new(broker.client());
        let state = Arc::new(Mutex::new(State::default()));
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let handler = {
            let state = state.clone();
            let device = device_id.to_string();
            Arc::new(move |_topic: &str, payload: &[u8]| {
                let replies = handle(&state, &device, &behavior, payload);
                for reply in replies {
                    let _ = tx.send(reply);
                }
            })
        };
        client
            .subscribe(&topics.upload(device_id), handler.clone())
            .await
            .unwrap();
        client
            .subscribe(&topics.command(device_id), handler)
            .await
            .unwrap();

        let result_topic = topics.result(device_id);
        let publisher: Arc<MemoryTransport> = client;
        let task = tokio::spawn(async move {
            while let Some(reply) = rx.recv().await {
                let _ = publisher.publish(&result_topic, reply).await;
            }
        });

        Self { state, task }
    }

    pub(crate) fn inbound(&self) -> Vec<Inbound> {
        self.state.lock().unwrap().inbound.clone()
    }

    pub(crate) fn files(&self) -> Vec<AssembledFile> {
        self.state.lock().unwrap().files.clone()
    }
}

impl Drop for SimController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn handle(state: &Mutex<State>, device: &str, behavior: &Behavior, payload: &[u8]) -> Vec<Vec<u8>> {
    let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
    let kind: MessageType = serde_json::from_value(value["type"].clone()).unwrap();
    let mut state = state.lock().unwrap();

    match kind {
        MessageType::Chunk => {
            let envelope: ChunkEnvelope = serde_json::from_value(value).unwrap();
            let assembler = state
                .assemblers
                .entry(envelope.transfer_id.clone())
                .or_default();
            if let Ok(Accepted::Appended) = assembler.accept(&envelope) {
                state.inbound.push(Inbound::Chunk {
                    index: envelope.index,
                    len: envelope.payload_length,
                });
            }
            Vec::new()
        }
        MessageType::Commit => {
            let commit: CommitMessage = serde_json::from_value(value).unwrap();
            // A redelivered commit finds no assembler left.
            let Some(assembler) = state.assemblers.remove(&commit.transfer_id) else {
                return Vec::new();
            };
            state.inbound.push(Inbound::Commit);
            let (success, error, filename) = match assembler.finish(&commit) {
                Ok(file) => {
                    let name = file.filename.clone();
                    state.files.push(file);
                    match behavior {
                        Behavior::Reject(reason) => (false, Some(reason.clone()), Some(name)),
                        _ => (true, None, Some(name)),
                    }
                }
                Err(e) => (false, Some(e.to_string()), None),
            };

            let mut replies = Vec::new();
            match behavior {
                Behavior::Silent => return replies,
                Behavior::ProgressThenAccept => replies.push(to_vec(&UploadProgressReport {
                    msg_type: MessageType::UploadProgress,
                    transfer_id: commit.transfer_id.clone(),
                    device_id: Some(device.to_string()),
                    received_bytes: None,
                    percent: Some(50.0),
                })),
                _ => {}
            }
            replies.push(to_vec(&UploadResult {
                msg_type: MessageType::UploadResult,
                transfer_id: commit.transfer_id,
                success,
                device_id: Some(device.to_string()),
                target: filename
                    .as_ref()
                    .map(|f| format!("{}:/{f}", commit.destination)),
                filename,
                error,
            }));
            replies
        }
        MessageType::Print | MessageType::Pause | MessageType::Resume | MessageType::Cancel => {
            let command: CommandMessage = serde_json::from_value(value).unwrap();
            state.inbound.push(Inbound::Command {
                kind,
                job_id: command.job_id.clone(),
            });

            let mut replies = Vec::new();
            let (success, error) = match behavior {
                Behavior::Silent => return replies,
                Behavior::Reject(reason) => (false, Some(reason.clone())),
                Behavior::ProgressThenAccept => {
                    replies.push(to_vec(&CommandProgress {
                        msg_type: MessageType::CommandProgress,
                        job_id: command.job_id.clone(),
                        device_id: None,
                        message: Some("heating".into()),
                        percent: Some(50.0),
                    }));
                    (true, None)
                }
                Behavior::Accept => (true, None),
            };
            replies.push(to_vec(&CommandResult {
                msg_type: MessageType::CommandResult,
                job_id: command.job_id,
                success,
                device_id: None,
                error,
            }));
            replies
        }
        _ => Vec::new(),
    }
}

fn to_vec<T: serde::Serialize>(msg: &T) -> Vec<u8> {
    serde_json::to_vec(msg).unwrap()
}
