use printlink_protocol::{ChunkEnvelope, CommitMessage, Destination};
use tracing::debug;

use crate::{TransferError, decode_payload};

/// What [`ChunkAssembler::accept`] did with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    /// The slice was appended.
    Appended,
    /// Exact redelivery of the previous chunk; nothing changed.
    Duplicate,
}

/// A fully received file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFile {
    pub transfer_id: String,
    pub filename: String,
    pub destination: Destination,
    pub data: Vec<u8>,
}

struct Header {
    transfer_id: String,
    filename: String,
    total_size: u64,
}

/// Rebuilds one transfer from its envelopes, controller side.
///
/// Chunks must arrive in index order starting at 0. Because the bus is
/// at-least-once, an identical copy of the last accepted chunk is tolerated.
#[derive(Default)]
pub struct ChunkAssembler {
    header: Option<Header>,
    data: Vec<u8>,
    next_index: u32,
    last_payload: Option<String>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfer id taken from chunk 0, once seen.
    pub fn transfer_id(&self) -> Option<&str> {
        self.header.as_ref().map(|h| h.transfer_id.as_str())
    }

    pub fn received_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    /// Declared file size, once chunk 0 was accepted.
    pub fn total_size(&self) -> Option<u64> {
        self.header.as_ref().map(|h| h.total_size)
    }

    /// Validates and appends one envelope.
    pub fn accept(&mut self, envelope: &ChunkEnvelope) -> Result<Accepted, TransferError> {
        if let Some(header) = &self.header {
            if envelope.transfer_id != header.transfer_id {
                return Err(TransferError::TransferMismatch {
                    expected: header.transfer_id.clone(),
                    got: envelope.transfer_id.clone(),
                });
            }
            if envelope.index.checked_add(1) == Some(self.next_index)
                && self.last_payload.as_deref() == Some(envelope.payload.as_str())
            {
                debug!(
                    transfer = %header.transfer_id,
                    index = envelope.index,
                    "ignoring redelivered chunk"
                );
                return Ok(Accepted::Duplicate);
            }
        }

        if envelope.index != self.next_index {
            return Err(TransferError::UnexpectedChunk {
                expected: self.next_index,
                got: envelope.index,
            });
        }

        let bytes = decode_payload(&envelope.payload)?;
        let actual = bytes.len() as u64;
        if actual != envelope.payload_length {
            return Err(TransferError::LengthMismatch {
                index: envelope.index,
                declared: envelope.payload_length,
                actual,
            });
        }

        let total = match &self.header {
            Some(header) => header.total_size,
            None => {
                let (Some(filename), Some(total_size)) =
                    (envelope.filename.as_ref(), envelope.total_size)
                else {
                    return Err(TransferError::MissingMetadata);
                };
                self.header = Some(Header {
                    transfer_id: envelope.transfer_id.clone(),
                    filename: filename.clone(),
                    total_size,
                });
                total_size
            }
        };

        let received = self.received_bytes() + actual;
        if received > total {
            return Err(TransferError::Overflow { total, received });
        }

        self.data.extend_from_slice(&bytes);
        self.next_index += 1;
        self.last_payload = Some(envelope.payload.clone());
        Ok(Accepted::Appended)
    }

    /// Completes the transfer on commit, checking that every byte arrived.
    pub fn finish(self, commit: &CommitMessage) -> Result<AssembledFile, TransferError> {
        let Some(header) = self.header else {
            return Err(TransferError::MissingMetadata);
        };
        if commit.transfer_id != header.transfer_id {
            return Err(TransferError::TransferMismatch {
                expected: header.transfer_id,
                got: commit.transfer_id.clone(),
            });
        }
        let received = self.data.len() as u64;
        if received != header.total_size {
            return Err(TransferError::Incomplete {
                total: header.total_size,
                received,
            });
        }
        Ok(AssembledFile {
            transfer_id: header.transfer_id,
            filename: header.filename,
            destination: commit.destination,
            data: self.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChunkPlan;

    fn envelopes(data: &[u8], chunk: usize) -> Vec<ChunkEnvelope> {
        ChunkPlan::new("t1", "cube.gcode", Destination::Sdcard, data, chunk)
            .unwrap()
            .envelopes()
            .collect()
    }

    fn commit() -> CommitMessage {
        CommitMessage::new("t1", Destination::Sdcard)
    }

    #[test]
    fn assembles_in_order() {
        let data: Vec<u8> = (0..=200).collect();
        let mut asm = ChunkAssembler::new();
        for env in envelopes(&data, 64) {
            assert_eq!(asm.accept(&env).unwrap(), Accepted::Appended);
        }
        assert_eq!(asm.transfer_id(), Some("t1"));
        assert_eq!(asm.received_bytes(), 201);

        let file = asm.finish(&commit()).unwrap();
        assert_eq!(file.filename, "cube.gcode");
        assert_eq!(file.destination, Destination::Sdcard);
        assert_eq!(file.data, data);
    }

    #[test]
    fn assembles_empty_file() {
        let mut asm = ChunkAssembler::new();
        for env in envelopes(b"", 64) {
            asm.accept(&env).unwrap();
        }
        let file = asm.finish(&commit()).unwrap();
        assert!(file.data.is_empty());
    }

    #[test]
    fn tolerates_redelivery_of_last_chunk() {
        let envs = envelopes(b"abcdefghij", 4);
        let mut asm = ChunkAssembler::new();
        asm.accept(&envs[0]).unwrap();
        asm.accept(&envs[1]).unwrap();
        assert_eq!(asm.accept(&envs[1]).unwrap(), Accepted::Duplicate);
        asm.accept(&envs[2]).unwrap();
        assert_eq!(asm.finish(&commit()).unwrap().data, b"abcdefghij");
    }

    #[test]
    fn rejects_gaps_and_replays() {
        let envs = envelopes(b"abcdefghij", 4);
        let mut asm = ChunkAssembler::new();
        assert!(matches!(
            asm.accept(&envs[1]),
            Err(TransferError::UnexpectedChunk { expected: 0, got: 1 })
        ));

        asm.accept(&envs[0]).unwrap();
        assert!(matches!(
            asm.accept(&envs[2]),
            Err(TransferError::UnexpectedChunk { expected: 1, got: 2 })
        ));

        asm.accept(&envs[1]).unwrap();
        // Older than the last accepted chunk is not a redelivery.
        assert!(asm.accept(&envs[0]).is_err());
    }

    #[test]
    fn rejects_chunk_zero_without_metadata() {
        let mut env = envelopes(b"abc", 4).remove(0);
        env.filename = None;
        let mut asm = ChunkAssembler::new();
        assert!(matches!(
            asm.accept(&env),
            Err(TransferError::MissingMetadata)
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut env = envelopes(b"abc", 4).remove(0);
        env.payload_length = 4;
        let mut asm = ChunkAssembler::new();
        assert!(matches!(
            asm.accept(&env),
            Err(TransferError::LengthMismatch { index: 0, declared: 4, actual: 3 })
        ));
    }

    #[test]
    fn rejects_bytes_beyond_total_size() {
        let mut envs = envelopes(b"abcdefgh", 4);
        envs[0].total_size = Some(6);
        let mut asm = ChunkAssembler::new();
        asm.accept(&envs[0]).unwrap();
        assert!(matches!(
            asm.accept(&envs[1]),
            Err(TransferError::Overflow { total: 6, received: 8 })
        ));
    }

    #[test]
    fn rejects_foreign_transfer() {
        let envs = envelopes(b"abcdefgh", 4);
        let mut asm = ChunkAssembler::new();
        asm.accept(&envs[0]).unwrap();
        let mut other = envs[1].clone();
        other.transfer_id = "t2".into();
        assert!(matches!(
            asm.accept(&other),
            Err(TransferError::TransferMismatch { .. })
        ));
    }

    #[test]
    fn finish_requires_every_byte() {
        let envs = envelopes(b"abcdefgh", 4);
        let mut asm = ChunkAssembler::new();
        asm.accept(&envs[0]).unwrap();
        assert!(matches!(
            asm.finish(&commit()),
            Err(TransferError::Incomplete { total: 8, received: 4 })
        ));

        assert!(matches!(
            ChunkAssembler::new().finish(&commit()),
            Err(TransferError::MissingMetadata)
        ));
    }

    #[test]
    fn finish_checks_commit_id() {
        let mut asm = ChunkAssembler::new();
        for env in envelopes(b"ab", 4) {
            asm.accept(&env).unwrap();
        }
        let wrong = CommitMessage::new("zzz", Destination::Local);
        assert!(matches!(
            asm.finish(&wrong),
            Err(TransferError::TransferMismatch { .. })
        ));
    }
}
