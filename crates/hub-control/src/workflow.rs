//! G-code library and the store-then-print workflow.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use printlink_protocol::Destination;
use printlink_services::{
    GcodeFileRecord, ObjectStore, RecordStore, ServiceError, SessionProvider, content_hash,
};
use printlink_transfer::validate_filename;

use crate::error::ControlError;
use crate::fleet::FleetClient;
use crate::types::{CommandReport, EventCallback, UploadReport, UploadRequest};

/// Result of sending a stored file to a printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJobReport {
    pub upload: UploadReport,
    /// Present when a print was requested and the upload succeeded.
    pub print: Option<CommandReport>,
}

/// The signed-in user's stored G-code files.
///
/// Bodies live in the object store under `gcode/{userId}/{filename}`; each
/// has a record carrying its size and SHA-256.
pub struct GcodeLibrary {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    session: Arc<dyn SessionProvider>,
}

impl GcodeLibrary {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            objects,
            records,
            session,
        }
    }

    /// Stores `data` as `filename`, replacing a previous file of that name.
    pub async fn store(&self, filename: &str, data: Vec<u8>) -> Result<GcodeFileRecord, ControlError> {
        validate_filename(filename)?;
        let user_id = self.user_id().await?;
        let storage_path = storage_path(&user_id, filename);

        let existing = self
            .records
            .gcode_files_for_user(&user_id)
            .await?
            .into_iter()
            .find(|f| f.storage_path == storage_path);

        let record = GcodeFileRecord {
            id: existing
                .map(|f| f.id)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            user_id,
            filename: filename.to_string(),
            storage_path,
            size: data.len() as u64,
            sha256: content_hash(&data),
            uploaded_at: Utc::now(),
        };

        self.objects.put(&record.storage_path, data).await?;
        self.records.upsert_gcode_file(record.clone()).await?;
        info!(file = %record.filename, id = %record.id, bytes = record.size, "stored gcode");
        Ok(record)
    }

    /// Files of the signed-in user, newest first.
    pub async fn list(&self) -> Result<Vec<GcodeFileRecord>, ControlError> {
        let user_id = self.user_id().await?;
        Ok(self.records.gcode_files_for_user(&user_id).await?)
    }

    pub async fn remove(&self, file_id: &str) -> Result<(), ControlError> {
        let record = self.owned(file_id).await?;
        match self.objects.remove(&record.storage_path).await {
            Ok(()) | Err(ServiceError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.records.delete_gcode_file(file_id).await?;
        Ok(())
    }

    /// Uploads a stored file to `device_id` and optionally starts printing
    /// it once the controller confirmed the upload.
    pub async fn send_to_printer(
        &self,
        fleet: &FleetClient,
        file_id: &str,
        device_id: &str,
        destination: Destination,
        start_print: bool,
        events: Option<EventCallback>,
    ) -> Result<PrintJobReport, ControlError> {
        let record = self.owned(file_id).await?;
        let data = self.objects.get(&record.storage_path).await?;
        if content_hash(&data) != record.sha256 {
            warn!(id = %file_id, path = %record.storage_path, "stored gcode hash mismatch");
            return Err(ControlError::Integrity {
                file_id: file_id.to_string(),
            });
        }

        let request = UploadRequest::new(device_id, &record.filename, destination, data);
        let upload = fleet.upload(request, events).await?;

        let print = if start_print && upload.succeeded() {
            Some(
                fleet
                    .commands()?
                    .start_print(device_id, &record.filename, destination)
                    .await?,
            )
        } else {
            None
        };

        Ok(PrintJobReport { upload, print })
    }

    async fn user_id(&self) -> Result<String, ControlError> {
        self.session
            .current_user_id()
            .await?
            .ok_or(ControlError::Service(ServiceError::Unauthenticated))
    }

    /// The record for `file_id`, hidden from other users.
    async fn owned(&self, file_id: &str) -> Result<GcodeFileRecord, ControlError> {
        let user_id = self.user_id().await?;
        let record = self.records.gcode_file(file_id).await?;
        if record.user_id != user_id {
            return Err(ServiceError::NotFound(format!("gcode file {file_id}")).into());
        }
        Ok(record)
    }
}

fn storage_path(user_id: &str, filename: &str) -> String {
    format!("gcode/{user_id}/{filename}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use printlink_services::{MemoryObjectStore, MemoryRecordStore, StaticSession};
    use printlink_transport::MemoryBroker;

    use crate::sim::{Behavior, Inbound, SimController};
    use crate::types::{CommandOutcome, FleetOptions, UploadOutcome};
    use printlink_protocol::MessageType;

    struct Fixture {
        objects: Arc<MemoryObjectStore>,
        library: GcodeLibrary,
    }

    fn fixture(session: StaticSession) -> Fixture {
        let objects = Arc::new(MemoryObjectStore::new());
        let library = GcodeLibrary::new(
            objects.clone(),
            Arc::new(MemoryRecordStore::new()),
            Arc::new(session),
        );
        Fixture { objects, library }
    }

    #[tokio::test]
    async fn store_records_path_and_hash() {
        let f = fixture(StaticSession::signed_in("u1"));
        let record = f.library.store("cube.gcode", b"G28\n".to_vec()).await.unwrap();

        assert_eq!(record.storage_path, "gcode/u1/cube.gcode");
        assert_eq!(record.size, 4);
        assert_eq!(record.sha256, content_hash(b"G28\n"));
        assert_eq!(f.objects.get("gcode/u1/cube.gcode").await.unwrap(), b"G28\n");

        // Same name again replaces, keeping the id.
        let again = f.library.store("cube.gcode", b"G28\nG1\n".to_vec()).await.unwrap();
        assert_eq!(again.id, record.id);
        assert_eq!(f.library.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn anonymous_user_is_refused() {
        let f = fixture(StaticSession::anonymous());
        assert!(matches!(
            f.library.store("cube.gcode", vec![]).await,
            Err(ControlError::Service(ServiceError::Unauthenticated))
        ));
    }

    #[tokio::test]
    async fn remove_deletes_body_and_record() {
        let f = fixture(StaticSession::signed_in("u1"));
        let record = f.library.store("cube.gcode", vec![1]).await.unwrap();
        f.library.remove(&record.id).await.unwrap();
        assert!(f.library.list().await.unwrap().is_empty());
        assert!(f.objects.list("gcode/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_uploads_then_prints() {
        let broker = MemoryBroker::new();
        let fleet = FleetClient::new(Arc::new(broker.client()), FleetOptions::default());
        fleet.start().await.unwrap();
        let sim = SimController::spawn(&broker, "p1", Behavior::Accept).await;

        let f = fixture(StaticSession::signed_in("u1"));
        let body: Vec<u8> = b"G28\nG1 X10\n".repeat(500);
        let record = f.library.store("part.gcode", body.clone()).await.unwrap();

        let job = f
            .library
            .send_to_printer(&fleet, &record.id, "p1", Destination::Sdcard, true, None)
            .await
            .unwrap();

        assert!(job.upload.succeeded());
        assert_eq!(job.print.unwrap().outcome, CommandOutcome::Succeeded);
        assert_eq!(sim.files()[0].data, body);
        assert!(matches!(
            sim.inbound().last(),
            Some(Inbound::Command {
                kind: MessageType::Print,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn rejected_upload_skips_print() {
        let broker = MemoryBroker::new();
        let fleet = FleetClient::new(Arc::new(broker.client()), FleetOptions::default());
        fleet.start().await.unwrap();
        let sim = SimController::spawn(&broker, "p1", Behavior::Reject("no space".into())).await;

        let f = fixture(StaticSession::signed_in("u1"));
        let record = f.library.store("part.gcode", vec![1, 2, 3]).await.unwrap();
        let job = f
            .library
            .send_to_printer(&fleet, &record.id, "p1", Destination::Local, true, None)
            .await
            .unwrap();

        assert!(matches!(job.upload.outcome, UploadOutcome::Rejected { .. }));
        assert!(job.print.is_none());
        assert_eq!(sim.inbound().last(), Some(&Inbound::Commit));
    }

    #[tokio::test]
    async fn tampered_body_is_not_sent() {
        let broker = MemoryBroker::new();
        let fleet = FleetClient::new(Arc::new(broker.client()), FleetOptions::default());
        fleet.start().await.unwrap();

        let f = fixture(StaticSession::signed_in("u1"));
        let record = f.library.store("part.gcode", vec![1, 2, 3]).await.unwrap();
        f.objects.put(&record.storage_path, vec![9]).await.unwrap();

        let err = f
            .library
            .send_to_printer(&fleet, &record.id, "p1", Destination::Local, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Integrity { .. }));
        assert!(broker.published().is_empty());
    }
}
