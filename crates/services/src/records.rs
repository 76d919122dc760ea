//! Printer and G-code file records.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BoxFuture, ServiceError};

/// A printer registered by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterRecord {
    pub id: String,
    pub user_id: String,
    pub device_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A stored G-code file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcodeFileRecord {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    /// Object store path of the file body.
    pub storage_path: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the file body.
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Relational storage for printers and G-code files.
pub trait RecordStore: Send + Sync {
    /// Inserts or replaces the printer with the same `id`.
    fn upsert_printer(&self, record: PrinterRecord) -> BoxFuture<'_, Result<(), ServiceError>>;

    fn printers_for_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<Vec<PrinterRecord>, ServiceError>>;

    fn printer_by_device<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PrinterRecord>, ServiceError>>;

    fn delete_printer<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ServiceError>>;

    /// Inserts or replaces the file with the same `id`.
    fn upsert_gcode_file(&self, record: GcodeFileRecord) -> BoxFuture<'_, Result<(), ServiceError>>;

    fn gcode_files_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<GcodeFileRecord>, ServiceError>>;

    fn gcode_file<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<GcodeFileRecord, ServiceError>>;

    fn delete_gcode_file<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ServiceError>>;
}

#[derive(Default)]
struct Tables {
    printers: HashMap<String, PrinterRecord>,
    gcode_files: HashMap<String, GcodeFileRecord>,
}

#[derive(Default)]
pub struct MemoryRecordStore {
    tables: Mutex<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordStore for MemoryRecordStore {
    fn upsert_printer(&self, record: PrinterRecord) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            self.tables().printers.insert(record.id.clone(), record);
            Ok(())
        })
    }

    fn printers_for_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<Vec<PrinterRecord>, ServiceError>> {
        Box::pin(async move {
            let mut printers: Vec<_> = self
                .tables()
                .printers
                .values()
                .filter(|p| p.user_id == user_id)
                .cloned()
                .collect();
            printers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(printers)
        })
    }

    fn printer_by_device<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<PrinterRecord>, ServiceError>> {
        Box::pin(async move {
            Ok(self
                .tables()
                .printers
                .values()
                .find(|p| p.device_id == device_id)
                .cloned())
        })
    }

    fn delete_printer<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ServiceError>> {
        Box::pin(async move {
            self.tables()
                .printers
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| ServiceError::NotFound(format!("printer {id}")))
        })
    }

    fn upsert_gcode_file(&self, record: GcodeFileRecord) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(async move {
            self.tables().gcode_files.insert(record.id.clone(), record);
            Ok(())
        })
    }

    fn gcode_files_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<GcodeFileRecord>, ServiceError>> {
        Box::pin(async move {
            let mut files: Vec<_> = self
                .tables()
                .gcode_files
                .values()
                .filter(|f| f.user_id == user_id)
                .cloned()
                .collect();
            files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
            Ok(files)
        })
    }

    fn gcode_file<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<GcodeFileRecord, ServiceError>> {
        Box::pin(async move {
            self.tables()
                .gcode_files
                .get(id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(format!("gcode file {id}")))
        })
    }

    fn delete_gcode_file<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ServiceError>> {
        Box::pin(async move {
            self.tables()
                .gcode_files
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| ServiceError::NotFound(format!("gcode file {id}")))
        })
    }
}
