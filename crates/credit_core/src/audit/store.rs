//! Append-only audit storage backends

use parking_lot::{Mutex, RwLock};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use super::record::{AuditRecord, AUDIT_COLUMNS};
use crate::errors::{Result, ScoringError};

/// Append-only store of audit records.
///
/// Implementations must make each `append` atomic with respect to
/// concurrent `append` and `read_all` calls: no reader may observe a
/// partial record and no two writers may interleave.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuditRecord) -> Result<()>;

    /// Consistent snapshot of every record, oldest first
    fn read_all(&self) -> Result<Vec<AuditRecord>>;

    fn len(&self) -> Result<usize> {
        Ok(self.read_all()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// CSV file sink. The header is written when the file is created; every
/// record is encoded in memory and written with a single `write_all`.
#[derive(Debug)]
pub struct CsvAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvAuditSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ScoringError::AuditWrite(format!("{}: {e}", parent.display())))?;
        }

        let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        if needs_header {
            let mut header = csv::Writer::from_writer(Vec::new());
            header.write_record(AUDIT_COLUMNS)?;
            let bytes = header
                .into_inner()
                .map_err(|e| ScoringError::AuditWrite(e.to_string()))?;
            fs::write(&path, bytes)
                .map_err(|e| ScoringError::AuditWrite(format!("{}: {e}", path.display())))?;
            info!("Created audit log at {}", path.display());
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(record: &AuditRecord) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.serialize(record)?;
        writer
            .into_inner()
            .map_err(|e| ScoringError::AuditWrite(e.to_string()))
    }
}

impl AuditSink for CsvAuditSink {
    fn append(&self, record: &AuditRecord) -> Result<()> {
        let row = Self::encode(record)?;

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| ScoringError::AuditWrite(format!("{}: {e}", self.path.display())))?;
        file.write_all(&row)
            .and_then(|_| file.flush())
            .map_err(|e| ScoringError::AuditWrite(format!("{}: {e}", self.path.display())))
    }

    fn read_all(&self) -> Result<Vec<AuditRecord>> {
        let _guard = self.lock.lock();
        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader.deserialize().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

/// In-memory sink for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, record: &AuditRecord) -> Result<()> {
        self.records.write().push(record.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<AuditRecord>> {
        Ok(self.records.read().clone())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}
