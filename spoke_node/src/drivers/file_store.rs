//! File-backed record store.
//!
//! The record is written to a temporary sibling and renamed over the target,
//! so a crash mid-write leaves the previous record intact.

use crate::hardware::{HardwareError, RecordStore};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Record store in a single file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store at `path`. Parent directories are created on first write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Record file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordStore for FileStore {
    fn read(&mut self) -> Result<Option<Vec<u8>>, HardwareError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                debug!("Read {} record bytes from {:?}", bytes.len(), self.path);
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Record file {:?} does not exist", self.path);
                Ok(None)
            }
            Err(e) => Err(HardwareError::Storage(format!(
                "Failed to read {:?}: {}",
                self.path, e
            ))),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), HardwareError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                HardwareError::Storage(format!("Failed to create directory: {}", e))
            })?;
        }

        let temp = self.temp_path();
        let file = File::create(&temp).map_err(|e| {
            HardwareError::Storage(format!("Failed to create record file: {}", e))
        })?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(bytes)
            .and_then(|_| writer.flush())
            .map_err(|e| HardwareError::Storage(format!("Failed to write record: {}", e)))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| HardwareError::Storage(format!("Failed to sync record: {}", e)))?;

        fs::rename(&temp, &self.path).map_err(|e| {
            HardwareError::Storage(format!("Failed to replace record file: {}", e))
        })?;
        Ok(())
    }
}
