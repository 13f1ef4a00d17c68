use std::fs::File;
use std::path::{Path, PathBuf};

use studiofinder_common::{CanonicalRecord, StudioFinderError, HEADERS};

/// Local CSV copy of every record pushed during a run. Written row by row
/// so it survives a failed destination write.
pub struct BackupWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl BackupWriter {
    /// Create (or truncate) the file and write the header row.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StudioFinderError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StudioFinderError::LocalIo {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut writer = csv::Writer::from_path(&path).map_err(|source| StudioFinderError::Csv {
            path: path.clone(),
            source,
        })?;
        writer.write_record(HEADERS).map_err(|source| StudioFinderError::Csv {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, writer, rows: 0 })
    }

    pub fn write(&mut self, record: &CanonicalRecord) -> Result<(), StudioFinderError> {
        self.writer
            .write_record(record.to_text_row())
            .map_err(|source| StudioFinderError::Csv {
                path: self.path.clone(),
                source,
            })?;
        self.writer.flush().map_err(|source| StudioFinderError::LocalIo {
            path: self.path.clone(),
            source,
        })?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and close. Returns the number of data rows written.
    pub fn finish(mut self) -> Result<usize, StudioFinderError> {
        self.writer.flush().map_err(|source| StudioFinderError::LocalIo {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), rows = self.rows, "Local backup closed");
        Ok(self.rows)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
