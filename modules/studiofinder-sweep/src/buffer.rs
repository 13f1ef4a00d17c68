//! Batched, chunked destination writes with retry.
//!
//! Rows collect in memory and go out once the flush threshold is reached.
//! A flush sends its rows in chunks; a chunk that keeps failing with a
//! transient error is retried with exponential backoff, and from the second
//! failure on the chunk size is halved (down to one row). Write semantics
//! are at-least-once: a chunk whose append succeeded upstream but whose
//! response was lost is sent again.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use sheets_client::SheetsError;
use studiofinder_common::{CanonicalRecord, WriteConfig};

use crate::backup::BackupWriter;
use crate::traits::{Row, TabularStore};

/// `base^(attempt-1) + 0.2·attempt` seconds.
pub fn write_backoff(base: f64, attempt: u32) -> Duration {
    let secs = base.powi(attempt.saturating_sub(1) as i32) + 0.2 * attempt as f64;
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Append `rows` in chunks, retrying transient failures. Returns the
/// number of successful append calls.
pub async fn append_with_retry(
    store: &dyn TabularStore,
    tab: &str,
    rows: &[Row],
    config: &WriteConfig,
) -> Result<usize, SheetsError> {
    let mut chunk = config.chunk_rows.max(1);
    let mut start = 0;
    let mut calls = 0;

    while start < rows.len() {
        let mut attempt = 1;
        loop {
            let end = (start + chunk).min(rows.len());
            match store.append_rows(tab, &rows[start..end]).await {
                Ok(()) => {
                    calls += 1;
                    start = end;
                    break;
                }
                Err(e) if e.is_transient() && attempt < config.max_attempts => {
                    let wait = write_backoff(config.backoff_base, attempt);
                    warn!(
                        tab,
                        attempt,
                        chunk_rows = end - start,
                        wait_secs = wait.as_secs_f64(),
                        error = %e,
                        "Transient error appending rows, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    if attempt >= 2 && chunk > 1 {
                        chunk = (chunk / 2).max(1);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(tab, attempt, error = %e, "Append failed permanently");
                    return Err(e);
                }
            }
        }
        if start < rows.len() {
            tokio::time::sleep(config.pace).await;
        }
    }
    Ok(calls)
}

pub struct WriteBuffer<'a> {
    store: &'a dyn TabularStore,
    tab: String,
    config: WriteConfig,
    pending: Vec<Row>,
    backup: Option<BackupWriter>,
    flushes: usize,
    rows_written: usize,
}

impl<'a> WriteBuffer<'a> {
    pub fn new(
        store: &'a dyn TabularStore,
        tab: &str,
        config: &WriteConfig,
        backup: Option<BackupWriter>,
    ) -> Self {
        Self {
            store,
            tab: tab.to_string(),
            config: config.clone(),
            pending: Vec::new(),
            backup,
            flushes: 0,
            rows_written: 0,
        }
    }

    /// Queue a record (and copy it to the local backup). Flushes once the
    /// threshold is reached.
    pub async fn push(&mut self, record: &CanonicalRecord) -> Result<()> {
        if let Some(backup) = self.backup.as_mut() {
            backup.write(record)?;
        }
        self.pending.push(record.to_sheet_row());
        if self.pending.len() >= self.config.flush_every {
            self.flush().await?;
        }
        Ok(())
    }

    /// Send everything pending. On failure the pending rows are dropped
    /// from the buffer; the local backup still has them.
    pub async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.pending);
        info!(tab = self.tab.as_str(), rows = rows.len(), "Flushing rows to destination");
        match append_with_retry(self.store, &self.tab, &rows, &self.config).await {
            Ok(_) => {
                self.flushes += 1;
                self.rows_written += rows.len();
                Ok(())
            }
            Err(e) => {
                warn!(tab = self.tab.as_str(), rows = rows.len(), "Rows not written to destination");
                Err(e).with_context(|| format!("appending {} rows to tab '{}'", rows.len(), self.tab))
            }
        }
    }

    /// Final flush, then close the backup. The backup is closed even when
    /// the flush fails; the flush error is returned first.
    pub async fn drain(&mut self) -> Result<()> {
        let flushed = self.flush().await;
        let closed = self.backup.take().map(BackupWriter::finish).transpose();
        flushed?;
        closed?;
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}
