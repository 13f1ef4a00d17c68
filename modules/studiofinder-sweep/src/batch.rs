//! Runs one sweep per centers file in a directory, in file-name order.
//!
//! Each `<code>.csv` supplies the centers for region `<CODE>`. The batch
//! stops at the first failed or halted region; nothing after it runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use studiofinder_common::{BoundingBox, RunResult, SearchCenter, StudioFinderError, SweepConfig};

use crate::notify::Notifier;
use crate::regions::{list_center_files, load_centers, load_region_bbox, region_code_for};
use crate::sweep::{HardStop, Sweep, SweepOutcome};
use crate::traits::{EmailFinder, PlacesApi, TabularStore};

#[derive(Debug)]
pub enum BatchOutcome {
    Completed(Vec<RunResult>),
    Halted {
        completed: Vec<RunResult>,
        stop: HardStop,
        source_file: PathBuf,
    },
    Failed {
        completed: Vec<RunResult>,
        region_code: String,
        source_file: PathBuf,
        error: anyhow::Error,
    },
}

impl BatchOutcome {
    pub fn completed(&self) -> &[RunResult] {
        match self {
            BatchOutcome::Completed(completed)
            | BatchOutcome::Halted { completed, .. }
            | BatchOutcome::Failed { completed, .. } => completed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Completed(_))
    }
}

/// Bounds for a batch region: the lookup file when configured and it
/// knows the region, else the box around its centers.
fn batch_bbox(code: &str, lookup: Option<&Path>, centers: &[SearchCenter]) -> Result<BoundingBox, StudioFinderError> {
    if let Some(path) = lookup {
        match load_region_bbox(code, Some(path)) {
            Ok(bbox) => return Ok(bbox),
            Err(e) => warn!(region = code, error = %e, "No usable bounds in lookup file, deriving from centers"),
        }
    }
    BoundingBox::from_centers(code, centers)
}

pub struct BatchRunner<'a> {
    config: &'a SweepConfig,
    places: &'a dyn PlacesApi,
    store: &'a dyn TabularStore,
    emails: Option<&'a dyn EmailFinder>,
    notifier: &'a dyn Notifier,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        config: &'a SweepConfig,
        places: &'a dyn PlacesApi,
        store: &'a dyn TabularStore,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            places,
            store,
            emails: None,
            notifier,
        }
    }

    pub fn with_email_finder(mut self, finder: &'a dyn EmailFinder) -> Self {
        self.emails = Some(finder);
        self
    }

    /// Errors only when the directory itself is unusable; per-region
    /// problems come back as [`BatchOutcome::Failed`].
    pub async fn run(&self, dir: &Path) -> Result<BatchOutcome> {
        let files = list_center_files(dir)?;
        if files.is_empty() {
            return Err(StudioFinderError::config(format!("no centers files (*.csv) in {}", dir.display())).into());
        }
        info!(dir = %dir.display(), files = files.len(), "Starting batch");

        let mut completed = Vec::new();
        for file in files {
            let code = region_code_for(&file).unwrap_or_default();
            let file_label = file.display().to_string();
            info!(file = file_label.as_str(), region = code.as_str(), "Batch region");

            match self.run_region(&code, &file).await {
                Ok(SweepOutcome::Completed(result)) => {
                    self.notifier.success(&result).await;
                    completed.push(result);
                }
                Ok(SweepOutcome::Halted { result, stop }) => {
                    self.notifier.halted(&result, &stop, &file_label).await;
                    return Ok(BatchOutcome::Halted {
                        completed,
                        stop,
                        source_file: file,
                    });
                }
                Err(error) => {
                    self.notifier.failure(&code, &file_label, &error).await;
                    return Ok(BatchOutcome::Failed {
                        completed,
                        region_code: code,
                        source_file: file,
                        error,
                    });
                }
            }
        }

        self.notifier.summary(&completed).await;
        Ok(BatchOutcome::Completed(completed))
    }

    async fn run_region(&self, code: &str, file: &Path) -> Result<SweepOutcome> {
        let centers = load_centers(file)?;
        if centers.is_empty() {
            return Err(StudioFinderError::config(format!("no usable centers in {}", file.display())).into());
        }
        let bbox = batch_bbox(code, self.config.region_bbox_file.as_deref(), &centers)?;

        // one backup file would be overwritten region after region
        let config = SweepConfig {
            region_code: code.to_string(),
            backup_csv: None,
            ..self.config.clone()
        };
        let mut sweep = Sweep::new(&config, self.places, self.store);
        if let Some(finder) = self.emails {
            sweep = sweep.with_email_finder(finder);
        }
        sweep
            .run(&bbox, Some(&centers))
            .await
            .with_context(|| format!("sweeping region {code} from {}", file.display()))
    }
}
