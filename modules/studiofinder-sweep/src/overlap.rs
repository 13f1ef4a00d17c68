//! Skips centers whose search circle mostly repeats a productive one.

use studiofinder_common::{SearchCenter, SweepConfig};

/// The productive center that made a candidate redundant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapHit {
    pub near: SearchCenter,
    pub distance_m: f64,
}

#[derive(Debug, Clone)]
pub struct OverlapPruner {
    enabled: bool,
    threshold_m: f64,
    min_productive: usize,
    processed: Vec<(SearchCenter, usize)>,
}

impl OverlapPruner {
    pub fn new(enabled: bool, overlap_factor: f64, radius_m: u32, min_productive: usize) -> Self {
        Self {
            enabled,
            threshold_m: overlap_factor * radius_m as f64,
            min_productive: min_productive.max(1),
            processed: Vec::new(),
        }
    }

    pub fn from_config(config: &SweepConfig) -> Self {
        Self::new(
            config.skip_overlap_centers,
            config.overlap_factor,
            config.radius_m,
            config.min_productive(),
        )
    }

    /// The first productive processed center within the threshold, if any.
    /// Always `None` when pruning is disabled.
    pub fn check(&self, candidate: &SearchCenter) -> Option<OverlapHit> {
        if !self.enabled {
            return None;
        }
        self.processed
            .iter()
            .filter(|(_, added)| *added >= self.min_productive)
            .map(|(c, _)| (c, candidate.distance_m(c)))
            .find(|(_, d)| *d < self.threshold_m)
            .map(|(c, distance_m)| OverlapHit {
                near: *c,
                distance_m,
            })
    }

    pub fn record(&mut self, center: SearchCenter, new_records: usize) {
        if self.enabled {
            self.processed.push((center, new_records));
        }
    }

    pub fn processed_len(&self) -> usize {
        self.processed.len()
    }
}
