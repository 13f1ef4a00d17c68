use crate::filter::Screening;

/// Counters for one sweep, logged when the run ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub centers_visited: u32,
    pub centers_skipped_overlap: u32,
    pub searches: u32,
    pub pages: u32,
    pub detail_lookups: u32,
    pub hits_seen: u32,
    pub hits_missing_id: u32,
    pub hits_known: u32,
    pub hits_rejected: u32,
    pub records_added: u32,
    pub flushes: u32,
}

impl SweepStats {
    pub fn record_screening(&mut self, screening: Screening) {
        self.hits_seen += 1;
        match screening {
            Screening::MissingId => self.hits_missing_id += 1,
            Screening::Known => self.hits_known += 1,
            Screening::Excluded | Screening::NotRelevant => self.hits_rejected += 1,
            Screening::Accepted => {}
        }
    }
}

impl std::fmt::Display for SweepStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Sweep Complete ===")?;
        writeln!(f, "Centers visited:    {}", self.centers_visited)?;
        writeln!(f, "Centers skipped:    {} (overlap)", self.centers_skipped_overlap)?;
        writeln!(f, "Searches:           {}", self.searches)?;
        writeln!(f, "Result pages:       {}", self.pages)?;
        writeln!(f, "Detail lookups:     {}", self.detail_lookups)?;
        writeln!(f, "\nHits:")?;
        writeln!(f, "  Seen:        {}", self.hits_seen)?;
        writeln!(f, "  No id:       {}", self.hits_missing_id)?;
        writeln!(f, "  Known:       {}", self.hits_known)?;
        writeln!(f, "  Filtered:    {}", self.hits_rejected)?;
        writeln!(f, "\nRecords added:      {}", self.records_added)?;
        writeln!(f, "Flushes:            {}", self.flushes)?;
        Ok(())
    }
}
