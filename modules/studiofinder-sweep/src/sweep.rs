//! One region sweep: Init → Sweeping → Draining → Done.
//!
//! Init resolves and prepares the destination tab and seeds the dedup
//! ledger from it. Sweeping walks the centers and keywords strictly in
//! sequence, one upstream call at a time. Draining always runs, even
//! when sweeping failed or was halted, so buffered records are written
//! before the run reports anything.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{error, info, warn};

use places_client::{ApiStatus, NearbyQuery, Outcome, RawHit};
use studiofinder_common::{
    column_letter, BoundingBox, RunResult, SearchCenter, StudioFinderError, SweepConfig,
    DEDUP_KEY_COLUMN, HEADERS,
};

use crate::backup::BackupWriter;
use crate::buffer::WriteBuffer;
use crate::filter::screen;
use crate::grid::{Grid, GridIter};
use crate::keywords::effective_keywords;
use crate::ledger::DedupLedger;
use crate::normalize::to_record;
use crate::overlap::OverlapPruner;
use crate::stats::SweepStats;
use crate::traits::{EmailFinder, PlacesApi, Row, TabularStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Sweeping,
    Draining,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Init => "init",
            Phase::Sweeping => "sweeping",
            Phase::Draining => "draining",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Places refused the credential mid-sweep. Carries enough context to
/// report where the run stopped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{status} from Places in {region_code} at {center} for '{keyword}'")]
pub struct HardStop {
    pub region_code: String,
    pub region_name: String,
    pub destination_tab: String,
    pub center: SearchCenter,
    pub keyword: String,
    pub status: ApiStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Completed(RunResult),
    /// Ended early on a hard-stop status. Everything collected before the
    /// stop has been drained.
    Halted { result: RunResult, stop: HardStop },
}

impl SweepOutcome {
    pub fn result(&self) -> &RunResult {
        match self {
            SweepOutcome::Completed(result) | SweepOutcome::Halted { result, .. } => result,
        }
    }

    pub fn hard_stop(&self) -> Option<&HardStop> {
        match self {
            SweepOutcome::Halted { stop, .. } => Some(stop),
            SweepOutcome::Completed(_) => None,
        }
    }
}

/// Destination tab: explicit title, else the template, else the region
/// name. Templates understand `{region_code}`, `{region_name}` and
/// `{yyyymmdd}` (`{state_code}`/`{state_name}` work too).
pub fn resolve_tab_title(
    bbox: &BoundingBox,
    explicit: Option<&str>,
    template: Option<&str>,
    today: NaiveDate,
) -> String {
    if let Some(title) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    if let Some(template) = template.filter(|t| !t.trim().is_empty()) {
        let date = today.format("%Y%m%d").to_string();
        return template
            .replace("{region_code}", &bbox.region_code)
            .replace("{state_code}", &bbox.region_code)
            .replace("{region_name}", &bbox.region_name)
            .replace("{state_name}", &bbox.region_name)
            .replace("{yyyymmdd}", &date);
    }
    bbox.region_name.clone()
}

enum Flow {
    Proceed,
    Halt(HardStop),
}

enum Centers<'c> {
    Listed(std::slice::Iter<'c, SearchCenter>),
    Generated(GridIter),
}

impl Iterator for Centers<'_> {
    type Item = SearchCenter;

    fn next(&mut self) -> Option<SearchCenter> {
        match self {
            Centers::Listed(it) => it.next().copied(),
            Centers::Generated(it) => it.next(),
        }
    }
}

struct RunState<'a> {
    tab: String,
    ledger: DedupLedger,
    buffer: WriteBuffer<'a>,
    pruner: OverlapPruner,
    stats: SweepStats,
    api_requests: u64,
}

pub struct Sweep<'a> {
    config: &'a SweepConfig,
    places: &'a dyn PlacesApi,
    store: &'a dyn TabularStore,
    emails: Option<&'a dyn EmailFinder>,
    today: NaiveDate,
}

impl<'a> Sweep<'a> {
    pub fn new(config: &'a SweepConfig, places: &'a dyn PlacesApi, store: &'a dyn TabularStore) -> Self {
        Self {
            config,
            places,
            store,
            emails: None,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Used only when `enrich_emails` is on.
    pub fn with_email_finder(mut self, finder: &'a dyn EmailFinder) -> Self {
        self.emails = Some(finder);
        self
    }

    /// Date substituted into the tab template.
    pub fn with_date(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Sweep `bbox`, over `centers` when given and non-empty, else over a
    /// generated grid.
    pub async fn run(&self, bbox: &BoundingBox, centers: Option<&[SearchCenter]>) -> Result<SweepOutcome> {
        self.enter(Phase::Init, bbox);

        let source = match centers {
            Some(list) if !list.is_empty() => {
                info!(count = list.len(), "Using supplied centers");
                Centers::Listed(list.iter())
            }
            _ => {
                let grid = Grid::new(bbox, self.config.grid_spacing_km)?;
                info!(spacing_km = self.config.grid_spacing_km, "Using generated grid");
                Centers::Generated(grid.iter())
            }
        };
        let keywords = effective_keywords(self.config);
        if keywords.is_empty() {
            return Err(StudioFinderError::config("no keywords to search").into());
        }

        let tab = resolve_tab_title(
            bbox,
            self.config.tab_title.as_deref(),
            self.config.tab_template.as_deref(),
            self.today,
        );
        let mut state = self.init(&tab).await?;

        self.enter(Phase::Sweeping, bbox);
        let swept = self.sweep(bbox, source, &keywords, &mut state).await;

        self.enter(Phase::Draining, bbox);
        let drained = state.buffer.drain().await;
        state.stats.flushes = state.buffer.flushes() as u32;
        info!("{}", state.stats);

        let flow = match (swept, drained) {
            (Ok(flow), Ok(())) => flow,
            (Ok(_), Err(e)) => return Err(e.context("final flush failed")),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(drain_err)) => {
                error!(error = format!("{drain_err:#}"), "Drain after failed sweep also failed");
                return Err(e);
            }
        };

        self.enter(Phase::Done, bbox);
        let result = RunResult {
            region_code: bbox.region_code.clone(),
            region_name: bbox.region_name.clone(),
            destination_tab: state.tab.clone(),
            added_count: state.ledger.added(),
            api_request_count: state.api_requests,
        };
        info!(
            region = result.region_code.as_str(),
            tab = result.destination_tab.as_str(),
            added = result.added_count,
            api_requests = result.api_request_count,
            "Sweep finished"
        );

        Ok(match flow {
            Flow::Proceed => SweepOutcome::Completed(result),
            Flow::Halt(stop) => SweepOutcome::Halted { result, stop },
        })
    }

    fn enter(&self, phase: Phase, bbox: &BoundingBox) {
        info!(phase = %phase, region = bbox.region_code.as_str(), "Sweep phase");
    }

    async fn init(&self, tab: &str) -> Result<RunState<'a>> {
        self.store
            .ensure_tab(tab)
            .await
            .with_context(|| format!("preparing tab '{tab}'"))?;

        let header_cells = format!("A1:{}1", column_letter(HEADERS.len()));
        let header = self
            .store
            .get_range(tab, &header_cells)
            .await
            .with_context(|| format!("reading header of tab '{tab}'"))?;
        if header.iter().flatten().all(|cell| cell.trim().is_empty()) {
            let row: Row = HEADERS.iter().map(|h| Value::from(*h)).collect();
            self.store
                .update_range(tab, &header_cells, &[row])
                .await
                .with_context(|| format!("writing header of tab '{tab}'"))?;
            info!(tab, "Wrote header row");
        }

        let key = column_letter(DEDUP_KEY_COLUMN + 1);
        let existing = self
            .store
            .get_range(tab, &format!("{key}2:{key}"))
            .await
            .with_context(|| format!("reading existing ids from tab '{tab}'"))?;
        let ledger = DedupLedger::seed(existing.into_iter().filter_map(|row| row.into_iter().next()));
        info!(tab, existing = ledger.initial_len(), "Loaded dedup ledger");

        let backup = self
            .config
            .backup_csv
            .as_deref()
            .map(BackupWriter::create)
            .transpose()?;
        if let Some(b) = &backup {
            info!(path = %b.path().display(), "Writing local backup");
        }

        Ok(RunState {
            tab: tab.to_string(),
            ledger,
            buffer: WriteBuffer::new(self.store, tab, &self.config.write, backup),
            pruner: OverlapPruner::from_config(self.config),
            stats: SweepStats::default(),
            api_requests: 0,
        })
    }

    async fn sweep(
        &self,
        bbox: &BoundingBox,
        centers: Centers<'_>,
        keywords: &[String],
        state: &mut RunState<'a>,
    ) -> Result<Flow> {
        for center in centers {
            if let Some(overlap) = state.pruner.check(&center) {
                state.stats.centers_skipped_overlap += 1;
                info!(
                    center = %center,
                    near = %overlap.near,
                    distance_m = overlap.distance_m.round(),
                    "Skipping center, overlaps a productive one"
                );
                continue;
            }
            state.stats.centers_visited += 1;

            let mut found = 0usize;
            for keyword in keywords {
                if self.cap_reached(found) {
                    info!(center = %center, found, "Per-center cap reached, next center");
                    break;
                }
                let flow = self.search_keyword(bbox, center, keyword, &mut found, state).await?;
                if let Flow::Halt(stop) = flow {
                    state.pruner.record(center, found);
                    return Ok(Flow::Halt(stop));
                }
            }
            state.pruner.record(center, found);
            info!(center = %center, new_records = found, "Center done");
        }
        Ok(Flow::Proceed)
    }

    fn cap_reached(&self, found: usize) -> bool {
        self.config.stop_after_new.is_some_and(|cap| found >= cap)
    }

    /// Every page of one keyword at one center.
    async fn search_keyword(
        &self,
        bbox: &BoundingBox,
        center: SearchCenter,
        keyword: &str,
        found: &mut usize,
        state: &mut RunState<'a>,
    ) -> Result<Flow> {
        info!(keyword, center = %center, "Searching");
        let mut page_token: Option<String> = None;
        let mut page_no = 1u32;

        loop {
            let query = NearbyQuery {
                lat: center.lat,
                lng: center.lng,
                keyword,
                radius_m: self.config.radius_m,
                page_token: page_token.as_deref(),
            };
            let reply = self
                .places
                .nearby_search(&query)
                .await
                .with_context(|| format!("nearby search '{keyword}' at {center}, page {page_no}"))?;
            state.api_requests += u64::from(reply.attempts);
            if page_no == 1 {
                state.stats.searches += 1;
            }
            tokio::time::sleep(self.config.pace).await;

            let page = match reply.outcome {
                Outcome::Success(page) => page,
                Outcome::ZeroResults => return Ok(Flow::Proceed),
                Outcome::ExhaustedRetries => {
                    warn!(keyword, center = %center, page = page_no, "Search retries exhausted, skipping keyword");
                    return Ok(Flow::Proceed);
                }
                Outcome::Fatal { status, message } if status.is_hard_stop() => {
                    return Ok(Flow::Halt(self.hard_stop(bbox, state, center, keyword, status, message)));
                }
                Outcome::Fatal { status, message } => {
                    warn!(
                        keyword,
                        center = %center,
                        status = %status,
                        message = message.as_deref().unwrap_or(""),
                        "Search failed, skipping keyword"
                    );
                    return Ok(Flow::Proceed);
                }
            };
            state.stats.pages += 1;
            if page_no > 1 {
                info!(page = page_no, results = page.hits.len(), "Continuation page");
            }

            for hit in &page.hits {
                let screening = screen(hit, &state.ledger);
                state.stats.record_screening(screening);
                if !screening.is_accepted() {
                    continue;
                }
                if let Flow::Halt(stop) = self.collect(bbox, center, keyword, hit, state).await? {
                    return Ok(Flow::Halt(stop));
                }
                *found += 1;
                if self.cap_reached(*found) {
                    info!(center = %center, found = *found, "Per-center cap reached while paging");
                    return Ok(Flow::Proceed);
                }
            }

            let Some(token) = page.next_page_token else {
                return Ok(Flow::Proceed);
            };
            if *found == 0 {
                info!(keyword, center = %center, "Nothing new at this center yet, skipping further pages");
                return Ok(Flow::Proceed);
            }
            // continuation tokens are rejected until they settle
            tokio::time::sleep(self.config.page_settle).await;
            page_token = Some(token);
            page_no += 1;
        }
    }

    /// Detail lookup, optional enrichment and buffering for one accepted hit.
    async fn collect(
        &self,
        bbox: &BoundingBox,
        center: SearchCenter,
        keyword: &str,
        hit: &RawHit,
        state: &mut RunState<'a>,
    ) -> Result<Flow> {
        let Some(id) = hit.external_id.as_deref() else {
            return Ok(Flow::Proceed);
        };
        let reply = self
            .places
            .place_details(id)
            .await
            .with_context(|| format!("place details for {id}"))?;
        state.api_requests += u64::from(reply.attempts);
        state.stats.detail_lookups += 1;
        tokio::time::sleep(self.config.pace).await;

        let details = match reply.outcome {
            Outcome::Success(details) => Some(details),
            Outcome::ZeroResults => None,
            Outcome::ExhaustedRetries => {
                warn!(place_id = id, "Details retries exhausted, keeping search fields");
                None
            }
            Outcome::Fatal { status, message } if status.is_hard_stop() => {
                return Ok(Flow::Halt(self.hard_stop(bbox, state, center, keyword, status, message)));
            }
            Outcome::Fatal { status, message } => {
                warn!(
                    place_id = id,
                    status = %status,
                    message = message.as_deref().unwrap_or(""),
                    "Details failed, keeping search fields"
                );
                None
            }
        };

        let website = details.as_ref().and_then(|d| d.website.as_deref()).filter(|w| !w.is_empty());
        let emails = match (self.config.enrich_emails, self.emails, website) {
            (true, Some(finder), Some(site)) => finder.find_emails(site).await,
            _ => Vec::new(),
        };

        let record = to_record(hit, id, details.as_ref(), &emails, keyword, center);
        state.ledger.insert(id);
        state.buffer.push(&record).await?;
        state.stats.records_added += 1;
        Ok(Flow::Proceed)
    }

    fn hard_stop(
        &self,
        bbox: &BoundingBox,
        state: &RunState<'a>,
        center: SearchCenter,
        keyword: &str,
        status: ApiStatus,
        message: Option<String>,
    ) -> HardStop {
        error!(
            region = bbox.region_code.as_str(),
            center = %center,
            keyword,
            status = %status,
            message = message.as_deref().unwrap_or(""),
            "Places refused the request, halting sweep"
        );
        HardStop {
            region_code: bbox.region_code.clone(),
            region_name: bbox.region_name.clone(),
            destination_tab: state.tab.clone(),
            center,
            keyword: keyword.to_string(),
            status,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox::builtin("CA").unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn explicit_title_wins() {
        assert_eq!(
            resolve_tab_title(&bbox(), Some("Leads"), Some("{region_code}-{yyyymmdd}"), date()),
            "Leads"
        );
    }

    #[test]
    fn template_fills_placeholders() {
        assert_eq!(
            resolve_tab_title(&bbox(), None, Some("{region_code} {region_name} {yyyymmdd}"), date()),
            "CA California 20240309"
        );
        assert_eq!(
            resolve_tab_title(&bbox(), Some("  "), Some("{state_name}_{state_code}"), date()),
            "California_CA"
        );
    }

    #[test]
    fn region_name_is_the_default() {
        assert_eq!(resolve_tab_title(&bbox(), None, None, date()), "California");
    }

    #[test]
    fn hard_stop_display_names_the_location() {
        let stop = HardStop {
            region_code: "CA".into(),
            region_name: "California".into(),
            destination_tab: "California".into(),
            center: SearchCenter::new(32.5, -117.0),
            keyword: "recording studio".into(),
            status: ApiStatus::RequestDenied,
            message: None,
        };
        assert_eq!(
            stop.to_string(),
            "REQUEST_DENIED from Places in CA at (32.5, -117) for 'recording studio'"
        );
    }
}
