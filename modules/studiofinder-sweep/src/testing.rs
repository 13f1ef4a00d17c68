// Test mocks for the sweep.
//
// Three mocks matching the three trait boundaries:
// - MockPlaces (PlacesApi): keyword/page-token → scripted reply, call log
// - MockStore (TabularStore): in-memory tabs with scripted append failures
// - MockEmailFinder (EmailFinder): website → addresses
//
// Plus helpers for building hits, pages, details and records.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use places_client::{
    ApiStatus, Location, NearbyQuery, Outcome, PlaceDetails, PlacesError, RawHit, Reply,
    SearchPage,
};
use sheets_client::SheetsError;
use studiofinder_common::{CanonicalRecord, SearchCenter, HEADERS};

use crate::traits::{EmailFinder, PlacesApi, Row, TabularStore};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn hit(id: &str, name: &str) -> RawHit {
    RawHit {
        external_id: Some(id.to_string()),
        name: name.to_string(),
        location: Some(Location { lat: 32.51, lng: -116.99 }),
        vicinity: format!("{name} St"),
    }
}

pub fn page(hits: Vec<RawHit>, next_page_token: Option<&str>) -> SearchPage {
    SearchPage {
        hits,
        next_page_token: next_page_token.map(String::from),
    }
}

pub fn details_with_website(website: &str) -> PlaceDetails {
    PlaceDetails {
        website: Some(website.to_string()),
        ..PlaceDetails::default()
    }
}

pub fn ok<T>(value: T) -> Reply<T> {
    Reply {
        outcome: Outcome::Success(value),
        attempts: 1,
    }
}

pub fn zero<T>() -> Reply<T> {
    Reply {
        outcome: Outcome::ZeroResults,
        attempts: 1,
    }
}

pub fn denied<T>() -> Reply<T> {
    Reply {
        outcome: Outcome::Fatal {
            status: ApiStatus::RequestDenied,
            message: Some("The provided API key is invalid.".into()),
        },
        attempts: 1,
    }
}

pub fn record(id: &str) -> CanonicalRecord {
    CanonicalRecord {
        name: format!("Studio {id}"),
        address: "1 Harbor Dr".into(),
        city: "San Diego".into(),
        postal_code: "92101".into(),
        website: String::new(),
        phone: String::new(),
        email: String::new(),
        map_url: format!("https://maps.example/{id}"),
        lat: Some(32.7),
        lng: Some(-117.1),
        external_id: id.to_string(),
        keyword: "recording studio".into(),
        center_lat: 32.5,
        center_lng: -117.0,
    }
}

// ---------------------------------------------------------------------------
// MockPlaces
// ---------------------------------------------------------------------------

/// Scripted Places API. Searches are keyed by keyword (first page) or by
/// page token (continuations); anything unregistered is zero results.
/// Builder pattern: `.on_search()`, `.on_search_at()`, `.on_page()`,
/// `.on_details()`, `.on_details_error()`.
pub struct MockPlaces {
    searches: HashMap<String, Reply<SearchPage>>,
    searches_at: HashMap<String, Reply<SearchPage>>,
    continuations: HashMap<String, Reply<SearchPage>>,
    details: HashMap<String, Reply<PlaceDetails>>,
    details_errors: HashMap<String, u16>,
    search_log: Mutex<Vec<(SearchCenter, String, Option<String>)>>,
    details_log: Mutex<Vec<String>>,
}

impl Default for MockPlaces {
    fn default() -> Self {
        Self::new()
    }
}

fn center_key(lat: f64, lng: f64, keyword: &str) -> String {
    format!("{lat},{lng}|{keyword}")
}

impl MockPlaces {
    pub fn new() -> Self {
        Self {
            searches: HashMap::new(),
            searches_at: HashMap::new(),
            continuations: HashMap::new(),
            details: HashMap::new(),
            details_errors: HashMap::new(),
            search_log: Mutex::new(Vec::new()),
            details_log: Mutex::new(Vec::new()),
        }
    }

    /// First page for `keyword` at every center.
    pub fn on_search(mut self, keyword: &str, reply: Reply<SearchPage>) -> Self {
        self.searches.insert(keyword.to_string(), reply);
        self
    }

    /// First page for `keyword` at one center; wins over `on_search`.
    pub fn on_search_at(mut self, center: SearchCenter, keyword: &str, reply: Reply<SearchPage>) -> Self {
        self.searches_at
            .insert(center_key(center.lat, center.lng, keyword), reply);
        self
    }

    pub fn on_page(mut self, token: &str, reply: Reply<SearchPage>) -> Self {
        self.continuations.insert(token.to_string(), reply);
        self
    }

    pub fn on_details(mut self, place_id: &str, reply: Reply<PlaceDetails>) -> Self {
        self.details.insert(place_id.to_string(), reply);
        self
    }

    /// Details for `place_id` fail at the transport with this HTTP status.
    pub fn on_details_error(mut self, place_id: &str, status: u16) -> Self {
        self.details_errors.insert(place_id.to_string(), status);
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_log.lock().unwrap().len()
    }

    /// (center, keyword, page token) for every search, in call order.
    pub fn searches(&self) -> Vec<(SearchCenter, String, Option<String>)> {
        self.search_log.lock().unwrap().clone()
    }

    pub fn searched_centers(&self) -> Vec<SearchCenter> {
        let mut centers: Vec<SearchCenter> = Vec::new();
        for (c, _, token) in self.searches() {
            if token.is_none() && centers.last() != Some(&c) {
                centers.push(c);
            }
        }
        centers
    }

    pub fn details_calls(&self) -> Vec<String> {
        self.details_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlacesApi for MockPlaces {
    async fn nearby_search(&self, query: &NearbyQuery<'_>) -> places_client::Result<Reply<SearchPage>> {
        self.search_log.lock().unwrap().push((
            SearchCenter::new(query.lat, query.lng),
            query.keyword.to_string(),
            query.page_token.map(String::from),
        ));
        let reply = match query.page_token {
            Some(token) => self.continuations.get(token),
            None => self
                .searches_at
                .get(&center_key(query.lat, query.lng, query.keyword))
                .or_else(|| self.searches.get(query.keyword)),
        };
        Ok(reply.cloned().unwrap_or_else(zero))
    }

    async fn place_details(&self, place_id: &str) -> places_client::Result<Reply<PlaceDetails>> {
        self.details_log.lock().unwrap().push(place_id.to_string());
        if let Some(status) = self.details_errors.get(place_id) {
            return Err(PlacesError::Http {
                status: *status,
                message: "mock transport failure".into(),
            });
        }
        Ok(self.details.get(place_id).cloned().unwrap_or_else(zero))
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory tabs. Row 1 is the header once written. Append failures are
/// scripted with `.fail_appends()` and consumed one per append call.
#[derive(Default)]
pub struct MockStore {
    tabs: Mutex<HashMap<String, Vec<Row>>>,
    append_failures: Mutex<VecDeque<SheetsError>>,
    attempted: Mutex<Vec<usize>>,
    appended: Mutex<Vec<usize>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a tab with a header row plus `ids` as existing records.
    pub fn with_existing(self, tab: &str, ids: &[&str]) -> Self {
        {
            let mut tabs = self.tabs.lock().unwrap();
            let rows = tabs.entry(tab.to_string()).or_default();
            rows.push(HEADERS.iter().map(|h| Value::from(*h)).collect());
            for id in ids {
                rows.push(record(id).to_sheet_row());
            }
        }
        self
    }

    pub fn fail_appends(self, errors: Vec<SheetsError>) -> Self {
        self.append_failures.lock().unwrap().extend(errors);
        self
    }

    pub fn tab_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tabs.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn rows(&self, tab: &str) -> Vec<Row> {
        self.tabs.lock().unwrap().get(tab).cloned().unwrap_or_default()
    }

    /// Rows after the header.
    pub fn data_rows(&self, tab: &str) -> Vec<Row> {
        let rows = self.rows(tab);
        match rows.first() {
            Some(first) if first.first() == Some(&Value::from(HEADERS[0])) => rows[1..].to_vec(),
            _ => rows,
        }
    }

    /// Dedup-key column of every data row.
    pub fn ids(&self, tab: &str) -> Vec<String> {
        self.data_rows(tab)
            .iter()
            .filter_map(|r| r.get(studiofinder_common::DEDUP_KEY_COLUMN))
            .map(cell_text)
            .collect()
    }

    /// Row count of every append call, failed ones included.
    pub fn attempted_sizes(&self) -> Vec<usize> {
        self.attempted.lock().unwrap().clone()
    }

    /// Row count of every successful append call.
    pub fn append_sizes(&self) -> Vec<usize> {
        self.appended.lock().unwrap().clone()
    }
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `K2:K` → (col 10, row 1, col 10, None); zero-based, end row inclusive.
fn parse_cells(cells: &str) -> (usize, usize, usize, Option<usize>) {
    fn split(part: &str) -> (usize, Option<usize>) {
        let letters: String = part.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        let digits: String = part.chars().skip(letters.len()).collect();
        let col = letters
            .chars()
            .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
        (col.saturating_sub(1), digits.parse::<usize>().ok().map(|r| r - 1))
    }
    let mut parts = cells.split(':');
    let (c0, r0) = split(parts.next().unwrap_or("A1"));
    let (c1, r1) = parts.next().map(split).unwrap_or((c0, r0));
    (c0, r0.unwrap_or(0), c1, r1)
}

#[async_trait]
impl TabularStore for MockStore {
    async fn ensure_tab(&self, tab: &str) -> sheets_client::Result<()> {
        self.tabs.lock().unwrap().entry(tab.to_string()).or_default();
        Ok(())
    }

    async fn get_range(&self, tab: &str, cells: &str) -> sheets_client::Result<Vec<Vec<String>>> {
        let (c0, r0, c1, r1) = parse_cells(cells);
        let rows = self.rows(tab);
        let end = r1.map(|r| r + 1).unwrap_or(rows.len()).min(rows.len());
        Ok(rows
            .get(r0..end)
            .unwrap_or_default()
            .iter()
            .map(|row| {
                row.iter()
                    .skip(c0)
                    .take(c1 + 1 - c0)
                    .map(cell_text)
                    .collect::<Vec<_>>()
            })
            .filter(|row: &Vec<String>| !row.is_empty())
            .collect())
    }

    async fn update_range(&self, tab: &str, cells: &str, rows: &[Row]) -> sheets_client::Result<()> {
        let (_, r0, _, _) = parse_cells(cells);
        let mut tabs = self.tabs.lock().unwrap();
        let existing = tabs.entry(tab.to_string()).or_default();
        for (i, row) in rows.iter().enumerate() {
            let idx = r0 + i;
            if idx < existing.len() {
                existing[idx] = row.clone();
            } else {
                existing.resize(idx, Vec::new());
                existing.push(row.clone());
            }
        }
        Ok(())
    }

    async fn append_rows(&self, tab: &str, rows: &[Row]) -> sheets_client::Result<()> {
        self.attempted.lock().unwrap().push(rows.len());
        if let Some(err) = self.append_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.appended.lock().unwrap().push(rows.len());
        self.tabs
            .lock()
            .unwrap()
            .entry(tab.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockEmailFinder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockEmailFinder {
    sites: HashMap<String, Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockEmailFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_site(mut self, website: &str, emails: &[&str]) -> Self {
        self.sites
            .insert(website.to_string(), emails.iter().map(|e| e.to_string()).collect());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailFinder for MockEmailFinder {
    async fn find_emails(&self, website: &str) -> Vec<String> {
        self.calls.lock().unwrap().push(website.to_string());
        self.sites.get(website).cloned().unwrap_or_default()
    }
}
