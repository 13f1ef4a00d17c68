use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StudioFinderError;

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "recording studio",
    "music studio",
    "mixing studio",
    "mastering studio",
    "rehearsal studio",
    "music production",
];

/// How the configured keyword list turns into per-center queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeywordStrategy {
    /// One search per configured keyword.
    #[default]
    All,
    /// Only the first configured keyword.
    First,
    /// All keywords tokenized and merged into one synthetic query.
    Combined,
}

impl FromStr for KeywordStrategy {
    type Err = StudioFinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(KeywordStrategy::All),
            "first" => Ok(KeywordStrategy::First),
            "combined" => Ok(KeywordStrategy::Combined),
            other => Err(StudioFinderError::config(format!(
                "unknown keyword strategy '{other}' (expected all, first or combined)"
            ))),
        }
    }
}

impl std::fmt::Display for KeywordStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KeywordStrategy::All => "all",
            KeywordStrategy::First => "first",
            KeywordStrategy::Combined => "combined",
        };
        f.write_str(s)
    }
}

/// How the Sheets client gets its bearer token.
#[derive(Clone, PartialEq)]
pub enum SheetsAuth {
    /// Service-account key file; tokens are minted and renewed.
    ServiceAccount(PathBuf),
    /// A token minted elsewhere. Expires on its own schedule.
    AccessToken(String),
}

impl std::fmt::Debug for SheetsAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetsAuth::ServiceAccount(path) => f.debug_tuple("ServiceAccount").field(path).finish(),
            SheetsAuth::AccessToken(token) => f.debug_tuple("AccessToken").field(&preview(token)).finish(),
        }
    }
}

/// Secrets and destination identifiers. Required before any network call.
#[derive(Clone)]
pub struct Credentials {
    pub places_api_key: String,
    pub sheet_id: String,
    pub sheets_auth: SheetsAuth,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("places_api_key", &preview(&self.places_api_key))
            .field("sheet_id", &preview(&self.sheet_id))
            .field("sheets_auth", &self.sheets_auth)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, StudioFinderError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Reports every missing variable at once.
    /// A service-account file wins over a fixed token when both are set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StudioFinderError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let places_api_key = get("GOOGLEAPI_KEY");
        let sheet_id = get("GOOGLESHEETS");
        let sheets_auth = get("GOOGLESERVICE")
            .map(|path| SheetsAuth::ServiceAccount(PathBuf::from(path.trim())))
            .or_else(|| get("GOOGLE_SHEETS_TOKEN").map(SheetsAuth::AccessToken));

        let mut missing = Vec::new();
        if places_api_key.is_none() {
            missing.push("GOOGLEAPI_KEY");
        }
        if sheet_id.is_none() {
            missing.push("GOOGLESHEETS");
        }
        if sheets_auth.is_none() {
            missing.push("GOOGLESERVICE or GOOGLE_SHEETS_TOKEN");
        }
        match (places_api_key, sheet_id, sheets_auth) {
            (Some(places_api_key), Some(sheet_id), Some(sheets_auth)) => Ok(Self {
                places_api_key,
                sheet_id,
                sheets_auth,
            }),
            _ => Err(StudioFinderError::config(format!(
                "missing required variables: {}",
                missing.join(", ")
            ))),
        }
    }

    pub fn log_redacted(&self) {
        tracing::info!("Credentials loaded:");
        tracing::info!("  GOOGLEAPI_KEY: {}", preview(&self.places_api_key));
        tracing::info!("  GOOGLESHEETS: {}", preview(&self.sheet_id));
        match &self.sheets_auth {
            SheetsAuth::ServiceAccount(path) => tracing::info!("  GOOGLESERVICE: {}", path.display()),
            SheetsAuth::AccessToken(token) => tracing::info!("  GOOGLE_SHEETS_TOKEN: {}", preview(token)),
        }
    }
}

fn preview(val: &str) -> String {
    let head: String = val.chars().take(5).collect();
    format!("{head}...({} chars)", val.len())
}

/// Destination write tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteConfig {
    /// Buffered rows that trigger a flush.
    pub flush_every: usize,
    /// Rows per append call at the start of each flush.
    pub chunk_rows: usize,
    pub max_attempts: u32,
    pub backoff_base: f64,
    /// Pause between successive chunk appends.
    pub pace: Duration,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            flush_every: 10,
            chunk_rows: 50,
            max_attempts: 10,
            backoff_base: 5.0,
            pace: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailCrawlConfig {
    pub max_pages: usize,
    pub pace: Duration,
    pub user_agent: String,
}

impl Default for EmailCrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 3,
            pace: Duration::from_millis(500),
            user_agent: "Mozilla/5.0 (compatible; StudioBot/1.0)".to_string(),
        }
    }
}

/// Every tunable of a sweep, built once by the entry point and passed by
/// reference into the orchestrator and its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub region_code: String,
    pub region_bbox_file: Option<PathBuf>,
    pub centers_file: Option<PathBuf>,
    pub keywords: Vec<String>,
    pub grid_spacing_km: f64,
    pub radius_m: u32,
    /// Delay after every upstream call.
    pub pace: Duration,
    /// Delay before a continuation page token becomes usable.
    pub page_settle: Duration,
    pub language: String,
    pub region_bias: String,
    pub tab_title: Option<String>,
    pub tab_template: Option<String>,
    pub backup_csv: Option<PathBuf>,
    pub keyword_strategy: KeywordStrategy,
    pub combined_max_tokens: usize,
    pub max_keywords_per_center: Option<usize>,
    pub stop_after_new: Option<usize>,
    pub skip_overlap_centers: bool,
    pub overlap_factor: f64,
    pub enrich_emails: bool,
    pub write: WriteConfig,
    pub email: EmailCrawlConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            region_code: "CA".to_string(),
            region_bbox_file: None,
            centers_file: None,
            keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            grid_spacing_km: 30.0,
            radius_m: 25_000,
            pace: Duration::from_secs(1),
            page_settle: Duration::from_secs(2),
            language: "en".to_string(),
            region_bias: "us".to_string(),
            tab_title: None,
            tab_template: None,
            backup_csv: None,
            keyword_strategy: KeywordStrategy::All,
            combined_max_tokens: 8,
            max_keywords_per_center: None,
            stop_after_new: None,
            skip_overlap_centers: false,
            overlap_factor: 0.6,
            enrich_emails: false,
            write: WriteConfig::default(),
            email: EmailCrawlConfig::default(),
        }
    }
}

impl SweepConfig {
    pub fn from_env() -> Result<Self, StudioFinderError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` provides. Zero for the
    /// optional limits means "no limit".
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StudioFinderError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(v) = get("TARGET_STATE") {
            config.region_code = v.to_uppercase();
        }
        config.region_bbox_file = get("STATE_BBOX_FILE").map(PathBuf::from);
        config.centers_file = get("CENTERS_CSV").map(PathBuf::from);
        if let Some(v) = get("KEYWORDS") {
            config.keywords = split_keywords(&v);
        }
        if let Some(v) = get("GRID_SPACING_KM") {
            config.grid_spacing_km = parse(&v, "GRID_SPACING_KM")?;
        }
        if let Some(v) = get("RADIUS_M") {
            config.radius_m = parse(&v, "RADIUS_M")?;
        }
        if let Some(v) = get("PACE_SECONDS") {
            config.pace = seconds(&v, "PACE_SECONDS")?;
        }
        config.tab_title = get("SHEET_STATE");
        config.tab_template = get("SHEET_TAB_TEMPLATE");
        config.backup_csv = get("CSV_OUTPUT").map(PathBuf::from);
        if let Some(v) = get("KEYWORD_STRATEGY") {
            config.keyword_strategy = v.parse()?;
        }
        if let Some(v) = get("MAX_KEYWORDS_PER_CENTER") {
            config.max_keywords_per_center = non_zero(parse(&v, "MAX_KEYWORDS_PER_CENTER")?);
        }
        if let Some(v) = get("STOP_AFTER_NEW") {
            config.stop_after_new = non_zero(parse(&v, "STOP_AFTER_NEW")?);
        }
        if let Some(v) = get("SKIP_OVERLAP_CENTERS") {
            config.skip_overlap_centers = v == "1";
        }
        if let Some(v) = get("OVERLAP_FACTOR") {
            config.overlap_factor = parse(&v, "OVERLAP_FACTOR")?;
        }
        if let Some(v) = get("ENRICH_EMAILS") {
            config.enrich_emails = v == "1";
        }
        if let Some(v) = get("FLUSH_EVERY") {
            config.write.flush_every = parse(&v, "FLUSH_EVERY")?;
        }
        if let Some(v) = get("CHUNK_APPEND_ROWS") {
            config.write.chunk_rows = parse(&v, "CHUNK_APPEND_ROWS")?;
        }
        if let Some(v) = get("SHEETS_PACE_SECONDS") {
            config.write.pace = seconds(&v, "SHEETS_PACE_SECONDS")?;
        }
        if let Some(v) = get("EMAIL_MAX_PAGES_PER_SITE") {
            config.email.max_pages = parse(&v, "EMAIL_MAX_PAGES_PER_SITE")?;
        }
        if let Some(v) = get("EMAIL_CRAWL_PACE_SECONDS") {
            config.email.pace = seconds(&v, "EMAIL_CRAWL_PACE_SECONDS")?;
        }
        if let Some(v) = get("EMAIL_USER_AGENT") {
            config.email.user_agent = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StudioFinderError> {
        if self.keywords.is_empty() {
            return Err(StudioFinderError::config("at least one keyword is required"));
        }
        if !(self.grid_spacing_km.is_finite() && self.grid_spacing_km > 0.0) {
            return Err(StudioFinderError::config(format!(
                "grid spacing must be positive, got {}",
                self.grid_spacing_km
            )));
        }
        if self.radius_m == 0 || self.radius_m > 50_000 {
            return Err(StudioFinderError::config(format!(
                "search radius must be within 1..=50000 m, got {}",
                self.radius_m
            )));
        }
        if !(self.overlap_factor.is_finite() && self.overlap_factor > 0.0) {
            return Err(StudioFinderError::config(format!(
                "overlap factor must be positive, got {}",
                self.overlap_factor
            )));
        }
        if self.write.flush_every == 0 || self.write.chunk_rows == 0 {
            return Err(StudioFinderError::config(
                "flush threshold and chunk size must be at least 1",
            ));
        }
        if self.write.max_attempts == 0 {
            return Err(StudioFinderError::config("write attempts must be at least 1"));
        }
        Ok(())
    }

    /// New-record count at which a processed center counts as productive
    /// for overlap pruning.
    pub fn min_productive(&self) -> usize {
        self.stop_after_new.unwrap_or(1)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            region = self.region_code.as_str(),
            grid_km = self.grid_spacing_km,
            radius_m = self.radius_m,
            pace_s = self.pace.as_secs_f64(),
            keywords = ?self.keywords,
            "Sweep config"
        );
        tracing::info!(
            strategy = %self.keyword_strategy,
            max_keywords = ?self.max_keywords_per_center,
            stop_after_new = ?self.stop_after_new,
            skip_overlap = self.skip_overlap_centers,
            overlap_factor = self.overlap_factor,
            "Sweep optimizations"
        );
    }
}

pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse<T: FromStr>(value: &str, key: &str) -> Result<T, StudioFinderError> {
    value
        .parse()
        .map_err(|_| StudioFinderError::config(format!("{key} has an invalid value: '{value}'")))
}

fn seconds(value: &str, key: &str) -> Result<Duration, StudioFinderError> {
    let secs: f64 = parse(value, key)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| StudioFinderError::config(format!("{key} must be a non-negative number of seconds")))
}

fn non_zero(n: usize) -> Option<usize> {
    (n > 0).then_some(n)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = SweepConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.region_code, "CA");
        assert_eq!(config.radius_m, 25_000);
        assert_eq!(config.write.flush_every, 10);
        assert_eq!(config.write.chunk_rows, 50);
        assert_eq!(config.keywords.len(), DEFAULT_KEYWORDS.len());
        assert_eq!(config.min_productive(), 1);
    }

    #[test]
    fn env_values_override_defaults() {
        let config = SweepConfig::from_lookup(lookup(&[
            ("TARGET_STATE", "nv"),
            ("KEYWORDS", "recording studio, , rehearsal space"),
            ("KEYWORD_STRATEGY", "Combined"),
            ("STOP_AFTER_NEW", "5"),
            ("MAX_KEYWORDS_PER_CENTER", "0"),
            ("SKIP_OVERLAP_CENTERS", "1"),
            ("PACE_SECONDS", "0.25"),
        ]))
        .unwrap();
        assert_eq!(config.region_code, "NV");
        assert_eq!(config.keywords, vec!["recording studio", "rehearsal space"]);
        assert_eq!(config.keyword_strategy, KeywordStrategy::Combined);
        assert_eq!(config.stop_after_new, Some(5));
        assert_eq!(config.max_keywords_per_center, None);
        assert!(config.skip_overlap_centers);
        assert_eq!(config.pace, Duration::from_millis(250));
        assert_eq!(config.min_productive(), 5);
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        let err = SweepConfig::from_lookup(lookup(&[("RADIUS_M", "far")])).unwrap_err();
        assert!(err.to_string().contains("RADIUS_M"));
        assert!(SweepConfig::from_lookup(lookup(&[("KEYWORD_STRATEGY", "some")])).is_err());
        assert!(SweepConfig::from_lookup(lookup(&[("GRID_SPACING_KM", "0")])).is_err());
    }

    #[test]
    fn credentials_report_every_missing_variable() {
        let err = Credentials::from_lookup(lookup(&[("GOOGLESHEETS", "sheet")])).unwrap_err();
        assert!(err
            .to_string()
            .ends_with("missing required variables: GOOGLEAPI_KEY, GOOGLESERVICE or GOOGLE_SHEETS_TOKEN"));
    }

    #[test]
    fn service_account_file_is_preferred_over_a_fixed_token() {
        let creds = Credentials::from_lookup(lookup(&[
            ("GOOGLEAPI_KEY", "AIzaKEY"),
            ("GOOGLESHEETS", "sheet-123"),
            ("GOOGLESERVICE", "/etc/studiofinder/service.json"),
            ("GOOGLE_SHEETS_TOKEN", "ya29.token"),
        ]))
        .unwrap();
        assert_eq!(
            creds.sheets_auth,
            SheetsAuth::ServiceAccount(PathBuf::from("/etc/studiofinder/service.json"))
        );

        let token_only = Credentials::from_lookup(lookup(&[
            ("GOOGLEAPI_KEY", "AIzaKEY"),
            ("GOOGLESHEETS", "sheet-123"),
            ("GOOGLE_SHEETS_TOKEN", "ya29.token"),
        ]))
        .unwrap();
        assert_eq!(token_only.sheets_auth, SheetsAuth::AccessToken("ya29.token".into()));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::from_lookup(lookup(&[
            ("GOOGLEAPI_KEY", "AIzaSECRETSECRET"),
            ("GOOGLESHEETS", "sheet-123"),
            ("GOOGLE_SHEETS_TOKEN", "ya29.token"),
        ]))
        .unwrap();
        let debug = format!("{creds:?}");
        assert!(!debug.contains("SECRETSECRET"));
        assert!(debug.contains("AIzaS...(16 chars)"));
        assert!(!debug.contains("ya29.token"));
    }
}
