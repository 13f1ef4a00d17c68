use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use places_client::PlacesClient;
use sheets_client::{ServiceAccountToken, SheetsClient, StaticToken};
use studiofinder_common::{split_keywords, Credentials, KeywordStrategy, SheetsAuth, SweepConfig};
use studiofinder_sweep::enrichment::SiteEmailFinder;
use studiofinder_sweep::notify::LogNotifier;
use studiofinder_sweep::regions::{load_centers, load_region_bbox};
use studiofinder_sweep::{BatchOutcome, BatchRunner, Sweep, SweepOutcome};

/// Exit code for a run stopped by Places or a failed batch region.
const EXIT_HALTED: u8 = 2;

#[derive(Parser)]
#[command(name = "studiofinder")]
#[command(about = "Sweep a region for recording studios into a spreadsheet")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep one region
    Sweep(SweepArgs),

    /// Sweep every <CODE>.csv centers file in a directory
    Batch {
        /// Directory of centers files (default: $STATES_DIR or ./states)
        #[arg(long)]
        dir: Option<PathBuf>,

        #[command(flatten)]
        tuning: Tuning,
    },
}

#[derive(clap::Args)]
struct SweepArgs {
    /// Region code, e.g. CA
    #[arg(long)]
    region: Option<String>,

    /// CSV with state_code,state_name,lat_min,lat_max,lng_min,lng_max
    #[arg(long)]
    bbox_file: Option<PathBuf>,

    /// CSV of lat,lng centers to use instead of a grid
    #[arg(long)]
    centers: Option<PathBuf>,

    /// Local CSV copy of every added record
    #[arg(long)]
    backup_csv: Option<PathBuf>,

    #[command(flatten)]
    tuning: Tuning,
}

/// Overrides shared by both commands. Unset flags keep the environment's
/// values.
#[derive(clap::Args)]
struct Tuning {
    /// Comma-separated search keywords
    #[arg(long)]
    keywords: Option<String>,

    #[arg(long)]
    grid_spacing_km: Option<f64>,

    #[arg(long)]
    radius_m: Option<u32>,

    /// Delay after every Places call
    #[arg(long)]
    pace_seconds: Option<f64>,

    /// Exact destination tab title
    #[arg(long)]
    tab: Option<String>,

    /// Tab title template ({region_code}, {region_name}, {yyyymmdd})
    #[arg(long)]
    tab_template: Option<String>,

    /// all | first | combined
    #[arg(long)]
    keyword_strategy: Option<KeywordStrategy>,

    #[arg(long)]
    max_keywords_per_center: Option<usize>,

    /// Move to the next center after this many new records
    #[arg(long)]
    stop_after_new: Option<usize>,

    /// Skip centers overlapping a productive one
    #[arg(long)]
    skip_overlap: bool,

    /// Look up contact emails on each studio's website
    #[arg(long)]
    enrich_emails: bool,
}

impl Tuning {
    fn apply(&self, config: &mut SweepConfig) -> Result<()> {
        if let Some(k) = &self.keywords {
            config.keywords = split_keywords(k);
        }
        if let Some(v) = self.grid_spacing_km {
            config.grid_spacing_km = v;
        }
        if let Some(v) = self.radius_m {
            config.radius_m = v;
        }
        if let Some(v) = self.pace_seconds {
            config.pace = std::time::Duration::try_from_secs_f64(v).context("--pace-seconds must be >= 0")?;
        }
        if self.tab.is_some() {
            config.tab_title = self.tab.clone();
        }
        if self.tab_template.is_some() {
            config.tab_template = self.tab_template.clone();
        }
        if let Some(v) = self.keyword_strategy {
            config.keyword_strategy = v;
        }
        if let Some(v) = self.max_keywords_per_center {
            config.max_keywords_per_center = (v > 0).then_some(v);
        }
        if let Some(v) = self.stop_after_new {
            config.stop_after_new = (v > 0).then_some(v);
        }
        config.skip_overlap_centers |= self.skip_overlap;
        config.enrich_emails |= self.enrich_emails;
        Ok(())
    }
}

/// Everything resolved before the first network call.
struct Setup {
    config: SweepConfig,
    places: PlacesClient,
    sheets: SheetsClient,
    emails: Option<SiteEmailFinder>,
}

fn setup(tuning: &Tuning, adjust: impl FnOnce(&mut SweepConfig)) -> Result<Setup> {
    let credentials = Credentials::from_env()?;
    credentials.log_redacted();

    let mut config = SweepConfig::from_env()?;
    adjust(&mut config);
    tuning.apply(&mut config)?;
    config.validate()?;
    config.log_summary();

    let places = PlacesClient::new(&credentials.places_api_key)?
        .with_locale(&config.language, &config.region_bias);
    let sheets = match &credentials.sheets_auth {
        SheetsAuth::ServiceAccount(path) => {
            let tokens = ServiceAccountToken::from_file(path)
                .with_context(|| format!("loading service account {}", path.display()))?;
            info!(account = tokens.client_email(), "Sheets auth via service account");
            SheetsClient::new(&credentials.sheet_id, tokens)?
        }
        SheetsAuth::AccessToken(token) => SheetsClient::new(&credentials.sheet_id, StaticToken::new(token))?,
    };
    let emails = if config.enrich_emails {
        Some(SiteEmailFinder::new(&config.email)?)
    } else {
        None
    };
    Ok(Setup {
        config,
        places,
        sheets,
        emails,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::from_default_env().add_directive(
        "studiofinder=info"
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
    );
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = format!("{e:#}"), "Run failed");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Sweep(args) => run_sweep(args).await,
        Commands::Batch { dir, tuning } => run_batch(dir, tuning).await,
    }
}

async fn run_sweep(args: SweepArgs) -> Result<ExitCode> {
    let setup = setup(&args.tuning, |config| {
        if let Some(region) = &args.region {
            config.region_code = region.to_uppercase();
        }
        if args.bbox_file.is_some() {
            config.region_bbox_file = args.bbox_file.clone();
        }
        if args.centers.is_some() {
            config.centers_file = args.centers.clone();
        }
        if args.backup_csv.is_some() {
            config.backup_csv = args.backup_csv.clone();
        }
    })?;
    let config = &setup.config;

    let bbox = load_region_bbox(&config.region_code, config.region_bbox_file.as_deref())?;
    let centers = config.centers_file.as_deref().map(load_centers).transpose()?;
    info!(
        region = bbox.region_code.as_str(),
        name = bbox.region_name.as_str(),
        "Studio sweep starting"
    );

    let mut sweep = Sweep::new(config, &setup.places, &setup.sheets);
    if let Some(finder) = &setup.emails {
        sweep = sweep.with_email_finder(finder);
    }

    match sweep.run(&bbox, centers.as_deref()).await? {
        SweepOutcome::Completed(result) => {
            info!(
                tab = result.destination_tab.as_str(),
                added = result.added_count,
                api_requests = result.api_request_count,
                "Done"
            );
            Ok(ExitCode::SUCCESS)
        }
        SweepOutcome::Halted { result, stop } => {
            error!(
                stop = %stop,
                message = stop.message.as_deref().unwrap_or(""),
                added = result.added_count,
                "Stopped early; fix the Places key or billing and rerun"
            );
            Ok(ExitCode::from(EXIT_HALTED))
        }
    }
}

async fn run_batch(dir: Option<PathBuf>, tuning: Tuning) -> Result<ExitCode> {
    let dir = dir
        .or_else(|| std::env::var("STATES_DIR").ok().filter(|d| !d.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("states"));
    let setup = setup(&tuning, |_| {})?;

    let notifier = LogNotifier;
    let mut runner = BatchRunner::new(&setup.config, &setup.places, &setup.sheets, &notifier);
    if let Some(finder) = &setup.emails {
        runner = runner.with_email_finder(finder);
    }

    match runner.run(&dir).await? {
        BatchOutcome::Completed(completed) => {
            info!(regions = completed.len(), "Batch complete");
            Ok(ExitCode::SUCCESS)
        }
        BatchOutcome::Halted { stop, .. } => {
            error!(stop = %stop, "Batch halted; fix the Places key or billing and rerun");
            Ok(ExitCode::from(EXIT_HALTED))
        }
        BatchOutcome::Failed {
            region_code, error, ..
        } => {
            error!(region = region_code.as_str(), error = format!("{error:#}"), "Batch stopped at failed region");
            Ok(ExitCode::from(EXIT_HALTED))
        }
    }
}
