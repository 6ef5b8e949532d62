//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use url::Url;

use classement_core::{
    ProgressReporter, SyncConfig, SyncReport, SyncRun, sync_matches, sync_standings,
};
use classement_fetcher::PageFetcher;
use classement_shared::{
    AppConfig, CHAMPIONSHIPS_COLLECTION, FetchConfig, MATCHES_COLLECTION, STANDINGS_COLLECTION,
    TargetConfig, database_path, expand_home, init_config, load_config, load_config_from,
    validate_championships,
};
use classement_storage::{DocumentStore, MemoryStore, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// classement: keep league standings and fixtures in sync.
#[derive(Parser)]
#[command(
    name = "classement",
    version,
    about = "Sync federation standings and fixtures into an allow-listed document store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.classement/classement.toml).
    #[arg(long, env = "CLASSEMENT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Store collections addressable from the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum Collection {
    #[value(name = "classement")]
    Standings,
    #[value(name = "matchs")]
    Matches,
    #[value(name = "championnats")]
    Championships,
}

impl Collection {
    fn name(self) -> &'static str {
        match self {
            Self::Standings => STANDINGS_COLLECTION,
            Self::Matches => MATCHES_COLLECTION,
            Self::Championships => CHAMPIONSHIPS_COLLECTION,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Local document store management.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Fetch from the federation API and write to the store.
    Sync {
        #[command(subcommand)]
        what: SyncWhat,
    },

    /// Championship metadata.
    Championships {
        #[command(subcommand)]
        action: ChampionshipsAction,
    },

    /// Delete every document in a collection.
    Clear {
        collection: Collection,

        /// Override the configured target project.
        #[arg(long, env = "CLASSEMENT_PROJECT")]
        project: Option<String>,
    },

    /// Print every document in a collection as JSON lines.
    List { collection: Collection },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Store subcommands.
#[derive(Subcommand)]
pub(crate) enum StoreAction {
    /// Create the database and bind it to a project.
    Init {
        #[arg(long)]
        project: String,

        /// Database path (defaults to [target].database).
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// What to sync.
#[derive(Subcommand)]
pub(crate) enum SyncWhat {
    /// League tables into `classement`.
    Standings(SyncArgs),
    /// Fixtures and results into `matchs`.
    Matches {
        #[command(flatten)]
        args: SyncArgs,

        /// Empty `matchs` before appending.
        #[arg(long)]
        clear_first: bool,
    },
}

/// Flags shared by both sync commands.
#[derive(clap::Args)]
pub(crate) struct SyncArgs {
    /// Championship id from the config (repeatable). Defaults to all.
    #[arg(long = "championship")]
    pub championships: Vec<String>,

    /// Endpoint override for a single championship, or an ad-hoc source.
    #[arg(long)]
    pub source_url: Option<String>,

    /// Override the configured target project.
    #[arg(long, env = "CLASSEMENT_PROJECT")]
    pub project: Option<String>,

    /// Accept invalid TLS certificates for this run.
    #[arg(long)]
    pub insecure: bool,

    /// Write to an in-memory store instead of the database.
    #[arg(long)]
    pub dry_run: bool,
}

/// Championship subcommands.
#[derive(Subcommand)]
pub(crate) enum ChampionshipsAction {
    /// Write the configured championships to `championnats`.
    Publish {
        #[arg(long, env = "CLASSEMENT_PROJECT")]
        project: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "classement=info",
        1 => "classement=debug",
        _ => "classement=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Store { action } => match action {
            StoreAction::Init { project, db } => {
                cmd_store_init(config_path, &project, db.as_deref()).await
            }
        },
        Command::Sync { what } => match what {
            SyncWhat::Standings(args) => {
                cmd_sync(config_path, SyncKind::Standings, &args, false).await
            }
            SyncWhat::Matches { args, clear_first } => {
                cmd_sync(config_path, SyncKind::Matches, &args, clear_first).await
            }
        },
        Command::Championships { action } => match action {
            ChampionshipsAction::Publish { project } => {
                cmd_publish(config_path, project.as_deref()).await
            }
        },
        Command::Clear {
            collection,
            project,
        } => cmd_clear(config_path, collection, project.as_deref()).await,
        Command::List { collection } => cmd_list(config_path, collection).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path).await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn load(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

fn target(config: &AppConfig, project: Option<&str>) -> TargetConfig {
    let mut target = TargetConfig::from(config);
    if let Some(p) = project {
        target.target_project = p.to_string();
    }
    target
}

// ---------------------------------------------------------------------------
// store init
// ---------------------------------------------------------------------------

async fn cmd_store_init(
    config_path: Option<&Path>,
    project: &str,
    db: Option<&Path>,
) -> Result<()> {
    let config = load(config_path)?;
    let path = match db {
        Some(p) => expand_home(&p.to_string_lossy())?,
        None => database_path(&config)?,
    };

    Storage::create(&path, project).await?;

    println!("Store bound to project '{project}' at {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// sync
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum SyncKind {
    Standings,
    Matches,
}

/// One championship (or ad-hoc source) to sync.
struct SyncJob {
    championship_id: Option<String>,
    source_url: Url,
}

async fn cmd_sync(
    config_path: Option<&Path>,
    kind: SyncKind,
    args: &SyncArgs,
    clear_first: bool,
) -> Result<()> {
    let config = load(config_path)?;
    validate_championships(&config.championships)?;

    let jobs = select_jobs(&config, kind, &args.championships, args.source_url.as_deref())?;
    let target = target(&config, args.project.as_deref());

    let mut fetch = FetchConfig::from(&config);
    fetch.insecure_tls |= args.insecure;
    let fetcher = PageFetcher::new(fetch)?;

    info!(
        ?kind,
        jobs = jobs.len(),
        project = %target.target_project,
        dry_run = args.dry_run,
        "starting sync"
    );

    if args.dry_run {
        let store = MemoryStore::new(target.target_project.clone());
        run_jobs(&store, &fetcher, &jobs, &target, kind, clear_first).await?;
        println!("  Dry run: nothing was written to the database.");
    } else {
        let store = Storage::open(&database_path(&config)?).await?;
        run_jobs(&store, &fetcher, &jobs, &target, kind, clear_first).await?;
    }
    Ok(())
}

fn select_jobs(
    config: &AppConfig,
    kind: SyncKind,
    ids: &[String],
    source_url: Option<&str>,
) -> Result<Vec<SyncJob>> {
    let override_url = source_url
        .map(|raw| Url::parse(raw).map_err(|e| eyre!("invalid URL '{raw}': {e}")))
        .transpose()?;

    if ids.is_empty() {
        if let Some(url) = override_url {
            return Ok(vec![SyncJob {
                championship_id: None,
                source_url: url,
            }]);
        }
    } else if override_url.is_some() && ids.len() > 1 {
        return Err(eyre!("--source-url can only override a single championship"));
    }

    let selected: Vec<_> = if ids.is_empty() {
        config.championships.iter().collect()
    } else {
        ids.iter()
            .map(|id| {
                config
                    .championships
                    .iter()
                    .find(|c| c.id == *id)
                    .ok_or_else(|| eyre!("unknown championship '{id}'"))
            })
            .collect::<Result<_>>()?
    };

    let mut jobs = Vec::with_capacity(selected.len());
    for c in selected {
        let endpoint = match (&override_url, kind) {
            (Some(url), _) => url.as_str(),
            (None, SyncKind::Standings) => c.source_url.as_str(),
            (None, SyncKind::Matches) => match &c.matches_url {
                Some(url) => url.as_str(),
                None if ids.is_empty() => {
                    warn!(championship = %c.id, "no matches_url configured, skipping");
                    continue;
                }
                None => return Err(eyre!("championship '{}' has no matches_url", c.id)),
            },
        };
        jobs.push(SyncJob {
            championship_id: Some(c.id.clone()),
            source_url: Url::parse(endpoint)?,
        });
    }

    if jobs.is_empty() {
        return Err(eyre!(
            "nothing to sync: configure [[championships]] or pass --source-url"
        ));
    }
    Ok(jobs)
}

async fn run_jobs<S: DocumentStore>(
    store: &S,
    fetcher: &PageFetcher,
    jobs: &[SyncJob],
    target: &TargetConfig,
    kind: SyncKind,
    clear_first: bool,
) -> Result<()> {
    for (job, config) in jobs.iter().zip(job_configs(jobs, target, clear_first)) {
        let mut run = SyncRun::new();
        let reporter = CliProgress::new();

        let report = match kind {
            SyncKind::Standings => {
                sync_standings(store, fetcher, &config, &mut run, &reporter).await?
            }
            SyncKind::Matches => sync_matches(store, fetcher, &config, &mut run, &reporter).await?,
        };
        print_report(job, &report);
    }
    Ok(())
}

/// Per-job run configs. Only the first job clears, or later jobs would wipe earlier ones.
fn job_configs(jobs: &[SyncJob], target: &TargetConfig, clear_first: bool) -> Vec<SyncConfig> {
    jobs.iter()
        .enumerate()
        .map(|(i, job)| SyncConfig {
            source_url: job.source_url.clone(),
            championship_id: job.championship_id.clone(),
            target: target.clone(),
            clear_first: clear_first && i == 0,
        })
        .collect()
}

fn print_report(job: &SyncJob, report: &SyncReport) {
    println!();
    println!(
        "  Synced {}",
        job.championship_id.as_deref().unwrap_or(job.source_url.as_str())
    );
    println!("  Run:       {}", report.run_id);
    println!("  Pages:     {}", report.pages_fetched);
    println!("  Rows:      {}", report.rows_fetched);
    if let Some(cleared) = &report.cleared {
        println!("  Cleared:   {}", cleared.deleted);
    }
    println!("  Created:   {}", report.writes.created);
    println!("  Updated:   {}", report.writes.updated);
    println!("  Unchanged: {}", report.writes.unchanged);
    if report.is_partial() {
        println!("  Partial:   stopped at page {}", report.stop.page());
    }
    if let Some(ranking) = &report.ranking {
        if !ranking.is_clean() {
            println!("  Ranking:   anomalies found, see log");
        }
    }
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// championships / clear / list
// ---------------------------------------------------------------------------

async fn cmd_publish(config_path: Option<&Path>, project: Option<&str>) -> Result<()> {
    let config = load(config_path)?;
    if config.championships.is_empty() {
        return Err(eyre!("no [[championships]] configured"));
    }
    let target = target(&config, project);
    let store = Storage::open(&database_path(&config)?).await?;

    let reporter = CliProgress::new();
    let summary =
        classement_core::publish(&store, &target, &config.championships, &reporter).await?;
    reporter.finish();

    println!(
        "Published {} championships ({} created, {} updated, {} unchanged)",
        summary.written, summary.created, summary.updated, summary.unchanged
    );
    Ok(())
}

async fn cmd_clear(
    config_path: Option<&Path>,
    collection: Collection,
    project: Option<&str>,
) -> Result<()> {
    let config = load(config_path)?;
    let target = target(&config, project);
    let store = Storage::open(&database_path(&config)?).await?;

    let reporter = CliProgress::new();
    let summary = classement_core::clear(&store, &target, collection.name(), &reporter).await?;
    reporter.finish();

    println!(
        "Deleted {} documents from '{}' in {} batches",
        summary.deleted,
        collection.name(),
        summary.batches
    );
    Ok(())
}

async fn cmd_list(config_path: Option<&Path>, collection: Collection) -> Result<()> {
    let config = load(config_path)?;
    let store = Storage::open_readonly(&database_path(&config)?).await?;

    let docs = store.list_documents(collection.name()).await?;
    for doc in &docs {
        println!(
            "{}",
            serde_json::json!({ "id": doc.id, "body": doc.body })
        );
    }
    info!(collection = collection.name(), count = docs.len(), "listed documents");
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = init_config(config_path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, page: u32, rows: usize) {
        self.spinner
            .set_message(format!("Fetching page {page} ({rows} rows)"));
    }

    fn row_written(&self, key: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Writing [{current}/{total}] {key}"));
    }

    fn done(&self, _report: &SyncReport) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classement_shared::Championship;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn championship(id: &str, matches_url: Option<&str>) -> Championship {
        Championship {
            id: id.into(),
            name: id.to_uppercase(),
            label: id.to_uppercase(),
            order: 1,
            source_url: format!("https://api.example.com/{id}/classement"),
            matches_url: matches_url.map(String::from),
        }
    }

    fn app_config() -> AppConfig {
        AppConfig {
            championships: vec![
                championship("r1", Some("https://api.example.com/r1/matchs")),
                championship("r2", None),
            ],
            ..AppConfig::default()
        }
    }

    fn ids(jobs: &[SyncJob]) -> Vec<Option<&str>> {
        jobs.iter().map(|j| j.championship_id.as_deref()).collect()
    }

    #[test]
    fn no_selection_syncs_every_championship() {
        let jobs = select_jobs(&app_config(), SyncKind::Standings, &[], None).unwrap();
        assert_eq!(ids(&jobs), vec![Some("r1"), Some("r2")]);
        assert_eq!(jobs[1].source_url.as_str(), "https://api.example.com/r2/classement");
    }

    #[test]
    fn source_url_alone_is_an_ad_hoc_sync() {
        let jobs = select_jobs(
            &app_config(),
            SyncKind::Standings,
            &[],
            Some("https://other.example.com/table?season=2024"),
        )
        .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].championship_id, None);
        assert_eq!(jobs[0].source_url.host_str(), Some("other.example.com"));
    }

    #[test]
    fn source_url_overrides_one_named_championship() {
        let jobs = select_jobs(
            &app_config(),
            SyncKind::Matches,
            &["r2".to_string()],
            Some("https://other.example.com/r2"),
        )
        .unwrap();
        assert_eq!(ids(&jobs), vec![Some("r2")]);
        assert_eq!(jobs[0].source_url.as_str(), "https://other.example.com/r2");
    }

    #[test]
    fn source_url_with_several_championships_is_rejected() {
        let err = select_jobs(
            &app_config(),
            SyncKind::Standings,
            &["r1".to_string(), "r2".to_string()],
            Some("https://other.example.com/x"),
        )
        .err()
        .expect("must refuse");
        assert!(err.to_string().contains("single championship"));
    }

    #[test]
    fn invalid_source_url_is_rejected() {
        let err = select_jobs(&app_config(), SyncKind::Standings, &[], Some("not a url"))
            .err()
            .expect("must refuse");
        assert!(err.to_string().contains("invalid URL"));
    }

    #[test]
    fn unknown_championship_is_an_error() {
        let err = select_jobs(&app_config(), SyncKind::Standings, &["n3".to_string()], None)
            .err()
            .expect("must refuse");
        assert!(err.to_string().contains("unknown championship 'n3'"));
    }

    #[test]
    fn missing_matches_url_is_skipped_when_unselected() {
        let jobs = select_jobs(&app_config(), SyncKind::Matches, &[], None).unwrap();
        assert_eq!(ids(&jobs), vec![Some("r1")]);
        assert_eq!(jobs[0].source_url.as_str(), "https://api.example.com/r1/matchs");
    }

    #[test]
    fn missing_matches_url_is_an_error_when_named() {
        let err = select_jobs(&app_config(), SyncKind::Matches, &["r2".to_string()], None)
            .err()
            .expect("must refuse");
        assert!(err.to_string().contains("has no matches_url"));
    }

    #[test]
    fn empty_config_has_nothing_to_sync() {
        let err = select_jobs(&AppConfig::default(), SyncKind::Standings, &[], None)
            .err()
            .expect("must refuse");
        assert!(err.to_string().contains("nothing to sync"));
    }

    #[test]
    fn only_the_first_job_clears() {
        let jobs = select_jobs(&app_config(), SyncKind::Standings, &[], None).unwrap();
        let target = TargetConfig {
            target_project: "prod".into(),
            allowed_projects: vec!["prod".into()],
        };
        let configs = job_configs(&jobs, &target, true);
        let clears: Vec<bool> = configs.iter().map(|c| c.clear_first).collect();
        assert_eq!(clears, vec![true, false]);
        assert_eq!(configs[1].championship_id.as_deref(), Some("r2"));
        assert!(job_configs(&jobs, &target, false).iter().all(|c| !c.clear_first));
    }

    #[tokio::test]
    async fn later_jobs_keep_matches_written_by_earlier_ones() {
        let server = MockServer::start().await;
        for id in ["r1", "r2"] {
            let fixture = json!({ "homeTeam": format!("{id}-A"), "awayTeam": format!("{id}-B") });
            Mock::given(method("GET"))
                .and(path(format!("/{id}/matchs")))
                .and(query_param("page", "1"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "hydra:member": [fixture] })),
                )
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!("/{id}/matchs")))
                .and(query_param("page", "2"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "hydra:member": [] })),
                )
                .mount(&server)
                .await;
        }

        let jobs: Vec<SyncJob> = ["r1", "r2"]
            .iter()
            .map(|id| SyncJob {
                championship_id: Some(id.to_string()),
                source_url: Url::parse(&format!("{}/{id}/matchs", server.uri())).unwrap(),
            })
            .collect();
        let target = TargetConfig {
            target_project: "prod".into(),
            allowed_projects: vec!["prod".into()],
        };
        let store = MemoryStore::new("prod");
        store.seed(MATCHES_COLLECTION, [("stale".to_string(), json!({}))]);
        let fetcher = PageFetcher::new(FetchConfig {
            timeout_secs: 5,
            ..FetchConfig::default()
        })
        .unwrap();

        run_jobs(&store, &fetcher, &jobs, &target, SyncKind::Matches, true)
            .await
            .unwrap();

        assert_eq!(store.len(MATCHES_COLLECTION), 2);
        assert!(store.raw(MATCHES_COLLECTION, "stale").is_none());
        assert_eq!(store.batch_sizes(), vec![1]);
    }
}
