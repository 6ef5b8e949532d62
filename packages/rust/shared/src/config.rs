//! Application configuration for the classement sync tool.
//!
//! User config lives at `~/.classement/classement.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ClassementError, Result};
use crate::types::Championship;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "classement.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".classement";

// ---------------------------------------------------------------------------
// Config structs (matching classement.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Standings API settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Write target and its allow-list.
    #[serde(default)]
    pub target: TargetSection,

    /// Known championships.
    #[serde(default)]
    pub championships: Vec<Championship>,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// First page requested.
    #[serde(default = "default_start_page")]
    pub start_page: u32,

    /// JSON field holding the rows of a page.
    #[serde(default = "default_member_key")]
    pub member_key: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Disable TLS certificate validation. Never on by default.
    #[serde(default)]
    pub insecure_tls: bool,

    /// Upper bound on pages fetched in one run.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// User-Agent header sent to the API.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            start_page: default_start_page(),
            member_key: default_member_key(),
            timeout_secs: default_timeout_secs(),
            insecure_tls: false,
            max_pages: default_max_pages(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_start_page() -> u32 {
    1
}
fn default_member_key() -> String {
    "hydra:member".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_pages() -> u32 {
    200
}
fn default_user_agent() -> String {
    concat!("classement/", env!("CARGO_PKG_VERSION")).into()
}

/// `[target]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSection {
    /// Project the run is expected to write to.
    #[serde(default)]
    pub project: String,

    /// Projects considered valid write targets.
    #[serde(default)]
    pub allowed_projects: Vec<String>,

    /// Path to the local document database.
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            project: String::new(),
            allowed_projects: Vec::new(),
            database: default_database(),
        }
    }
}

fn default_database() -> String {
    "~/.classement/classement.db".into()
}

// ---------------------------------------------------------------------------
// Runtime config (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub start_page: u32,
    pub member_key: String,
    pub timeout_secs: u64,
    pub insecure_tls: bool,
    pub max_pages: u32,
    pub user_agent: String,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            start_page: config.source.start_page,
            member_key: config.source.member_key.clone(),
            timeout_secs: config.source.timeout_secs,
            insecure_tls: config.source.insecure_tls,
            max_pages: config.source.max_pages,
            user_agent: config.source.user_agent.clone(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Runtime write-target configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    pub target_project: String,
    pub allowed_projects: Vec<String>,
}

impl From<&AppConfig> for TargetConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            target_project: config.target.project.clone(),
            allowed_projects: config.target.allowed_projects.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.classement/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ClassementError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.classement/classement.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ClassementError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ClassementError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Write a default config file at `path`, or at the default location.
/// Returns the path to the created file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ClassementError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ClassementError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ClassementError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| ClassementError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

/// Resolved path of the local document database.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    expand_home(&config.target.database)
}

/// Check the write target before any network traffic happens.
pub fn validate_target(target: &TargetConfig) -> Result<()> {
    if target.target_project.trim().is_empty() {
        return Err(ClassementError::config(
            "no target project configured. Set [target].project or pass --project",
        ));
    }
    if target.allowed_projects.is_empty() {
        return Err(ClassementError::config(
            "[target].allowed_projects is empty, refusing to write anywhere",
        ));
    }
    Ok(())
}

/// Check that every championship has an id and parseable endpoints.
pub fn validate_championships(championships: &[Championship]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for c in championships {
        if c.id.trim().is_empty() {
            return Err(ClassementError::config(format!(
                "championship '{}' has an empty id",
                c.name
            )));
        }
        if !seen.insert(c.id.as_str()) {
            return Err(ClassementError::config(format!(
                "duplicate championship id '{}'",
                c.id
            )));
        }
        Url::parse(&c.source_url).map_err(|e| {
            ClassementError::config(format!("championship '{}': bad source_url: {e}", c.id))
        })?;
        if let Some(m) = &c.matches_url {
            Url::parse(m).map_err(|e| {
                ClassementError::config(format!("championship '{}': bad matches_url: {e}", c.id))
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("member_key"));
        assert!(toml_str.contains("hydra:member"));
        assert!(toml_str.contains("insecure_tls = false"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.source.start_page, 1);
        assert_eq!(parsed.source.timeout_secs, 30);
        assert!(!parsed.source.insecure_tls);
    }

    #[test]
    fn config_with_championships() {
        let toml_str = r#"
[target]
project = "classement-prod"
allowed_projects = ["classement-prod", "classement-staging"]

[[championships]]
id = "r1-m"
name = "Régionale 1 Masculine"
label = "R1M"
order = 2
source_url = "https://api.example.com/poules/42/classement_journees"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.championships.len(), 1);
        assert_eq!(config.championships[0].order, 2);
        assert!(config.championships[0].matches_url.is_none());

        let target = TargetConfig::from(&config);
        assert_eq!(target.allowed_projects.len(), 2);
        validate_target(&target).expect("valid target");
        validate_championships(&config.championships).expect("valid championships");
    }

    #[test]
    fn fetch_config_from_app_config() {
        let mut app = AppConfig::default();
        app.source.insecure_tls = true;
        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.max_pages, 200);
        assert_eq!(fetch.member_key, "hydra:member");
        assert!(fetch.insecure_tls);
    }

    #[test]
    fn empty_allow_list_is_rejected() {
        let target = TargetConfig {
            target_project: "classement-prod".into(),
            allowed_projects: vec![],
        };
        let err = validate_target(&target).unwrap_err();
        assert!(err.to_string().contains("allowed_projects"));

        let target = TargetConfig {
            target_project: " ".into(),
            allowed_projects: vec!["classement-prod".into()],
        };
        assert!(validate_target(&target).is_err());
    }

    #[test]
    fn duplicate_championship_ids_are_rejected() {
        let c = Championship {
            id: "n3".into(),
            name: "Nationale 3".into(),
            label: String::new(),
            order: 0,
            source_url: "https://api.example.com/n3".into(),
            matches_url: None,
        };
        let err = validate_championships(&[c.clone(), c]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn expand_home_leaves_plain_paths_alone() {
        assert_eq!(
            expand_home("/var/lib/classement.db").unwrap(),
            PathBuf::from("/var/lib/classement.db")
        );
    }

    #[test]
    fn init_config_writes_loadable_file() {
        let path = std::env::temp_dir()
            .join(format!("classement-cfg-{}", std::process::id()))
            .join("classement.toml");
        let written = init_config(Some(&path)).expect("init");
        let loaded = load_config_from(&written).expect("load");
        assert_eq!(loaded.source.member_key, "hydra:member");
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
