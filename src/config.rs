use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default query window for pipeline status lookups, minutes.
pub const DEFAULT_PIPELINE_WINDOW_MINUTES: i64 = 60;

/// Default query window for the main-branch running-pipeline probe,
/// minutes. Longer, because that pipeline may have been started well
/// before this run.
pub const DEFAULT_MAIN_PIPELINE_WINDOW_MINUTES: i64 = 1440;

/// Configuration file structure for cibridge.
///
/// Lets deployments keep sync settings next to the service instead of on
/// the command line. Loaded from ./cibridge.toml when present; command-line
/// flags win over file values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfig {
    /// Branch whose running pipeline gates base-backlog decisions
    pub main_branch: Option<String>,

    /// GitHub checks that must succeed before a PR is pushed
    pub prereq_checks: Vec<String>,

    /// Window for pipeline status queries, minutes
    pub pipeline_window_minutes: Option<i64>,

    /// Window for the main-branch running-pipeline probe, minutes
    pub main_pipeline_window_minutes: Option<i64>,
}

impl FileConfig {
    /// Load configuration from a file.
    ///
    /// Uses the specified path, then ./cibridge.toml, then defaults when
    /// neither exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidate = Path::new("cibridge.toml");
        if candidate.exists() {
            return Self::load_from_path(candidate);
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

/// Fully resolved settings for one bridge run.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Source project (owner/repo)
    pub github_project: String,
    /// Clone URL of the mirror repository
    pub gitlab_repo: String,
    /// Web host of the mirror's hosting service
    pub gitlab_host: String,
    /// Mirror project path (group/project)
    pub gitlab_project: String,
    pub main_branch: Option<String>,
    pub prereq_checks: Vec<String>,
    pub post_status: bool,
    /// Window for pipeline status queries
    pub brief_window: Duration,
    /// Window for the main-branch running-pipeline probe
    pub long_window: Duration,
}
