//! Run/service configuration.
//!
//! Priority (highest to lowest): CLI / env args > JSON config file > built-in
//! defaults. Loaded once at startup and read-only afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LAUNCH_SETTLE_MS: u64 = 5_000;
const DEFAULT_ACK_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_CLOSE_GRACE_MS: u64 = 5_000;
const DEFAULT_COMPLETION_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_DEBOUNCE_MS: u64 = 2_000;
const DEFAULT_JOB_RETENTION_SECS: u64 = 3_600;

fn default_cursor_path() -> PathBuf {
    if let Ok(path) = std::env::var("CURSOR_PATH") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    #[cfg(target_os = "macos")]
    {
        return PathBuf::from("/Applications/Cursor.app/Contents/MacOS/Cursor");
    }
    #[cfg(not(target_os = "macos"))]
    PathBuf::from("cursor")
}

// ─── Deployment settings ─────────────────────────────────────────────────────

/// Deployment section of the configuration: default target list plus the
/// credential and option maps handed to provider routines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeploymentSettings {
    pub targets: Vec<String>,
    pub credentials: HashMap<String, String>,
    pub options: HashMap<String, serde_json::Value>,
}

// ─── Timing knobs ────────────────────────────────────────────────────────────

/// Timing knobs for process settling, sentinel polling, and watch debounce.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// How long the launched process must stay alive before it counts as ready.
    pub launch_settle: Duration,
    /// How long to poll for the companion watcher to consume a sentinel file.
    pub sentinel_ack: Duration,
    /// Graceful-termination window before force-kill.
    pub close_grace: Duration,
    /// MONITORING-phase wait for the completion sentinel.
    pub completion: Duration,
    /// File-watch stability window; a path is not reported until it has been
    /// quiet this long.
    pub debounce: Duration,
    /// Service mode: how long finished job records stay queryable.
    pub job_retention: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            launch_settle: Duration::from_millis(DEFAULT_LAUNCH_SETTLE_MS),
            sentinel_ack: Duration::from_millis(DEFAULT_ACK_TIMEOUT_MS),
            close_grace: Duration::from_millis(DEFAULT_CLOSE_GRACE_MS),
            completion: Duration::from_millis(DEFAULT_COMPLETION_TIMEOUT_MS),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            job_retention: Duration::from_secs(DEFAULT_JOB_RETENTION_SECS),
        }
    }
}

// ─── JSON config file ────────────────────────────────────────────────────────

/// On-disk config shape; all fields are optional overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FileConfig {
    cursor_path: Option<PathBuf>,
    working_directory: Option<PathBuf>,
    deployment_settings: Option<DeploymentSettings>,
    log_level: Option<String>,
    log_format: Option<String>,
    service_mode: Option<bool>,
    port: Option<u16>,
    launch_settle_ms: Option<u64>,
    sentinel_ack_ms: Option<u64>,
    close_grace_ms: Option<u64>,
    completion_timeout_ms: Option<u64>,
    debounce_ms: Option<u64>,
    job_retention_secs: Option<u64>,
}

fn load_file(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("configuration file not found: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse configuration file {}", path.display()))
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub cursor_path: PathBuf,
    pub working_dir: PathBuf,
    pub deployment: DeploymentSettings,
    /// Log level filter string, e.g. "debug", "info,autoforge=trace".
    pub log: String,
    /// "pretty" (default) or "json".
    pub log_format: String,
    pub service_mode: bool,
    pub port: u16,
    pub timeouts: Timeouts,
}

/// CLI/env overrides as parsed by clap; `None` means "not given".
#[derive(Debug, Default)]
pub struct Overrides {
    pub working_dir: Option<PathBuf>,
    pub cursor_path: Option<PathBuf>,
    pub targets: Option<Vec<String>>,
    pub log: Option<String>,
    pub port: Option<u16>,
    pub service_mode: bool,
}

impl Config {
    /// Build config from overrides plus an optional JSON file.
    ///
    /// A `config_path` that does not exist or does not parse is an error:
    /// service startup must not silently run on defaults the operator did
    /// not choose.
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => load_file(path)?,
            None => FileConfig::default(),
        };

        let cursor_path = overrides
            .cursor_path
            .or(file.cursor_path)
            .unwrap_or_else(default_cursor_path);
        let working_dir = overrides
            .working_dir
            .or(file.working_directory)
            .unwrap_or_else(|| PathBuf::from("./output"));

        let mut deployment = file.deployment_settings.unwrap_or_default();
        if let Some(targets) = overrides.targets {
            deployment.targets = targets;
        }

        let log = overrides
            .log
            .or(file.log_level)
            .unwrap_or_else(|| "info".to_string());
        let log_format = file.log_format.unwrap_or_else(|| "pretty".to_string());
        let service_mode = overrides.service_mode || file.service_mode.unwrap_or(false);
        let port = overrides.port.or(file.port).unwrap_or(DEFAULT_PORT);

        let defaults = Timeouts::default();
        let ms = Duration::from_millis;
        let timeouts = Timeouts {
            launch_settle: file.launch_settle_ms.map(ms).unwrap_or(defaults.launch_settle),
            sentinel_ack: file.sentinel_ack_ms.map(ms).unwrap_or(defaults.sentinel_ack),
            close_grace: file.close_grace_ms.map(ms).unwrap_or(defaults.close_grace),
            completion: file
                .completion_timeout_ms
                .map(ms)
                .unwrap_or(defaults.completion),
            debounce: file.debounce_ms.map(ms).unwrap_or(defaults.debounce),
            job_retention: file
                .job_retention_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_retention),
        };

        let config = Self {
            cursor_path,
            working_dir,
            deployment,
            log,
            log_format,
            service_mode,
            port,
            timeouts,
        };
        config.ensure_working_dir()?;
        debug!(working_dir = %config.working_dir.display(), "configuration loaded");
        Ok(config)
    }

    fn ensure_working_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.working_dir).with_context(|| {
            format!(
                "working directory could not be created: {}",
                self.working_dir.display()
            )
        })
    }
}
