//! Application configuration for s3-antivirus.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! environment variables. The result is read once at startup and handed to
//! the pipelines as plain structs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AntivirusError, Result};
use crate::types::Verdict;

/// Definition files published by freshclam.
pub const DEFAULT_DEFINITION_FILES: [&str; 4] =
    ["bytecode.cvd", "daily.cvd", "freshclam.dat", "main.cvd"];

pub const ENV_TAG_KEY: &str = "ANTIVIRUS_TAG_KEY";
pub const ENV_TAG_VALUE_PASS: &str = "ANTIVIRUS_TAG_VALUE_PASS";
pub const ENV_TAG_VALUE_FAIL: &str = "ANTIVIRUS_TAG_VALUE_FAIL";
pub const ENV_DEFINITIONS_BUCKET: &str = "ANTIVIRUS_DEFINITIONS_BUCKET";
pub const ENV_SCAN_BUCKET: &str = "ANTIVIRUS_SCAN_BUCKET";
pub const ENV_S3_ENDPOINT: &str = "AWS_S3_ENDPOINT";
pub const ENV_REGION: &str = "AWS_REGION";

// ---------------------------------------------------------------------------
// Config structs (matching the TOML schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Blob store connection settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Object scanning and tagging.
    #[serde(default)]
    pub scan: ScanSettings,

    /// Where definition files live, remotely and locally.
    #[serde(default)]
    pub definitions: DefinitionsConfig,

    /// ClamAV binaries and modes.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// `[store]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Alternate endpoint for S3-compatible stores (e.g. localstack, MinIO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Region override. Falls back to the SDK's default provider chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// `[scan]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Default bucket for ad-hoc `scan-object` runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Tag key the verdict is written under.
    #[serde(default = "default_tag_key")]
    pub tag_key: String,

    /// Tag value for clean objects.
    #[serde(default = "default_pass_value")]
    pub pass_value: String,

    /// Tag value for infected objects.
    #[serde(default = "default_fail_value")]
    pub fail_value: String,

    /// Directory scratch files are created in. Defaults to the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            bucket: None,
            tag_key: default_tag_key(),
            pass_value: default_pass_value(),
            fail_value: default_fail_value(),
            scratch_dir: None,
        }
    }
}

fn default_tag_key() -> String {
    "VIRUS_SCAN".into()
}
fn default_pass_value() -> String {
    "ok".into()
}
fn default_fail_value() -> String {
    "infected".into()
}

/// `[definitions]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionsConfig {
    /// Bucket holding the published definition files.
    #[serde(default)]
    pub bucket: String,

    /// Local directory the engine reads definitions from.
    #[serde(default = "default_definitions_dir")]
    pub dir: PathBuf,

    /// File names, fetched and pushed in this order.
    #[serde(default = "default_definition_files")]
    pub files: Vec<String>,
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            dir: default_definitions_dir(),
            files: default_definition_files(),
        }
    }
}

fn default_definitions_dir() -> PathBuf {
    PathBuf::from("/tmp/clamav")
}
fn default_definition_files() -> Vec<String> {
    DEFAULT_DEFINITION_FILES.iter().map(|s| s.to_string()).collect()
}

/// How the scanner is invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    /// `clamd` is started once; scans go through `clamdscan`.
    #[default]
    Daemon,
    /// Every scan runs `clamscan`, loading the database itself.
    Standalone,
}

/// `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub mode: EngineMode,

    #[serde(default = "default_clamd_bin")]
    pub clamd_bin: PathBuf,

    #[serde(default = "default_clamdscan_bin")]
    pub clamdscan_bin: PathBuf,

    #[serde(default = "default_clamscan_bin")]
    pub clamscan_bin: PathBuf,

    #[serde(default = "default_freshclam_bin")]
    pub freshclam_bin: PathBuf,

    /// `clamd.conf` shared by `clamd` and `clamdscan`.
    #[serde(default = "default_clamd_config")]
    pub config_file: PathBuf,

    /// Optional `freshclam.conf`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshclam_config: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: EngineMode::default(),
            clamd_bin: default_clamd_bin(),
            clamdscan_bin: default_clamdscan_bin(),
            clamscan_bin: default_clamscan_bin(),
            freshclam_bin: default_freshclam_bin(),
            config_file: default_clamd_config(),
            freshclam_config: None,
        }
    }
}

fn default_clamd_bin() -> PathBuf {
    PathBuf::from("clamd")
}
fn default_clamdscan_bin() -> PathBuf {
    PathBuf::from("clamdscan")
}
fn default_clamscan_bin() -> PathBuf {
    PathBuf::from("clamscan")
}
fn default_freshclam_bin() -> PathBuf {
    PathBuf::from("freshclam")
}
fn default_clamd_config() -> PathBuf {
    PathBuf::from("/etc/clamd.conf")
}

// ---------------------------------------------------------------------------
// Scan config (runtime, merged from config sections)
// ---------------------------------------------------------------------------

/// Tag values written for each verdict. Either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagValues {
    pub pass: String,
    pub fail: String,
}

impl TagValues {
    pub fn for_verdict(&self, verdict: Verdict) -> &str {
        match verdict {
            Verdict::Clean => &self.pass,
            Verdict::Infected => &self.fail,
        }
    }
}

/// Runtime configuration for the scan pipeline.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub tag_key: String,
    pub tag_values: TagValues,
    pub scratch_dir: PathBuf,
    /// Definitions fetched during cold-start warm-up.
    pub definitions: DefinitionsConfig,
}

impl From<&AppConfig> for ScanConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            tag_key: config.scan.tag_key.clone(),
            tag_values: TagValues {
                pass: config.scan.pass_value.clone(),
                fail: config.scan.fail_value.clone(),
            },
            scratch_dir: config
                .scan
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            definitions: config.definitions.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_TAG_KEY) {
            self.scan.tag_key = v;
        }
        if let Some(v) = lookup(ENV_TAG_VALUE_PASS) {
            self.scan.pass_value = v;
        }
        if let Some(v) = lookup(ENV_TAG_VALUE_FAIL) {
            self.scan.fail_value = v;
        }
        if let Some(v) = lookup(ENV_SCAN_BUCKET) {
            self.scan.bucket = Some(v);
        }
        if let Some(v) = lookup(ENV_DEFINITIONS_BUCKET) {
            self.definitions.bucket = v;
        }
        if let Some(v) = lookup(ENV_S3_ENDPOINT) {
            self.store.endpoint = Some(v);
        }
        if let Some(v) = lookup(ENV_REGION).filter(|v| !v.is_empty()) {
            self.store.region = Some(v);
        }
    }
}

/// Load config from `path` (or defaults), then apply process environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config_from(path)?,
        None => {
            tracing::debug!("no config file given, using defaults");
            AppConfig::default()
        }
    };
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AntivirusError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| AntivirusError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file to `path`, creating parent directories.
pub fn init_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AntivirusError::io(parent, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| AntivirusError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| AntivirusError::io(path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(())
}

/// Check the settings the scan pipeline depends on.
pub fn validate_scan(config: &AppConfig) -> Result<()> {
    if config.scan.tag_key.trim().is_empty() {
        return Err(AntivirusError::config(format!(
            "scan tag key is empty. Set [scan].tag_key or the {ENV_TAG_KEY} environment variable."
        )));
    }
    Ok(())
}

/// Check the settings the definition sync depends on.
pub fn validate_sync(config: &AppConfig) -> Result<()> {
    if config.definitions.bucket.trim().is_empty() {
        return Err(AntivirusError::config(format!(
            "definitions bucket is not set. Set [definitions].bucket or the \
             {ENV_DEFINITIONS_BUCKET} environment variable."
        )));
    }
    if config.definitions.files.is_empty() {
        return Err(AntivirusError::config("definitions file list is empty"));
    }
    Ok(())
}

/// Check the store endpoint override, if any.
pub fn validate_store(config: &AppConfig) -> Result<()> {
    if let Some(endpoint) = &config.store.endpoint {
        Url::parse(endpoint).map_err(|e| {
            AntivirusError::config(format!("invalid store endpoint '{endpoint}': {e}"))
        })?;
    }
    Ok(())
}
