//! ClamAV adapter: `clamd`/`clamdscan`, `clamscan`, and `freshclam`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use antivirus_shared::{AntivirusError, EngineConfig, EngineMode, Result, Verdict};

use crate::{Scanner, Updater};

/// Exit code clamscan/clamdscan use for "virus found".
const EXIT_INFECTED: i32 = 1;

/// Runs the ClamAV binaries named in [`EngineConfig`].
///
/// `database_dir` is the definitions directory: `clamscan` reads from it and
/// `freshclam` updates it in place.
#[derive(Debug, Clone)]
pub struct ClamAv {
    config: EngineConfig,
    database_dir: PathBuf,
}

impl ClamAv {
    pub fn new(config: EngineConfig, database_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            database_dir: database_dir.into(),
        }
    }

    fn update_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--datadir".into(),
            self.database_dir.clone().into_os_string(),
        ];
        if let Some(conf) = &self.config.freshclam_config {
            args.push("--config-file".into());
            args.push(conf.clone().into_os_string());
        }
        args
    }

    /// Binary and arguments for scanning `path` in the configured mode.
    fn scan_command(&self, path: &Path) -> (&Path, Vec<OsString>) {
        match self.config.mode {
            EngineMode::Daemon => (
                self.config.clamdscan_bin.as_path(),
                vec![
                    "--config-file".into(),
                    self.config.config_file.clone().into(),
                    "--stdout".into(),
                    path.into(),
                ],
            ),
            EngineMode::Standalone => (
                self.config.clamscan_bin.as_path(),
                vec![
                    "--stdout".into(),
                    "-d".into(),
                    self.database_dir.clone().into(),
                    path.into(),
                ],
            ),
        }
    }
}

/// Map a scanner exit status to a verdict.
fn verdict_from_status(status: ExitStatus) -> Result<Verdict> {
    match status.code() {
        Some(0) => Ok(Verdict::Clean),
        Some(EXIT_INFECTED) => Ok(Verdict::Infected),
        Some(code) => Err(AntivirusError::engine(format!(
            "clamav returned exit code {code}"
        ))),
        None => Err(AntivirusError::engine("clamav terminated by signal")),
    }
}

fn spawn_error(bin: &Path, err: std::io::Error) -> AntivirusError {
    AntivirusError::engine(format!("failed to run {}: {err}", bin.display()))
}

/// Run `bin` with its stdout and stderr forwarded to our stderr, untouched.
async fn run_forwarded(bin: &Path, args: &[OsString]) -> Result<()> {
    debug!(bin = %bin.display(), ?args, "running");

    let status = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(std::io::stderr())
        .stderr(std::io::stderr())
        .status()
        .await
        .map_err(|e| spawn_error(bin, e))?;

    if status.success() {
        return Ok(());
    }

    let name = bin
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| bin.display().to_string());

    Err(match status.code() {
        Some(code) => AntivirusError::engine(format!("{name} returned exit code {code}")),
        None => AntivirusError::engine(format!("{name} terminated by signal")),
    })
}

#[async_trait]
impl Scanner for ClamAv {
    async fn start_daemon(&self) -> Result<()> {
        match self.config.mode {
            EngineMode::Daemon => {
                info!(config = %self.config.config_file.display(), "starting clamd");
                run_forwarded(
                    &self.config.clamd_bin,
                    &[
                        OsString::from("--config-file"),
                        self.config.config_file.clone().into_os_string(),
                    ],
                )
                .await
            }
            EngineMode::Standalone => {
                debug!("standalone mode, no daemon to start");
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    async fn scan_file(&self, path: &Path) -> Result<Verdict> {
        let (bin, args) = self.scan_command(path);

        let output = Command::new(bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(bin, e))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(stream = "stdout", "{line}");
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            info!(stream = "stderr", "{line}");
        }

        verdict_from_status(output.status)
    }
}

#[async_trait]
impl Updater for ClamAv {
    async fn run_update(&self) -> Result<()> {
        let args = self.update_args();
        info!(
            bin = %self.config.freshclam_bin.display(),
            datadir = %self.database_dir.display(),
            "running freshclam"
        );
        run_forwarded(&self.config.freshclam_bin, &args).await
    }
}
