//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use tokio::io::AsyncReadExt;
use tracing::info;

use antivirus_core::{DefinitionSync, ScanPipeline};
use antivirus_engine::ClamAv;
use antivirus_shared::{
    AppConfig, ObjectCreatedEvent, Response, ScanConfig, init_config, load_config, validate_scan,
    validate_store, validate_sync,
};
use antivirus_storage::S3Store;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// s3-antivirus: scan uploaded objects and keep virus definitions current.
#[derive(Parser)]
#[command(
    name = "s3-antivirus",
    version,
    about = "Scan S3 objects with ClamAV, tag them with the verdict, and sync virus definitions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (TOML). Defaults are used when omitted.
    #[arg(long, global = true, env = "ANTIVIRUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Handle one object-created event and tag the object with the verdict.
    Scan {
        /// Event JSON file, or `-` for stdin.
        #[arg(long, default_value = "-")]
        event: String,

        /// Skip fetching definitions and starting the daemon.
        #[arg(long)]
        no_warmup: bool,
    },

    /// Scan a single object by key.
    ScanObject {
        /// Object key, unencoded.
        #[arg(long)]
        key: String,

        /// Bucket holding the object (defaults to `[scan].bucket`).
        #[arg(long)]
        bucket: Option<String>,

        /// Skip fetching definitions and starting the daemon.
        #[arg(long)]
        no_warmup: bool,
    },

    /// Refresh the definitions bucket with freshclam.
    Update,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults.
    Init {
        #[arg(long, default_value = "s3-antivirus.toml")]
        path: PathBuf,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "antivirus=info",
        1 => "antivirus=debug",
        _ => "antivirus=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
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
        Command::Scan { event, no_warmup } => cmd_scan(config_path, &event, no_warmup).await,
        Command::ScanObject {
            key,
            bucket,
            no_warmup,
        } => cmd_scan_object(config_path, &key, bucket.as_deref(), no_warmup).await,
        Command::Update => cmd_update(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init { path } => cmd_config_init(&path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_scan(config_path: Option<&Path>, event: &str, no_warmup: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let event = read_event(event).await?;
    scan(&config, &event, no_warmup).await
}

async fn cmd_scan_object(
    config_path: Option<&Path>,
    key: &str,
    bucket: Option<&str>,
    no_warmup: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let bucket = bucket
        .map(String::from)
        .or_else(|| config.scan.bucket.clone())
        .ok_or_else(|| eyre!("no bucket given: pass --bucket or set [scan].bucket"))?;

    let event = ObjectCreatedEvent::for_object(bucket, key);
    scan(&config, &event, no_warmup).await
}

async fn scan(config: &AppConfig, event: &ObjectCreatedEvent, no_warmup: bool) -> Result<()> {
    validate_scan(config)?;
    validate_store(config)?;

    let store = S3Store::connect(&config.store).await;
    let engine = ClamAv::new(config.engine.clone(), config.definitions.dir.clone());
    let pipeline = ScanPipeline::new(ScanConfig::from(config), Arc::new(store), Arc::new(engine));

    if no_warmup {
        info!("skipping warm-up");
    } else {
        pipeline.warm_up().await;
    }

    let response = pipeline.handle_event(event).await?;
    print_response(&response)
}

async fn cmd_update(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    validate_sync(&config)?;
    validate_store(&config)?;

    let store = S3Store::connect(&config.store).await;
    let engine = ClamAv::new(config.engine.clone(), config.definitions.dir.clone());
    let sync = DefinitionSync::new(config.definitions.clone(), Arc::new(store), Arc::new(engine));

    let response = sync.handle().await?;
    print_response(&response)
}

fn cmd_config_init(path: &Path) -> Result<()> {
    init_config(path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read and parse an event from a file, or from stdin when `source` is `-`.
async fn read_event(source: &str) -> Result<ObjectCreatedEvent> {
    let raw = if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .wrap_err("failed to read event from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(source)
            .await
            .wrap_err_with(|| format!("failed to read event file {source}"))?
    };
    parse_event(&raw)
}

fn parse_event(raw: &str) -> Result<ObjectCreatedEvent> {
    serde_json::from_str(raw).wrap_err("failed to parse event JSON")
}

fn print_response(response: &Response) -> Result<()> {
    println!("{}", serde_json::to_string(response)?);
    Ok(())
}
