//! Modem Exporter binary
//!
//! Serves modem telemetry from ModemManager over HTTP, or prints a single
//! collection pass and exits.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use modem_exporter::{
    config::APN_ENV, start_web_server, Exporter, ExporterConfig, MmcliManager, ModemManager,
    PipelineProfile, WebConfig, DEFAULT_MODEM_TIMEOUT_SECS, DEFAULT_WEB_PORT,
};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "modem_exporter")]
#[command(about = "Prometheus and InfluxDB exporter for ModemManager modems")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Path under which to expose Prometheus metrics
    #[arg(long, default_value = "/metrics")]
    telemetry_path: String,

    /// Path under which to expose InfluxDB line protocol
    #[arg(long, default_value = "/influx")]
    influx_path: String,

    /// APN to reconnect registered but disconnected modems on
    #[arg(long, env = APN_ENV)]
    apn: Option<String>,

    /// mmcli binary to drive ModemManager with
    #[arg(long, default_value = "mmcli")]
    mmcli: String,

    /// Deadline for processing one modem in seconds, 0 to disable
    #[arg(long, default_value_t = DEFAULT_MODEM_TIMEOUT_SECS)]
    modem_timeout: u64,

    /// Process modems concurrently
    #[arg(long)]
    concurrent: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve,

    /// Run a single collection pass, print it and exit
    Snapshot(SnapshotArgs),

    /// Show ModemManager and modem information
    Info,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = SnapshotFormat::Prometheus)]
    format: SnapshotFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SnapshotFormat {
    Prometheus,
    Influx,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = exporter_config(&cli);
    let manager = Arc::new(MmcliManager::new(config.mmcli_path.as_str()));
    handshake(manager.as_ref()).await?;

    let exporter = Arc::new(Exporter::new(manager, config)?);

    match &cli.command {
        Some(Commands::Serve) | None => serve_command(&cli, exporter).await,
        Some(Commands::Snapshot(args)) => snapshot_command(&exporter, args).await,
        Some(Commands::Info) => info_command(&exporter).await,
    }
}

fn exporter_config(cli: &Cli) -> ExporterConfig {
    ExporterConfig::default()
        .with_apn(cli.apn.clone())
        .with_modem_timeout_secs(cli.modem_timeout)
        .with_concurrent_modems(cli.concurrent)
        .with_mmcli_path(cli.mmcli.as_str())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Make sure ModemManager answers and quieten its own logging.
async fn handshake(manager: &dyn ModemManager) -> anyhow::Result<()> {
    let version = manager
        .version()
        .await
        .context("cannot query ModemManager version")?;
    manager
        .set_logging("ERR")
        .await
        .context("cannot set ModemManager logging level")?;

    info!("Starting modem exporter using ModemManager v{}", version);
    Ok(())
}

async fn serve_command(cli: &Cli, exporter: Arc<Exporter>) -> anyhow::Result<()> {
    let web_config = WebConfig::new(&cli.host, cli.port)
        .with_telemetry_path(&cli.telemetry_path)
        .with_influx_path(&cli.influx_path);

    info!("Web server configuration:");
    info!("  - Bind address: {}", web_config.bind_address());
    info!(
        "  - Reconnection APN: {}",
        exporter.config().apn.as_deref().unwrap_or("disabled")
    );
    info!("  - Modem timeout: {:?}", exporter.config().modem_timeout);
    info!("  - Concurrent modems: {}", exporter.config().concurrent_modems);

    start_web_server(web_config, exporter).await?;
    Ok(())
}

async fn snapshot_command(exporter: &Exporter, args: &SnapshotArgs) -> anyhow::Result<()> {
    match args.format {
        SnapshotFormat::Prometheus => print!("{}", exporter.scrape_prometheus().await?),
        SnapshotFormat::Influx => print!("{}", exporter.scrape_influx().await?),
        SnapshotFormat::Json => {
            let modems = exporter.collect(&PipelineProfile::push()).await?;
            println!("{}", serde_json::to_string_pretty(&modems)?);
        }
    }
    Ok(())
}

async fn info_command(exporter: &Exporter) -> anyhow::Result<()> {
    let manager = exporter.manager();
    println!("Modem Exporter v{}", env!("CARGO_PKG_VERSION"));
    println!("ModemManager: v{}", manager.version().await?);
    println!();

    let modems = manager.list_modems().await.context("cannot list modems")?;
    println!("Modems: {}", modems.len());
    for modem in &modems {
        let state = modem
            .state()
            .await
            .map(|s| s.to_string())
            .unwrap_or_else(|e| format!("unknown ({})", e));
        let imei = modem
            .three_gpp()
            .await
            .map(|g| g.imei)
            .unwrap_or_default();
        println!("  {}: {} (IMEI {})", modem.path(), state, imei);
    }

    Ok(())
}
