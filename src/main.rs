use anyhow::Result;
use clap::{Parser, ValueEnum};
use fabric_admin_mcp::azure::AzureConnector;
use fabric_admin_mcp::config::{Config, Overrides};
use fabric_admin_mcp::{build_server, VERSION};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// MCP server for Microsoft Fabric capacity administration
#[derive(Parser, Debug)]
#[command(name = "fabric-admin-mcp", version = VERSION, about, long_about = None)]
struct Args {
    /// Interface to bind
    #[arg(long, env = "FABRIC_MCP_HOST")]
    host: Option<String>,

    /// Port to bind
    #[arg(short, long, env = "FABRIC_MCP_PORT")]
    port: Option<u16>,

    /// HTTP path of the MCP endpoint
    #[arg(long, env = "FABRIC_MCP_PATH")]
    path: Option<String>,

    /// Azure Resource Manager endpoint (sovereign clouds)
    #[arg(long, env = "FABRIC_MCP_MANAGEMENT_ENDPOINT")]
    management_endpoint: Option<String>,

    /// Microsoft.Fabric api-version
    #[arg(long, env = "FABRIC_MCP_API_VERSION")]
    api_version: Option<String>,

    /// Config file (defaults to <config dir>/fabric-admin-mcp/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    // RUST_LOG wins over --log-level when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_appender::non_blocking(file)
        }
        // stdout stays clean for clients that capture it
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(log_file.is_none())
        .with_target(true)
        .with_thread_ids(false)
        .init();

    Ok(Some(guard))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let _log_guard = setup_logging(args.log_level, args.log_file.as_ref())?;

    let base = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    let config = base.with_overrides(Overrides {
        host: args.host.clone(),
        port: args.port,
        path: args.path.clone(),
        management_endpoint: args.management_endpoint.clone(),
        api_version: args.api_version.clone(),
    });
    config.validate()?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    tracing::info!("Starting Fabric Admin MCP server");
    tracing::info!("Version: {}", VERSION);
    tracing::info!("Platform: {}-{}", std::env::consts::OS, std::env::consts::ARCH);
    tracing::info!("PID: {}", std::process::id());
    tracing::info!(
        "Client: {}",
        std::env::var("AZURE_CLIENT_ID").unwrap_or_else(|_| "<not set>".to_string())
    );

    let connector = Arc::new(AzureConnector::new(config.arm_settings()));
    let server = build_server(connector);
    tracing::info!("Registered {} tools", server.registry().len());

    server
        .serve(config.socket_addr()?, &config.path, shutdown_signal())
        .await
}
