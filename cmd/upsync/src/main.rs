use clap::{Parser, ValueEnum};
use pkg_constants::network::DEFAULT_WATCH_ADDR;
use pkg_constants::paths::DEFAULT_CONFIG;
use pkg_controllers::upstream_sync::UpstreamSyncController;
use pkg_nginx::NginxAdmin;
use pkg_types::config::{SyncConfig, SyncConfigFile, load_config_file};
use pkg_watch::EndpointWatcher;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "upsync",
    about = "Keeps nginx upstream backends in sync with cluster endpoints"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: String,

    /// API server for watching endpoints (ip:port)
    #[arg(long)]
    api_server: Option<String>,

    /// Nginx admin interface for managing backends (ip:port)
    #[arg(long)]
    nginx_server: Option<String>,

    /// Port used for every endpoint address when registering backends
    #[arg(long)]
    backend_port: Option<u16>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

/// Merge: CLI args > config file > defaults
fn resolve_config(cli: &Cli, file_cfg: SyncConfigFile) -> anyhow::Result<SyncConfig> {
    let watch_addr = cli
        .api_server
        .clone()
        .or(file_cfg.watch_server)
        .unwrap_or_else(|| DEFAULT_WATCH_ADDR.to_string());
    let admin_addr = cli
        .nginx_server
        .clone()
        .or(file_cfg.admin_server)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no nginx admin server configured: pass --nginx-server or set admin-server in {}",
                cli.config
            )
        })?;

    let mut config = SyncConfig::new(watch_addr, admin_addr);
    if let Some(port) = cli.backend_port.or(file_cfg.backend_port) {
        config.backend_port = port;
    }
    if let Some(reconnect) = file_cfg.reconnect {
        config.reconnect = reconnect;
    }
    if let Some(policy) = file_cfg.policy {
        config.policy = policy;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    // Load config file (returns defaults if file not found)
    let file_cfg: SyncConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    let config = resolve_config(&cli, file_cfg)?;

    info!("Starting upsync");
    info!("  Watch server:  {}", config.watch_addr);
    info!("  Admin server:  {}", config.admin_addr);
    info!("  Backend port:  {}", config.backend_port);
    info!(
        "  Reconnect:     {}ms..{}ms, max {} attempts",
        config.reconnect.initial_delay_ms,
        config.reconnect.max_delay_ms,
        config.reconnect.max_attempts
    );

    let admin = NginxAdmin::new(&config.admin_addr)?;
    let watch = EndpointWatcher::connect(&config.watch_addr, config.reconnect).await?;
    let controller = UpstreamSyncController::new(watch, admin, &config);

    tokio::select! {
        result = controller.run() => {
            if let Err(e) = result {
                error!("Sync loop stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down upsync");
        }
    }

    Ok(())
}
