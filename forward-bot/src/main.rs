use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use forward_bot::app::App;
use forward_bot::config::Config;
use forward_bot::logging::init_logging;

#[derive(Debug, Parser)]
#[command(name = "forward-bot", version, about)]
struct Args {
    /// Path of the TOML config file.
    #[arg(short, long, env = "FORWARD_BOT_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Log filter directive, overrides `log_filter` from the config.
    #[arg(long, env = "FORWARD_BOT_LOG")]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let filter = args.log_filter.as_deref().unwrap_or(&config.log_filter);
    let _guard = init_logging(filter, config.log_dir.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "forward-bot starting"
    );
    if !config.has_sources() {
        warn!("No source configured, only push tests will produce messages");
    }

    let cancel = CancellationToken::new();
    let app = App::build(&config, &cancel)?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shutdown.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    app.run(cancel).await;
    info!("forward-bot stopped");
    Ok(())
}
