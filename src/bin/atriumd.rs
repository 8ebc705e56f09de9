use atrium::config::Config;
use atrium::daemon;
use atrium::error::Result;
use atrium::plugins::registry::HandlerRegistry;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "atriumd")]
#[command(about = "Atrium message switch daemon")]
struct Cli {
    #[arg(long, env = "ATRIUM_CONFIG", help = "Topology file (JSON)")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atrium=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)?;
    let shutdown = daemon::shutdown_on(tokio::signal::ctrl_c());
    let stats =
        daemon::run_with_shutdown(config, HandlerRegistry::with_builtins(), shutdown).await?;
    tracing::info!(
        forwarded = stats.forwarded,
        dropped = stats.dropped,
        ignored = stats.ignored,
        "atriumd exiting"
    );
    Ok(())
}
