use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::{OffLevel, Verbosity};
use std::path::PathBuf;
use tracing::{error, info};
use velo_common::config::ConfigLoader;
use velo_common::logging::{init_json_logging, init_logging};
use velo_rental::{Server, VeloConfig};

const DEFAULT_LOG_FILTER: &str = "velo_rental=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "velo-rental")]
#[command(about = "Velo bike rental service")]
struct Args {
    #[arg(short, long, help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Print the default configuration as TOML and exit")]
    gen_config: bool,

    #[arg(long, help = "Validate configuration without starting the server")]
    dry_run: bool,

    #[arg(long, help = "Emit logs as JSON")]
    log_json: bool,

    // Without -v/-q the filter comes from RUST_LOG, then the built-in default
    #[command(flatten)]
    verbosity: Verbosity<OffLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.gen_config {
        println!("{}", VeloConfig::generate_example()?);
        return Ok(());
    }

    if args.log_json {
        init_json_logging(&args.verbosity, DEFAULT_LOG_FILTER)?;
    } else {
        init_logging(&args.verbosity, DEFAULT_LOG_FILTER)?;
    }

    let config = VeloConfig::load(args.config.as_deref())?;

    info!("Starting velo rental service");
    info!(
        bind_address = %config.server.bind_address,
        database = %config.database.url,
        geofence_radius_km = config.rental.geofence_radius_km,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Configuration validated successfully (dry-run mode)");
        return Ok(());
    }

    let server = Server::new(config).await?;
    server.run_migrations().await?;

    if let Err(e) = server.run().await {
        error!("Server error: {:#}", e);
        return Err(e);
    }

    info!("Velo rental service stopped gracefully");
    Ok(())
}
