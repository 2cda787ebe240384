use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use upwatch::{
    analytics::Range,
    api::{ApiConfig, ApiState, spawn_api_server},
    broadcast::Broadcaster,
    config::read_config_file,
    probe::Prober,
    scheduler::Scheduler,
    store::MemoryStore,
};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("upwatch", LevelFilter::TRACE),
        ("engine", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;
    let auth_token = config.resolved_auth_token();
    let default_range: Range = config.analytics_range.parse().map_err(|e| {
        anyhow::anyhow!("invalid analyticsRange in config: {e}")
    })?;

    let store = Arc::new(MemoryStore::seeded(config.monitors.clone()));
    let broadcaster = Arc::new(Broadcaster::new());
    let prober = Prober::new(Duration::from_secs(config.probe_timeout_secs));

    let scheduler = Arc::new(Scheduler::new(store, prober, broadcaster.clone()));
    scheduler.recover_all().await?;

    // Recovery seeds analytics jobs with the default 24h window; a non-default
    // configured range replaces them.
    if default_range != Range::default() {
        for monitor in &config.monitors {
            scheduler
                .start_analytics(monitor.clone(), default_range)
                .await;
        }
    }

    let api_config = ApiConfig {
        bind_addr: config.bind_addr,
        auth_token: auth_token.clone(),
        enable_cors: true,
    };
    let api_state = ApiState {
        broadcaster,
        auth_token,
    };
    spawn_api_server(api_config, api_state).await?;

    info!(
        "engine running with {} probe jobs",
        scheduler.probe_job_count().await
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    Ok(())
}
