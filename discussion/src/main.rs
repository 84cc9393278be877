use std::sync::Arc;

use discussion::{
    Forum,
    cache::NoCache,
    config::{self, EngineConfig},
    notify::NullNotifier,
    store::postgres::PgStore,
};
use dotenv::dotenv;
use eyre::WrapErr;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,discussion=debug"));

    let json = matches!(config::parsed_var::<String>("LOG_FORMAT"), Ok(Some(f)) if f == "json");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Recounts post and comment scores from the vote tables and repairs drift.
/// Pass `--dry-run` to only report.
#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();
    init_tracing();

    let dry_run = std::env::args().any(|arg| arg == "--dry-run");

    let database_url: String = config::required_var("DATABASE_URL")?;
    let store = PgStore::connect(&database_url, 4).wrap_err("failed to set up database pool")?;

    let forum = Forum::new(
        Arc::new(store),
        Arc::new(NoCache),
        Arc::new(NullNotifier),
        EngineConfig::new_from_env(),
    );

    let drifts = forum
        .reconcile_scores(!dry_run)
        .await
        .wrap_err("score reconciliation failed")?;

    tracing::info!(drifted = drifts.len(), dry_run, "finished");
    Ok(())
}
