use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod adapters;
mod chain;
mod config;
mod core;
mod error;
mod external;
mod metrics;

use crate::adapters::redis_kv::{RedisKvStore, RedisKvStoreConfig};
use crate::chain::ChainFollower;
use crate::config::AppConfig;
use crate::core::router::SmartOrderRouter;

#[derive(Clone)]
struct AppState {
    router: Arc<SmartOrderRouter>,
    metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "utxo_dex_matcher=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    config.validate()?;
    tracing::info!(network = %config.network, profiles = config.profiles.len(), "starting matcher");

    let metrics_handle = crate::metrics::init_metrics();

    let kv = Arc::new(
        RedisKvStore::new(RedisKvStoreConfig {
            url: config.redis_url.clone(),
            ..RedisKvStoreConfig::default()
        })
        .await?,
    );

    // Fingerprint gate (spec §6): a mismatch between persisted state and
    // the current config means the profiles or network changed since the
    // last run, which would otherwise corrupt warm-started order state.
    let fingerprint = config.fingerprint();
    match kv.get_fingerprint().await? {
        Some(stored) if stored != fingerprint => {
            return Err(crate::error::ConfigError::FingerprintMismatch {
                stored,
                current: fingerprint,
            }
            .into());
        }
        Some(_) => {}
        None => kv.set_fingerprint(&fingerprint).await?,
    }

    let router = Arc::new(SmartOrderRouter::new(config.multi_hop_enabled));

    // Warm start every profile's watched addresses from persisted UTxO
    // bytes before serving traffic (spec §4.3 "Cursor and warm start").
    // Live block-following and mempool-observation need a `ChainSyncSource`
    // / `MempoolSource` implementation, which is a per-deployment adapter
    // outside this crate's scope (spec §1); this binary wires and warm-
    // starts the router, then serves its operational surface.
    let now = chrono::Utc::now().timestamp();
    for profile in &config.profiles {
        let watched = profile.watched_addresses.iter().cloned().collect();
        let follower = ChainFollower::new(router.clone(), kv.clone(), watched, profile.name.clone());
        match follower.warm_start(now).await {
            Ok(restored) => tracing::info!(profile = %profile.name, restored, "warm start complete"),
            Err(err) => tracing::warn!(profile = %profile.name, error = %err, "warm start failed, continuing with empty book"),
        }
    }

    // Periodic expiration sweep (spec §4.2 "expiry sweep"): removes
    // orders whose end_time has passed so the router's books don't
    // accumulate unmatchable stale entries.
    let sweep_router = router.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let started = std::time::Instant::now();
            let now = chrono::Utc::now().timestamp();
            let removed = sweep_router.clear_expired(now);
            let elapsed = started.elapsed().as_secs_f64();
            crate::metrics::record_expiration_sweep(removed, elapsed);
            crate::metrics::set_orders_live(sweep_router.order_count());
            crate::metrics::set_pairs_live(sweep_router.pair_count());
            if removed > 0 {
                tracing::debug!(removed, "expired orders swept");
            }
        }
    });

    let state = AppState { router, metrics_handle };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<AppState>) -> String {
    format!("OK orders={} pairs={}", state.router.order_count(), state.router.pair_count())
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}
