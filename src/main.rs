//! hearthsignal — smart-home signal aggregation service.
//!
//! Connects to upstream smart-home controllers (OpenHAB first), normalizes
//! their state into a uniform `Signal`, keeps an in-memory snapshot, and
//! fans live updates out over SSE. See `hearthsignal::signal` for the data
//! model and `hearthsignal::manager` for the adapter lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hearthsignal::adapters::openhab::OpenHabAdapter;
use hearthsignal::adapters::SmartHomeAdapter;
use hearthsignal::api::{
    get_signal, health_check, list_signals, metrics, stream_signals, AppState,
};
use hearthsignal::config::Settings;
use hearthsignal::manager::AdapterManager;
use hearthsignal::store::SignalStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("hearthsignal=info".parse()?))
        .init();

    let settings = Settings::from_env()?;
    info!(port = settings.port, host = %settings.host, "starting hearthsignal");

    let store = Arc::new(SignalStore::new(
        settings.subscriber_queue_size,
        settings.drop_log_interval,
    ));
    let manager = AdapterManager::new(store.clone(), settings.backoff);

    if let Some(openhab) = &settings.openhab {
        let adapter: Arc<dyn SmartHomeAdapter> = Arc::new(OpenHabAdapter::new(
            openhab.url.clone(),
            openhab.tag.clone().unwrap_or_default(),
            Some(openhab.name.clone()),
            Some(openhab.prefix.clone()),
        ));
        manager.add(adapter).await?;
        info!(name = %openhab.name, url = %openhab.url, "registered openhab adapter");
    } else {
        info!("no adapters configured (set HEARTHSIGNAL_OPENHAB_URL to connect one)");
    }

    manager.start_all().await;

    let state = AppState {
        store,
        manager: manager.clone(),
    };

    let cors = build_cors_layer(&settings.cors_origins);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/signals", get(list_signals))
        .route("/api/signals/:id", get(get_signal))
        .route("/api/events/signals", get(stream_signals))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "hearthsignal is listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down, stopping adapters");
    manager.stop_all().await;
    info!("shutdown complete");

    Ok(())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
