use anyhow::Result;
use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    analysis::PlaceholderSlicer,
    config::{Config, ServerConfig},
    handlers::{self, AppState},
    metrics, payment, pricing,
    signals::{setup_signal_handlers, ShutdownSignal},
    store::{OrderLedger, QuoteStore},
    uploads::UploadStore,
};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Start the quoting server
///
/// This function:
/// 1. Initializes metrics
/// 2. Builds the pricing engine, upload store and payment gateway
/// 3. Sets up signal handlers for graceful shutdown and config reload
/// 4. Starts the periodic cleanup of expired uploads and quotes
/// 5. Binds to the configured address and serves until shutdown
pub async fn start_server(config: Config, config_path: PathBuf) -> Result<()> {
    let metrics_handle = if config.metrics.enabled {
        info!("Initializing Prometheus metrics...");
        match metrics::init_metrics() {
            Ok(handle) => Some(Arc::new(handle)),
            Err(e) => {
                warn!("Metrics disabled, recorder could not be installed: {}", e);
                None
            }
        }
    } else {
        None
    };

    let engine = pricing::engine_from_config(&config)?;
    let config_swap = Arc::new(ArcSwap::from_pointee(config.clone()));
    let engine_swap = Arc::new(ArcSwap::from_pointee(engine));

    // SIGTERM/SIGINT shut down; SIGHUP reloads config and pricing
    let (shutdown_tx, signal_handle) =
        setup_signal_handlers(config_path, config_swap.clone(), engine_swap.clone());
    let mut shutdown_rx = shutdown_tx.subscribe();

    let uploads = Arc::new(UploadStore::new(&config.uploads));
    uploads.ensure_directory().await?;

    let app_state = AppState {
        config: config_swap,
        engine: engine_swap,
        analyzer: Arc::new(PlaceholderSlicer::new(&config.analysis)),
        gateway: payment::gateway_from_config(&config.payment)?,
        uploads,
        quotes: Arc::new(QuoteStore::new(config.pricing.quote_validity_hours)),
        orders: Arc::new(OrderLedger::new()),
    };

    spawn_cleanup_task(
        app_state.clone(),
        Duration::from_secs(config.uploads.max_age_hours * 3600),
        shutdown_tx.subscribe(),
    );

    let app = create_router(app_state.clone(), metrics_handle);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting print quote service on {}", addr);
    info!(
        materials = config.materials.catalog.len(),
        default_material = %config.materials.default_material,
        payment_provider = app_state.gateway.name(),
        analyzer = app_state.analyzer.name(),
        upload_dir = %app_state.uploads.root().display(),
        "Configuration loaded"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Hourly removal of stale uploads, expired quotes and settled orders
fn spawn_cleanup_task(
    state: AppState,
    max_age: Duration,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match state.uploads.cleanup_expired(max_age).await {
                        Ok(removed) if removed > 0 => info!(removed, "Removed expired uploads"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Upload cleanup failed"),
                    }
                    let now = chrono::Utc::now();
                    let purged = state.quotes.purge_expired(now);
                    if purged > 0 {
                        info!(purged, "Purged expired quotes");
                    }
                    let retention =
                        chrono::Duration::hours(state.config.load().payment.order_retention_hours);
                    let dropped = state.orders.purge_settled(now - retention);
                    if dropped > 0 {
                        info!(dropped, "Dropped settled orders past retention");
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    });
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if server.cors_allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}

/// Create the Axum router with all routes and middleware
pub fn create_router(app_state: AppState, metrics_handle: Option<Arc<PrometheusHandle>>) -> Router {
    let config = app_state.config.load_full();

    let api_routes = Router::new()
        .route("/materials", get(handlers::materials::list_materials))
        .route("/upload/stl", post(handlers::upload::upload_stl))
        .route("/upload/validate", post(handlers::upload::validate_stl))
        .route("/upload/cleanup", post(handlers::upload::cleanup_uploads))
        .route("/quote/calculate", post(handlers::quote::calculate_quote))
        .route("/quote/estimate", post(handlers::quote::estimate_quote))
        .route("/payment/create-order", post(handlers::payment::create_order))
        .route("/payment/capture-order", post(handlers::payment::capture_order))
        .route("/payment/webhook", post(handlers::payment::webhook))
        .route("/payment/order/:order_id", get(handlers::payment::get_order))
        .route("/payment/receipt/:transaction_id", get(handlers::payment::get_receipt))
        .with_state(app_state);

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_routes);

    if let Some(handle) = metrics_handle {
        let metrics_routes = Router::new()
            .route(&config.metrics.endpoint, get(handlers::metrics_handler::metrics))
            .with_state(handle);
        app = app.merge(metrics_routes);
    }

    app.layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::create_test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_route() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(create_test_state(dir.path()), None);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_route_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(create_test_state(dir.path()), None);
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let app = create_router(create_test_state(dir.path()), Some(Arc::new(recorder.handle())));
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
