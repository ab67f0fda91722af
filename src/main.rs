// Eversports Slots v0.1
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod routes;
mod services;

use config::AppConfig;
use services::coordinator::{Clock, RefreshCoordinator, SystemClock};
use services::eversports::EversportsClient;
use services::registry::CoordinatorRegistry;

/// OpenAPI document for the sensor API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Eversports Slots API",
        version = "0.1.0",
        description = "Next-available court slot sensor for Eversports facilities. \
            Polls the Eversports booking widget every 15 minutes per configured \
            facility/sport/court set and exposes the next free slot, today's free \
            times and related attributes for home-automation consumers.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Sensors", description = "Slot availability sensors"),
    ),
    paths(
        routes::health::health_check,
        routes::sensors::list_sensors,
        routes::sensors::get_sensor,
        routes::sensors::get_sensor_status,
        routes::sensors::get_sensor_summary,
        routes::sensors::refresh_sensor,
        routes::sensors::remove_sensor,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::sensors::RefreshResponse,
            services::sensor::SensorView,
            services::sensor::SensorAttributes,
            services::sensor::DeviceInfo,
            services::coordinator::RefreshState,
            services::slots::AvailabilitySummary,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eversports_slots=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    let client = EversportsClient::new(&config.base_url, &config.user_agent, config.request_timeout)
        .expect("Failed to build HTTP client");
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Set up all sensors in parallel; each blocks on its first refresh.
    let registry = CoordinatorRegistry::new();
    let setups = config.sensors.iter().cloned().map(|sensor| {
        let client = client.clone();
        let clock = clock.clone();
        let interval = config.update_interval;
        async move {
            let id = sensor.unique_id();
            (id, RefreshCoordinator::setup(sensor, client, clock, interval).await)
        }
    });

    for (id, result) in futures::future::join_all(setups).await {
        match result {
            Ok(coordinator) => {
                if let Err(e) = registry.insert(coordinator.clone()).await {
                    tracing::error!("Sensor '{}' not registered: {}", id, e);
                    coordinator.shutdown().await;
                }
            }
            Err(e) => {
                tracing::error!("Sensor '{}' failed to set up: {}", id, e);
            }
        }
    }

    let ready = registry.all().await.len();
    if ready == 0 {
        tracing::warn!("No sensor could be set up; serving health endpoint only");
    } else {
        tracing::info!("{} of {} sensors ready", ready, config.sensors.len());
    }

    // CORS: reads, manual refresh and teardown
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/sensors", get(routes::sensors::list_sensors))
        .route(
            "/api/v1/sensors/:id",
            get(routes::sensors::get_sensor).delete(routes::sensors::remove_sensor),
        )
        .route(
            "/api/v1/sensors/:id/status",
            get(routes::sensors::get_sensor_status),
        )
        .route(
            "/api/v1/sensors/:id/summary",
            get(routes::sensors::get_sensor_summary),
        )
        .route(
            "/api/v1/sensors/:id/refresh",
            post(routes::sensors::refresh_sensor),
        )
        .with_state(registry.clone())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server terminated unexpectedly");

    // Tear down every coordinator so no refresh runs past shutdown.
    registry.shutdown_all().await;
    tracing::info!("Shutdown complete");
}

/// Resolve on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
