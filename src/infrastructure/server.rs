//! HTTP application assembly and the serve loop

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::net::SocketAddr;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::api_docs::ApiDoc;
use crate::infrastructure::AppState;

const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;
const STATIC_CACHE: &str = "public, max-age=2592000, immutable";
const MEDIA_CACHE: &str = "public, max-age=604800";

/// Build the full application: API under `/api`, docs, static and media
/// files, plus the host check and the request-wide layers.
pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();

    let static_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(STATIC_CACHE),
        ))
        .service(ServeDir::new(&config.static_root));
    let media_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(MEDIA_CACHE),
        ))
        .service(ServeDir::new(&config.media_root));

    Router::new()
        .route("/health", get(api::health::health_check))
        .route("/health/", get(api::health::health_check))
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api::api_router_with_state(state.clone()))
        .nest_service("/static", static_files)
        .nest_service("/media", media_files)
        .layer(middleware::from_fn_with_state(state, enforce_allowed_hosts))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allowed_origins, config.debug))
}

fn cors_layer(origins: &[String], debug: bool) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() && debug {
        return layer.allow_origin(Any);
    }

    let mut allowed = Vec::new();
    for origin in origins {
        match origin.parse::<HeaderValue>() {
            Ok(v) => allowed.push(v),
            Err(e) => tracing::error!("Failed to parse CORS origin '{}': {}", origin, e),
        }
    }
    layer.allow_origin(allowed)
}

/// Reject requests whose Host header is missing or not in ALLOWED_HOSTS.
async fn enforce_allowed_hosts(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .unwrap_or_default();

    if state.config.host_allowed(host) {
        return next.run(request).await;
    }

    tracing::warn!(host, "rejected request for disallowed host");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": "Invalid host header" })),
    )
        .into_response()
}

/// Bind on all interfaces and serve until Ctrl-C or SIGTERM.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("IlmSpace server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
