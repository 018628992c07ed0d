//! Application startup and lifecycle management.

use crate::config::PortalConfig;
use crate::handlers::{
    adjustment::{original_bill_amount, submit_adjustment},
    health::{health_check, readiness_check},
    metrics::metrics,
    pages::{bill_adjustment_page, bill_payment_page, bill_retrieval_page, index},
    payment::submit_payment,
    retrieval::retrieve_bill,
};
use crate::middleware::metrics_middleware;
use crate::services::{
    metrics::init_metrics, AdjustmentWorkflow, BillingGateway, Database, PaymentWorkflow,
    StatementService,
};
use crate::utils::{Clock, SystemClock};
use axum::{middleware::from_fn, routing::get, Router};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn BillingGateway>,
    pub payments: PaymentWorkflow,
    pub adjustments: AdjustmentWorkflow,
    pub statements: StatementService,
}

impl AppState {
    pub fn new(gateway: Arc<dyn BillingGateway>, clock: Arc<dyn Clock>) -> Self {
        init_metrics();

        Self {
            payments: PaymentWorkflow::new(gateway.clone(), clock.clone()),
            adjustments: AdjustmentWorkflow::new(gateway.clone(), clock),
            statements: StatementService::new(gateway.clone()),
            gateway,
        }
    }
}

pub fn build_router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/bill-payment", get(bill_payment_page).post(submit_payment))
        .route(
            "/bill-retrieval",
            get(bill_retrieval_page).post(retrieve_bill),
        )
        .route(
            "/bill-adjustments",
            get(bill_adjustment_page).post(submit_adjustment),
        )
        .route(
            "/get-original-bill-amount/:bill_id",
            get(original_bill_amount),
        )
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .route_layer(from_fn(metrics_middleware))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Outermost, so the trace span sees the request id
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Connect to the database and bind the HTTP listener.
    pub async fn build(config: PortalConfig) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
            Duration::from_secs(config.database.acquire_timeout_secs),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        let state = AppState::new(Arc::new(db), Arc::new(SystemClock));
        let router = build_router(state, &config.static_dir);

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Billing portal listener bound");

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = "billing-portal",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, self.router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
