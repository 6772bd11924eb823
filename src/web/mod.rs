use axum::{Router, http::Method, routing::get};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::db::services::{BatchIngestor, DbEmployeeDirectory, EmployeeResolver};
use crate::server::clock_service::ClockService;
use crate::server::config::ServerConfig;
use crate::server::device_ops::{DeviceGateway, TerminalTimeouts};
use crate::server::pull_sync::PullSynchronizer;
use crate::server::push_receiver::PushReceiver;
use crate::terminal::TerminalConnector;
use crate::web::routes::*;

pub use crate::web::error::AppError;

pub mod error;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub ingestor: BatchIngestor,
    pub push_receiver: PushReceiver,
    pub gateway: DeviceGateway,
    pub synchronizer: PullSynchronizer,
    pub clock: ClockService,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wires the ingestion core over one pool and one terminal driver.
    pub fn new(
        db_pool: DatabaseConnection,
        config: Arc<ServerConfig>,
        connector: Arc<dyn TerminalConnector>,
    ) -> Self {
        let resolver = EmployeeResolver::new(Arc::new(DbEmployeeDirectory::new(db_pool.clone())));
        let ingestor = BatchIngestor::new(
            db_pool.clone(),
            resolver,
            config.device_timezone,
            info_span!("ingest"),
        );
        let push_receiver = PushReceiver::new(db_pool.clone(), ingestor.clone(), info_span!("adms"));
        let gateway = DeviceGateway::new(
            connector,
            TerminalTimeouts {
                probe: config.probe_timeout(),
                connect: config.terminal_timeout(),
            },
        );
        let synchronizer = PullSynchronizer::new(gateway.clone(), ingestor.clone());
        let clock = ClockService::new(gateway.clone(), config.device_timezone);

        Self {
            db_pool,
            ingestor,
            push_receiver,
            gateway,
            synchronizer,
            clock,
            config,
        }
    }
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest("/adms", adms_routes::adms_router())
        // Path the terminal firmware uses when configured for a stock ADMS server.
        .nest("/iclock", adms_routes::iclock_router())
        .nest("/api/devices", device_routes::device_router())
        .nest("/api/batches", batch_routes::batch_router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
pub(crate) mod test_app {
    use super::*;
    use crate::test_support::FakeTerminal;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    pub fn config() -> ServerConfig {
        ServerConfig {
            database_url: "sqlite::memory:".to_string(),
            listen_addr: "127.0.0.1:0".to_string(),
            log_dir: "logs".to_string(),
            device_timezone: chrono_tz::UTC,
            terminal_timeout_secs: 2,
            probe_timeout_secs: 2,
            pull_interval_secs: None,
            clear_after_pull: false,
            max_db_connections: 1,
        }
    }

    pub fn router(db: &DatabaseConnection, fake: &FakeTerminal) -> Router {
        let state = AppState::new(db.clone(), Arc::new(config()), Arc::new(fake.clone()));
        create_axum_router(Arc::new(state))
    }

    pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    pub fn json(body: &str) -> serde_json::Value {
        serde_json::from_str(body).unwrap()
    }
}
