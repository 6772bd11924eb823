use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Query, State,
        rejection::{BytesRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error};

use crate::db::services::batch_service;
use crate::server::push_receiver::{ACK, TableKind};
use crate::web::models::{AdmsQuery, AdmsStatsResponse};
use crate::web::{AppError, AppState};

/// Largest push body read. Anything bigger is acknowledged unread; the
/// punches stay in the terminal log and are recovered by a pull.
const MAX_PUSH_BODY: usize = 16 * 1024 * 1024;

fn plain_text(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

/// Terminals never get a 400 for their query string: a pair list that does
/// not decode is treated as empty.
fn adms_query(raw: Result<Query<Vec<(String, String)>>, QueryRejection>) -> AdmsQuery {
    match raw {
        Ok(Query(pairs)) => AdmsQuery::from_pairs(pairs),
        Err(rejection) => {
            debug!(error = %rejection, "Unreadable ADMS query string.");
            AdmsQuery::default()
        }
    }
}

async fn handshake_handler(
    State(app_state): State<Arc<AppState>>,
    raw_query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let query = adms_query(raw_query);
    plain_text(StatusCode::OK, app_state.push_receiver.handshake(query.serial()))
}

/// Terminals only understand success or failure; a 500 is reserved for
/// database failures, which are the only outcome worth a resend.
async fn receive_handler(
    State(app_state): State<Arc<AppState>>,
    raw_query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let query = adms_query(raw_query);
    // A rejected body would be resent forever, so it is acknowledged.
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            error!(
                serial = ?query.serial(),
                table = ?query.table,
                error = %rejection,
                "ADMS body not read; acknowledged without ingesting. Pull the terminal to recover its punches."
            );
            return plain_text(StatusCode::OK, ACK);
        }
    };
    let table = TableKind::parse(query.table.as_deref());
    match app_state
        .push_receiver
        .receive(query.serial(), table, &body)
        .await
    {
        Ok(_) => plain_text(StatusCode::OK, ACK),
        Err(e) => {
            error!(serial = ?query.serial(), error = %e, "ADMS delivery rolled back.");
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}

async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<AdmsStatsResponse>, AppError> {
    let stats = batch_service::dashboard_stats(
        &app_state.db_pool,
        app_state.config.device_timezone,
        Utc::now(),
    )
    .await?;
    Ok(Json(AdmsStatsResponse {
        success: true,
        stats,
    }))
}

pub fn adms_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/receive", get(handshake_handler).post(receive_handler))
        .route("/stats", get(stats_handler))
        .layer(DefaultBodyLimit::max(MAX_PUSH_BODY))
}

pub fn iclock_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cdata", get(handshake_handler).post(receive_handler))
        .layer(DefaultBodyLimit::max(MAX_PUSH_BODY))
}
