use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use std::sync::Arc;

use crate::db::entities::batch_load;
use crate::db::services::batch_service;
use crate::web::models::BatchListQuery;
use crate::web::{AppError, AppState};

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 500;

async fn list_batches_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<BatchListQuery>,
) -> Result<Json<Vec<batch_load::Model>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let loads = batch_service::list_batch_loads(&app_state.db_pool, query.device_id, limit).await?;
    Ok(Json(loads))
}

pub fn batch_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_batches_handler))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{self, FakeTerminal};
    use crate::web::test_app::{json, router, send};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn test_batches_filter_by_device() {
        let db = test_support::memory_db().await;
        let first = test_support::insert_device(&db, "SN-A", true).await;
        let second = test_support::insert_device(&db, "SN-B", true).await;
        test_support::register_employee(&db, 1, "1").await;
        let ingestor = test_support::ingestor(&db);
        for device in [&first, &second, &second] {
            ingestor
                .ingest(
                    Some(device),
                    crate::db::enums::LoadType::Push,
                    "test",
                    test_support::lines(&["1\t2025-01-10 08:00:00"]),
                )
                .await
                .unwrap();
        }
        let app = router(&db, &FakeTerminal::default());

        let uri = format!("/api/batches?device_id={}", second.id);
        let (status, body) = send(app.clone(), Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let loads = json(&body);
        let loads = loads.as_array().unwrap();
        assert_eq!(loads.len(), 2);
        assert!(loads.iter().all(|l| l["device_id"] == second.id));
        assert_eq!(loads[0]["load_type"], "PUSH");

        let (_, body) = send(app, Request::builder().uri("/api/batches?limit=1").body(Body::empty()).unwrap()).await;
        assert_eq!(json(&body).as_array().unwrap().len(), 1);
    }
}
