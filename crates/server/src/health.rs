use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use tandem_store::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

/// Readiness report. `association_rows` doubles as a schema probe: it is
/// `None` whenever the association table cannot be counted, which covers
/// both a dead connection and a database that was never migrated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: &'static str,
    pub association_rows: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let probe = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM item_associations")
        .fetch_one(&state.db_pool)
        .await;
    let checked_at = Utc::now().to_rfc3339();

    match probe {
        Ok(rows) => (
            StatusCode::OK,
            Json(HealthReport {
                status: "ready",
                database: "ready",
                association_rows: Some(rows),
                detail: None,
                checked_at,
            }),
        ),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthReport {
                status: "degraded",
                database: "degraded",
                association_rows: None,
                detail: Some(format!("association table probe failed: {error}")),
                checked_at,
            }),
        ),
    }
}
