//! JSON API for the co-purchase association engine.
//!
//! Endpoints:
//! - `POST /purchases`       — record a completed purchase basket
//! - `GET  /recommendations` — ranked "bought together" items for seed ids
//! - `GET  /items`           — list the known catalog
//! - `POST /admin/reset`     — clear all association history (token-guarded)

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use tandem_core::{
    Basket, Catalog, EngineError, InterfaceError, ItemId, PurchaseLedger, Recommender, ScoreStore,
    Weight,
};
use tandem_store::{SqlCatalog, SqlScoreStore};

use crate::bootstrap::Application;

#[derive(Clone)]
pub struct ApiState {
    ledger: Arc<PurchaseLedger>,
    recommender: Arc<Recommender>,
    catalog: Arc<dyn Catalog>,
    admin_token: Option<SecretString>,
    default_max_results: usize,
    max_results_cap: usize,
}

impl ApiState {
    pub fn new(
        store: Arc<dyn ScoreStore>,
        catalog: Arc<dyn Catalog>,
        admin_token: Option<SecretString>,
        default_max_results: usize,
        max_results_cap: usize,
    ) -> Self {
        Self {
            ledger: Arc::new(PurchaseLedger::new(Arc::clone(&store))),
            recommender: Arc::new(Recommender::new(store, Arc::clone(&catalog))),
            catalog,
            admin_token,
            default_max_results,
            max_results_cap,
        }
    }
}

/// Builds the full application router, health endpoint included.
pub fn router(app: &Application) -> Router {
    let store = Arc::new(SqlScoreStore::new(app.db_pool.clone())) as Arc<dyn ScoreStore>;
    let catalog = Arc::new(SqlCatalog::new(app.db_pool.clone())) as Arc<dyn Catalog>;
    let state = ApiState::new(
        store,
        catalog,
        app.config.server.admin_token.clone(),
        app.config.recommender.default_max_results,
        app.config.recommender.max_results_cap,
    );

    Router::new()
        .route("/purchases", post(record_purchase))
        .route("/recommendations", get(recommendations))
        .route("/items", get(list_items))
        .route("/admin/reset", post(reset_history))
        .with_state(state)
        .merge(crate::health::router(app.db_pool.clone()))
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub items: Vec<u64>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub distinct_items: usize,
    pub pairs_recorded: usize,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    /// Comma-separated seed item ids, e.g. `seeds=3` or `seeds=3,17`.
    pub seeds: String,
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub seeds: Vec<u64>,
    pub k: usize,
    pub items: Vec<RecommendedItem>,
}

#[derive(Debug, Serialize)]
pub struct RecommendedItem {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub available: bool,
    pub weight: Weight,
}

#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub count: usize,
    pub items: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub cleared: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub correlation_id: String,
}

type ApiError = (StatusCode, Json<ApiErrorBody>);

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn record_purchase(
    State(state): State<ApiState>,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let basket = Basket::new(request.items.iter().copied().map(ItemId));
    let distinct_items = basket.len();
    let pairs_recorded = distinct_items * distinct_items.saturating_sub(1) / 2;

    state
        .ledger
        .record_purchase(&basket)
        .await
        .map_err(|error| engine_failure(EngineError::from(error), &correlation_id))?;

    info!(
        event_name = "recommender.purchase.recorded",
        correlation_id = %correlation_id,
        distinct_items,
        pairs_recorded,
        "purchase recorded"
    );

    Ok(Json(PurchaseResponse { distinct_items, pairs_recorded }))
}

pub async fn recommendations(
    State(state): State<ApiState>,
    Query(params): Query<RecommendationParams>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let seeds = parse_seed_list(&params.seeds)
        .map_err(|message| bad_request(message, &correlation_id))?;
    let k = params.k.unwrap_or(state.default_max_results).min(state.max_results_cap);

    let ranked = state
        .recommender
        .recommend_ids(&seeds, k)
        .await
        .map_err(|error| engine_failure(error, &correlation_id))?;

    let ids: Vec<ItemId> = ranked.iter().map(|&(id, _)| id).collect();
    let mut resolved = state
        .catalog
        .resolve_ids(&ids)
        .await
        .map_err(|error| engine_failure(EngineError::from(error), &correlation_id))?;

    let items: Vec<RecommendedItem> = ranked
        .into_iter()
        .filter_map(|(id, weight)| {
            resolved.remove(&id).map(|item| RecommendedItem {
                id: item.id.0,
                name: item.name,
                slug: item.slug,
                price: item.price,
                available: item.available,
                weight,
            })
        })
        .collect();

    info!(
        event_name = "recommender.query.served",
        correlation_id = %correlation_id,
        seed_count = seeds.len(),
        k,
        result_count = items.len(),
        "recommendations served"
    );

    Ok(Json(RecommendationResponse {
        seeds: seeds.iter().map(|id| id.0).collect(),
        k,
        items,
    }))
}

pub async fn list_items(State(state): State<ApiState>) -> Result<Json<CatalogResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let ids = state
        .catalog
        .all_known_ids()
        .await
        .map_err(|error| engine_failure(EngineError::from(error), &correlation_id))?;
    let mut resolved = state
        .catalog
        .resolve_ids(&ids)
        .await
        .map_err(|error| engine_failure(EngineError::from(error), &correlation_id))?;

    let items: Vec<CatalogEntry> = ids
        .into_iter()
        .filter_map(|id| resolved.remove(&id))
        .map(|item| CatalogEntry {
            id: item.id.0,
            name: item.name,
            slug: item.slug,
            price: item.price,
            available: item.available,
        })
        .collect();

    Ok(Json(CatalogResponse { count: items.len(), items }))
}

pub async fn reset_history(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    authorize(&state, &headers, &correlation_id)?;

    state
        .ledger
        .clear_history()
        .await
        .map_err(|error| engine_failure(EngineError::from(error), &correlation_id))?;

    info!(
        event_name = "recommender.history.reset",
        correlation_id = %correlation_id,
        "association history cleared"
    );

    Ok(Json(ResetResponse { cleared: true }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_seed_list(raw: &str) -> Result<Vec<ItemId>, String> {
    let mut seeds = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id =
            part.parse::<u64>().map_err(|_| format!("seed `{part}` is not a valid item id"))?;
        seeds.push(ItemId(id));
    }
    if seeds.is_empty() {
        return Err("at least one seed item id is required".to_string());
    }
    Ok(seeds)
}

fn authorize(state: &ApiState, headers: &HeaderMap, correlation_id: &str) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(token) => token,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiErrorBody {
                    error: "admin endpoints are disabled: no admin token is configured"
                        .to_string(),
                    correlation_id: correlation_id.to_string(),
                }),
            ));
        }
    };

    let provided =
        headers.get("x-admin-token").and_then(|value| value.to_str().ok()).unwrap_or("");
    if provided == required.expose_secret() {
        Ok(())
    } else {
        warn!(
            event_name = "api.admin.unauthorized",
            correlation_id = correlation_id,
            "admin reset rejected"
        );
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiErrorBody {
                error: "invalid admin token".to_string(),
                correlation_id: correlation_id.to_string(),
            }),
        ))
    }
}

fn bad_request(message: impl Into<String>, correlation_id: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiErrorBody { error: message.into(), correlation_id: correlation_id.to_string() }),
    )
}

fn engine_failure(error: EngineError, correlation_id: &str) -> ApiError {
    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };

    warn!(
        event_name = "api.request.failed",
        correlation_id = correlation_id,
        error = %interface,
        "request failed"
    );

    (
        status,
        Json(ApiErrorBody {
            error: interface.user_message().to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}
