use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ReservationEngine;
use crate::error::InventoryError;
use crate::ledger::InventoryStore;
use crate::models::{Inventory, StockMovement};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockRequest {
    pub quantity: i32,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveStockRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub quantity: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub struct ApiError(InventoryError);

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InventoryError::NotFound(_) => StatusCode::NOT_FOUND,
            InventoryError::InsufficientStock { .. } => StatusCode::CONFLICT,
            InventoryError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
            err => {
                tracing::error!(error = %err, "inventory request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn create_router<S>(engine: ReservationEngine<S>) -> Router
where
    S: InventoryStore + 'static,
{
    let inventory = Router::new()
        .route("/products/:product_id", get(get_stock::<S>))
        .route("/products/:product_id/add", post(add_stock::<S>))
        .route("/products/:product_id/remove", post(remove_stock::<S>))
        .route("/products/:product_id/availability", get(check_availability::<S>))
        .route("/products/:product_id/movements", get(list_movements::<S>))
        .route("/reserve", post(reserve_stock::<S>))
        .route("/release", post(release_stock::<S>));

    Router::new()
        .nest("/api/v1/inventory", inventory)
        .route("/health", get(health_check))
        .with_state(engine)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn get_stock<S: InventoryStore>(
    State(engine): State<ReservationEngine<S>>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Inventory>, ApiError> {
    Ok(Json(engine.get_stock(product_id).await?))
}

pub async fn add_stock<S: InventoryStore>(
    State(engine): State<ReservationEngine<S>>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateStockRequest>,
) -> Result<StatusCode, ApiError> {
    engine
        .add_stock(product_id, request.quantity, &request.reason)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_stock<S: InventoryStore>(
    State(engine): State<ReservationEngine<S>>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateStockRequest>,
) -> Result<StatusCode, ApiError> {
    engine
        .remove_stock(product_id, request.quantity, &request.reason)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reserve_stock<S: InventoryStore>(
    State(engine): State<ReservationEngine<S>>,
    Json(request): Json<ReserveStockRequest>,
) -> Result<StatusCode, ApiError> {
    engine
        .reserve(request.product_id, request.quantity, request.order_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn release_stock<S: InventoryStore>(
    State(engine): State<ReservationEngine<S>>,
    Json(request): Json<ReserveStockRequest>,
) -> Result<StatusCode, ApiError> {
    engine
        .release(request.product_id, request.quantity, request.order_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Missing, unparsable or non-positive quantities are treated as 1.
pub async fn check_availability<S: InventoryStore>(
    State(engine): State<ReservationEngine<S>>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let quantity = query
        .quantity
        .and_then(|q| q.parse::<i32>().ok())
        .filter(|q| *q >= 1)
        .unwrap_or(1);
    let available = engine.check_availability(product_id, quantity).await?;
    Ok(Json(AvailabilityResponse { available }))
}

pub async fn list_movements<S: InventoryStore>(
    State(engine): State<ReservationEngine<S>>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
    Ok(Json(engine.movements(product_id).await?))
}

pub async fn health_check() -> &'static str {
    "OK"
}
