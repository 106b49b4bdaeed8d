use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::inventory::{
        CreateTransactionRequest, InventorySummary, StockMovementRequest, TransactionList,
        TransactionWithProduct,
    },
    dto::products::ProductList,
    error::AppResult,
    middleware::auth::MaybeUser,
    models::{InventoryTransaction, TransactionType},
    response::ApiResponse,
    routes::params::{Pagination, TransactionListQuery},
    services::{inventory_service, product_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transactions).post(create_transaction))
        .route("/summary", get(summary))
        .route("/low-stock-alerts", get(low_stock_alerts))
        .route("/receive", post(receive_stock))
        .route("/issue", post(issue_stock))
        .route("/adjust", post(adjust_stock))
        .route("/product/{product_id}", get(product_transactions))
        .route("/{id}", get(get_transaction))
}

#[utoipa::path(
    get,
    path = "/api/inventory",
    params(("limit" = Option<u64>, Query, description = "Newest-first cap, default 100")),
    responses(
        (status = 200, description = "Recent transactions", body = ApiResponse<TransactionList>)
    ),
    tag = "Inventory"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionListQuery>,
) -> AppResult<Json<ApiResponse<TransactionList>>> {
    Ok(Json(
        inventory_service::list_transactions(&state, query).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/inventory",
    request_body = CreateTransactionRequest,
    responses(
        (status = 200, description = "Ledger entry plus updated product", body = ApiResponse<TransactionWithProduct>),
        (status = 400, description = "Invalid quantity or insufficient stock"),
        (status = 404, description = "Product not found"),
    ),
    tag = "Inventory"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    actor: MaybeUser,
    Json(payload): Json<CreateTransactionRequest>,
) -> AppResult<Json<ApiResponse<TransactionWithProduct>>> {
    Ok(Json(
        inventory_service::create_transaction(&state, actor.user_id(), payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/inventory/summary",
    responses(
        (status = 200, description = "Inventory summary", body = ApiResponse<InventorySummary>)
    ),
    tag = "Inventory"
)]
pub async fn summary(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<InventorySummary>>> {
    Ok(Json(inventory_service::summary(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/inventory/low-stock-alerts",
    responses(
        (status = 200, description = "Products at or below minimum stock", body = ApiResponse<ProductList>)
    ),
    tag = "Inventory"
)]
pub async fn low_stock_alerts(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(
        product_service::list_low_stock(&state, pagination).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/inventory/product/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Ledger entries for one product", body = ApiResponse<TransactionList>)
    ),
    tag = "Inventory"
)]
pub async fn product_transactions(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<TransactionList>>> {
    Ok(Json(
        inventory_service::product_transactions(&state, product_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/inventory/{id}",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "One ledger entry", body = ApiResponse<InventoryTransaction>),
        (status = 404, description = "Transaction not found"),
    ),
    tag = "Inventory"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<InventoryTransaction>>> {
    Ok(Json(inventory_service::get_transaction(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/inventory/receive",
    request_body = StockMovementRequest,
    responses(
        (status = 200, description = "Stock received", body = ApiResponse<TransactionWithProduct>)
    ),
    tag = "Inventory"
)]
pub async fn receive_stock(
    State(state): State<AppState>,
    actor: MaybeUser,
    Json(payload): Json<StockMovementRequest>,
) -> AppResult<Json<ApiResponse<TransactionWithProduct>>> {
    movement(state, actor, TransactionType::Receive, payload).await
}

#[utoipa::path(
    post,
    path = "/api/inventory/issue",
    request_body = StockMovementRequest,
    responses(
        (status = 200, description = "Stock issued", body = ApiResponse<TransactionWithProduct>),
        (status = 400, description = "Insufficient stock"),
    ),
    tag = "Inventory"
)]
pub async fn issue_stock(
    State(state): State<AppState>,
    actor: MaybeUser,
    Json(payload): Json<StockMovementRequest>,
) -> AppResult<Json<ApiResponse<TransactionWithProduct>>> {
    movement(state, actor, TransactionType::Issue, payload).await
}

#[utoipa::path(
    post,
    path = "/api/inventory/adjust",
    request_body = StockMovementRequest,
    responses(
        (status = 200, description = "Stock level set", body = ApiResponse<TransactionWithProduct>)
    ),
    tag = "Inventory"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    actor: MaybeUser,
    Json(payload): Json<StockMovementRequest>,
) -> AppResult<Json<ApiResponse<TransactionWithProduct>>> {
    movement(state, actor, TransactionType::Adjust, payload).await
}

async fn movement(
    state: AppState,
    actor: MaybeUser,
    transaction_type: TransactionType,
    payload: StockMovementRequest,
) -> AppResult<Json<ApiResponse<TransactionWithProduct>>> {
    Ok(Json(
        inventory_service::create_transaction(
            &state,
            actor.user_id(),
            CreateTransactionRequest {
                product_id: payload.product_id,
                transaction_type,
                quantity: payload.quantity,
                reference: None,
                reason: payload.reason,
            },
        )
        .await?,
    ))
}
