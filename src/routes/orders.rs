use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        CancelOrderRequest, CreateOrderRequest, OrderList, OrderStats, OrderWithItems,
        RefundOrderRequest, SalesSummary, TopSellingList, UpdateOrderStatusRequest,
    },
    error::AppResult,
    middleware::auth::MaybeUser,
    models::Order,
    response::ApiResponse,
    routes::params::{OrderListQuery, SalesSummaryQuery, TopSellingQuery},
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/stats", get(order_stats))
        .route("/sales-summary", get(sales_summary))
        .route("/top-selling", get(top_selling))
        .route("/quick-sale", post(quick_sale))
        .route("/customer/{email}", get(customer_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/status", patch(update_order_status))
        .route("/{id}/cancel", patch(cancel_order))
        .route("/{id}/refund", patch(refund_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "List orders, newest first", body = ApiResponse<OrderList>)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(order_service::list_orders(&state, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order captured and stock issued", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Empty order or insufficient stock"),
        (status = 404, description = "Unknown product in a line"),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    actor: MaybeUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(
        order_service::create_order(&state, actor.user_id(), payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/orders/quick-sale",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Walk-in sale captured", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Empty order or insufficient stock"),
    ),
    tag = "Orders"
)]
pub async fn quick_sale(
    State(state): State<AppState>,
    actor: MaybeUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(
        order_service::quick_sale(&state, actor.user_id(), payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/orders/stats",
    responses(
        (status = 200, description = "Order counts grouped by status", body = ApiResponse<OrderStats>)
    ),
    tag = "Orders"
)]
pub async fn order_stats(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<OrderStats>>> {
    Ok(Json(order_service::order_stats(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/sales-summary",
    params(
        ("from" = Option<String>, Query, description = "RFC 3339 lower bound"),
        ("to" = Option<String>, Query, description = "RFC 3339 upper bound"),
    ),
    responses(
        (status = 200, description = "Revenue over paid, completed orders", body = ApiResponse<SalesSummary>)
    ),
    tag = "Orders"
)]
pub async fn sales_summary(
    State(state): State<AppState>,
    Query(query): Query<SalesSummaryQuery>,
) -> AppResult<Json<ApiResponse<SalesSummary>>> {
    Ok(Json(order_service::sales_summary(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/top-selling",
    params(("limit" = Option<u64>, Query, description = "Default 10, capped at 100")),
    responses(
        (status = 200, description = "Products by quantity sold", body = ApiResponse<TopSellingList>)
    ),
    tag = "Orders"
)]
pub async fn top_selling(
    State(state): State<AppState>,
    Query(query): Query<TopSellingQuery>,
) -> AppResult<Json<ApiResponse<TopSellingList>>> {
    Ok(Json(order_service::top_selling(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/customer/{email}",
    params(("email" = String, Path, description = "Customer email")),
    responses(
        (status = 200, description = "Orders recorded under this email", body = ApiResponse<OrderList>)
    ),
    tag = "Orders"
)]
pub async fn customer_orders(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(order_service::customer_orders(&state, &email).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with its lines", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(order_service::get_order(&state, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status advanced", body = ApiResponse<Order>),
        (status = 400, description = "Transition not allowed from the current status"),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(
        order_service::update_order_status(&state, actor.user_id(), id, payload).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<Order>),
        (status = 400, description = "Order already terminal"),
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(
        order_service::cancel_order(&state, actor.user_id(), id, payload).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/refund",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = RefundOrderRequest,
    responses(
        (status = 200, description = "Payment marked refunded", body = ApiResponse<Order>),
        (status = 400, description = "Missing reason or amount exceeds the order total"),
        (status = 409, description = "Order is already refunded"),
    ),
    tag = "Orders"
)]
pub async fn refund_order(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RefundOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(
        order_service::refund_order(&state, actor.user_id(), id, payload).await?,
    ))
}
