use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::inventory::TransactionWithProduct,
    dto::products::{
        CreateProductRequest, ProductList, ProductStats, UpdateProductRequest, UpdateStockRequest,
    },
    error::AppResult,
    middleware::auth::{AuthUser, MaybeUser},
    models::Product,
    response::ApiResponse,
    routes::params::{Pagination, ProductQuery},
    services::product_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/low-stock", get(list_low_stock))
        .route("/stats", get(product_stats))
        .route("/export", get(export_products))
        .route("/sku/{sku}", get(get_product_by_sku))
        .route("/barcode/{barcode}", get(get_product_by_barcode))
        .route(
            "/{id}",
            get(get_product).patch(update_product).delete(retire_product),
        )
        .route("/{id}/stock", patch(update_stock))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search in name, description, SKU, barcode"),
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(product_service::list_products(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/low-stock",
    responses(
        (status = 200, description = "Products at or below their minimum stock", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(
        product_service::list_low_stock(&state, pagination).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/products/stats",
    responses(
        (status = 200, description = "Per-category catalog rollup", body = ApiResponse<ProductStats>)
    ),
    tag = "Products"
)]
pub async fn product_stats(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ProductStats>>> {
    Ok(Json(product_service::product_stats(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/export",
    responses(
        (status = 200, description = "Catalog as CSV", content_type = "text/csv", body = String)
    ),
    tag = "Products"
)]
pub async fn export_products(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let csv = product_service::export_products_csv(&state).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"products.csv\"",
            ),
        ],
        csv,
    ))
}

#[utoipa::path(
    get,
    path = "/api/products/sku/{sku}",
    params(("sku" = String, Path, description = "Product SKU")),
    responses(
        (status = 200, description = "Get product by SKU", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product_by_sku(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::get_product_by_sku(&state, &sku).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/products/barcode/{barcode}",
    params(("barcode" = String, Path, description = "Product barcode")),
    responses(
        (status = 200, description = "Get product by barcode", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product_by_barcode(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::get_product_by_barcode(&state, &barcode).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(product_service::get_product(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Create product", body = ApiResponse<Product>),
        (status = 409, description = "SKU or barcode already exists"),
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    actor: MaybeUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::create_product(&state, actor.user_id(), payload).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<Product>)
    ),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::update_product(&state, actor.user_id(), id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product soft-retired", body = ApiResponse<Product>),
        (status = 403, description = "Manager role required"),
    ),
    tag = "Products"
)]
pub async fn retire_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::retire_product(&state, &user, id).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/products/{id}/stock",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateStockRequest,
    responses(
        (status = 200, description = "Stock updated through the ledger", body = ApiResponse<TransactionWithProduct>),
        (status = 400, description = "Invalid quantity or insufficient stock"),
    ),
    tag = "Products"
)]
pub async fn update_stock(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStockRequest>,
) -> AppResult<Json<ApiResponse<TransactionWithProduct>>> {
    Ok(Json(
        product_service::update_stock(&state, actor.user_id(), id, payload).await?,
    ))
}
