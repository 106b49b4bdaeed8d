use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::customers::{CreateCustomerRequest, CustomerList, CustomerStats, UpdateCustomerRequest},
    error::AppResult,
    middleware::auth::MaybeUser,
    models::Customer,
    response::ApiResponse,
    routes::params::{Pagination, SearchQuery},
    services::customer_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route("/search", get(search_customers))
        .route("/stats", get(customer_stats))
        .route(
            "/{id}",
            get(get_customer)
                .patch(update_customer)
                .delete(delete_customer),
        )
}

#[utoipa::path(
    get,
    path = "/api/customers",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "List customers", body = ApiResponse<CustomerList>)
    ),
    tag = "Customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<CustomerList>>> {
    Ok(Json(
        customer_service::list_customers(&state, pagination).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/customers/search",
    params(("q" = String, Query, description = "Matches name, email or phone")),
    responses(
        (status = 200, description = "Matching customers", body = ApiResponse<CustomerList>)
    ),
    tag = "Customers"
)]
pub async fn search_customers(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<CustomerList>>> {
    Ok(Json(
        customer_service::search_customers(&state, &query.q).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/customers/stats",
    responses(
        (status = 200, description = "Customer counts", body = ApiResponse<CustomerStats>)
    ),
    tag = "Customers"
)]
pub async fn customer_stats(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CustomerStats>>> {
    Ok(Json(customer_service::customer_stats(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Get customer", body = ApiResponse<Customer>),
        (status = 404, description = "Customer not found"),
    ),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    Ok(Json(customer_service::get_customer(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 200, description = "Create customer", body = ApiResponse<Customer>),
        (status = 409, description = "Email or phone already registered"),
    ),
    tag = "Customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    actor: MaybeUser,
    Json(payload): Json<CreateCustomerRequest>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    Ok(Json(
        customer_service::create_customer(&state, actor.user_id(), payload).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Updated customer", body = ApiResponse<Customer>),
        (status = 409, description = "Email or phone already registered"),
    ),
    tag = "Customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    Ok(Json(
        customer_service::update_customer(&state, actor.user_id(), id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Customer not found"),
    ),
    tag = "Customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        customer_service::delete_customer(&state, actor.user_id(), id).await?,
    ))
}
