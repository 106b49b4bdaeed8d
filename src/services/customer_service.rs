use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::customers::{CreateCustomerRequest, CustomerList, CustomerStats, UpdateCustomerRequest},
    entity::customers::{ActiveModel, Column, Entity as Customers, Model as CustomerModel},
    error::{AppError, AppResult},
    models::{Customer, CustomerStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_customers(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<CustomerList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Customers::find().order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(customer_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Customers",
        CustomerList { items },
        Some(meta),
    ))
}

pub async fn get_customer(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Customer>> {
    let result = Customers::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(customer_from_entity);
    match result {
        Some(c) => Ok(ApiResponse::success("Customer", c, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn create_customer(
    state: &AppState,
    actor: Option<Uuid>,
    payload: CreateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("Customer name is required".into()));
    }

    let email = payload.email.map(|e| e.to_lowercase());
    if let Some(email) = email.as_ref() {
        ensure_unique(state, Column::Email, email, None).await?;
    }
    if let Some(phone) = payload.phone.as_ref() {
        ensure_unique(state, Column::Phone, phone, None).await?;
    }

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        email: Set(email),
        phone: Set(payload.phone),
        address: Set(payload.address),
        total_orders: Set(0),
        total_spent: Set(0),
        notes: Set(payload.notes),
        status: Set(CustomerStatus::Active.as_str().to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let customer = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor,
        "customer_create",
        Some("customers"),
        Some(serde_json::json!({ "customer_id": customer.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Customer created",
        customer_from_entity(customer),
        Some(Meta::empty()),
    ))
}

pub async fn update_customer(
    state: &AppState,
    actor: Option<Uuid>,
    id: Uuid,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    let existing = Customers::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let email = payload.email.map(|e| e.to_lowercase());
    if let Some(email) = email.as_ref() {
        ensure_unique(state, Column::Email, email, Some(id)).await?;
    }
    if let Some(phone) = payload.phone.as_ref() {
        ensure_unique(state, Column::Phone, phone, Some(id)).await?;
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(email) = email {
        active.email = Set(Some(email));
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(address) = payload.address {
        active.address = Set(Some(address));
    }
    if let Some(notes) = payload.notes {
        active.notes = Set(Some(notes));
    }
    if let Some(status) = payload.status {
        active.status = Set(status.as_str().to_string());
    }
    active.updated_at = Set(Utc::now().into());

    let customer = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor,
        "customer_update",
        Some("customers"),
        Some(serde_json::json!({ "customer_id": customer.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        customer_from_entity(customer),
        Some(Meta::empty()),
    ))
}

/// Orders embed their customer snapshot, so deleting a customer record never
/// touches order history.
pub async fn delete_customer(
    state: &AppState,
    actor: Option<Uuid>,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Customers::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        actor,
        "customer_delete",
        Some("customers"),
        Some(serde_json::json!({ "customer_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn search_customers(state: &AppState, q: &str) -> AppResult<ApiResponse<CustomerList>> {
    let pattern = format!("%{}%", q);
    let items: Vec<Customer> = Customers::find()
        .filter(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Email).ilike(pattern.clone()))
                .add(Expr::col(Column::Phone).ilike(pattern)),
        )
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(customer_from_entity)
        .collect();

    let meta = Meta::count(items.len() as i64);
    Ok(ApiResponse::success(
        "Customers",
        CustomerList { items },
        Some(meta),
    ))
}

pub async fn customer_stats(state: &AppState) -> AppResult<ApiResponse<CustomerStats>> {
    let total = Customers::find().count(&state.orm).await? as i64;
    let active = Customers::find()
        .filter(Column::Status.eq(CustomerStatus::Active.as_str()))
        .count(&state.orm)
        .await? as i64;
    let vip = Customers::find()
        .filter(Column::Status.eq(CustomerStatus::Vip.as_str()))
        .count(&state.orm)
        .await? as i64;

    Ok(ApiResponse::success(
        "Customer stats",
        CustomerStats { total, active, vip },
        Some(Meta::empty()),
    ))
}

async fn ensure_unique(
    state: &AppState,
    column: Column,
    value: &str,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    let mut condition = Condition::all().add(column.eq(value));
    if let Some(id) = exclude {
        condition = condition.add(Column::Id.ne(id));
    }
    let taken = Customers::find().filter(condition).count(&state.orm).await?;
    if taken > 0 {
        let field = match column {
            Column::Email => "Email",
            Column::Phone => "Phone",
            _ => "Value",
        };
        return Err(AppError::Conflict(format!("{field} is already taken")));
    }
    Ok(())
}

fn customer_from_entity(model: CustomerModel) -> Customer {
    Customer {
        id: model.id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        address: model.address,
        total_orders: model.total_orders,
        total_spent: model.total_spent,
        notes: model.notes,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
