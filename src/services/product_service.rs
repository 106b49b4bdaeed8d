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
    dto::inventory::{CreateTransactionRequest, TransactionWithProduct},
    dto::products::{
        CategoryStats, CreateProductRequest, ProductList, ProductStats, StockOperation,
        UpdateProductRequest, UpdateStockRequest,
    },
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_manager},
    models::{Category, Product, ProductStatus, TransactionType},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SortOrder},
    services::inventory_service,
    state::AppState,
};

/// Category prefix plus a random suffix, e.g. `FRU-9F2A41C3`.
pub(crate) fn generate_sku(category: Category) -> String {
    let prefix: String = category.as_str().chars().take(3).collect();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix.to_uppercase(), suffix[..8].to_uppercase())
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern.clone()))
                .add(Expr::col(Column::Sku).ilike(pattern.clone()))
                .add(Expr::col(Column::Barcode).ilike(pattern)),
        );
    }

    if let Some(category) = query.category {
        condition = condition.add(Column::Category.eq(category.as_str()));
    }

    if let Some(status) = query.status {
        condition = condition.add(Column::Status.eq(status.as_str()));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Stock => Column::Stock,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity);
    match result {
        Some(p) => Ok(ApiResponse::success("Product", p, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn get_product_by_sku(state: &AppState, sku: &str) -> AppResult<ApiResponse<Product>> {
    let result = Products::find()
        .filter(Column::Sku.eq(sku.to_uppercase()))
        .one(&state.orm)
        .await?
        .map(product_from_entity);
    match result {
        Some(p) => Ok(ApiResponse::success("Product", p, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn get_product_by_barcode(
    state: &AppState,
    barcode: &str,
) -> AppResult<ApiResponse<Product>> {
    let result = Products::find()
        .filter(Column::Barcode.eq(barcode))
        .one(&state.orm)
        .await?
        .map(product_from_entity);
    match result {
        Some(p) => Ok(ApiResponse::success("Product", p, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn create_product(
    state: &AppState,
    actor: Option<Uuid>,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let sku = payload
        .sku
        .filter(|s| !s.is_empty())
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| generate_sku(payload.category));

    let taken = Products::find()
        .filter(Column::Sku.eq(sku.clone()))
        .count(&state.orm)
        .await?;
    if taken > 0 {
        return Err(AppError::Conflict(format!("SKU {sku} already exists")));
    }

    if let Some(barcode) = payload.barcode.as_ref() {
        let taken = Products::find()
            .filter(Column::Barcode.eq(barcode.clone()))
            .count(&state.orm)
            .await?;
        if taken > 0 {
            return Err(AppError::Conflict("Barcode already exists".into()));
        }
    }

    if payload.price < 0 {
        return Err(AppError::BadRequest("Price cannot be negative".into()));
    }
    let stock = payload.stock.unwrap_or(0);
    if stock < 0 {
        return Err(AppError::BadRequest("Stock cannot be negative".into()));
    }

    let id = Uuid::new_v4();
    let active = ActiveModel {
        id: Set(id),
        sku: Set(sku),
        name: Set(payload.name),
        description: Set(payload.description),
        category: Set(payload.category.as_str().to_string()),
        price: Set(payload.price),
        cost_price: Set(payload.cost_price),
        stock: Set(stock),
        min_stock: Set(payload.min_stock.unwrap_or(10)),
        uom: Set(payload.uom.as_str().to_string()),
        barcode: Set(payload.barcode),
        status: Set(ProductStatus::Active.as_str().to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor,
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id, "sku": product.sku })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    actor: Option<Uuid>,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Some(barcode) = payload.barcode.as_ref() {
        let taken = Products::find()
            .filter(
                Condition::all()
                    .add(Column::Barcode.eq(barcode.clone()))
                    .add(Column::Id.ne(id)),
            )
            .count(&state.orm)
            .await?;
        if taken > 0 {
            return Err(AppError::Conflict("Barcode already exists".into()));
        }
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(category) = payload.category {
        active.category = Set(category.as_str().to_string());
    }
    if let Some(price) = payload.price {
        if price < 0 {
            return Err(AppError::BadRequest("Price cannot be negative".into()));
        }
        active.price = Set(price);
    }
    if let Some(cost_price) = payload.cost_price {
        active.cost_price = Set(Some(cost_price));
    }
    if let Some(min_stock) = payload.min_stock {
        active.min_stock = Set(min_stock);
    }
    if let Some(uom) = payload.uom {
        active.uom = Set(uom.as_str().to_string());
    }
    if let Some(barcode) = payload.barcode {
        active.barcode = Set(Some(barcode));
    }
    if let Some(status) = payload.status {
        active.status = Set(status.as_str().to_string());
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor,
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// Soft retire. The ledger keeps referencing retired products, so catalog
/// rows are never hard-deleted.
pub async fn retire_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    ensure_manager(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    active.status = Set(ProductStatus::Discontinued.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_retire",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product retired",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// Products at or below their own minimum-stock threshold.
pub async fn list_low_stock(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Products::find()
        .filter(Expr::col(Column::Stock).lte(Expr::col(Column::MinStock)))
        .order_by_asc(Column::Stock)
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(meta),
    ))
}

/// Direct stock endpoint. Funnels into the same movement rule as the
/// standalone inventory endpoints and order fulfillment.
pub async fn update_stock(
    state: &AppState,
    actor: Option<Uuid>,
    id: Uuid,
    payload: UpdateStockRequest,
) -> AppResult<ApiResponse<TransactionWithProduct>> {
    let transaction_type = match payload.operation {
        StockOperation::Add => TransactionType::Receive,
        StockOperation::Subtract => TransactionType::Issue,
    };

    inventory_service::create_transaction(
        state,
        actor,
        CreateTransactionRequest {
            product_id: id,
            transaction_type,
            quantity: payload.quantity,
            reference: None,
            reason: payload.reason,
        },
    )
    .await
}

/// Per-category catalog rollup plus the low/out-of-stock counters. The
/// aggregation runs over (category, price, stock) tuples in memory; the
/// catalog is small and this keeps the money math in integer cents.
pub async fn product_stats(state: &AppState) -> AppResult<ApiResponse<ProductStats>> {
    let rows: Vec<(String, i64, i32)> = Products::find()
        .select_only()
        .column(Column::Category)
        .column(Column::Price)
        .column(Column::Stock)
        .into_tuple()
        .all(&state.orm)
        .await?;

    let mut by_category: std::collections::BTreeMap<String, (i64, i64, i64, i64)> =
        std::collections::BTreeMap::new();
    for (category, price, stock) in rows {
        let entry = by_category.entry(category).or_default();
        entry.0 += 1;
        entry.1 += stock as i64;
        entry.2 += price * stock as i64;
        entry.3 += price;
    }

    let mut categories: Vec<CategoryStats> = by_category
        .into_iter()
        .map(
            |(category, (total_products, total_stock, total_value, price_sum))| CategoryStats {
                category,
                total_products,
                total_stock,
                total_value,
                average_price: price_sum / total_products,
            },
        )
        .collect();
    categories.sort_by(|a, b| b.total_products.cmp(&a.total_products));

    let low_stock = Products::find()
        .filter(Expr::col(Column::Stock).lte(Expr::col(Column::MinStock)))
        .count(&state.orm)
        .await? as i64;
    let out_of_stock = Products::find()
        .filter(Column::Stock.eq(0))
        .count(&state.orm)
        .await? as i64;

    Ok(ApiResponse::success(
        "Product stats",
        ProductStats {
            categories,
            low_stock,
            out_of_stock,
        },
        Some(Meta::empty()),
    ))
}

pub async fn export_products_csv(state: &AppState) -> AppResult<String> {
    let products = Products::find()
        .order_by_asc(Column::Sku)
        .all(&state.orm)
        .await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "SKU",
            "Name",
            "Category",
            "Price",
            "Cost Price",
            "Stock",
            "Min Stock",
            "UOM",
            "Barcode",
            "Status",
            "Created At",
        ])
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    for p in products {
        writer
            .write_record([
                p.sku,
                p.name,
                p.category,
                p.price.to_string(),
                p.cost_price.map(|c| c.to_string()).unwrap_or_default(),
                p.stock.to_string(),
                p.min_stock.to_string(),
                p.uom,
                p.barcode.unwrap_or_default(),
                p.status,
                p.created_at.with_timezone(&Utc).to_rfc3339(),
            ])
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        sku: model.sku,
        name: model.name,
        description: model.description,
        category: model.category,
        price: model.price,
        cost_price: model.cost_price,
        stock: model.stock,
        min_stock: model.min_stock,
        uom: model.uom,
        barcode: model.barcode,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
