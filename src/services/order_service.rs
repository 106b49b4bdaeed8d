use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Alias, Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CancelOrderRequest, CreateOrderRequest, CustomerSnapshot, OrderList, OrderStats,
        OrderStatusCount, OrderWithItems, RefundOrderRequest, SalesSummary, TopSellingList,
        TopSellingProduct, UpdateOrderStatusRequest,
    },
    entity::{
        inventory_transactions::{Column as TxCol, Entity as InventoryTransactions},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    models::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, TransactionType},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SalesSummaryQuery, SortOrder, TopSellingQuery},
    services::inventory_service::{Movement, record_movement},
    state::AppState,
};

/// Date plus a time-based suffix, e.g. `ORD-250825-381204`. Unique by
/// timestamp granularity plus the database unique index, not by retry.
pub(crate) fn generate_order_number() -> String {
    let now = Utc::now();
    let suffix = now.timestamp_millis() % 1_000_000;
    format!("ORD-{}-{:06}", now.format("%y%m%d"), suffix)
}

/// Temporary tag linking ledger entries to an in-progress order before its
/// final order number exists.
pub(crate) fn correlation_reference() -> String {
    let short = Uuid::new_v4().simple().to_string();
    format!("order-{}-{}", Utc::now().timestamp_millis(), &short[..8])
}

pub(crate) fn order_totals(line_totals: &[i64], tax: i64, discount: i64) -> (i64, i64) {
    let subtotal: i64 = line_totals.iter().sum();
    (subtotal, subtotal + tax - discount)
}

/// Explicit transition table. `delivered`, `cancelled` and `returned` are
/// terminal; `cancelled`/`returned` are reachable from every non-terminal
/// state.
pub(crate) fn transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Confirmed, Processing)
            | (Processing, Shipped)
            | (Shipped, Delivered)
            | (Pending | Confirmed | Processing | Shipped, Cancelled | Returned)
    )
}

pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

struct LineSnapshot {
    product_id: Uuid,
    sku: String,
    name: String,
    quantity: i32,
    unit_price: i64,
    total_price: i64,
}

/// Order assembly. Every line issues stock through the shared movement rule
/// inside one transaction, so a failing line rolls the whole order back,
/// including earlier lines' deductions and ledger entries.
pub async fn create_order(
    state: &AppState,
    actor: Option<Uuid>,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    create_order_with_fallback(state, actor, payload, "Guest").await
}

/// Walk-in sale without customer details.
pub async fn quick_sale(
    state: &AppState,
    actor: Option<Uuid>,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    create_order_with_fallback(state, actor, payload, "Quick Sale").await
}

async fn create_order_with_fallback(
    state: &AppState,
    actor: Option<Uuid>,
    payload: CreateOrderRequest,
    fallback_customer: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest(
            "Order must contain at least one item".into(),
        ));
    }
    for line in &payload.items {
        if line.quantity < 1 {
            return Err(AppError::BadRequest("Quantity must be at least 1".into()));
        }
    }
    let tax = payload.tax.unwrap_or(0);
    let discount = payload.discount.unwrap_or(0);
    if tax < 0 || discount < 0 {
        return Err(AppError::BadRequest(
            "Tax and discount cannot be negative".into(),
        ));
    }

    let customer = payload
        .customer
        .filter(|c| !c.name.trim().is_empty())
        .unwrap_or(CustomerSnapshot {
            name: fallback_customer.to_string(),
            email: None,
            phone: None,
            address: None,
        });

    let txn = state.orm.begin().await?;
    let correlation = correlation_reference();

    let mut snapshots: Vec<LineSnapshot> = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        let product = Products::find_by_id(line.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        let product = match product {
            Some(p) => p,
            None => return Err(AppError::NotFound),
        };

        let (_entry, product) = record_movement(
            &txn,
            product,
            Movement {
                kind: TransactionType::Issue,
                quantity: line.quantity,
                reference: Some(correlation.clone()),
                reason: None,
                order_number: None,
                performed_by: actor,
            },
        )
        .await?;

        snapshots.push(LineSnapshot {
            product_id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity: line.quantity,
            unit_price: product.price,
            total_price: product.price * line.quantity as i64,
        });
    }

    let line_totals: Vec<i64> = snapshots.iter().map(|s| s.total_price).collect();
    let (subtotal, total) = order_totals(&line_totals, tax, discount);

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(generate_order_number()),
        customer_name: Set(customer.name),
        // Normalized at write time so customer_orders lookups always match.
        customer_email: Set(customer.email.map(|e| e.to_lowercase())),
        customer_phone: Set(customer.phone),
        customer_address: Set(customer.address),
        subtotal: Set(subtotal),
        tax: Set(tax),
        discount: Set(discount),
        total: Set(total),
        payment_method: Set(payload
            .payment_method
            .unwrap_or(PaymentMethod::Cash)
            .as_str()
            .to_string()),
        payment_status: Set(payload
            .payment_status
            .unwrap_or(PaymentStatus::Pending)
            .as_str()
            .to_string()),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        notes: Set(payload.notes),
        created_by: Set(actor),
        processed_by: Set(None),
        cancelled_by: Set(None),
        cancellation_reason: Set(None),
        refund_amount: Set(None),
        refund_reason: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(snapshot.product_id),
            sku: Set(snapshot.sku),
            name: Set(snapshot.name),
            quantity: Set(snapshot.quantity),
            unit_price: Set(snapshot.unit_price),
            total_price: Set(snapshot.total_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    // Back-fill the ledger rows tagged during fulfillment with the final
    // order number.
    InventoryTransactions::update_many()
        .col_expr(TxCol::OrderNumber, Expr::value(order.order_number.clone()))
        .filter(TxCol::Reference.eq(correlation.clone()))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor,
        "order_create",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "total": order.total,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn customer_orders(
    state: &AppState,
    email: &str,
) -> AppResult<ApiResponse<OrderList>> {
    let orders: Vec<Order> = Orders::find()
        .filter(OrderCol::CustomerEmail.eq(email.to_lowercase()))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::count(orders.len() as i64);
    Ok(ApiResponse::success(
        "Customer orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn order_stats(state: &AppState) -> AppResult<ApiResponse<OrderStats>> {
    let rows: Vec<(String, i64)> = Orders::find()
        .select_only()
        .column(OrderCol::Status)
        .column_as(OrderCol::Id.count(), "count")
        .group_by(OrderCol::Status)
        .into_tuple()
        .all(&state.orm)
        .await?;

    let by_status = rows
        .into_iter()
        .map(|(status, count)| OrderStatusCount { status, count })
        .collect();

    Ok(ApiResponse::success(
        "Order stats",
        OrderStats { by_status },
        Some(Meta::empty()),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    actor: Option<Uuid>,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let target = payload.status;
    let reason = payload.reason.filter(|r| !r.trim().is_empty());
    if target == OrderStatus::Cancelled && reason.is_none() {
        return Err(AppError::BadRequest(
            "Cancelling an order requires a reason".into(),
        ));
    }

    // Row lock so concurrent updates serialize and re-check the current
    // status, same as the stock paths.
    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = OrderStatus::parse(&existing.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown order status in database")))?;
    if !transition_allowed(current, target) {
        return Err(AppError::BadRequest(format!(
            "Cannot move order from {} to {}",
            current.as_str(),
            target.as_str()
        )));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(target.as_str().to_string());
    match target {
        OrderStatus::Cancelled => {
            active.cancelled_by = Set(actor);
            active.cancellation_reason = Set(reason);
        }
        OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered => {
            active.processed_by = Set(actor);
        }
        _ => {}
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor,
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn cancel_order(
    state: &AppState,
    actor: Option<Uuid>,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    update_order_status(
        state,
        actor,
        id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
            reason: Some(payload.reason),
        },
    )
    .await
}

/// Marks the payment refunded. Orthogonal to the order status machine; the
/// amount defaults to the full total and can never exceed it.
pub async fn refund_order(
    state: &AppState,
    actor: Option<Uuid>,
    id: Uuid,
    payload: RefundOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let reason = payload.reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::BadRequest("Refund reason is required".into()));
    }

    let txn = state.orm.begin().await?;
    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if existing.payment_status == PaymentStatus::Refunded.as_str() {
        return Err(AppError::Conflict("Order is already refunded".into()));
    }

    let amount = payload.amount.unwrap_or(existing.total);
    if amount < 0 || amount > existing.total {
        return Err(AppError::BadRequest(
            "Refund amount must be between 0 and the order total".into(),
        ));
    }

    let mut active: OrderActive = existing.into();
    active.payment_status = Set(PaymentStatus::Refunded.as_str().to_string());
    active.refund_amount = Set(Some(amount));
    active.refund_reason = Set(Some(reason));
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor,
        "order_refund",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "amount": amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order refunded",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Revenue over completed, paid orders; cancelled and returned orders are
/// excluded so refund-bound sales never inflate the numbers.
pub async fn sales_summary(
    state: &AppState,
    query: SalesSummaryQuery,
) -> AppResult<ApiResponse<SalesSummary>> {
    let mut condition = Condition::all()
        .add(OrderCol::PaymentStatus.eq(PaymentStatus::Paid.as_str()))
        .add(OrderCol::Status.is_not_in([
            OrderStatus::Cancelled.as_str(),
            OrderStatus::Returned.as_str(),
        ]));
    if let Some(from) = query.from {
        condition = condition.add(OrderCol::CreatedAt.gte(from));
    }
    if let Some(to) = query.to {
        condition = condition.add(OrderCol::CreatedAt.lte(to));
    }

    let rows: Vec<(Uuid, i64)> = Orders::find()
        .select_only()
        .column(OrderCol::Id)
        .column(OrderCol::Total)
        .filter(condition)
        .into_tuple()
        .all(&state.orm)
        .await?;

    let total_orders = rows.len() as i64;
    let total_revenue: i64 = rows.iter().map(|(_, total)| total).sum();
    let ids: Vec<Uuid> = rows.into_iter().map(|(id, _)| id).collect();

    let total_items = if ids.is_empty() {
        0
    } else {
        let qty: Option<Option<i64>> = OrderItems::find()
            .select_only()
            .column_as(OrderItemCol::Quantity.sum(), "total_items")
            .filter(OrderItemCol::OrderId.is_in(ids))
            .into_tuple()
            .one(&state.orm)
            .await?;
        qty.flatten().unwrap_or(0)
    };

    let average_order_value = if total_orders > 0 {
        total_revenue / total_orders
    } else {
        0
    };

    Ok(ApiResponse::success(
        "Sales summary",
        SalesSummary {
            total_orders,
            total_revenue,
            total_items,
            average_order_value,
        },
        Some(Meta::empty()),
    ))
}

/// Line items grouped per product snapshot, busiest first.
pub async fn top_selling(
    state: &AppState,
    query: TopSellingQuery,
) -> AppResult<ApiResponse<TopSellingList>> {
    let limit = query.limit.unwrap_or(10).min(100);

    // SUM over a bigint widens to numeric in Postgres, so cast back.
    let rows: Vec<(Uuid, String, String, i64, i64)> = OrderItems::find()
        .select_only()
        .column(OrderItemCol::ProductId)
        .column(OrderItemCol::Sku)
        .column(OrderItemCol::Name)
        .column_as(OrderItemCol::Quantity.sum(), "total_quantity")
        .column_as(
            Expr::col(OrderItemCol::TotalPrice)
                .sum()
                .cast_as(Alias::new("BIGINT")),
            "total_revenue",
        )
        .group_by(OrderItemCol::ProductId)
        .group_by(OrderItemCol::Sku)
        .group_by(OrderItemCol::Name)
        .order_by_desc(Expr::cust("total_quantity"))
        .limit(limit)
        .into_tuple()
        .all(&state.orm)
        .await?;

    let items: Vec<TopSellingProduct> = rows
        .into_iter()
        .map(
            |(product_id, sku, name, total_quantity, total_revenue)| TopSellingProduct {
                product_id,
                sku,
                name,
                total_quantity,
                total_revenue,
            },
        )
        .collect();

    let meta = Meta::count(items.len() as i64);
    Ok(ApiResponse::success(
        "Top selling products",
        TopSellingList { items },
        Some(meta),
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        order_number: model.order_number,
        customer_name: model.customer_name,
        customer_email: model.customer_email,
        customer_phone: model.customer_phone,
        customer_address: model.customer_address,
        subtotal: model.subtotal,
        tax: model.tax,
        discount: model.discount,
        total: model.total,
        payment_method: model.payment_method,
        payment_status: model.payment_status,
        status: model.status,
        notes: model.notes,
        created_by: model.created_by,
        processed_by: model.processed_by,
        cancelled_by: model.cancelled_by,
        cancellation_reason: model.cancellation_reason,
        refund_amount: model.refund_amount,
        refund_reason: model.refund_reason,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        sku: model.sku,
        name: model.name,
        quantity: model.quantity,
        unit_price: model.unit_price,
        total_price: model.total_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtotal_is_sum_of_line_totals() {
        // 2.99 x 3 and 1.50 x 2, in cents.
        let (subtotal, total) = order_totals(&[299 * 3, 150 * 2], 0, 0);
        assert_eq!(subtotal, 1197);
        assert_eq!(total, 1197);
    }

    #[test]
    fn total_adds_tax_and_subtracts_discount() {
        let (subtotal, total) = order_totals(&[299 * 3, 150 * 2], 120, 50);
        assert_eq!(subtotal, 1197);
        assert_eq!(total, 1197 + 120 - 50);
    }

    #[test]
    fn forward_chain_is_allowed() {
        use OrderStatus::*;
        assert!(transition_allowed(Pending, Confirmed));
        assert!(transition_allowed(Confirmed, Processing));
        assert!(transition_allowed(Processing, Shipped));
        assert!(transition_allowed(Shipped, Delivered));
    }

    #[test]
    fn skipping_states_is_denied() {
        use OrderStatus::*;
        assert!(!transition_allowed(Pending, Shipped));
        assert!(!transition_allowed(Pending, Delivered));
        assert!(!transition_allowed(Confirmed, Delivered));
    }

    #[test]
    fn cancel_and_return_reachable_from_non_terminal_states() {
        use OrderStatus::*;
        for from in [Pending, Confirmed, Processing, Shipped] {
            assert!(transition_allowed(from, Cancelled));
            assert!(transition_allowed(from, Returned));
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use OrderStatus::*;
        for from in [Delivered, Cancelled, Returned] {
            for to in [
                Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Returned,
            ] {
                assert!(!transition_allowed(from, to));
            }
        }
    }

    #[test]
    fn order_number_has_date_and_suffix() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        // ORD-YYMMDD-NNNNNN
        assert_eq!(number.len(), 4 + 6 + 1 + 6);
    }

    #[test]
    fn correlation_references_are_distinct() {
        assert_ne!(correlation_reference(), correlation_reference());
    }
}
