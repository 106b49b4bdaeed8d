use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::inventory::{
        CreateTransactionRequest, InventorySummary, TransactionList, TransactionWithProduct,
    },
    entity::{
        inventory_transactions::{
            ActiveModel as TxActive, Column as TxCol, Entity as InventoryTransactions,
            Model as TxModel,
        },
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    models::{InventoryTransaction, TransactionType},
    response::{ApiResponse, Meta},
    routes::params::TransactionListQuery,
    services::product_service::product_from_entity,
    state::AppState,
};

/// A stock movement about to be applied to one product.
#[derive(Debug, Clone)]
pub(crate) struct Movement {
    pub kind: TransactionType,
    pub quantity: i32,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub order_number: Option<String>,
    pub performed_by: Option<Uuid>,
}

/// Type-specific stock rule. For `adjust` the quantity is the absolute new
/// level; everything else moves by the quantity. Committed stock never goes
/// negative.
pub(crate) fn next_stock(
    kind: TransactionType,
    previous: i32,
    quantity: i32,
    product_name: &str,
) -> AppResult<i32> {
    if quantity < 0 {
        let what = match kind {
            TransactionType::Adjust => "New stock cannot be negative",
            _ => "Quantity must be a non-negative number",
        };
        return Err(AppError::BadRequest(what.into()));
    }
    match kind {
        TransactionType::Receive | TransactionType::Return => Ok(previous + quantity),
        TransactionType::Issue | TransactionType::Damage | TransactionType::Expiry => {
            if quantity > previous {
                Err(AppError::InsufficientStock(product_name.to_string()))
            } else {
                Ok(previous - quantity)
            }
        }
        TransactionType::Adjust => Ok(quantity),
    }
}

/// Write one ledger entry and the updated counter. Callers must hold the
/// product row locked inside an open transaction so the pair commits
/// atomically; every stock-changing call path funnels through here.
pub(crate) async fn record_movement<C: ConnectionTrait>(
    conn: &C,
    product: ProductModel,
    movement: Movement,
) -> AppResult<(TxModel, ProductModel)> {
    let previous = product.stock;
    let new_stock = next_stock(movement.kind, previous, movement.quantity, &product.name)?;

    let entry = TxActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        sku: Set(product.sku.clone()),
        transaction_type: Set(movement.kind.as_str().to_string()),
        quantity: Set(movement.quantity),
        previous_stock: Set(previous),
        new_stock: Set(new_stock),
        unit_price: Set(product.price),
        total_value: Set(product.price * movement.quantity as i64),
        reference: Set(movement.reference),
        reason: Set(movement.reason),
        order_number: Set(movement.order_number),
        performed_by: Set(movement.performed_by),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    let mut active: crate::entity::products::ActiveModel = product.into();
    active.stock = Set(new_stock);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(conn).await?;

    Ok((entry, product))
}

pub async fn create_transaction(
    state: &AppState,
    actor: Option<Uuid>,
    payload: CreateTransactionRequest,
) -> AppResult<ApiResponse<TransactionWithProduct>> {
    let txn = state.orm.begin().await?;

    let product = Products::find_by_id(payload.product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let (entry, product) = record_movement(
        &txn,
        product,
        Movement {
            kind: payload.transaction_type,
            quantity: payload.quantity,
            reference: payload.reference,
            reason: payload.reason,
            order_number: None,
            performed_by: actor,
        },
    )
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor,
        "inventory_transaction",
        Some("inventory_transactions"),
        Some(serde_json::json!({
            "transaction_id": entry.id,
            "product_id": product.id,
            "type": entry.transaction_type,
            "quantity": entry.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Transaction recorded",
        TransactionWithProduct {
            transaction: tx_from_entity(entry),
            product: product_from_entity(product),
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_transactions(
    state: &AppState,
    query: TransactionListQuery,
) -> AppResult<ApiResponse<TransactionList>> {
    let limit = query.limit.unwrap_or(100).min(500);
    let items: Vec<InventoryTransaction> = InventoryTransactions::find()
        .order_by_desc(TxCol::CreatedAt)
        .limit(limit)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(tx_from_entity)
        .collect();

    let meta = Meta::count(items.len() as i64);
    Ok(ApiResponse::success(
        "Transactions",
        TransactionList { items },
        Some(meta),
    ))
}

pub async fn get_transaction(
    state: &AppState,
    id: Uuid,
) -> AppResult<ApiResponse<InventoryTransaction>> {
    let entry = InventoryTransactions::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(tx_from_entity);
    match entry {
        Some(t) => Ok(ApiResponse::success("Transaction", t, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn product_transactions(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<TransactionList>> {
    let items: Vec<InventoryTransaction> = InventoryTransactions::find()
        .filter(TxCol::ProductId.eq(product_id))
        .order_by_desc(TxCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(tx_from_entity)
        .collect();

    let meta = Meta::count(items.len() as i64);
    Ok(ApiResponse::success(
        "Product transactions",
        TransactionList { items },
        Some(meta),
    ))
}

pub async fn summary(state: &AppState) -> AppResult<ApiResponse<InventorySummary>> {
    let total_products = Products::find().count(&state.orm).await? as i64;
    let low_stock = Products::find()
        .filter(Expr::col(ProdCol::Stock).lte(Expr::col(ProdCol::MinStock)))
        .count(&state.orm)
        .await? as i64;
    let out_of_stock = Products::find()
        .filter(ProdCol::Stock.eq(0))
        .count(&state.orm)
        .await? as i64;

    Ok(ApiResponse::success(
        "Inventory summary",
        InventorySummary {
            total_products,
            low_stock,
            out_of_stock,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) fn tx_from_entity(model: TxModel) -> InventoryTransaction {
    InventoryTransaction {
        id: model.id,
        product_id: model.product_id,
        sku: model.sku,
        transaction_type: model.transaction_type,
        quantity: model.quantity,
        previous_stock: model.previous_stock,
        new_stock: model.new_stock,
        unit_price: model.unit_price,
        total_value: model.total_value,
        reference: model.reference,
        reason: model.reason,
        order_number: model.order_number,
        performed_by: model.performed_by,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_adds_to_previous_stock() {
        assert_eq!(
            next_stock(TransactionType::Receive, 10, 5, "Apples").unwrap(),
            15
        );
        assert_eq!(
            next_stock(TransactionType::Receive, 0, 0, "Apples").unwrap(),
            0
        );
    }

    #[test]
    fn return_behaves_like_receive() {
        assert_eq!(
            next_stock(TransactionType::Return, 3, 2, "Apples").unwrap(),
            5
        );
    }

    #[test]
    fn issue_subtracts_and_guards_available_stock() {
        assert_eq!(
            next_stock(TransactionType::Issue, 10, 4, "Apples").unwrap(),
            6
        );
        let err = next_stock(TransactionType::Issue, 6, 10, "Apples").unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(ref name) if name == "Apples"));
    }

    #[test]
    fn damage_and_expiry_guard_available_stock() {
        assert_eq!(
            next_stock(TransactionType::Damage, 5, 5, "Milk").unwrap(),
            0
        );
        assert!(matches!(
            next_stock(TransactionType::Expiry, 2, 3, "Milk"),
            Err(AppError::InsufficientStock(_))
        ));
    }

    #[test]
    fn adjust_sets_absolute_level() {
        assert_eq!(
            next_stock(TransactionType::Adjust, 42, 7, "Rice").unwrap(),
            7
        );
        assert_eq!(next_stock(TransactionType::Adjust, 0, 0, "Rice").unwrap(), 0);
    }

    #[test]
    fn negative_quantity_is_rejected_for_every_type() {
        for kind in [
            TransactionType::Receive,
            TransactionType::Issue,
            TransactionType::Adjust,
            TransactionType::Return,
            TransactionType::Damage,
            TransactionType::Expiry,
        ] {
            assert!(matches!(
                next_stock(kind, 10, -1, "Rice"),
                Err(AppError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn receive_then_issue_round_trips() {
        let after_receive = next_stock(TransactionType::Receive, 8, 5, "Tea").unwrap();
        let after_issue = next_stock(TransactionType::Issue, after_receive, 5, "Tea").unwrap();
        assert_eq!(after_issue, 8);
    }
}
