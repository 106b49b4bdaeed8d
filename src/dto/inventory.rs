use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{InventoryTransaction, Product, TransactionType};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    pub product_id: Uuid,
    pub transaction_type: TransactionType,
    /// For `adjust` this is the absolute stock level; for every other type
    /// it is the moved quantity.
    pub quantity: i32,
    pub reference: Option<String>,
    pub reason: Option<String>,
}

/// Body for the `/receive`, `/issue` and `/adjust` convenience endpoints;
/// the transaction type comes from the route.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StockMovementRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionWithProduct {
    pub transaction: InventoryTransaction,
    pub product: Product,
}

#[derive(Serialize, ToSchema)]
pub struct TransactionList {
    pub items: Vec<InventoryTransaction>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InventorySummary {
    pub total_products: i64,
    pub low_stock: i64,
    pub out_of_stock: i64,
}
