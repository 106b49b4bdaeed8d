use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Category, Product, ProductStatus, Uom};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    /// Unit price in cents.
    pub price: i64,
    pub cost_price: Option<i64>,
    pub stock: Option<i32>,
    pub min_stock: Option<i32>,
    pub uom: Uom,
    pub barcode: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub price: Option<i64>,
    pub cost_price: Option<i64>,
    pub min_stock: Option<i32>,
    pub uom: Option<Uom>,
    pub barcode: Option<String>,
    pub status: Option<ProductStatus>,
}

/// Direct stock endpoint: `add` funnels into a `receive` movement,
/// `subtract` into an `issue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    Add,
    Subtract,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStockRequest {
    pub quantity: i32,
    pub operation: StockOperation,
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

/// Per-category rollup; `total_value` is price x stock summed, in cents.
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryStats {
    pub category: String,
    pub total_products: i64,
    pub total_stock: i64,
    pub total_value: i64,
    pub average_price: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductStats {
    pub categories: Vec<CategoryStats>,
    pub low_stock: i64,
    pub out_of_stock: i64,
}
