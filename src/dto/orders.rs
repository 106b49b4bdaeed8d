use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CustomerSnapshot {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Denormalized at order time; defaults to a "Guest" placeholder.
    pub customer: Option<CustomerSnapshot>,
    pub items: Vec<OrderLineRequest>,
    pub payment_method: Option<PaymentMethod>,
    /// Walk-in cash sales are typically `paid` at capture; defaults to `pending`.
    pub payment_status: Option<PaymentStatus>,
    /// Cents.
    pub tax: Option<i64>,
    /// Cents.
    pub discount: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    /// Required when the target status is `cancelled`.
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefundOrderRequest {
    /// Cents; defaults to the full order total.
    pub amount: Option<i64>,
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStats {
    pub by_status: Vec<OrderStatusCount>,
}

/// Paid, non-cancelled, non-returned orders only. Amounts in cents.
#[derive(Debug, Serialize, ToSchema)]
pub struct SalesSummary {
    pub total_orders: i64,
    pub total_revenue: i64,
    pub total_items: i64,
    pub average_order_value: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopSellingProduct {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub total_quantity: i64,
    pub total_revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopSellingList {
    pub items: Vec<TopSellingProduct>,
}
