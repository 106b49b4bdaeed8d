use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Customer, CustomerStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub status: Option<CustomerStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct CustomerList {
    pub items: Vec<Customer>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerStats {
    pub total: i64,
    pub active: i64,
    pub vip: i64,
}
