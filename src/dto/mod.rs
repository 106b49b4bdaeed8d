pub mod auth;
pub mod customers;
pub mod inventory;
pub mod orders;
pub mod products;
