use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{Claims, LoginRequest, LoginResponse},
        customers::{CreateCustomerRequest, CustomerList, CustomerStats, UpdateCustomerRequest},
        inventory::{
            CreateTransactionRequest, InventorySummary, StockMovementRequest, TransactionList,
            TransactionWithProduct,
        },
        orders::{
            CancelOrderRequest, CreateOrderRequest, CustomerSnapshot, OrderLineRequest, OrderList,
            OrderStats, OrderStatusCount, OrderWithItems, RefundOrderRequest, SalesSummary,
            TopSellingList, TopSellingProduct, UpdateOrderStatusRequest,
        },
        products::{
            CategoryStats, CreateProductRequest, ProductList, ProductStats, StockOperation,
            UpdateProductRequest, UpdateStockRequest,
        },
    },
    models::{
        Category, Customer, CustomerStatus, InventoryTransaction, Order, OrderItem, OrderStatus,
        PaymentMethod, PaymentStatus, Product, ProductStatus, TransactionType, Uom, User,
    },
    response::{ApiResponse, Meta},
    routes::{auth, customers, health, inventory, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::me,
        products::list_products,
        products::list_low_stock,
        products::product_stats,
        products::export_products,
        products::get_product_by_sku,
        products::get_product_by_barcode,
        products::get_product,
        products::create_product,
        products::update_product,
        products::retire_product,
        products::update_stock,
        inventory::list_transactions,
        inventory::create_transaction,
        inventory::summary,
        inventory::low_stock_alerts,
        inventory::product_transactions,
        inventory::get_transaction,
        inventory::receive_stock,
        inventory::issue_stock,
        inventory::adjust_stock,
        orders::list_orders,
        orders::create_order,
        orders::quick_sale,
        orders::order_stats,
        orders::sales_summary,
        orders::top_selling,
        orders::customer_orders,
        orders::get_order,
        orders::update_order_status,
        orders::cancel_order,
        orders::refund_order,
        customers::list_customers,
        customers::search_customers,
        customers::customer_stats,
        customers::get_customer,
        customers::create_customer,
        customers::update_customer,
        customers::delete_customer
    ),
    components(
        schemas(
            User,
            Product,
            InventoryTransaction,
            Order,
            OrderItem,
            Customer,
            Category,
            Uom,
            ProductStatus,
            TransactionType,
            PaymentMethod,
            PaymentStatus,
            OrderStatus,
            CustomerStatus,
            LoginRequest,
            LoginResponse,
            Claims,
            CreateProductRequest,
            UpdateProductRequest,
            StockOperation,
            UpdateStockRequest,
            ProductList,
            CategoryStats,
            ProductStats,
            CreateTransactionRequest,
            StockMovementRequest,
            TransactionWithProduct,
            TransactionList,
            InventorySummary,
            CustomerSnapshot,
            OrderLineRequest,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            CancelOrderRequest,
            RefundOrderRequest,
            OrderWithItems,
            OrderList,
            OrderStatusCount,
            OrderStats,
            SalesSummary,
            TopSellingProduct,
            TopSellingList,
            CreateCustomerRequest,
            UpdateCustomerRequest,
            CustomerList,
            CustomerStats,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::TransactionListQuery,
            params::SearchQuery,
            params::SalesSummaryQuery,
            params::TopSellingQuery,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<ProductStats>,
            ApiResponse<TransactionWithProduct>,
            ApiResponse<TransactionList>,
            ApiResponse<InventorySummary>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<OrderStats>,
            ApiResponse<SalesSummary>,
            ApiResponse<TopSellingList>,
            ApiResponse<Customer>,
            ApiResponse<CustomerList>,
            ApiResponse<CustomerStats>,
            ApiResponse<LoginResponse>,
            ApiResponse<User>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Inventory", description = "Stock ledger endpoints"),
        (name = "Orders", description = "Order capture and lifecycle endpoints"),
        (name = "Customers", description = "Customer directory endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
