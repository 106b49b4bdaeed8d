use grocery_erp_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::orders::{
        CancelOrderRequest, CreateOrderRequest, CustomerSnapshot, OrderLineRequest,
        RefundOrderRequest, UpdateOrderStatusRequest,
    },
    entity::inventory_transactions::{
        Column as TxCol, Entity as InventoryTransactions,
    },
    entity::products::ActiveModel as ProductActive,
    error::AppError,
    models::{OrderStatus, PaymentStatus},
    routes::params::{SalesSummaryQuery, TopSellingQuery},
    services::{order_service, product_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, Statement};
use std::sync::Mutex;
use uuid::Uuid;

// Tests in this binary truncate the same tables, so they take turns.
static DB_LOCK: Mutex<()> = Mutex::new(());

// Order capture: totals from locked snapshots, stock issued per line, ledger
// rows tagged with the order number, then the status lifecycle.
#[tokio::test]
async fn order_capture_and_lifecycle() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let apples = create_product(&state, "FRU-TEST0001", "Apple Fuji", 299, 10).await?;
    let milk = create_product(&state, "DAI-TEST0002", "Whole Milk 1L", 150, 8).await?;

    let resp = order_service::create_order(
        &state,
        None,
        CreateOrderRequest {
            customer: Some(CustomerSnapshot {
                name: "Asha Patel".into(),
                email: Some("asha@example.com".into()),
                phone: None,
                address: None,
            }),
            items: vec![
                OrderLineRequest {
                    product_id: apples.id,
                    quantity: 3,
                },
                OrderLineRequest {
                    product_id: milk.id,
                    quantity: 2,
                },
            ],
            payment_method: None,
            payment_status: None,
            tax: None,
            discount: None,
            notes: None,
        },
    )
    .await?;

    let data = resp.data.expect("order data");
    let order = data.order;
    assert_eq!(order.subtotal, 3 * 299 + 2 * 150);
    assert_eq!(order.total, 1197);
    assert_eq!(order.status, "pending");
    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(data.items.len(), 2);

    // Stock was issued per line.
    let apples_now = product_service::get_product(&state, apples.id).await?;
    assert_eq!(apples_now.data.expect("product").stock, 7);
    let milk_now = product_service::get_product(&state, milk.id).await?;
    assert_eq!(milk_now.data.expect("product").stock, 6);

    // Ledger rows carry the final order number.
    let tagged = InventoryTransactions::find()
        .filter(TxCol::OrderNumber.eq(order.order_number.clone()))
        .all(&state.orm)
        .await?;
    assert_eq!(tagged.len(), 2);
    assert!(tagged.iter().all(|t| t.transaction_type == "issue"));

    // pending -> confirmed -> processing is allowed.
    let confirmed = order_service::update_order_status(
        &state,
        None,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Confirmed,
            reason: None,
        },
    )
    .await?;
    assert_eq!(confirmed.data.expect("order").status, "confirmed");

    // Skipping ahead is not.
    let err = order_service::update_order_status(
        &state,
        None,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
            reason: None,
        },
    )
    .await
    .expect_err("confirmed -> delivered should be rejected");
    assert!(matches!(err, AppError::BadRequest(_)));

    // Cancel needs a reason.
    let err = order_service::update_order_status(
        &state,
        None,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
            reason: None,
        },
    )
    .await
    .expect_err("cancel without reason should fail");
    assert!(matches!(err, AppError::BadRequest(_)));

    let cancelled = order_service::cancel_order(
        &state,
        None,
        order.id,
        CancelOrderRequest {
            reason: "customer changed their mind".into(),
        },
    )
    .await?;
    let cancelled = cancelled.data.expect("order");
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(
        cancelled.cancellation_reason.as_deref(),
        Some("customer changed their mind")
    );

    let err = order_service::update_order_status(
        &state,
        None,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Confirmed,
            reason: None,
        },
    )
    .await
    .expect_err("cancelled is terminal");
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

// A failing line rolls the whole order back: no order row, no ledger rows,
// stock untouched on lines that had already been issued.
#[tokio::test]
async fn failed_line_rolls_back_everything() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let bread = create_product(&state, "BAK-TEST0003", "Sourdough Loaf", 450, 5).await?;
    let juice = create_product(&state, "BEV-TEST0004", "Orange Juice 1L", 350, 0).await?;

    let err = order_service::create_order(
        &state,
        None,
        CreateOrderRequest {
            customer: None,
            items: vec![
                OrderLineRequest {
                    product_id: bread.id,
                    quantity: 2,
                },
                OrderLineRequest {
                    product_id: juice.id,
                    quantity: 1,
                },
            ],
            payment_method: None,
            payment_status: None,
            tax: None,
            discount: None,
            notes: None,
        },
    )
    .await
    .expect_err("second line is out of stock");
    assert!(matches!(err, AppError::InsufficientStock(_)));

    // First line's issue was rolled back with the rest.
    let bread_now = product_service::get_product(&state, bread.id).await?;
    assert_eq!(bread_now.data.expect("product").stock, 5);

    let leftover = InventoryTransactions::find()
        .filter(TxCol::ProductId.eq(bread.id))
        .all(&state.orm)
        .await?;
    assert!(leftover.is_empty(), "no ledger rows should survive the rollback");

    Ok(())
}

#[tokio::test]
async fn empty_order_is_rejected() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let err = order_service::create_order(
        &state,
        None,
        CreateOrderRequest {
            customer: None,
            items: vec![],
            payment_method: None,
            payment_status: None,
            tax: None,
            discount: None,
            notes: None,
        },
    )
    .await
    .expect_err("empty orders are invalid");
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

// Snapshot emails are normalized at write time, so lookups find the order
// no matter how the email was cased at capture.
#[tokio::test]
async fn mixed_case_snapshot_email_is_still_findable() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let apples = create_product(&state, "FRU-TEST0010", "Apple Gala", 199, 10).await?;

    let resp = order_service::create_order(
        &state,
        None,
        CreateOrderRequest {
            customer: Some(CustomerSnapshot {
                name: "Farah Khan".into(),
                email: Some("Farah.Khan@Example.COM".into()),
                phone: None,
                address: None,
            }),
            items: vec![OrderLineRequest {
                product_id: apples.id,
                quantity: 1,
            }],
            payment_method: None,
            payment_status: None,
            tax: None,
            discount: None,
            notes: None,
        },
    )
    .await?;

    let order = resp.data.expect("order data").order;
    assert_eq!(
        order.customer_email.as_deref(),
        Some("farah.khan@example.com")
    );

    // Lookup casing does not matter either.
    let found = order_service::customer_orders(&state, "FARAH.KHAN@example.com").await?;
    assert_eq!(found.data.expect("orders").items.len(), 1);

    Ok(())
}

#[tokio::test]
async fn refund_marks_payment_and_bounds_the_amount() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let milk = create_product(&state, "DAI-TEST0011", "Whole Milk 1L", 500, 10).await?;

    let resp = order_service::create_order(
        &state,
        None,
        CreateOrderRequest {
            customer: None,
            items: vec![OrderLineRequest {
                product_id: milk.id,
                quantity: 2,
            }],
            payment_method: None,
            payment_status: Some(PaymentStatus::Paid),
            tax: None,
            discount: None,
            notes: None,
        },
    )
    .await?;
    let order = resp.data.expect("order data").order;
    assert_eq!(order.payment_status, "paid");

    // Amount exceeding the total is rejected before anything changes.
    let err = order_service::refund_order(
        &state,
        None,
        order.id,
        RefundOrderRequest {
            amount: Some(order.total + 1),
            reason: "spoiled on arrival".into(),
        },
    )
    .await
    .expect_err("amount above the total should be rejected");
    assert!(matches!(err, AppError::BadRequest(_)));

    // Without an amount the whole total is refunded.
    let refunded = order_service::refund_order(
        &state,
        None,
        order.id,
        RefundOrderRequest {
            amount: None,
            reason: "spoiled on arrival".into(),
        },
    )
    .await?;
    let refunded = refunded.data.expect("order");
    assert_eq!(refunded.payment_status, "refunded");
    assert_eq!(refunded.refund_amount, Some(1000));
    assert_eq!(refunded.refund_reason.as_deref(), Some("spoiled on arrival"));

    // Refunding twice is a conflict.
    let err = order_service::refund_order(
        &state,
        None,
        order.id,
        RefundOrderRequest {
            amount: None,
            reason: "asked again".into(),
        },
    )
    .await
    .expect_err("already refunded");
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

// The summary only counts paid orders that were not cancelled or returned;
// top sellers rank by quantity across all captured lines.
#[tokio::test]
async fn sales_summary_and_top_selling() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let apples = create_product(&state, "FRU-TEST0012", "Apple Fuji", 299, 20).await?;
    let milk = create_product(&state, "DAI-TEST0013", "Whole Milk 1L", 150, 20).await?;

    let paid = order_service::create_order(
        &state,
        None,
        CreateOrderRequest {
            customer: None,
            items: vec![
                OrderLineRequest {
                    product_id: apples.id,
                    quantity: 3,
                },
                OrderLineRequest {
                    product_id: milk.id,
                    quantity: 2,
                },
            ],
            payment_method: None,
            payment_status: Some(PaymentStatus::Paid),
            tax: None,
            discount: None,
            notes: None,
        },
    )
    .await?;
    assert_eq!(paid.data.expect("order data").order.total, 1197);

    // Payment still pending: not revenue yet.
    order_service::create_order(
        &state,
        None,
        CreateOrderRequest {
            customer: None,
            items: vec![OrderLineRequest {
                product_id: apples.id,
                quantity: 2,
            }],
            payment_method: None,
            payment_status: None,
            tax: None,
            discount: None,
            notes: None,
        },
    )
    .await?;

    // Paid but cancelled: dropped from the summary too.
    let cancelled = order_service::create_order(
        &state,
        None,
        CreateOrderRequest {
            customer: None,
            items: vec![OrderLineRequest {
                product_id: milk.id,
                quantity: 2,
            }],
            payment_method: None,
            payment_status: Some(PaymentStatus::Paid),
            tax: None,
            discount: None,
            notes: None,
        },
    )
    .await?;
    order_service::cancel_order(
        &state,
        None,
        cancelled.data.expect("order data").order.id,
        CancelOrderRequest {
            reason: "duplicate entry".into(),
        },
    )
    .await?;

    let summary = order_service::sales_summary(&state, SalesSummaryQuery { from: None, to: None })
        .await?
        .data
        .expect("summary");
    assert_eq!(summary.total_orders, 1);
    assert_eq!(summary.total_revenue, 1197);
    assert_eq!(summary.total_items, 5);
    assert_eq!(summary.average_order_value, 1197);

    let top = order_service::top_selling(&state, TopSellingQuery { limit: None })
        .await?
        .data
        .expect("top selling");
    assert_eq!(top.items.len(), 2);
    // Apples sold 5 across all orders, milk 4.
    assert_eq!(top.items[0].product_id, apples.id);
    assert_eq!(top.items[0].total_quantity, 5);
    assert_eq!(top.items[0].total_revenue, 5 * 299);
    assert_eq!(top.items[1].product_id, milk.id);
    assert_eq!(top.items[1].total_quantity, 4);

    Ok(())
}

// Two transitions race on the same order; the row lock serializes them so
// exactly one wins and the loser sees the terminal state.
#[tokio::test]
async fn concurrent_status_updates_serialize() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let bread = create_product(&state, "BAK-TEST0014", "Sourdough Loaf", 450, 5).await?;

    let resp = order_service::create_order(
        &state,
        None,
        CreateOrderRequest {
            customer: None,
            items: vec![OrderLineRequest {
                product_id: bread.id,
                quantity: 1,
            }],
            payment_method: None,
            payment_status: None,
            tax: None,
            discount: None,
            notes: None,
        },
    )
    .await?;
    let order_id = resp.data.expect("order data").order.id;

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ] {
        order_service::update_order_status(
            &state,
            None,
            order_id,
            UpdateOrderStatusRequest {
                status,
                reason: None,
            },
        )
        .await?;
    }

    // Both transitions are valid from shipped, but they exclude each other.
    let deliver = order_service::update_order_status(
        &state,
        None,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
            reason: None,
        },
    );
    let send_back = order_service::update_order_status(
        &state,
        None,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Returned,
            reason: None,
        },
    );
    let (a, b) = tokio::join!(deliver, send_back);
    assert_eq!(
        a.is_ok() as u8 + b.is_ok() as u8,
        1,
        "exactly one transition should win the race"
    );

    let order = order_service::get_order(&state, order_id)
        .await?
        .data
        .expect("order")
        .order;
    assert!(order.status == "delivered" || order.status == "returned");

    Ok(())
}

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, inventory_transactions, audit_logs, products, customers, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(Some(AppState { pool, orm }))
}

async fn create_product(
    state: &AppState,
    sku: &str,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<grocery_erp_api::entity::products::Model> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        sku: Set(sku.to_string()),
        name: Set(name.to_string()),
        description: NotSet,
        category: Set("Fruits".into()),
        price: Set(price),
        cost_price: NotSet,
        stock: Set(stock),
        min_stock: Set(5),
        uom: Set("piece".into()),
        barcode: NotSet,
        status: Set("active".into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product)
}
