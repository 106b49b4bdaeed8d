use grocery_erp_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::inventory::CreateTransactionRequest,
    entity::products::ActiveModel as ProductActive,
    error::AppError,
    models::TransactionType,
    routes::params::{Pagination, TransactionListQuery},
    services::{inventory_service, product_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use std::sync::Mutex;
use uuid::Uuid;

// Tests in this binary truncate the same tables, so they take turns.
static DB_LOCK: Mutex<()> = Mutex::new(());

// Ledger flow: receive and issue move the counter, every change leaves an
// entry with before/after snapshots, and an over-issue fails without touching
// the counter.
#[tokio::test]
async fn ledger_and_counter_stay_consistent() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let product = create_product(&state, "GRA-TEST0001", "Test Rice", 1299, 10, 4).await?;

    // Issue 4 of 10.
    let resp = inventory_service::create_transaction(
        &state,
        None,
        CreateTransactionRequest {
            product_id: product.id,
            transaction_type: TransactionType::Issue,
            quantity: 4,
            reference: None,
            reason: Some("shelf restock".into()),
        },
    )
    .await?;
    let data = resp.data.expect("transaction data");
    assert_eq!(data.transaction.previous_stock, 10);
    assert_eq!(data.transaction.new_stock, 6);
    assert_eq!(data.product.stock, 6);

    // Issuing more than on hand must fail and leave the counter alone.
    let err = inventory_service::create_transaction(
        &state,
        None,
        CreateTransactionRequest {
            product_id: product.id,
            transaction_type: TransactionType::Issue,
            quantity: 10,
            reference: None,
            reason: None,
        },
    )
    .await
    .expect_err("over-issue should fail");
    assert!(matches!(err, AppError::InsufficientStock(_)));

    let current = product_service::get_product(&state, product.id).await?;
    assert_eq!(current.data.expect("product").stock, 6);

    // Receive chains off the committed level.
    let resp = inventory_service::create_transaction(
        &state,
        None,
        CreateTransactionRequest {
            product_id: product.id,
            transaction_type: TransactionType::Receive,
            quantity: 5,
            reference: Some("PO-1001".into()),
            reason: None,
        },
    )
    .await?;
    let data = resp.data.expect("transaction data");
    assert_eq!(data.transaction.previous_stock, 6);
    assert_eq!(data.transaction.new_stock, 11);

    // Adjust sets the absolute level.
    let resp = inventory_service::create_transaction(
        &state,
        None,
        CreateTransactionRequest {
            product_id: product.id,
            transaction_type: TransactionType::Adjust,
            quantity: 3,
            reference: None,
            reason: Some("annual count".into()),
        },
    )
    .await?;
    let data = resp.data.expect("transaction data");
    assert_eq!(data.transaction.previous_stock, 11);
    assert_eq!(data.transaction.new_stock, 3);

    // Negative quantities never reach the ledger.
    let err = inventory_service::create_transaction(
        &state,
        None,
        CreateTransactionRequest {
            product_id: product.id,
            transaction_type: TransactionType::Receive,
            quantity: -1,
            reference: None,
            reason: None,
        },
    )
    .await
    .expect_err("negative quantity should fail");
    assert!(matches!(err, AppError::BadRequest(_)));

    // Full history, newest first.
    let history = inventory_service::product_transactions(&state, product.id).await?;
    let items = history.data.expect("history").items;
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].transaction_type, "adjust");
    assert_eq!(items[2].transaction_type, "issue");

    let listed = inventory_service::list_transactions(&state, TransactionListQuery { limit: Some(2) })
        .await?;
    assert_eq!(listed.data.expect("list").items.len(), 2);

    Ok(())
}

#[tokio::test]
async fn low_stock_uses_per_product_threshold() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    // stock == min_stock is low, stock > min_stock is not.
    let low = create_product(&state, "VEG-TEST0002", "Test Tomato", 149, 4, 4).await?;
    let fine = create_product(&state, "VEG-TEST0003", "Test Carrot", 99, 9, 4).await?;
    let out = create_product(&state, "VEG-TEST0004", "Test Okra", 120, 0, 4).await?;

    let resp = product_service::list_low_stock(
        &state,
        Pagination {
            page: Some(1),
            per_page: Some(20),
        },
    )
    .await?;
    let items = resp.data.expect("low stock").items;
    assert!(items.iter().any(|p| p.id == low.id));
    assert!(items.iter().any(|p| p.id == out.id));
    assert!(!items.iter().any(|p| p.id == fine.id));

    let summary = inventory_service::summary(&state).await?;
    let summary = summary.data.expect("summary");
    assert_eq!(summary.total_products, 3);
    assert_eq!(summary.low_stock, 2);
    assert_eq!(summary.out_of_stock, 1);

    // The catalog rollup groups the same three products under one category.
    let stats = product_service::product_stats(&state).await?;
    let stats = stats.data.expect("stats");
    assert_eq!(stats.low_stock, 2);
    assert_eq!(stats.out_of_stock, 1);
    assert_eq!(stats.categories.len(), 1);
    let veg = &stats.categories[0];
    assert_eq!(veg.category, "Vegetables");
    assert_eq!(veg.total_products, 3);
    assert_eq!(veg.total_stock, 13);
    assert_eq!(veg.total_value, 149 * 4 + 99 * 9);
    assert_eq!(veg.average_price, (149 + 99 + 120) / 3);

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
    min_stock: i32,
) -> anyhow::Result<grocery_erp_api::entity::products::Model> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        sku: Set(sku.to_string()),
        name: Set(name.to_string()),
        description: NotSet,
        category: Set("Vegetables".into()),
        price: Set(price),
        cost_price: NotSet,
        stock: Set(stock),
        min_stock: Set(min_stock),
        uom: Set("kg".into()),
        barcode: NotSet,
        status: Set("active".into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product)
}
