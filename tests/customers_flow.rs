use grocery_erp_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::customers::{CreateCustomerRequest, UpdateCustomerRequest},
    error::AppError,
    models::CustomerStatus,
    services::customer_service,
    state::AppState,
};
use sea_orm::{ConnectionTrait, Statement};
use std::sync::Mutex;

// Tests in this binary truncate the same tables, so they take turns.
static DB_LOCK: Mutex<()> = Mutex::new(());

#[tokio::test]
async fn directory_enforces_unique_contacts() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let created = customer_service::create_customer(
        &state,
        None,
        CreateCustomerRequest {
            name: "Asha Patel".into(),
            email: Some("Asha@Example.com".into()),
            phone: Some("555-0101".into()),
            address: None,
            notes: None,
        },
    )
    .await?;
    let customer = created.data.expect("customer");
    // Emails are normalized on the way in.
    assert_eq!(customer.email.as_deref(), Some("asha@example.com"));
    assert_eq!(customer.total_orders, 0);
    assert_eq!(customer.total_spent, 0);

    // Same email in a different case is a conflict.
    let err = customer_service::create_customer(
        &state,
        None,
        CreateCustomerRequest {
            name: "A. Patel".into(),
            email: Some("ASHA@example.com".into()),
            phone: None,
            address: None,
            notes: None,
        },
    )
    .await
    .expect_err("duplicate email should fail");
    assert!(matches!(err, AppError::Conflict(_)));

    let err = customer_service::create_customer(
        &state,
        None,
        CreateCustomerRequest {
            name: "Someone Else".into(),
            email: None,
            phone: Some("555-0101".into()),
            address: None,
            notes: None,
        },
    )
    .await
    .expect_err("duplicate phone should fail");
    assert!(matches!(err, AppError::Conflict(_)));

    // Updating a customer's own record with its own contact info is allowed.
    let updated = customer_service::update_customer(
        &state,
        None,
        customer.id,
        UpdateCustomerRequest {
            name: None,
            email: Some("asha@example.com".into()),
            phone: None,
            address: Some("12 Market Lane".into()),
            notes: None,
            status: Some(CustomerStatus::Vip),
        },
    )
    .await?;
    let updated = updated.data.expect("customer");
    assert_eq!(updated.status, "vip");
    assert_eq!(updated.address.as_deref(), Some("12 Market Lane"));

    Ok(())
}

#[tokio::test]
async fn search_matches_name_email_and_phone() -> anyhow::Result<()> {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    for (name, email, phone) in [
        ("Ravi Kumar", Some("ravi@example.com"), Some("555-0201")),
        ("Meera Shah", Some("meera@example.com"), Some("555-0202")),
        ("Walk-in Guest", None, None),
    ] {
        customer_service::create_customer(
            &state,
            None,
            CreateCustomerRequest {
                name: name.into(),
                email: email.map(String::from),
                phone: phone.map(String::from),
                address: None,
                notes: None,
            },
        )
        .await?;
    }

    let by_name = customer_service::search_customers(&state, "ravi").await?;
    assert_eq!(by_name.data.expect("results").items.len(), 1);

    let by_phone = customer_service::search_customers(&state, "555-02").await?;
    assert_eq!(by_phone.data.expect("results").items.len(), 2);

    let none = customer_service::search_customers(&state, "nobody").await?;
    assert!(none.data.expect("results").items.is_empty());

    let stats = customer_service::customer_stats(&state).await?;
    let stats = stats.data.expect("stats");
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 3);
    assert_eq!(stats.vip, 0);

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
