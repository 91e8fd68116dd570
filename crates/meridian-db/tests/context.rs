//! Cancelled and expired request contexts.

mod common;

use std::time::Duration;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};

use common::{
    accepted_quotation, contact, quotation_input, reference_items, remove_db_files, setup,
    temp_db_path,
};
use meridian_core::document::NewQuotation;
use meridian_core::pagination::PaginationParams;
use meridian_db::{Database, DbConfig, DbError, RequestContext};

#[tokio::test]
async fn test_cancelled_create_writes_nothing() {
    let (db, ctx) = setup().await;
    let contact_id = contact(&db, "Acme Logistics").await;
    let items = reference_items(&db).await;

    let cancelled = RequestContext::background();
    cancelled.cancel();

    let err = db
        .quotations()
        .create(&cancelled, &quotation_input(contact_id, items))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::ContextCancelled));
    assert_eq!(db.quotations().count(&ctx).await.unwrap(), 0);
}

#[tokio::test]
async fn test_cancelled_conversion_writes_nothing() {
    let (db, ctx) = setup().await;
    let quotation = accepted_quotation(&db, &ctx).await;

    let cancelled = ctx.child(None);
    cancelled.cancel();

    let err = db
        .conversions()
        .convert_quotation_to_sales_order(&cancelled, quotation.id)
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::ContextCancelled));
    assert_eq!(db.sales_orders().count(&ctx).await.unwrap(), 0);
    // cancelling a child leaves the parent usable
    assert!(!ctx.is_cancelled());
}

#[tokio::test]
async fn test_expired_deadline_times_out() {
    let (db, _) = setup().await;

    let expired = RequestContext::with_timeout(Duration::ZERO);
    let err = db
        .quotations()
        .get_all(&expired, PaginationParams::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::ContextTimeout));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deadline_inside_transaction_writes_nothing() {
    let path = temp_db_path();
    let db = Database::new(
        DbConfig::new(&path)
            .max_connections(2)
            .busy_timeout(Duration::from_secs(2)),
    )
    .await
    .unwrap();
    let ctx = RequestContext::background();
    let contact_id = contact(&db, "Acme Logistics").await;

    // another writer holds the database write lock
    let mut holder = SqliteConnectOptions::new().filename(&path).connect().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE").execute(&mut holder).await.unwrap();

    // a fixed number skips allocation, so the first blocked write is the INSERT
    let input = NewQuotation {
        document_no: Some("QT-LOCKED-1".to_string()),
        ..quotation_input(contact_id, vec![])
    };
    let short = RequestContext::with_timeout(Duration::from_millis(200));
    let err = db.quotations().create(&short, &input).await.unwrap_err();
    assert!(matches!(err, DbError::ContextTimeout));

    sqlx::query("ROLLBACK").execute(&mut holder).await.unwrap();
    holder.close().await.unwrap();

    assert_eq!(db.quotations().count(&ctx).await.unwrap(), 0);
    db.close().await;
    remove_db_files(&path);
}
