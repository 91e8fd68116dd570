//! Document number allocation, including concurrent creates.

mod common;

use std::collections::HashSet;

use common::{contact, number, quotation_input, remove_db_files, setup, temp_db_path};
use meridian_core::document::{NewQuotation, NewSalesOrder};
use meridian_db::{Database, DbConfig, DbError, RequestContext};

#[tokio::test]
async fn test_sequences_are_per_document_type() {
    let (db, ctx) = setup().await;
    let contact_id = contact(&db, "Acme Logistics").await;

    let q1 = db.quotations().create(&ctx, &quotation_input(contact_id, vec![])).await.unwrap();
    let q2 = db.quotations().create(&ctx, &quotation_input(contact_id, vec![])).await.unwrap();
    let so = db
        .sales_orders()
        .create(&ctx, &NewSalesOrder { contact_id, ..Default::default() })
        .await
        .unwrap();

    assert_eq!(q1.document_no, number("QT", 1));
    assert_eq!(q2.document_no, number("QT", 2));
    assert_eq!(so.document_no, number("SO", 1));
}

#[tokio::test]
async fn test_supplied_duplicate_number_is_rejected() {
    let (db, ctx) = setup().await;
    let contact_id = contact(&db, "Acme Logistics").await;
    let input = NewQuotation {
        document_no: Some("QT-CUSTOM-1".to_string()),
        ..quotation_input(contact_id, vec![])
    };

    let first = db.quotations().create(&ctx, &input).await.unwrap();
    assert_eq!(first.document_no, "QT-CUSTOM-1");

    let err = db.quotations().create(&ctx, &input).await.unwrap_err();
    match err {
        DbError::UniqueViolation { field, value } => {
            assert_eq!(field, "document_no");
            assert_eq!(value, "QT-CUSTOM-1");
        }
        other => panic!("expected UniqueViolation, got {other:?}"),
    }
    assert_eq!(db.quotations().count(&ctx).await.unwrap(), 1);
}

#[tokio::test]
async fn test_generated_number_skips_a_taken_one() {
    let (db, ctx) = setup().await;
    let contact_id = contact(&db, "Acme Logistics").await;

    // occupy the number the sequence will hand out first
    let manual = NewQuotation {
        document_no: Some(number("QT", 1)),
        ..quotation_input(contact_id, vec![])
    };
    db.quotations().create(&ctx, &manual).await.unwrap();

    let generated = db
        .quotations()
        .create(&ctx, &quotation_input(contact_id, vec![]))
        .await
        .unwrap();
    assert_eq!(generated.document_no, number("QT", 2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_unique_numbers() {
    let path = temp_db_path();
    let db = Database::new(DbConfig::new(&path).max_connections(4)).await.unwrap();
    let contact_id = contact(&db, "Acme Logistics").await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::background();
            db.quotations()
                .create(&ctx, &quotation_input(contact_id, vec![]))
                .await
                .map(|q| q.document_no)
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        let document_no = handle.await.unwrap().unwrap();
        assert!(numbers.insert(document_no), "duplicate document number");
    }
    assert_eq!(numbers.len(), 16);
    assert!(numbers.contains(&number("QT", 1)));
    assert!(numbers.contains(&number("QT", 16)));

    db.close().await;
    remove_db_files(&path);
}
