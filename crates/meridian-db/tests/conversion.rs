//! Conversions along the quotation → order → purchase order / invoice chain.

mod common;

use chrono::{Duration, Utc};

use common::{accepted_quotation, contact, number, quotation_input, reference_items, setup};
use meridian_core::document::NewSalesOrder;
use meridian_core::money::Money;
use meridian_core::status::{
    InvoiceStatus, PurchaseOrderStatus, QuotationStatus, SalesOrderStatus,
};
use meridian_core::types::{NewPayment, PaymentMethod};
use meridian_core::{CoreError, ValidationError};
use meridian_db::DbError;

// =============================================================================
// Quotation → Sales Order
// =============================================================================

#[tokio::test]
async fn test_draft_quotation_cannot_be_converted() {
    let (db, ctx) = setup().await;
    let contact_id = contact(&db, "Acme Logistics").await;
    let items = reference_items(&db).await;
    let quotation = db
        .quotations()
        .create(&ctx, &quotation_input(contact_id, items))
        .await
        .unwrap();

    let err = db
        .conversions()
        .convert_quotation_to_sales_order(&ctx, quotation.id)
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Core(CoreError::InvalidStatusTransition { .. })));
    assert_eq!(db.sales_orders().count(&ctx).await.unwrap(), 0);
}

#[tokio::test]
async fn test_accepted_quotation_converts_to_confirmed_order() {
    let (db, ctx) = setup().await;
    let quotation = accepted_quotation(&db, &ctx).await;

    let order = db
        .conversions()
        .convert_quotation_to_sales_order(&ctx, quotation.id)
        .await
        .unwrap();

    assert_eq!(order.status, SalesOrderStatus::Confirmed);
    assert_eq!(order.document_no, number("SO", 1));
    assert_eq!(order.quotation_id, Some(quotation.id));
    assert_eq!(order.contact_id, quotation.contact_id);
    assert_eq!(order.payment_terms.as_deref(), Some("Net 30"));
    assert_eq!(order.notes, quotation.notes);
    assert_eq!(order.subtotal, Money::from_cents(24_000));
    assert_eq!(order.tax_total, Money::from_cents(4_320));
    assert_eq!(order.grand_total, Money::from_cents(28_320));

    assert_eq!(order.items.len(), quotation.items.len());
    for (copied, source) in order.items.iter().zip(&quotation.items) {
        assert_eq!(copied.document_id, order.id);
        assert_eq!(copied.product_id, source.product_id);
        assert_eq!(copied.product_name, source.product_name);
        assert_eq!(copied.quantity, source.quantity);
        assert_eq!(copied.unit_price, source.unit_price);
        assert_eq!(copied.discount, source.discount);
        assert_eq!(copied.tax_rate, source.tax_rate);
        assert_eq!(copied.total, source.total);
        assert_eq!(copied.position, source.position);
    }

    // the source is left untouched
    let after = db.quotations().get_by_id(&ctx, quotation.id).await.unwrap();
    assert_eq!(after.status, QuotationStatus::Accepted);
}

#[tokio::test]
async fn test_conversion_copies_stored_line_totals() {
    let (db, ctx) = setup().await;
    let quotation = accepted_quotation(&db, &ctx).await;

    // a stored total that disagrees with the recomputed 224.20
    sqlx::query("UPDATE quotation_items SET total = 20800 WHERE quotation_id = ?1 AND position = 0")
        .bind(quotation.id)
        .execute(db.pool())
        .await
        .unwrap();

    let order = db
        .conversions()
        .convert_quotation_to_sales_order(&ctx, quotation.id)
        .await
        .unwrap();

    assert_eq!(order.items[0].total, Money::from_cents(20_800));
    assert_eq!(order.grand_total, quotation.grand_total);
}

#[tokio::test]
async fn test_empty_quotation_cannot_be_converted() {
    let (db, ctx) = setup().await;
    let contact_id = contact(&db, "Acme Logistics").await;
    let quotation = db
        .quotations()
        .create(&ctx, &quotation_input(contact_id, vec![]))
        .await
        .unwrap();
    db.quotations()
        .update_status(&ctx, quotation.id, QuotationStatus::Sent)
        .await
        .unwrap();
    db.quotations()
        .update_status(&ctx, quotation.id, QuotationStatus::Accepted)
        .await
        .unwrap();

    let err = db
        .conversions()
        .convert_quotation_to_sales_order(&ctx, quotation.id)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::Core(CoreError::Validation(ValidationError::NoLineItems { .. }))
    ));
}

#[tokio::test]
async fn test_missing_quotation_is_not_found() {
    let (db, ctx) = setup().await;

    let err = db
        .conversions()
        .convert_quotation_to_sales_order(&ctx, 404)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}

#[tokio::test]
async fn test_repeat_conversion_is_visible_through_get_by_quotation() {
    let (db, ctx) = setup().await;
    let quotation = accepted_quotation(&db, &ctx).await;
    let conversions = db.conversions();

    let first = conversions.convert_quotation_to_sales_order(&ctx, quotation.id).await.unwrap();
    assert_eq!(
        db.sales_orders().get_by_quotation(&ctx, quotation.id).await.unwrap(),
        vec![first.clone()]
    );

    let second = conversions.convert_quotation_to_sales_order(&ctx, quotation.id).await.unwrap();
    let linked: Vec<i64> = db
        .sales_orders()
        .get_by_quotation(&ctx, quotation.id)
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(linked, vec![second.id, first.id]);

    // the quotation is now protected from deletion
    let err = db.quotations().delete(&ctx, quotation.id).await.unwrap_err();
    assert!(matches!(err, DbError::RelatedRecordsExist { count: 2, .. }));
}

// =============================================================================
// Sales Order → Purchase Order / Invoice
// =============================================================================

#[tokio::test]
async fn test_purchase_order_from_sales_order() {
    let (db, ctx) = setup().await;
    let quotation = accepted_quotation(&db, &ctx).await;
    let order = db
        .conversions()
        .convert_quotation_to_sales_order(&ctx, quotation.id)
        .await
        .unwrap();

    let po = db
        .conversions()
        .create_purchase_order_from_sales_order(&ctx, order.id)
        .await
        .unwrap();

    assert_eq!(po.status, PurchaseOrderStatus::Draft);
    assert_eq!(po.document_no, number("PO", 1));
    assert_eq!(po.sales_order_id, Some(order.id));
    assert_eq!(po.so_no.as_deref(), Some(order.document_no.as_str()));
    assert_eq!(po.payment_terms, order.payment_terms);
    assert_eq!(po.grand_total, order.grand_total);
    assert_eq!(po.items.len(), 2);
}

#[tokio::test]
async fn test_cancelled_sales_order_is_not_converted() {
    let (db, ctx) = setup().await;
    let contact_id = contact(&db, "Acme Logistics").await;
    let items = reference_items(&db).await;
    let order = db
        .sales_orders()
        .create(&ctx, &NewSalesOrder { contact_id, items, ..Default::default() })
        .await
        .unwrap();
    db.sales_orders()
        .update_status(&ctx, order.id, SalesOrderStatus::Cancelled)
        .await
        .unwrap();

    let err = db
        .conversions()
        .create_purchase_order_from_sales_order(&ctx, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Core(CoreError::InvalidStatusTransition { .. })));

    let err = db
        .conversions()
        .create_invoice_from_sales_order(&ctx, order.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Core(CoreError::InvalidStatusTransition { .. })));
}

#[tokio::test]
async fn test_invoice_requires_a_confirmed_order() {
    let (db, ctx) = setup().await;
    let contact_id = contact(&db, "Acme Logistics").await;
    let items = reference_items(&db).await;
    let order = db
        .sales_orders()
        .create(&ctx, &NewSalesOrder { contact_id, items, ..Default::default() })
        .await
        .unwrap();
    let due = Utc::now().date_naive() + Duration::days(30);

    let err = db
        .conversions()
        .create_invoice_from_sales_order(&ctx, order.id, Some(due))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Core(CoreError::InvalidStatusTransition { .. })));

    db.sales_orders()
        .update_status(&ctx, order.id, SalesOrderStatus::Confirmed)
        .await
        .unwrap();
    let invoice = db
        .conversions()
        .create_invoice_from_sales_order(&ctx, order.id, Some(due))
        .await
        .unwrap();

    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.sales_order_id, Some(order.id));
    assert_eq!(invoice.due_date, Some(due));
    assert_eq!(invoice.amount_paid, Money::zero());
    assert_eq!(invoice.grand_total, order.grand_total);
}

// =============================================================================
// Sales Process Report
// =============================================================================

#[tokio::test]
async fn test_sales_process_report() {
    let (db, ctx) = setup().await;
    let quotation = accepted_quotation(&db, &ctx).await;
    let conversions = db.conversions();
    let order = conversions.convert_quotation_to_sales_order(&ctx, quotation.id).await.unwrap();
    let po = conversions.create_purchase_order_from_sales_order(&ctx, order.id).await.unwrap();
    let invoice = conversions
        .create_invoice_from_sales_order(&ctx, order.id, None)
        .await
        .unwrap();
    db.payments()
        .apply_payment(
            &ctx,
            &NewPayment {
                invoice_id: invoice.id,
                amount: Money::from_cents(10_000),
                payment_date: Utc::now().date_naive(),
                method: PaymentMethod::Card,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let process = db.reports().for_sales_order(&ctx, order.id).await.unwrap();

    assert_eq!(process.quotation.as_ref().map(|q| q.id), Some(quotation.id));
    assert_eq!(process.purchase_order.as_ref().map(|p| p.id), Some(po.id));
    assert_eq!(process.invoices.len(), 1);
    assert_eq!(process.total_value, order.grand_total);
    assert_eq!(process.profit, order.subtotal - po.subtotal);
    assert_eq!(process.amount_invoiced, invoice.grand_total);
    assert_eq!(process.amount_paid, Money::from_cents(10_000));

    let all = db.reports().for_contact(&ctx, order.contact_id).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0], process);
}
