//! Payment application, reversal and invoice reconciliation.

mod common;

use chrono::Utc;

use common::{contact, number, product, setup};
use meridian_core::document::{Invoice, NewInvoice};
use meridian_core::money::Money;
use meridian_core::status::InvoiceStatus;
use meridian_core::types::{NewLineItem, NewPayment, PaymentMethod};
use meridian_core::{CoreError, ValidationError};
use meridian_db::{Database, DbError, RequestContext};

/// A sent invoice for exactly 200.00 (no tax).
async fn sent_invoice(db: &Database, ctx: &RequestContext) -> Invoice {
    let contact_id = contact(db, "Northwind Traders").await;
    let service = product(db, "SRV-1", 20_000).await;
    let invoice = db
        .invoices()
        .create(
            ctx,
            &NewInvoice {
                contact_id,
                items: vec![NewLineItem::new(service.id, 1, Money::from_cents(20_000))],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(invoice.grand_total, Money::from_cents(20_000));
    db.invoices()
        .update_status(ctx, invoice.id, InvoiceStatus::Sent)
        .await
        .unwrap()
}

fn payment(invoice_id: i64, cents: i64) -> NewPayment {
    NewPayment {
        invoice_id,
        amount: Money::from_cents(cents),
        payment_date: Utc::now().date_naive(),
        method: PaymentMethod::BankTransfer,
        reference: Some("TRX-1".to_string()),
        notes: None,
    }
}

#[tokio::test]
async fn test_two_halves_pay_the_invoice() {
    let (db, ctx) = setup().await;
    let invoice = sent_invoice(&db, &ctx).await;

    let (first, after_first) = db
        .payments()
        .apply_payment(&ctx, &payment(invoice.id, 10_000))
        .await
        .unwrap();
    assert_eq!(first.payment_no, number("PAY", 1));
    assert_eq!(after_first.amount_paid, Money::from_cents(10_000));
    assert_eq!(after_first.status, InvoiceStatus::Partial);
    assert_eq!(after_first.balance_due(), Money::from_cents(10_000));

    let (second, after_second) = db
        .payments()
        .apply_payment(&ctx, &payment(invoice.id, 10_000))
        .await
        .unwrap();
    assert_eq!(second.payment_no, number("PAY", 2));
    assert_eq!(after_second.amount_paid, Money::from_cents(20_000));
    assert_eq!(after_second.status, InvoiceStatus::Paid);

    // returned invoice matches what is stored
    assert_eq!(after_second, db.invoices().get_by_id(&ctx, invoice.id).await.unwrap());

    let listed = db.payments().list_for_invoice(&ctx, invoice.id).await.unwrap();
    assert_eq!(listed, vec![first, second]);
}

#[tokio::test]
async fn test_overpayment_marks_paid() {
    let (db, ctx) = setup().await;
    let invoice = sent_invoice(&db, &ctx).await;

    let (_, after) = db
        .payments()
        .apply_payment(&ctx, &payment(invoice.id, 25_000))
        .await
        .unwrap();

    assert_eq!(after.status, InvoiceStatus::Paid);
    assert_eq!(after.amount_paid, Money::from_cents(25_000));
    assert_eq!(after.balance_due(), Money::zero());
}

#[tokio::test]
async fn test_deleting_payments_reverts_status() {
    let (db, ctx) = setup().await;
    let invoice = sent_invoice(&db, &ctx).await;
    let payments = db.payments();

    let (first, _) = payments.apply_payment(&ctx, &payment(invoice.id, 10_000)).await.unwrap();
    let (second, _) = payments.apply_payment(&ctx, &payment(invoice.id, 10_000)).await.unwrap();

    let after = payments.delete_payment(&ctx, second.id).await.unwrap();
    assert_eq!(after.status, InvoiceStatus::Partial);
    assert_eq!(after.amount_paid, Money::from_cents(10_000));

    let after = payments.delete_payment(&ctx, first.id).await.unwrap();
    assert_eq!(after.status, InvoiceStatus::Sent);
    assert_eq!(after.amount_paid, Money::zero());

    let err = payments.get_by_id(&ctx, first.id).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}

#[tokio::test]
async fn test_delete_missing_payment_is_not_found() {
    let (db, ctx) = setup().await;

    let err = db.payments().delete_payment(&ctx, 9).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}

#[tokio::test]
async fn test_cancelled_invoice_rejects_payments() {
    let (db, ctx) = setup().await;
    let invoice = sent_invoice(&db, &ctx).await;
    db.invoices()
        .update_status(&ctx, invoice.id, InvoiceStatus::Cancelled)
        .await
        .unwrap();

    let err = db
        .payments()
        .apply_payment(&ctx, &payment(invoice.id, 10_000))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Core(CoreError::InvalidStatusTransition { .. })));
    assert!(db.payments().list_for_invoice(&ctx, invoice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_on_missing_invoice_is_not_found() {
    let (db, ctx) = setup().await;

    let err = db
        .payments()
        .apply_payment(&ctx, &payment(12, 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let (db, ctx) = setup().await;
    let invoice = sent_invoice(&db, &ctx).await;

    for cents in [0, -500] {
        let err = db
            .payments()
            .apply_payment(&ctx, &payment(invoice.id, cents))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
    }
    let unchanged = db.invoices().get_by_id(&ctx, invoice.id).await.unwrap();
    assert_eq!(unchanged.amount_paid, Money::zero());
}

#[tokio::test]
async fn test_invoice_with_payments_cannot_be_deleted() {
    let (db, ctx) = setup().await;
    let invoice = sent_invoice(&db, &ctx).await;
    db.payments()
        .apply_payment(&ctx, &payment(invoice.id, 5_000))
        .await
        .unwrap();

    let err = db.invoices().delete(&ctx, invoice.id).await.unwrap_err();
    assert_eq!(err.to_string(), format!("Invoice {} cannot be deleted: 1 linked payment", invoice.id));
}

#[tokio::test]
async fn test_invoice_edit_rederives_payment_status() {
    let (db, ctx) = setup().await;
    let invoice = sent_invoice(&db, &ctx).await;
    let (_, partial) = db
        .payments()
        .apply_payment(&ctx, &payment(invoice.id, 10_000))
        .await
        .unwrap();
    assert_eq!(partial.status, InvoiceStatus::Partial);

    let half = product(&db, "SRV-2", 10_000).await;
    let shrunk = NewInvoice {
        contact_id: invoice.contact_id,
        // echoing the current status back must not pin it
        status: Some(InvoiceStatus::Partial),
        items: vec![NewLineItem::new(half.id, 1, Money::from_cents(10_000))],
        ..Default::default()
    };
    let updated = db.invoices().update(&ctx, invoice.id, &shrunk).await.unwrap();
    assert_eq!(updated.grand_total, Money::from_cents(10_000));
    assert_eq!(updated.amount_paid, Money::from_cents(10_000));
    assert_eq!(updated.status, InvoiceStatus::Paid);

    let grown = NewInvoice {
        status: None,
        items: vec![NewLineItem::new(half.id, 3, Money::from_cents(10_000))],
        ..shrunk
    };
    let updated = db.invoices().update(&ctx, invoice.id, &grown).await.unwrap();
    assert_eq!(updated.status, InvoiceStatus::Partial);
    assert_eq!(updated.balance_due(), Money::from_cents(20_000));
}

#[tokio::test]
async fn test_payment_above_amount_cap_is_rejected() {
    let (db, ctx) = setup().await;
    let invoice = sent_invoice(&db, &ctx).await;

    let err = db
        .payments()
        .apply_payment(&ctx, &payment(invoice.id, i64::MAX))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
    ));
    assert!(db.payments().list_for_invoice(&ctx, invoice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_overdue_invoice_still_accepts_payments() {
    let (db, ctx) = setup().await;
    let invoice = sent_invoice(&db, &ctx).await;
    db.invoices()
        .update_status(&ctx, invoice.id, InvoiceStatus::Overdue)
        .await
        .unwrap();

    let (_, after) = db
        .payments()
        .apply_payment(&ctx, &payment(invoice.id, 20_000))
        .await
        .unwrap();
    assert_eq!(after.status, InvoiceStatus::Paid);
}
