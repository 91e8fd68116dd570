//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};

use meridian_core::document::{NewQuotation, Quotation};
use meridian_core::money::Money;
use meridian_core::status::QuotationStatus;
use meridian_core::types::{NewContact, NewLineItem, NewProduct, Product, TaxRate};
use meridian_db::{Database, DbConfig, RequestContext};

/// Fresh in-memory database with migrations applied.
pub async fn setup() -> (Database, RequestContext) {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("Failed to create test database");
    (db, RequestContext::background())
}

pub async fn contact(db: &Database, name: &str) -> i64 {
    db.contacts()
        .insert(&NewContact::named(name))
        .await
        .expect("Failed to insert contact")
        .id
}

pub async fn product(db: &Database, code: &str, cents: i64) -> Product {
    let mut product = NewProduct::new(code, format!("Product {}", code), Money::from_cents(cents));
    product.tax_rate = TaxRate::from_percent(18);
    db.products().insert(&product).await.expect("Failed to insert product")
}

/// Two lines that total 240.00 + 43.20 tax:
/// - 2 × 100.00 less 10.00 discount at 18%
/// - 1 × 50.00 at 18%
pub async fn reference_items(db: &Database) -> Vec<NewLineItem> {
    let widget = product(db, "WID-1", 10_000).await;
    let gadget = product(db, "GAD-1", 5_000).await;
    vec![
        NewLineItem::new(widget.id, 2, Money::from_cents(10_000))
            .with_discount(Money::from_cents(1_000))
            .with_tax(TaxRate::from_percent(18)),
        NewLineItem::new(gadget.id, 1, Money::from_cents(5_000)).with_tax(TaxRate::from_percent(18)),
    ]
}

pub fn quotation_input(contact_id: i64, items: Vec<NewLineItem>) -> NewQuotation {
    NewQuotation {
        contact_id,
        terms: Some("Net 30".to_string()),
        notes: Some("Rack install".to_string()),
        items,
        ..Default::default()
    }
}

/// A quotation walked through draft → sent → accepted.
pub async fn accepted_quotation(db: &Database, ctx: &RequestContext) -> Quotation {
    let contact_id = contact(db, "Acme Logistics").await;
    let items = reference_items(db).await;
    let quotation = db
        .quotations()
        .create(ctx, &quotation_input(contact_id, items))
        .await
        .expect("Failed to create quotation");
    db.quotations()
        .update_status(ctx, quotation.id, QuotationStatus::Sent)
        .await
        .expect("Failed to send quotation");
    db.quotations()
        .update_status(ctx, quotation.id, QuotationStatus::Accepted)
        .await
        .expect("Failed to accept quotation")
}

/// `PREFIX-<current year>-<seq>` as the allocator formats it.
pub fn number(prefix: &str, seq: i64) -> String {
    format!("{}-{}-{:05}", prefix, Utc::now().year(), seq)
}

/// A unique database path under the system temp dir.
pub fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("meridian-{}.db", uuid::Uuid::new_v4()))
}

/// Removes a file database together with its WAL side files.
pub fn remove_db_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}
