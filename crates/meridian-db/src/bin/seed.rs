//! # Seed Data Generator
//!
//! Populates the database with a few contacts, products and complete sales
//! chains for development, then prints one chain as JSON.
//!
//! ## Usage
//! ```bash
//! # Three chains into ./meridian.db (or MERIDIAN_DATABASE_PATH)
//! cargo run -p meridian-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p meridian-db --bin seed -- --count 10 --db ./data/sales.db
//!
//! # More logging
//! RUST_LOG=meridian_db=debug cargo run -p meridian-db --bin seed
//! ```
//!
//! ## Generated Chain
//! Each chain walks the whole lifecycle:
//! - quotation (draft → sent → accepted)
//! - sales order by conversion
//! - purchase order and invoice from the sales order
//! - one delivery
//! - a partial payment on the invoice

use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use meridian_core::document::{NewDelivery, NewQuotation};
use meridian_core::money::Money;
use meridian_core::status::{InvoiceStatus, QuotationStatus};
use meridian_core::types::{
    NewContact, NewLineItem, NewPayment, NewProduct, PaymentMethod, Product, TaxRate,
};
use meridian_db::{Database, EngineConfig};

/// (code, name, unit price in cents, tax %)
const PRODUCTS: &[(&str, &str, i64, u32)] = &[
    ("SRV-INSTALL", "Installation service", 12_500, 18),
    ("HW-ROUTER", "Edge router", 34_900, 18),
    ("HW-SWITCH-24", "24-port switch", 21_000, 18),
    ("LIC-SUPPORT", "Annual support licence", 50_000, 0),
    ("CBL-CAT6-50", "Cat6 cable, 50 m", 4_500, 8),
];

const CONTACTS: &[(&str, &str)] = &[
    ("Acme Logistics", "purchasing@acme.example"),
    ("Northwind Traders", "orders@northwind.example"),
    ("Globex Retail", "ap@globex.example"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("meridian_db=info")),
        )
        .init();

    let mut config = EngineConfig::load()?;
    let mut count: usize = 3;

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Meridian Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of sales chains to generate (default: 3)");
                println!("  -d, --db <PATH>    Database file path (default: MERIDIAN_DATABASE_PATH or ./meridian.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Meridian Seed Data Generator");
    println!("============================");
    println!("Database: {}", config.database_path.display());
    println!("Chains:   {}", count);
    println!();

    let db = Database::new(config.db_config()).await?;
    let ctx = config.request_context();

    let existing = db.quotations().count(&ctx).await?;
    if existing > 0 {
        println!("⚠ Database already has {} quotations", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Master data
    let mut products: Vec<Product> = Vec::with_capacity(PRODUCTS.len());
    for (code, name, cents, tax) in PRODUCTS {
        let mut product = NewProduct::new(*code, *name, Money::from_cents(*cents));
        product.tax_rate = TaxRate::from_percent(*tax);
        products.push(db.products().insert(&product).await?);
    }

    let mut contact_ids = Vec::with_capacity(CONTACTS.len());
    for (name, email) in CONTACTS {
        let mut contact = NewContact::named(*name);
        contact.email = Some(email.to_string());
        contact_ids.push(db.contacts().insert(&contact).await?.id);
    }
    println!("✓ {} products, {} contacts", products.len(), contact_ids.len());

    let today = Utc::now().date_naive();
    let mut last_order = None;
    let start = std::time::Instant::now();

    for n in 0..count {
        let contact_id = contact_ids[n % contact_ids.len()];
        let items: Vec<NewLineItem> = products
            .iter()
            .cycle()
            .skip(n)
            .take(3)
            .enumerate()
            .map(|(k, p)| {
                NewLineItem::new(p.id, (k + 1) as i64, p.unit_price)
                    .with_tax(p.tax_rate)
                    .with_discount(Money::from_cents(if k == 0 { 1_000 } else { 0 }))
            })
            .collect();

        let quotation = db
            .quotations()
            .create(
                &ctx,
                &NewQuotation {
                    contact_id,
                    expiry_date: Some(today + Duration::days(30)),
                    terms: Some("Net 30".to_string()),
                    notes: Some(format!("Seeded chain {}", n + 1)),
                    items,
                    ..Default::default()
                },
            )
            .await?;
        db.quotations().update_status(&ctx, quotation.id, QuotationStatus::Sent).await?;
        db.quotations().update_status(&ctx, quotation.id, QuotationStatus::Accepted).await?;

        let conversions = db.conversions();
        let order = conversions.convert_quotation_to_sales_order(&ctx, quotation.id).await?;
        conversions.create_purchase_order_from_sales_order(&ctx, order.id).await?;

        db.deliveries()
            .create(
                &ctx,
                &NewDelivery {
                    contact_id,
                    sales_order_id: Some(order.id),
                    delivery_date: Some(today + Duration::days(7)),
                    items: order.items.iter().map(NewLineItem::from).collect(),
                    ..Default::default()
                },
            )
            .await?;

        let invoice = conversions
            .create_invoice_from_sales_order(&ctx, order.id, Some(today + Duration::days(30)))
            .await?;
        db.invoices().update_status(&ctx, invoice.id, InvoiceStatus::Sent).await?;
        db.payments()
            .apply_payment(
                &ctx,
                &NewPayment {
                    invoice_id: invoice.id,
                    amount: Money::from_cents(invoice.grand_total.cents() / 2),
                    payment_date: today,
                    method: PaymentMethod::BankTransfer,
                    reference: Some(format!("TRX-{:04}", n + 1)),
                    notes: None,
                },
            )
            .await?;

        println!("  {} → {} ({})", quotation.document_no, order.document_no, order.grand_total);
        last_order = Some(order.id);
    }

    println!();
    println!("✓ Generated {} chains in {:?}", count, start.elapsed());

    if let Some(order_id) = last_order {
        let process = db.reports().for_sales_order(&ctx, order_id).await?;
        println!();
        println!("Last sales process:");
        println!("{}", serde_json::to_string_pretty(&process)?);
    }

    db.close().await;
    Ok(())
}
