//! # Master Data Lookups
//!
//! Read access to contacts and products, which the surrounding CRUD system
//! owns. The engine reads them to check references and to snapshot product
//! name/code onto line items; `insert` exists for seeding and tests.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use meridian_core::types::{Contact, NewContact, NewProduct, Product};
use meridian_core::validation::validate_text;
use meridian_core::ValidationError;

use crate::error::{DbError, DbResult};

/// Read-only contact access.
#[derive(Debug, Clone)]
pub struct ContactLookup {
    pool: SqlitePool,
}

impl ContactLookup {
    pub fn new(pool: SqlitePool) -> Self {
        ContactLookup { pool }
    }

    /// Gets a contact by id; `NotFound` if absent.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Contact> {
        let mut conn = self.pool.acquire().await?;
        fetch_contact(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Contact", id))
    }

    pub async fn insert(&self, contact: &NewContact) -> DbResult<Contact> {
        let name = contact.name.trim();
        if name.is_empty() {
            return Err(ValidationError::required("name").into());
        }
        validate_text("name", name, 200)?;

        debug!(name = %name, "Inserting contact");

        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (name, email, phone, company, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.company)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(contact)
    }
}

/// Read-only product access.
#[derive(Debug, Clone)]
pub struct ProductLookup {
    pool: SqlitePool,
}

impl ProductLookup {
    pub fn new(pool: SqlitePool) -> Self {
        ProductLookup { pool }
    }

    /// Gets a product by id; `NotFound` if absent.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    pub async fn insert(&self, product: &NewProduct) -> DbResult<Product> {
        if product.code.trim().is_empty() {
            return Err(ValidationError::required("code").into());
        }
        if product.name.trim().is_empty() {
            return Err(ValidationError::required("name").into());
        }
        if product.unit_price.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "unit_price".to_string(),
            }
            .into());
        }

        debug!(code = %product.code, "Inserting product");

        let inserted = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (code, name, description, unit_price, tax_rate, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(product.code.trim())
        .bind(product.name.trim())
        .bind(&product.description)
        .bind(product.unit_price)
        .bind(product.tax_rate)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, product.code.clone()),
            other => other,
        })?;

        Ok(inserted)
    }
}

pub(crate) async fn fetch_contact(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Contact>> {
    let contact = sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(contact)
}

pub(crate) async fn fetch_product(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(product)
}
