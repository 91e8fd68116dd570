//! # Document Numbers
//!
//! Formatting and parsing of `<PREFIX>-<YEAR>-<SEQUENCE>` numbers such as
//! `PO-2025-00042`.
//!
//! Sequence allocation itself lives in meridian-db (it needs the database to
//! be race-safe); this module only owns the format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::DocumentKind;

/// Zero-padded width of the sequence part.
pub const SEQUENCE_WIDTH: usize = 5;

/// A parsed document number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentNumber {
    pub kind: DocumentKind,
    pub year: i32,
    pub sequence: i64,
}

impl DocumentNumber {
    pub fn new(kind: DocumentKind, year: i32, sequence: i64) -> Self {
        DocumentNumber {
            kind,
            year,
            sequence,
        }
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:0width$}",
            self.kind.prefix(),
            self.year,
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

impl FromStr for DocumentNumber {
    type Err = ValidationError;

    /// ```rust
    /// use meridian_core::numbering::DocumentNumber;
    /// use meridian_core::types::DocumentKind;
    ///
    /// let no: DocumentNumber = "PO-2025-00042".parse().unwrap();
    /// assert_eq!(no.kind, DocumentKind::PurchaseOrder);
    /// assert_eq!(no.sequence, 42);
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "document_no".to_string(),
            reason: format!("'{}': {}", s, reason),
        };

        let mut parts = s.trim().splitn(3, '-');
        let (prefix, year, seq) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(y), Some(n)) => (p, y, n),
            _ => return Err(invalid("expected PREFIX-YEAR-SEQUENCE")),
        };

        let kind = DocumentKind::from_prefix(prefix).ok_or_else(|| invalid("unknown prefix"))?;
        if year.len() != 4 {
            return Err(invalid("year must have four digits"));
        }
        let year: i32 = year.parse().map_err(|_| invalid("year is not a number"))?;
        if seq.len() < SEQUENCE_WIDTH || !seq.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("sequence must be at least five digits"));
        }
        let sequence: i64 = seq.parse().map_err(|_| invalid("sequence is not a number"))?;
        if sequence < 1 {
            return Err(invalid("sequence starts at 1"));
        }

        Ok(DocumentNumber::new(kind, year, sequence))
    }
}

/// Formats a number for `kind` without building the struct.
pub fn format_document_no(kind: DocumentKind, year: i32, sequence: i64) -> String {
    DocumentNumber::new(kind, year, sequence).to_string()
}
