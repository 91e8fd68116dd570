//! # Error Types
//!
//! Domain errors raised by meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  meridian-core errors (this file)                                      │
//! │  ├── CoreError        - status, pagination, validation failures        │
//! │  └── ValidationError  - bad caller input                               │
//! │                                                                         │
//! │  meridian-db errors (separate crate)                                   │
//! │  └── DbError          - storage, not-found, context, wraps CoreError   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::DocumentKind;

/// Business rule violations detected without touching storage.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A status change outside the document's transition table, or a
    /// conversion attempted from a status that does not allow it.
    #[error("{document} cannot move from '{from}' to '{to}'")]
    InvalidStatusTransition {
        document: DocumentKind,
        from: String,
        to: String,
    },

    /// Page number below 1 or page size outside the accepted bounds.
    #[error("Invalid pagination: {reason}")]
    InvalidPagination { reason: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn invalid_transition(
        document: DocumentKind,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        CoreError::InvalidStatusTransition {
            document,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn invalid_pagination(reason: impl Into<String>) -> Self {
        CoreError::InvalidPagination {
            reason: reason.into(),
        }
    }
}

/// Input validation failures.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field or reference is missing.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A document that must carry line items has none.
    #[error("{document} {id} has no line items")]
    NoLineItems { document: DocumentKind, id: i64 },

    /// A referenced record (contact, product, parent document) does not exist.
    #[error("{entity} {id} does not exist")]
    UnknownReference { entity: String, id: i64 },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn unknown_reference(entity: impl Into<String>, id: i64) -> Self {
        ValidationError::UnknownReference {
            entity: entity.into(),
            id,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_message_names_both_statuses() {
        let err = CoreError::invalid_transition(DocumentKind::Quotation, "draft", "accepted");
        assert_eq!(
            err.to_string(),
            "Quotation cannot move from 'draft' to 'accepted'"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let err: CoreError = ValidationError::required("contact_id").into();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(err.to_string(), "Validation failed: contact_id is required");
    }

    #[test]
    fn test_no_line_items_message() {
        let err = ValidationError::NoLineItems {
            document: DocumentKind::Quotation,
            id: 4,
        };
        assert_eq!(err.to_string(), "Quotation 4 has no line items");
    }
}
