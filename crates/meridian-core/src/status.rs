//! # Status State Machines
//!
//! One closed enum per document type, each with its own transition table.
//!
//! ## Transition Tables
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Quotation      draft → sent → { accepted, rejected, expired*,        │
//! │                                  cancelled }                            │
//! │                                                                         │
//! │  SalesOrder     draft → confirmed → processing → completed             │
//! │                   └──────────┴────────────┴──→ cancelled               │
//! │                                                                         │
//! │  PurchaseOrder  draft → sent → confirmed → received                    │
//! │                   └───────┴────────┴──→ cancelled                      │
//! │                                                                         │
//! │  Delivery       pending → shipped → delivered                          │
//! │                             └───────────┴──→ returned                  │
//! │                                                                         │
//! │  Invoice        draft → sent → { partial*, paid*, overdue, cancelled } │
//! │                 partial → { paid*, overdue }                            │
//! │                 overdue → { partial*, paid*, cancelled }                │
//! │                                                                         │
//! │  * computed by the engine, never accepted from callers                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A request outside the table fails with
//! [`CoreError::InvalidStatusTransition`]; nothing is clamped or ignored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::DocumentKind;

/// Behaviour shared by every document status enum.
pub trait DocumentStatus: Copy + Eq + fmt::Display + 'static {
    /// Document type this status belongs to (used in error messages).
    const KIND: DocumentKind;

    /// Status a freshly created document starts in.
    const INITIAL: Self;

    /// Statuses reachable from `self` in one step.
    fn allowed_transitions(&self) -> &'static [Self];

    /// Whether a caller may request this status directly. Computed statuses
    /// (invoice partial/paid, quotation expired) return `false`.
    fn is_caller_settable(&self) -> bool {
        true
    }

    fn can_transition_to(&self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// No outgoing transitions.
    fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Validates a caller-requested status change.
///
/// Requesting the current status is a no-op and succeeds.
pub fn transition<S: DocumentStatus>(current: S, requested: S) -> CoreResult<S> {
    if current == requested {
        return Ok(current);
    }
    if !requested.is_caller_settable() || !current.can_transition_to(requested) {
        return Err(CoreError::invalid_transition(S::KIND, current, requested));
    }
    Ok(requested)
}

/// Generates `as_str`, `Display` and `FromStr` for a status enum.
macro_rules! status_strings {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(ValidationError::InvalidFormat {
                        field: "status".to_string(),
                        reason: format!("unknown {} status '{}'", stringify!($ty), other),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Quotation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    #[default]
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

status_strings!(QuotationStatus {
    Draft => "draft",
    Sent => "sent",
    Accepted => "accepted",
    Rejected => "rejected",
    Expired => "expired",
    Cancelled => "cancelled",
});

impl QuotationStatus {
    /// Only accepted quotations may become sales orders.
    pub const fn is_convertible(&self) -> bool {
        matches!(self, QuotationStatus::Accepted)
    }
}

impl DocumentStatus for QuotationStatus {
    const KIND: DocumentKind = DocumentKind::Quotation;
    const INITIAL: Self = QuotationStatus::Draft;

    fn allowed_transitions(&self) -> &'static [Self] {
        use QuotationStatus::*;
        match self {
            Draft => &[Sent],
            Sent => &[Accepted, Rejected, Expired, Cancelled],
            Accepted | Rejected | Expired | Cancelled => &[],
        }
    }

    fn is_caller_settable(&self) -> bool {
        !matches!(self, QuotationStatus::Expired)
    }
}

// =============================================================================
// Sales Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    #[default]
    Draft,
    Confirmed,
    Processing,
    Completed,
    Cancelled,
}

status_strings!(SalesOrderStatus {
    Draft => "draft",
    Confirmed => "confirmed",
    Processing => "processing",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl DocumentStatus for SalesOrderStatus {
    const KIND: DocumentKind = DocumentKind::SalesOrder;
    const INITIAL: Self = SalesOrderStatus::Draft;

    fn allowed_transitions(&self) -> &'static [Self] {
        use SalesOrderStatus::*;
        match self {
            Draft => &[Confirmed, Cancelled],
            Confirmed => &[Processing, Cancelled],
            Processing => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }
}

// =============================================================================
// Purchase Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    #[default]
    Draft,
    Sent,
    Confirmed,
    Received,
    Cancelled,
}

status_strings!(PurchaseOrderStatus {
    Draft => "draft",
    Sent => "sent",
    Confirmed => "confirmed",
    Received => "received",
    Cancelled => "cancelled",
});

impl DocumentStatus for PurchaseOrderStatus {
    const KIND: DocumentKind = DocumentKind::PurchaseOrder;
    const INITIAL: Self = PurchaseOrderStatus::Draft;

    fn allowed_transitions(&self) -> &'static [Self] {
        use PurchaseOrderStatus::*;
        match self {
            Draft => &[Sent, Cancelled],
            Sent => &[Confirmed, Cancelled],
            Confirmed => &[Received, Cancelled],
            Received | Cancelled => &[],
        }
    }
}

// =============================================================================
// Delivery
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Shipped,
    Delivered,
    Returned,
}

status_strings!(DeliveryStatus {
    Pending => "pending",
    Shipped => "shipped",
    Delivered => "delivered",
    Returned => "returned",
});

impl DocumentStatus for DeliveryStatus {
    const KIND: DocumentKind = DocumentKind::Delivery;
    const INITIAL: Self = DeliveryStatus::Pending;

    fn allowed_transitions(&self) -> &'static [Self] {
        use DeliveryStatus::*;
        match self {
            Pending => &[Shipped],
            Shipped => &[Delivered, Returned],
            Delivered => &[Returned],
            Returned => &[],
        }
    }
}

// =============================================================================
// Invoice
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

status_strings!(InvoiceStatus {
    Draft => "draft",
    Sent => "sent",
    Partial => "partial",
    Paid => "paid",
    Overdue => "overdue",
    Cancelled => "cancelled",
});

impl InvoiceStatus {
    /// Status implied by the amount paid so far.
    ///
    /// - `paid` once `amount_paid >= grand_total` (and something was paid)
    /// - `partial` while `0 < amount_paid < grand_total`
    /// - back to `sent` when a reversal empties a partial/paid invoice
    /// - otherwise unchanged
    ///
    /// Payment-driven statuses bypass the caller transition table.
    pub fn derive_from_payments(current: InvoiceStatus, amount_paid: Money, grand_total: Money) -> Self {
        if current == InvoiceStatus::Cancelled {
            return current;
        }
        if amount_paid.is_positive() && amount_paid >= grand_total {
            InvoiceStatus::Paid
        } else if amount_paid.is_positive() {
            InvoiceStatus::Partial
        } else if matches!(current, InvoiceStatus::Partial | InvoiceStatus::Paid) {
            InvoiceStatus::Sent
        } else {
            current
        }
    }

    /// Status of an invoice after an edit that may change its grand total.
    ///
    /// `requested` has already passed the transition table. Payments still
    /// decide `partial` and `paid`; an explicit `overdue` outranks `partial`.
    pub fn after_edit(requested: InvoiceStatus, amount_paid: Money, grand_total: Money) -> Self {
        match InvoiceStatus::derive_from_payments(requested, amount_paid, grand_total) {
            InvoiceStatus::Partial if requested == InvoiceStatus::Overdue => InvoiceStatus::Overdue,
            derived => derived,
        }
    }

    /// Whether payments may be recorded against an invoice in this status.
    pub const fn accepts_payments(&self) -> bool {
        !matches!(self, InvoiceStatus::Cancelled)
    }
}

impl DocumentStatus for InvoiceStatus {
    const KIND: DocumentKind = DocumentKind::Invoice;
    const INITIAL: Self = InvoiceStatus::Draft;

    fn allowed_transitions(&self) -> &'static [Self] {
        use InvoiceStatus::*;
        match self {
            Draft => &[Sent],
            Sent => &[Partial, Paid, Overdue, Cancelled],
            Partial => &[Paid, Overdue],
            Overdue => &[Partial, Paid, Cancelled],
            Paid | Cancelled => &[],
        }
    }

    fn is_caller_settable(&self) -> bool {
        !matches!(self, InvoiceStatus::Partial | InvoiceStatus::Paid)
    }
}
