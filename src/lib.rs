//! EZMarket Orders
//!
//! Order lifecycle and activity audit service for the EZMarket storefront.
//!
//! ## Features
//! - Order status and payment status transitions with terminal-state locking
//! - Append-only activity log, one entry per mutating admin action
//! - Admin notes as a last-writer-wins overlay on the activity log
//! - Shipping info updates with partial payloads
//! - Pluggable storage (Postgres, in-memory for tests)

use thiserror::Error;

pub mod domain;
pub mod service;
pub mod store;

pub use domain::activity::{ActivityKind, ActivityLogEntry, AdminIdentity, Note};
pub use domain::order::{NewOrder, Order, ShippingInfo, ShippingUpdate};
pub use domain::status::{OrderStatus, PaymentStatus, StatusMeta};
pub use domain::value_objects::Money;
pub use service::OrderService;
pub use store::{MemoryStore, OrderStore, PgStore};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum OrdersError {
    #[error("Order not found")]
    OrderNotFound,

    #[error("Note not found")]
    NoteNotFound,

    #[error("Order is {0} and its status can no longer change")]
    InvalidTransition(OrderStatus),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, OrdersError>;

impl From<domain::value_objects::MoneyError> for OrdersError {
    fn from(e: domain::value_objects::MoneyError) -> Self {
        OrdersError::Validation(vec![e.to_string()])
    }
}

