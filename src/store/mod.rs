//! Storage seam for orders and their activity log.
//!
//! Components never touch a database directly; they get an [`OrderStore`]
//! injected. [`PgStore`] backs the service in production, [`MemoryStore`]
//! backs the tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::activity::ActivityLogEntry;
use crate::domain::order::Order;
use crate::Result;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;

    /// Orders newest-first, plus the total count.
    async fn list_orders(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, i64)>;

    /// Persist a new order together with its `order_created` entry. Both
    /// commit or neither does.
    async fn insert_order(&self, order: &Order, entry: &ActivityLogEntry) -> Result<()>;

    /// Persist a mutated order together with the entry describing the
    /// mutation. Both commit or neither does.
    async fn save_order(&self, order: &Order, entry: &ActivityLogEntry) -> Result<()>;

    /// Append an entry that does not alter the order row (note operations,
    /// customer notifications).
    async fn append_activity(&self, entry: &ActivityLogEntry) -> Result<()>;

    /// Entries for one order, newest first.
    async fn list_activity(&self, order_id: Uuid) -> Result<Vec<ActivityLogEntry>>;
}
