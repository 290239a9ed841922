//! In-memory store used by tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::activity::ActivityLogEntry;
use crate::domain::order::Order;
use crate::store::OrderStore;
use crate::{OrdersError, Result};

/// A single mutex over both tables gives note-free atomicity: an order write
/// and its activity append happen in one lock scope, mirroring the Postgres
/// transaction.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<Uuid, Order>,
    activity: Vec<ActivityLogEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("order store lock poisoned")
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn list_orders(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, i64)> {
        let inner = self.lock();
        let mut orders: Vec<Order> = inner.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = orders.len() as i64;
        let start = (page.max(1) - 1) as usize * per_page as usize;
        let orders = orders.into_iter().skip(start).take(per_page as usize).collect();
        Ok((orders, total))
    }

    async fn insert_order(&self, order: &Order, entry: &ActivityLogEntry) -> Result<()> {
        let mut inner = self.lock();
        inner.orders.insert(order.id, order.clone());
        inner.activity.push(entry.clone());
        Ok(())
    }

    async fn save_order(&self, order: &Order, entry: &ActivityLogEntry) -> Result<()> {
        let mut inner = self.lock();
        if !inner.orders.contains_key(&order.id) {
            return Err(OrdersError::OrderNotFound);
        }
        inner.orders.insert(order.id, order.clone());
        inner.activity.push(entry.clone());
        Ok(())
    }

    async fn append_activity(&self, entry: &ActivityLogEntry) -> Result<()> {
        self.lock().activity.push(entry.clone());
        Ok(())
    }

    async fn list_activity(&self, order_id: Uuid) -> Result<Vec<ActivityLogEntry>> {
        let inner = self.lock();
        Ok(inner
            .activity
            .iter()
            .filter(|e| e.order_id == order_id)
            .rev()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::{ActivityKind, AdminIdentity};
    use crate::domain::order::NewOrder;
    use rust_decimal::Decimal;

    fn sample_order() -> Order {
        Order::create(NewOrder {
            customer_id: None,
            customer_email: "musteri@example.com".into(),
            currency: "TRY".into(),
            subtotal: Decimal::new(100, 0),
            shipping_cost: Decimal::ZERO,
            discount: Decimal::ZERO,
        })
        .unwrap()
    }

    fn admin() -> AdminIdentity {
        AdminIdentity { id: "adm_1".into(), name: "Admin".into() }
    }

    #[tokio::test]
    async fn test_save_unknown_order_fails() {
        let store = MemoryStore::new();
        let order = sample_order();
        let entry = ActivityLogEntry::record(
            order.id,
            ActivityKind::OrderCreated { order_number: order.order_number.clone() },
            &admin(),
        );
        assert!(matches!(
            store.save_order(&order, &entry).await,
            Err(OrdersError::OrderNotFound)
        ));
    }

    #[tokio::test]
    async fn test_activity_is_returned_newest_first() {
        let store = MemoryStore::new();
        let order = sample_order();
        let created = ActivityLogEntry::record(
            order.id,
            ActivityKind::OrderCreated { order_number: order.order_number.clone() },
            &admin(),
        );
        store.insert_order(&order, &created).await.unwrap();
        let note = ActivityLogEntry::record(
            order.id,
            ActivityKind::NoteAdded { note_id: Uuid::now_v7(), text: "hi".into() },
            &admin(),
        );
        store.append_activity(&note).await.unwrap();

        let entries = store.list_activity(order.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, note.id);
        assert_eq!(entries[1].id, created.id);
    }
}
