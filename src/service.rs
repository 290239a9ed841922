//! Transition controller: the single authorized mutator of order state.
//!
//! Every mutation flows through [`OrderService`], which pairs the state
//! change with exactly one activity entry and persists both atomically. When
//! a NATS client is configured, committed entries are also published on
//! `ezmarket.orders.<action>`; publish failures are logged and never fail the
//! operation.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::activity::{
    rebuild_notes, ActivityKind, ActivityLogEntry, AdminIdentity, Note,
};
use crate::domain::order::{NewOrder, Order, ShippingUpdate};
use crate::domain::status::{OrderStatus, PaymentStatus};
use crate::store::OrderStore;
use crate::{OrdersError, Result};

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    events: Option<async_nats::Client>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store, events: None }
    }

    pub fn with_events(store: Arc<dyn OrderStore>, events: Option<async_nats::Client>) -> Self {
        Self { store, events }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn get_order(&self, id: Uuid) -> Result<Order> {
        self.store.get_order(id).await?.ok_or(OrdersError::OrderNotFound)
    }

    pub async fn list_orders(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, i64)> {
        self.store.list_orders(page, per_page).await
    }

    pub async fn list_activity(&self, order_id: Uuid) -> Result<Vec<ActivityLogEntry>> {
        self.get_order(order_id).await?;
        self.store.list_activity(order_id).await
    }

    /// Current notes, freshly derived from the activity log on every call.
    pub async fn list_notes(&self, order_id: Uuid) -> Result<Vec<Note>> {
        self.get_order(order_id).await?;
        let entries = self.store.list_activity(order_id).await?;
        Ok(rebuild_notes(&entries))
    }

    // -------------------------------------------------------------------------
    // Order mutations
    // -------------------------------------------------------------------------

    pub async fn create_order(
        &self,
        new: NewOrder,
        admin: &AdminIdentity,
    ) -> Result<(Order, ActivityLogEntry)> {
        let order = Order::create(new)?;
        let entry = ActivityLogEntry::record(
            order.id,
            ActivityKind::OrderCreated { order_number: order.order_number.clone() },
            admin,
        );
        self.store.insert_order(&order, &entry).await?;
        tracing::info!(order_number = %order.order_number, "order created");
        self.publish(&entry).await;
        Ok((order, entry))
    }

    pub async fn change_status(
        &self,
        order_id: Uuid,
        to: OrderStatus,
        admin: &AdminIdentity,
    ) -> Result<(Order, ActivityLogEntry)> {
        let mut order = self.get_order(order_id).await?;
        let kind = order.change_status(to)?;
        self.commit(order, kind, admin).await
    }

    pub async fn change_payment_status(
        &self,
        order_id: Uuid,
        to: PaymentStatus,
        admin: &AdminIdentity,
    ) -> Result<(Order, ActivityLogEntry)> {
        let mut order = self.get_order(order_id).await?;
        let kind = order.change_payment_status(to);
        self.commit(order, kind, admin).await
    }

    pub async fn update_shipping(
        &self,
        order_id: Uuid,
        patch: ShippingUpdate,
        admin: &AdminIdentity,
    ) -> Result<(Order, ActivityLogEntry)> {
        let mut order = self.get_order(order_id).await?;
        let kind = order.update_shipping(patch);
        self.commit(order, kind, admin).await
    }

    /// Records that the customer was notified (the send itself is the event
    /// consumer's job).
    pub async fn notify_customer(
        &self,
        order_id: Uuid,
        channel: String,
        message: String,
        admin: &AdminIdentity,
    ) -> Result<(Order, ActivityLogEntry)> {
        if message.trim().is_empty() {
            return Err(OrdersError::Validation(vec!["message must not be empty".into()]));
        }
        let order = self.get_order(order_id).await?;
        let entry = ActivityLogEntry::record(
            order.id,
            ActivityKind::CustomerNotified { channel, message },
            admin,
        );
        self.store.append_activity(&entry).await?;
        self.publish(&entry).await;
        Ok((order, entry))
    }

    // -------------------------------------------------------------------------
    // Notes
    // -------------------------------------------------------------------------

    pub async fn add_note(
        &self,
        order_id: Uuid,
        text: String,
        admin: &AdminIdentity,
    ) -> Result<(Note, ActivityLogEntry)> {
        validate_note_text(&text)?;
        self.get_order(order_id).await?;
        let note_id = Uuid::now_v7();
        let entry = ActivityLogEntry::record(
            order_id,
            ActivityKind::NoteAdded { note_id, text: text.clone() },
            admin,
        );
        self.store.append_activity(&entry).await?;
        self.publish(&entry).await;
        let note = Note {
            id: note_id,
            order_id,
            text,
            author: admin.name.clone(),
            created_at: entry.created_at,
            updated_at: entry.created_at,
        };
        Ok((note, entry))
    }

    pub async fn update_note(
        &self,
        order_id: Uuid,
        note_id: Uuid,
        text: String,
        admin: &AdminIdentity,
    ) -> Result<(Note, ActivityLogEntry)> {
        validate_note_text(&text)?;
        let existing = self.require_note(order_id, note_id).await?;
        let entry = ActivityLogEntry::record(
            order_id,
            ActivityKind::NoteUpdated { note_id, text: text.clone() },
            admin,
        );
        self.store.append_activity(&entry).await?;
        self.publish(&entry).await;
        Ok((Note { text, updated_at: entry.created_at, ..existing }, entry))
    }

    pub async fn delete_note(
        &self,
        order_id: Uuid,
        note_id: Uuid,
        admin: &AdminIdentity,
    ) -> Result<ActivityLogEntry> {
        self.require_note(order_id, note_id).await?;
        let entry =
            ActivityLogEntry::record(order_id, ActivityKind::NoteDeleted { note_id }, admin);
        self.store.append_activity(&entry).await?;
        self.publish(&entry).await;
        Ok(entry)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// An already-deleted note id is indistinguishable from one that never
    /// existed in the reconstructed view, so both fail the same way here.
    async fn require_note(&self, order_id: Uuid, note_id: Uuid) -> Result<Note> {
        let notes = self.list_notes(order_id).await?;
        notes.into_iter().find(|n| n.id == note_id).ok_or(OrdersError::NoteNotFound)
    }

    async fn commit(
        &self,
        order: Order,
        kind: ActivityKind,
        admin: &AdminIdentity,
    ) -> Result<(Order, ActivityLogEntry)> {
        order.validate()?;
        let entry = ActivityLogEntry::record(order.id, kind, admin);
        self.store.save_order(&order, &entry).await?;
        self.publish(&entry).await;
        Ok((order, entry))
    }

    async fn publish(&self, entry: &ActivityLogEntry) {
        let Some(client) = &self.events else { return };
        let subject = format!("ezmarket.orders.{}", entry.kind.action());
        match serde_json::to_vec(entry) {
            Ok(payload) => {
                if let Err(e) = client.publish(subject, payload.into()).await {
                    tracing::warn!("activity publish failed: {e}");
                }
            }
            Err(e) => tracing::warn!("activity serialize failed: {e}"),
        }
    }
}

fn validate_note_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(OrdersError::Validation(vec!["note text must not be empty".into()]));
    }
    Ok(())
}
