//! Append-only activity log and the note view derived from it.
//!
//! Every mutating admin action on an order produces exactly one
//! [`ActivityLogEntry`]. Entries are never updated or deleted; notes get their
//! update/delete semantics from correlated follow-up entries instead, so the
//! full history stays in the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::order::ShippingInfo;
use crate::domain::status::{OrderStatus, PaymentStatus};

/// What happened, with a payload shape fixed per action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActivityKind {
    OrderCreated { order_number: String },
    StatusChanged { from: OrderStatus, to: OrderStatus },
    PaymentStatusChanged { from: PaymentStatus, to: PaymentStatus },
    ShippingUpdated { shipping: ShippingInfo },
    NoteAdded { note_id: Uuid, text: String },
    NoteUpdated { note_id: Uuid, text: String },
    NoteDeleted { note_id: Uuid },
    CustomerNotified { channel: String, message: String },
}

impl ActivityKind {
    pub fn action(&self) -> &'static str {
        match self {
            ActivityKind::OrderCreated { .. } => "order_created",
            ActivityKind::StatusChanged { .. } => "status_changed",
            ActivityKind::PaymentStatusChanged { .. } => "payment_status_changed",
            ActivityKind::ShippingUpdated { .. } => "shipping_updated",
            ActivityKind::NoteAdded { .. } => "note_added",
            ActivityKind::NoteUpdated { .. } => "note_updated",
            ActivityKind::NoteDeleted { .. } => "note_deleted",
            ActivityKind::CustomerNotified { .. } => "customer_notified",
        }
    }
}

/// The admin performing a mutation, for attribution on log entries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub id: String,
    pub name: String,
}

/// One immutable audit record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    #[serde(flatten)]
    pub kind: ActivityKind,
    pub admin_id: String,
    pub admin_name: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn record(order_id: Uuid, kind: ActivityKind, admin: &AdminIdentity) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id,
            kind,
            admin_id: admin.id.clone(),
            admin_name: admin.name.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Current state of one admin note, reconstructed from the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub order_id: Uuid,
    pub text: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rebuild the current notes from an order's activity entries.
///
/// `entries` is newest-first, as stores return it. Per note id the latest
/// surviving revision wins: `note_updated` replaces the text, `note_deleted`
/// removes the note from the view. Revisions for ids the view no longer
/// contains are ignored. The result is freshly derived on every call and
/// sorted newest-first by creation time.
pub fn rebuild_notes(entries: &[ActivityLogEntry]) -> Vec<Note> {
    let mut notes: HashMap<Uuid, Note> = HashMap::new();
    for e in entries.iter().rev() {
        match &e.kind {
            ActivityKind::NoteAdded { note_id, text } => {
                notes.insert(
                    *note_id,
                    Note {
                        id: *note_id,
                        order_id: e.order_id,
                        text: text.clone(),
                        author: e.admin_name.clone(),
                        created_at: e.created_at,
                        updated_at: e.created_at,
                    },
                );
            }
            ActivityKind::NoteUpdated { note_id, text } => {
                if let Some(note) = notes.get_mut(note_id) {
                    note.text = text.clone();
                    note.updated_at = e.created_at;
                }
            }
            ActivityKind::NoteDeleted { note_id } => {
                notes.remove(note_id);
            }
            _ => {}
        }
    }
    let mut notes: Vec<Note> = notes.into_values().collect();
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn admin() -> AdminIdentity {
        AdminIdentity { id: "adm_1".into(), name: "Admin".into() }
    }

    fn entry(order_id: Uuid, kind: ActivityKind, minute: u32) -> ActivityLogEntry {
        ActivityLogEntry {
            id: Uuid::now_v7(),
            order_id,
            kind,
            admin_id: "adm_1".into(),
            admin_name: "Admin".into(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_rebuild_add_update_delete() {
        let order_id = Uuid::now_v7();
        let kept = Uuid::now_v7();
        let gone = Uuid::now_v7();
        // Stored newest-first, like list_activity returns.
        let entries = vec![
            entry(order_id, ActivityKind::NoteDeleted { note_id: gone }, 4),
            entry(order_id, ActivityKind::NoteUpdated { note_id: kept, text: "second".into() }, 3),
            entry(order_id, ActivityKind::NoteAdded { note_id: gone, text: "bye".into() }, 2),
            entry(order_id, ActivityKind::NoteAdded { note_id: kept, text: "first".into() }, 1),
        ];
        let notes = rebuild_notes(&entries);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, kept);
        assert_eq!(notes[0].text, "second");
        assert_eq!(notes[0].created_at.minute(), 1);
        assert_eq!(notes[0].updated_at.minute(), 3);
    }

    #[test]
    fn test_update_after_delete_is_ignored() {
        let order_id = Uuid::now_v7();
        let id = Uuid::now_v7();
        let entries = vec![
            entry(order_id, ActivityKind::NoteUpdated { note_id: id, text: "ghost".into() }, 3),
            entry(order_id, ActivityKind::NoteDeleted { note_id: id }, 2),
            entry(order_id, ActivityKind::NoteAdded { note_id: id, text: "hello".into() }, 1),
        ];
        assert!(rebuild_notes(&entries).is_empty());
    }

    #[test]
    fn test_non_note_entries_do_not_affect_view() {
        let order_id = Uuid::now_v7();
        let id = Uuid::now_v7();
        let entries = vec![
            entry(
                order_id,
                ActivityKind::StatusChanged { from: OrderStatus::Pending, to: OrderStatus::Confirmed },
                2,
            ),
            entry(order_id, ActivityKind::NoteAdded { note_id: id, text: "call back".into() }, 1),
        ];
        let notes = rebuild_notes(&entries);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].author, "Admin");
    }

    #[test]
    fn test_entry_serializes_with_action_tag() {
        let e = ActivityLogEntry::record(
            Uuid::now_v7(),
            ActivityKind::StatusChanged { from: OrderStatus::Pending, to: OrderStatus::Confirmed },
            &admin(),
        );
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["action"], "status_changed");
        assert_eq!(json["from"], "pending");
        assert_eq!(json["to"], "confirmed");
        let back: ActivityLogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind, e.kind);
    }
}
