//! Order entity and its state transitions.
//!
//! Transitions return the [`ActivityKind`] describing what changed, so a
//! mutation cannot happen without producing its audit record. The service
//! layer persists the order and the entry together.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::activity::ActivityKind;
use crate::domain::status::{OrderStatus, PaymentStatus};
use crate::domain::value_objects::Money;
use crate::{OrdersError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub customer_email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub discount: Money,
    pub total: Money,
    pub shipping: ShippingInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Carrier details, meaningful once an order ships.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Partial shipping update; `None` fields keep their prior value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ShippingUpdate {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Input for the admin "create order" operation.
#[derive(Clone, Debug, Deserialize)]
pub struct NewOrder {
    pub customer_id: Option<Uuid>,
    pub customer_email: String,
    pub currency: String,
    pub subtotal: Decimal,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

impl Order {
    pub fn create(new: NewOrder) -> Result<Self> {
        let subtotal = Money::new(new.subtotal, &new.currency);
        let shipping_cost = Money::new(new.shipping_cost, &new.currency);
        let discount = Money::new(new.discount, &new.currency);
        let total = subtotal.add(&shipping_cost)?.subtract(&discount)?;
        let now = Utc::now();
        let order = Self {
            id: Uuid::now_v7(),
            order_number: generate_order_number(),
            customer_id: new.customer_id,
            customer_email: new.customer_email,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal,
            shipping_cost,
            discount,
            total,
            shipping: ShippingInfo::default(),
            created_at: now,
            updated_at: now,
        };
        order.validate()?;
        Ok(order)
    }

    pub fn currency(&self) -> &str {
        self.subtotal.currency()
    }

    /// Any non-terminal status may move to any status, including backwards;
    /// terminal statuses are locked.
    pub fn change_status(&mut self, to: OrderStatus) -> Result<ActivityKind> {
        if self.status.is_terminal() {
            return Err(OrdersError::InvalidTransition(self.status));
        }
        let from = self.status;
        self.status = to;
        self.touch();
        Ok(ActivityKind::StatusChanged { from, to })
    }

    /// Payment status is never locked, so a late refund stays recordable
    /// after the order itself is cancelled.
    pub fn change_payment_status(&mut self, to: PaymentStatus) -> ActivityKind {
        let from = self.payment_status;
        self.payment_status = to;
        self.touch();
        ActivityKind::PaymentStatusChanged { from, to }
    }

    /// Merges the patch into the current shipping info and reports the full
    /// merged payload.
    pub fn update_shipping(&mut self, patch: ShippingUpdate) -> ActivityKind {
        if let Some(carrier) = patch.carrier {
            self.shipping.carrier = Some(carrier);
        }
        if let Some(tracking) = patch.tracking_number {
            self.shipping.tracking_number = Some(tracking);
        }
        if let Some(eta) = patch.estimated_delivery {
            self.shipping.estimated_delivery = Some(eta);
        }
        self.touch();
        ActivityKind::ShippingUpdated { shipping: self.shipping.clone() }
    }

    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();
        if self.customer_email.trim().is_empty() {
            issues.push("customer_email must not be empty".to_string());
        }
        let monetary = [
            ("subtotal", &self.subtotal),
            ("shipping_cost", &self.shipping_cost),
            ("discount", &self.discount),
            ("total", &self.total),
        ];
        for (field, money) in monetary {
            if money.is_negative() {
                issues.push(format!("{field} must not be negative"));
            }
            if money.currency() != self.currency() {
                issues.push(format!("{field} is not in the order currency"));
            }
        }
        match self.subtotal.add(&self.shipping_cost).and_then(|m| m.subtract(&self.discount)) {
            Ok(expected) if expected == self.total => {}
            Ok(expected) => issues.push(format!(
                "total {} does not equal subtotal + shipping_cost - discount ({})",
                self.total, expected
            )),
            Err(e) => issues.push(e.to_string()),
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(OrdersError::Validation(issues))
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

pub fn generate_order_number() -> String {
    format!("EZM-{}-{:06}", Utc::now().year(), rand::random::<u32>() % 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order() -> NewOrder {
        NewOrder {
            customer_id: None,
            customer_email: "musteri@example.com".into(),
            currency: "TRY".into(),
            subtotal: Decimal::new(100, 0),
            shipping_cost: Decimal::new(20, 0),
            discount: Decimal::new(10, 0),
        }
    }

    #[test]
    fn test_create_computes_total() {
        let order = Order::create(new_order()).unwrap();
        assert_eq!(order.total.amount(), Decimal::new(110, 0));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(order.order_number.starts_with("EZM-"));
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_create_rejects_negative_total() {
        let mut new = new_order();
        new.discount = Decimal::new(500, 0);
        assert!(matches!(Order::create(new), Err(OrdersError::Validation(_))));
    }

    #[test]
    fn test_terminal_status_locks_transitions() {
        let mut order = Order::create(new_order()).unwrap();
        order.change_status(OrderStatus::Cancelled).unwrap();
        let err = order.change_status(OrderStatus::Shipped).unwrap_err();
        assert!(matches!(err, OrdersError::InvalidTransition(OrderStatus::Cancelled)));
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_payment_status_survives_terminal_order() {
        let mut order = Order::create(new_order()).unwrap();
        order.change_status(OrderStatus::Cancelled).unwrap();
        let kind = order.change_payment_status(PaymentStatus::Refunded);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert!(matches!(kind, ActivityKind::PaymentStatusChanged { .. }));
    }

    #[test]
    fn test_shipping_patch_keeps_prior_fields() {
        let mut order = Order::create(new_order()).unwrap();
        order.update_shipping(ShippingUpdate {
            carrier: Some("aras".into()),
            tracking_number: Some("TR123".into()),
            ..Default::default()
        });
        let kind = order.update_shipping(ShippingUpdate {
            estimated_delivery: Some(Utc::now()),
            ..Default::default()
        });
        assert_eq!(order.shipping.carrier.as_deref(), Some("aras"));
        assert_eq!(order.shipping.tracking_number.as_deref(), Some("TR123"));
        assert!(order.shipping.estimated_delivery.is_some());
        match kind {
            ActivityKind::ShippingUpdated { shipping } => {
                assert_eq!(shipping.carrier.as_deref(), Some("aras"));
            }
            other => panic!("unexpected activity kind: {other:?}"),
        }
    }
}
