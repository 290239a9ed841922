//! Order and payment status enums plus the display registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fulfillment status of an order.
///
/// `Cancelled` and `Refunded` are terminal: once an order enters one of them
/// its status can never change again. Payment status is tracked separately
/// and is not locked by a terminal order status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

/// Payment state of an order, independent of fulfillment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

/// Display metadata for one order status.
///
/// `step_index` is the position on the linear happy path (0..=4); terminal
/// statuses sit off the path and carry `-1` so progress bars can skip them.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct StatusMeta {
    pub label: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub step_index: i8,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Authoritative lookup table, total over the enum.
    pub const fn meta(self) -> &'static StatusMeta {
        match self {
            OrderStatus::Pending => &StatusMeta {
                label: "Pending",
                description: "Order received, awaiting confirmation",
                color: "amber",
                icon: "clock",
                step_index: 0,
            },
            OrderStatus::Confirmed => &StatusMeta {
                label: "Confirmed",
                description: "Confirmed by the store",
                color: "blue",
                icon: "check-circle",
                step_index: 1,
            },
            OrderStatus::Preparing => &StatusMeta {
                label: "Preparing",
                description: "Being picked and packed",
                color: "indigo",
                icon: "package",
                step_index: 2,
            },
            OrderStatus::Shipped => &StatusMeta {
                label: "Shipped",
                description: "Handed to the carrier",
                color: "violet",
                icon: "truck",
                step_index: 3,
            },
            OrderStatus::Delivered => &StatusMeta {
                label: "Delivered",
                description: "Delivered to the customer",
                color: "green",
                icon: "badge-check",
                step_index: 4,
            },
            OrderStatus::Cancelled => &StatusMeta {
                label: "Cancelled",
                description: "Cancelled before fulfillment completed",
                color: "red",
                icon: "x-circle",
                step_index: -1,
            },
            OrderStatus::Refunded => &StatusMeta {
                label: "Refunded",
                description: "Payment returned to the customer",
                color: "gray",
                icon: "receipt-refund",
                step_index: -1,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "preparing" => Ok(OrderStatus::Preparing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A status string in storage that no enum member matches.
#[derive(Debug, Clone)]
pub struct UnknownStatus(pub String);

impl std::error::Error for UnknownStatus {}
impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status {:?}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        for s in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            assert!(!s.is_terminal());
        }
    }

    #[test]
    fn registry_step_indices() {
        let on_path: Vec<i8> = OrderStatus::ALL
            .iter()
            .map(|s| s.meta().step_index)
            .filter(|&i| i >= 0)
            .collect();
        assert_eq!(on_path, vec![0, 1, 2, 3, 4]);
        assert_eq!(OrderStatus::Cancelled.meta().step_index, -1);
        assert_eq!(OrderStatus::Refunded.meta().step_index, -1);
    }

    #[test]
    fn status_strings_round_trip() {
        for s in OrderStatus::ALL {
            assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s);
        }
        assert!("unknown".parse::<OrderStatus>().is_err());
        assert_eq!("completed".parse::<PaymentStatus>().unwrap(), PaymentStatus::Completed);
    }
}
