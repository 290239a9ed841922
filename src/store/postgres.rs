//! Postgres-backed store.
//!
//! Order writes and their activity append share one transaction so a torn
//! write between the two tables cannot be observed, even under concurrent
//! admin requests against the same order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::activity::ActivityLogEntry;
use crate::domain::order::{Order, ShippingInfo};
use crate::domain::status::UnknownStatus;
use crate::domain::value_objects::Money;
use crate::store::OrderStore;
use crate::{OrdersError, Result};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for OrdersError {
    fn from(e: sqlx::Error) -> Self {
        OrdersError::Storage(e.to_string())
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Option<Uuid>,
    customer_email: String,
    status: String,
    payment_status: String,
    currency: String,
    subtotal: Decimal,
    shipping_cost: Decimal,
    discount: Decimal,
    total: Decimal,
    carrier: Option<String>,
    tracking_number: Option<String>,
    estimated_delivery: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order> {
        let bad_status = |e: UnknownStatus| OrdersError::Storage(e.to_string());
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            customer_id: self.customer_id,
            customer_email: self.customer_email,
            status: self.status.parse().map_err(bad_status)?,
            payment_status: self.payment_status.parse().map_err(bad_status)?,
            subtotal: Money::new(self.subtotal, &self.currency),
            shipping_cost: Money::new(self.shipping_cost, &self.currency),
            discount: Money::new(self.discount, &self.currency),
            total: Money::new(self.total, &self.currency),
            shipping: ShippingInfo {
                carrier: self.carrier,
                tracking_number: self.tracking_number,
                estimated_delivery: self.estimated_delivery,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    order_id: Uuid,
    payload: Value,
    admin_id: String,
    admin_name: String,
    created_at: DateTime<Utc>,
}

impl ActivityRow {
    fn into_entry(self) -> Result<ActivityLogEntry> {
        let kind = serde_json::from_value(self.payload)
            .map_err(|e| OrdersError::Storage(format!("bad activity payload: {e}")))?;
        Ok(ActivityLogEntry {
            id: self.id,
            order_id: self.order_id,
            kind,
            admin_id: self.admin_id,
            admin_name: self.admin_name,
            created_at: self.created_at,
        })
    }
}

async fn insert_activity(tx: &mut Transaction<'_, Postgres>, entry: &ActivityLogEntry) -> Result<()> {
    let payload = serde_json::to_value(&entry.kind)
        .map_err(|e| OrdersError::Storage(format!("serialize activity payload: {e}")))?;
    sqlx::query(
        "INSERT INTO order_activity (id, order_id, action, payload, admin_id, admin_name, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id)
    .bind(entry.order_id)
    .bind(entry.kind.action())
    .bind(&payload)
    .bind(&entry.admin_id)
    .bind(&entry.admin_name)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl OrderStore for PgStore {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(OrderRow::into_order).transpose()
    }

    async fn list_orders(&self, page: u32, per_page: u32) -> Result<(Vec<Order>, i64)> {
        let page = page.max(1);
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(per_page as i64)
        .bind(((page - 1) * per_page) as i64)
        .fetch_all(&self.pool)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        let orders = rows
            .into_iter()
            .map(OrderRow::into_order)
            .collect::<Result<Vec<_>>>()?;
        Ok((orders, total.0))
    }

    async fn insert_order(&self, order: &Order, entry: &ActivityLogEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO orders (id, order_number, customer_id, customer_email, status, payment_status, \
             currency, subtotal, shipping_cost, discount, total, carrier, tracking_number, \
             estimated_delivery, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.customer_id)
        .bind(&order.customer_email)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.currency())
        .bind(order.subtotal.amount())
        .bind(order.shipping_cost.amount())
        .bind(order.discount.amount())
        .bind(order.total.amount())
        .bind(&order.shipping.carrier)
        .bind(&order.shipping.tracking_number)
        .bind(order.shipping.estimated_delivery)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;
        insert_activity(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_order(&self, order: &Order, entry: &ActivityLogEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, carrier = $4, \
             tracking_number = $5, estimated_delivery = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.shipping.carrier)
        .bind(&order.shipping.tracking_number)
        .bind(order.shipping.estimated_delivery)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(OrdersError::OrderNotFound);
        }
        insert_activity(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn append_activity(&self, entry: &ActivityLogEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_activity(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_activity(&self, order_id: Uuid) -> Result<Vec<ActivityLogEntry>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, order_id, payload, admin_id, admin_name, created_at \
             FROM order_activity WHERE order_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ActivityRow::into_entry).collect()
    }
}
