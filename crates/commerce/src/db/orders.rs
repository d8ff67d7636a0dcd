//! Order repository.
//!
//! Statuses are stored as snake_case text; rows that fail to parse are
//! surfaced as `DataCorruption` rather than silently skipped.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use clementine_core::{
    Email, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, Price, ProductId,
    UserId,
};

use super::RepositoryError;
use crate::models::{
    DashboardStats, Order, OrderFilter, OrderItem, OrderWithItems, Page, Pagination,
    ShippingAddress, StatusCounts,
};

const ORDER_COLUMNS: &str = "id, user_id, customer_email, status, payment_method, \
     payment_status, total_amount, shipping_address, shipping_city, shipping_postal_code, \
     shipping_country, invoice_ref, tracking_number, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    customer_email: Email,
    status: String,
    payment_method: String,
    payment_status: String,
    total_amount: Price,
    shipping_address: String,
    shipping_city: String,
    shipping_postal_code: String,
    shipping_country: String,
    invoice_ref: Option<String>,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_str(&row.status).map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id.as_i32()))
        })?;
        let payment_method = PaymentMethod::from_str(&row.payment_method).map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id.as_i32()))
        })?;
        let payment_status = PaymentStatus::from_str(&row.payment_status).map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id.as_i32()))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            customer_email: row.customer_email,
            status,
            payment_method,
            payment_status,
            total_amount: row.total_amount,
            shipping: ShippingAddress {
                address: row.shipping_address,
                city: row.shipping_city,
                postal_code: row.shipping_postal_code,
                country: row.shipping_country,
            },
            invoice_ref: row.invoice_ref,
            tracking_number: row.tracking_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    unit_price: Price,
    line_total: Price,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.line_total,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total_orders: i64,
    total_revenue: Option<Decimal>,
    pending: i64,
    processing: i64,
    shipped: i64,
    delivered: i64,
    cancelled: i64,
    paid_orders: i64,
    pending_payments: i64,
    failed_payments: i64,
    refunded_payments: i64,
    recent_orders: i64,
    recent_revenue: Option<Decimal>,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders matching the filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails,
    /// `RepositoryError::DataCorruption` if a stored status is invalid.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders WHERE TRUE");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"
        ));
        push_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id DESC");
        query.push(" LIMIT ");
        query.push_bind(pagination.limit());
        query.push(" OFFSET ");
        query.push_bind(pagination.offset());

        let rows: Vec<OrderRow> = query.build_query_as().fetch_all(self.pool).await?;
        let items = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total, pagination))
    }

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails,
    /// `RepositoryError::DataCorruption` if a stored status is invalid.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Get the items of an order, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT id, order_id, product_id, quantity, unit_price, line_total \
             FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_items(
        &self,
        id: OrderId,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let Some(order) = self.get(id).await? else {
            return Ok(None);
        };
        let items = self.items(id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// Set the order status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(status.to_string())
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record the carrier tracking reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn set_tracking_number(
        &self,
        id: OrderId,
        tracking_number: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET tracking_number = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(tracking_number)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set the payment status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status.to_string())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Compute dashboard aggregates in a single pass over `orders`.
    ///
    /// Revenue figures exclude cancelled orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self) -> Result<DashboardStats, RepositoryError> {
        let row: StatsRow = sqlx::query_as(
            "SELECT \
               COUNT(*) AS total_orders, \
               SUM(total_amount) FILTER (WHERE status <> 'cancelled') AS total_revenue, \
               COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
               COUNT(*) FILTER (WHERE status = 'processing') AS processing, \
               COUNT(*) FILTER (WHERE status = 'shipped') AS shipped, \
               COUNT(*) FILTER (WHERE status = 'delivered') AS delivered, \
               COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled, \
               COUNT(*) FILTER (WHERE payment_status = 'paid') AS paid_orders, \
               COUNT(*) FILTER (WHERE payment_status = 'pending') AS pending_payments, \
               COUNT(*) FILTER (WHERE payment_status = 'failed') AS failed_payments, \
               COUNT(*) FILTER (WHERE payment_status = 'refunded') AS refunded_payments, \
               COUNT(*) FILTER (WHERE created_at >= now() - INTERVAL '30 days') AS recent_orders, \
               SUM(total_amount) FILTER (WHERE status <> 'cancelled' \
                   AND created_at >= now() - INTERVAL '30 days') AS recent_revenue \
             FROM orders",
        )
        .fetch_one(self.pool)
        .await?;

        let total_revenue = Price::new(row.total_revenue.unwrap_or_default());
        let counted = row.total_orders - row.cancelled;
        let average_order_value = if counted > 0 {
            Price::new(total_revenue.amount() / Decimal::from(counted))
        } else {
            Price::ZERO
        };

        Ok(DashboardStats {
            total_orders: row.total_orders,
            total_revenue,
            average_order_value,
            status_counts: StatusCounts {
                pending: row.pending,
                processing: row.processing,
                shipped: row.shipped,
                delivered: row.delivered,
                cancelled: row.cancelled,
            },
            paid_orders: row.paid_orders,
            pending_payments: row.pending_payments,
            failed_payments: row.failed_payments,
            refunded_payments: row.refunded_payments,
            recent_orders: row.recent_orders,
            recent_revenue: Price::new(row.recent_revenue.unwrap_or_default()),
        })
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(payment_status) = filter.payment_status {
        query
            .push(" AND payment_status = ")
            .push_bind(payment_status.to_string());
    }
    if let Some(user_id) = filter.user_id {
        query.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(after) = filter.placed_after {
        query.push(" AND created_at >= ").push_bind(after);
    }
    if let Some(before) = filter.placed_before {
        query.push(" AND created_at <= ").push_bind(before);
    }
}
