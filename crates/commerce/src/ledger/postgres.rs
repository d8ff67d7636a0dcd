//! `PostgreSQL` ledger.

use sqlx::{PgPool, Postgres, Transaction};

use clementine_core::{CategoryId, OrderId, OrderStatus, PaymentStatus, Price, ProductId, UserId};

use super::{Ledger, LedgerTx, OrderDraft};
use crate::db::RepositoryError;
use crate::models::{NewOrderItem, Order, Product};

/// [`Ledger`] backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Create a ledger over the pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Ledger for PgLedger {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(PgLedgerTx { tx })
    }
}

/// An open `PostgreSQL` transaction. sqlx rolls back on drop.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: String,
    price: Price,
    stock: i32,
    image: Option<String>,
    category_id: Option<CategoryId>,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl LedgerTx for PgLedgerTx {
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT id, name, slug, description, price, stock, image, category_id, is_active, \
                    created_at, updated_at \
             FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|row| Product {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            stock: row.stock,
            image: row.image,
            category_id: row.category_id,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let quantity = i64::from(quantity);
        // The stock >= quantity guard makes the decrement atomic under
        // concurrent placements; a lost race simply affects zero rows.
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, updated_at = now() \
             WHERE id = $1 AND stock >= $2",
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_order(&mut self, draft: &OrderDraft) -> Result<Order, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct InsertedRow {
            id: OrderId,
            created_at: chrono::DateTime<chrono::Utc>,
            updated_at: chrono::DateTime<chrono::Utc>,
        }

        let row: InsertedRow = sqlx::query_as(
            "INSERT INTO orders (user_id, customer_email, status, payment_method, \
                                 payment_status, total_amount, shipping_address, shipping_city, \
                                 shipping_postal_code, shipping_country) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING id, created_at, updated_at",
        )
        .bind(draft.user_id)
        .bind(&draft.customer_email)
        .bind(OrderStatus::Pending.to_string())
        .bind(draft.payment_method.to_string())
        .bind(PaymentStatus::Pending.to_string())
        .bind(draft.total_amount)
        .bind(&draft.shipping.address)
        .bind(&draft.shipping.city)
        .bind(&draft.shipping.postal_code)
        .bind(&draft.shipping.country)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Order {
            id: row.id,
            user_id: draft.user_id,
            customer_email: draft.customer_email.clone(),
            status: OrderStatus::Pending,
            payment_method: draft.payment_method,
            payment_status: PaymentStatus::Pending,
            total_amount: draft.total_amount,
            shipping: draft.shipping.clone(),
            invoice_ref: None,
            tracking_number: None,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<(), RepositoryError> {
        for item in items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, unit_price, line_total) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(i64::from(item.quantity))
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn attach_invoice(
        &mut self,
        order_id: OrderId,
        invoice_ref: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET invoice_ref = $2, updated_at = now() WHERE id = $1",
        )
        .bind(order_id)
        .bind(invoice_ref)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "DELETE FROM cart_items \
             WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
