//! Transactional writes for order placement.
//!
//! The [`Ledger`] trait is the seam between the placement algorithm and
//! storage. [`PgLedger`] runs against `PostgreSQL`; [`MemoryLedger`] gives
//! tests the same transactional semantics in-process, including rollback
//! when a transaction is dropped without commit.

use std::future::Future;

use clementine_core::{Email, OrderId, PaymentMethod, Price, ProductId, UserId};

use crate::db::RepositoryError;
use crate::models::{NewOrderItem, Order, Product, ShippingAddress};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

/// Everything needed to insert the order row; items are attached
/// separately with [`LedgerTx::insert_order_items`].
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: UserId,
    /// Snapshotted onto the order; the user directory is external.
    pub customer_email: Email,
    pub payment_method: PaymentMethod,
    pub shipping: ShippingAddress,
    pub total_amount: Price,
}

/// Opens transactions over the order and stock tables.
pub trait Ledger: Send + Sync {
    type Tx: LedgerTx;

    /// Begin a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;
}

/// One placement transaction. Dropping without [`commit`](Self::commit)
/// rolls every write back.
pub trait LedgerTx: Send {
    /// Read a product inside the transaction.
    fn product(
        &mut self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Atomically decrement stock if at least `quantity` units remain.
    ///
    /// Returns `false` when stock is insufficient; no change is made in
    /// that case.
    fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Insert the order row and return it.
    fn insert_order(
        &mut self,
        draft: &OrderDraft,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    /// Insert the order's line items.
    fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Record the invoice reference on the order.
    fn attach_invoice(
        &mut self,
        order_id: OrderId,
        invoice_ref: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Empty the user's cart.
    fn clear_cart(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Commit the transaction.
    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
