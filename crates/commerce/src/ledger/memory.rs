//! In-memory ledger for tests.
//!
//! A transaction takes the single state mutex and mutates a working copy;
//! commit writes the copy back, drop discards it. Holding the mutex for
//! the whole transaction serializes placements the way row locks do in
//! `PostgreSQL`, so concurrency tests observe real contention.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use clementine_core::{
    OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, UserId,
};

use super::{Ledger, LedgerTx, OrderDraft};
use crate::db::RepositoryError;
use crate::models::{NewOrderItem, Order, OrderItem, OrderLine, Product};

/// Shared state behind a [`MemoryLedger`].
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub products: HashMap<ProductId, Product>,
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
    pub carts: HashMap<UserId, Vec<OrderLine>>,
    next_order_id: i32,
    next_order_item_id: i32,
}

impl MemoryState {
    fn next_order_id(&mut self) -> OrderId {
        self.next_order_id += 1;
        OrderId::new(self.next_order_id)
    }

    fn next_order_item_id(&mut self) -> OrderItemId {
        self.next_order_item_id += 1;
        OrderItemId::new(self.next_order_item_id)
    }
}

/// [`Ledger`] over an in-process state map.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product.
    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    /// Seed a user's cart contents.
    pub async fn set_cart(&self, user_id: UserId, lines: Vec<OrderLine>) {
        self.state.lock().await.carts.insert(user_id, lines);
    }

    /// Snapshot of a product, if present.
    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    /// Snapshot of all committed orders.
    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.clone()
    }

    /// Items of one committed order.
    pub async fn order_items(&self, order_id: OrderId) -> Vec<OrderItem> {
        self.state
            .lock()
            .await
            .order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Current cart lines for a user.
    pub async fn cart_lines(&self, user_id: UserId) -> Vec<OrderLine> {
        self.state
            .lock()
            .await
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn shared_state(&self) -> Arc<Mutex<MemoryState>> {
        Arc::clone(&self.state)
    }
}

impl Ledger for MemoryLedger {
    type Tx = MemoryLedgerTx;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(MemoryLedgerTx { guard, work })
    }
}

/// Transaction over a working copy of the state.
pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl LedgerTx for MemoryLedgerTx {
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.work.products.get(&id).cloned())
    }

    async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let Some(product) = self.work.products.get_mut(&id) else {
            return Ok(false);
        };
        let Ok(quantity) = i32::try_from(quantity) else {
            return Ok(false);
        };
        if product.stock < quantity {
            return Ok(false);
        }
        product.stock -= quantity;
        product.updated_at = Utc::now();
        Ok(true)
    }

    async fn insert_order(&mut self, draft: &OrderDraft) -> Result<Order, RepositoryError> {
        let now = Utc::now();
        let order = Order {
            id: self.work.next_order_id(),
            user_id: draft.user_id,
            customer_email: draft.customer_email.clone(),
            status: OrderStatus::Pending,
            payment_method: draft.payment_method,
            payment_status: PaymentStatus::Pending,
            total_amount: draft.total_amount,
            shipping: draft.shipping.clone(),
            invoice_ref: None,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        };
        self.work.orders.push(order.clone());
        Ok(order)
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<(), RepositoryError> {
        for item in items {
            let id = self.work.next_order_item_id();
            self.work.order_items.push(OrderItem {
                id,
                order_id,
                product_id: item.product_id,
                quantity: i32::try_from(item.quantity).map_err(|_| {
                    RepositoryError::Conflict(format!("quantity {} out of range", item.quantity))
                })?,
                unit_price: item.unit_price,
                line_total: item.line_total,
            });
        }
        Ok(())
    }

    async fn attach_invoice(
        &mut self,
        order_id: OrderId,
        invoice_ref: &str,
    ) -> Result<(), RepositoryError> {
        let order = self
            .work
            .orders
            .iter_mut()
            .find(|order| order.id == order_id)
            .ok_or(RepositoryError::NotFound)?;
        order.invoice_ref = Some(invoice_ref.to_string());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<(), RepositoryError> {
        self.work.carts.remove(&user_id);
        Ok(())
    }

    async fn commit(mut self) -> Result<(), RepositoryError> {
        *self.guard = self.work;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clementine_core::Price;

    use super::*;
    use crate::models::ShippingAddress;

    fn product(id: i32, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: String::new(),
            price: Price::from_cents(1000),
            stock,
            image: None,
            category_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn draft(user_id: i32) -> OrderDraft {
        OrderDraft {
            user_id: UserId::new(user_id),
            customer_email: clementine_core::Email::parse("buyer@example.com").unwrap(),
            payment_method: clementine_core::PaymentMethod::Online,
            shipping: ShippingAddress {
                address: "1 Main St".to_string(),
                city: "Lyon".to_string(),
                postal_code: "69000".to_string(),
                country: "FR".to_string(),
            },
            total_amount: Price::from_cents(1000),
        }
    }

    #[tokio::test]
    async fn test_commit_persists_writes() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 5)).await;

        let mut tx = ledger.begin().await.unwrap();
        assert!(tx.decrement_stock(ProductId::new(1), 2).await.unwrap());
        let order = tx.insert_order(&draft(1)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(ledger.product(ProductId::new(1)).await.unwrap().stock, 3);
        assert_eq!(ledger.orders().await.len(), 1);
        assert_eq!(ledger.orders().await[0].id, order.id);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 5)).await;

        {
            let mut tx = ledger.begin().await.unwrap();
            assert!(tx.decrement_stock(ProductId::new(1), 5).await.unwrap());
            tx.insert_order(&draft(1)).await.unwrap();
            // No commit.
        }

        assert_eq!(ledger.product(ProductId::new(1)).await.unwrap().stock, 5);
        assert!(ledger.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_decrement_refuses_oversell() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 3)).await;

        let mut tx = ledger.begin().await.unwrap();
        assert!(!tx.decrement_stock(ProductId::new(1), 4).await.unwrap());
        // The failed decrement must leave stock untouched.
        let stock = tx.product(ProductId::new(1)).await.unwrap().unwrap().stock;
        assert_eq!(stock, 3);
    }
}
