//! Order placement.
//!
//! One transaction covers stock decrements, the order row, its items,
//! the invoice reference and the cart clear; any failure before commit
//! rolls everything back, so stock is never consumed by an order that
//! was not placed. Notifications go out only after commit and a failed
//! dispatch does not unplace the order.

use clementine_core::{PaymentMethod, Price};

use crate::activity;
use crate::auth::{Actor, Permission};
use crate::cart_store::CartStore;
use crate::error::{CommerceError, Result};
use crate::invoice::InvoiceGenerator;
use crate::ledger::{Ledger, LedgerTx, OrderDraft};
use crate::models::{NewOrderItem, Order, OrderLine, ShippingAddress};
use crate::notify::{Notification, NotificationDispatcher};

/// Everything a customer submits to place an order.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    /// Explicit lines; when empty, the user's cart is used instead.
    pub lines: Vec<OrderLine>,
    pub payment_method: PaymentMethod,
    pub shipping: ShippingAddress,
}

/// Places orders atomically against the ledger.
pub struct OrderPlacementService<L, C, I, N> {
    ledger: L,
    carts: C,
    invoices: I,
    notifier: N,
}

impl<L, C, I, N> OrderPlacementService<L, C, I, N>
where
    L: Ledger,
    C: CartStore,
    I: InvoiceGenerator,
    N: NotificationDispatcher,
{
    pub const fn new(ledger: L, carts: C, invoices: I, notifier: N) -> Self {
        Self {
            ledger,
            carts,
            invoices,
            notifier,
        }
    }

    /// Place an order for the actor.
    ///
    /// # Errors
    ///
    /// - `Forbidden` when the actor may not place orders
    /// - `Validation` for a malformed shipping address or non-positive
    ///   quantity
    /// - `EmptyCart` when no lines were given and the cart is empty
    /// - `NotFound` for products that don't exist
    /// - `ProductUnavailable` for deactivated products
    /// - `InsufficientStock` when stock cannot cover a line, including
    ///   when a concurrent placement takes the last units
    /// - `System` when invoice generation fails (the order is rolled back)
    pub async fn place_order(&self, actor: &Actor, request: PlacementRequest) -> Result<Order> {
        actor.require(Permission::PlaceOrders)?;

        request
            .shipping
            .validate()
            .map_err(|field| CommerceError::Validation(format!("{field} must not be empty")))?;

        let from_cart = request.lines.is_empty();
        let lines = if from_cart {
            self.carts.lines_for_user(actor.user_id()).await?
        } else {
            request.lines
        };
        if lines.is_empty() {
            return Err(CommerceError::EmptyCart);
        }
        if lines.iter().any(|line| line.quantity == 0) {
            return Err(CommerceError::Validation(
                "quantity must be positive".to_string(),
            ));
        }

        let mut tx = self.ledger.begin().await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = tx
                .product(line.product_id)
                .await?
                .ok_or_else(|| CommerceError::NotFound(format!("product {}", line.product_id)))?;
            if !product.is_active {
                return Err(CommerceError::ProductUnavailable { name: product.name });
            }
            if !product.has_stock(line.quantity) {
                return Err(CommerceError::InsufficientStock { name: product.name });
            }
            // The conditional decrement is the authoritative stock check;
            // the read above only provides the product name and price.
            if !tx.decrement_stock(line.product_id, line.quantity).await? {
                return Err(CommerceError::InsufficientStock { name: product.name });
            }

            items.push(NewOrderItem {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: product.price,
                line_total: product.price.times(line.quantity),
            });
        }

        let total_amount: Price = items.iter().map(|item| item.line_total).sum();

        let draft = OrderDraft {
            user_id: actor.user_id(),
            customer_email: actor.email().clone(),
            payment_method: request.payment_method,
            shipping: request.shipping,
            total_amount,
        };
        let mut order = tx.insert_order(&draft).await?;
        tx.insert_order_items(order.id, &items).await?;

        let invoice_ref = self
            .invoices
            .generate(&order, &items)
            .await
            .map_err(|e| CommerceError::System(e.to_string()))?;
        tx.attach_invoice(order.id, &invoice_ref).await?;
        order.invoice_ref = Some(invoice_ref);

        if from_cart {
            tx.clear_cart(actor.user_id()).await?;
        }

        tx.commit().await?;

        if let Err(e) = self
            .notifier
            .dispatch(Notification::OrderConfirmation {
                recipient: order.customer_email.clone(),
                order: order.clone(),
            })
            .await
        {
            tracing::warn!(order_id = %order.id, error = %e, "order confirmation not sent");
        }

        activity::order_placed(actor, &order, items.len());

        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use clementine_core::{Email, OrderStatus, PaymentStatus, ProductId, UserId};

    use super::*;
    use crate::invoice::{InvoiceError, ReferenceInvoiceGenerator};
    use crate::ledger::MemoryLedger;
    use crate::models::Product;
    use crate::notify::{NotifyError, TracingNotifier};

    fn actor(id: i32) -> Actor {
        Actor::customer(UserId::new(id), Email::parse("buyer@example.com").unwrap())
    }

    fn product(id: i32, cents: i64, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: String::new(),
            price: Price::from_cents(cents),
            stock,
            image: None,
            category_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn request(lines: Vec<OrderLine>) -> PlacementRequest {
        PlacementRequest {
            lines,
            payment_method: PaymentMethod::Online,
            shipping: ShippingAddress {
                address: "1 Main St".to_string(),
                city: "Lyon".to_string(),
                postal_code: "69000".to_string(),
                country: "FR".to_string(),
            },
        }
    }

    fn line(product_id: i32, quantity: u32) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(product_id),
            quantity,
        }
    }

    fn service(
        ledger: &MemoryLedger,
    ) -> OrderPlacementService<MemoryLedger, MemoryLedger, ReferenceInvoiceGenerator, TracingNotifier>
    {
        OrderPlacementService::new(
            ledger.clone(),
            ledger.clone(),
            ReferenceInvoiceGenerator,
            TracingNotifier,
        )
    }

    struct BrokenInvoices;

    impl InvoiceGenerator for BrokenInvoices {
        async fn generate(
            &self,
            _order: &Order,
            _items: &[NewOrderItem],
        ) -> std::result::Result<String, InvoiceError> {
            Err(InvoiceError("renderer offline".to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: std::sync::Arc<std::sync::Mutex<Vec<Notification>>>,
    }

    impl NotificationDispatcher for RecordingNotifier {
        async fn dispatch(
            &self,
            notification: Notification,
        ) -> std::result::Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }
    }

    struct BrokenNotifier;

    impl NotificationDispatcher for BrokenNotifier {
        async fn dispatch(
            &self,
            _notification: Notification,
        ) -> std::result::Result<(), NotifyError> {
            Err(NotifyError("smtp down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_place_order_decrements_stock_and_totals() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 1250, 10)).await;
        ledger.insert_product(product(2, 400, 5)).await;

        let order = service(&ledger)
            .place_order(&actor(1), request(vec![line(1, 2), line(2, 3)]))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total_amount, Price::from_cents(2 * 1250 + 3 * 400));
        assert!(order.invoice_ref.as_deref().unwrap().starts_with("INV-"));

        assert_eq!(ledger.product(ProductId::new(1)).await.unwrap().stock, 8);
        assert_eq!(ledger.product(ProductId::new(2)).await.unwrap().stock, 2);

        let items = ledger.order_items(order.id).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].unit_price, Price::from_cents(1250));
        assert_eq!(items[0].line_total, Price::from_cents(2500));
    }

    #[tokio::test]
    async fn test_cart_fallback_and_clear() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 500, 4)).await;
        ledger
            .set_cart(UserId::new(1), vec![line(1, 2)])
            .await;

        let order = service(&ledger)
            .place_order(&actor(1), request(vec![]))
            .await
            .unwrap();

        assert_eq!(order.total_amount, Price::from_cents(1000));
        assert!(ledger.cart_lines(UserId::new(1)).await.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_lines_leave_cart_alone() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 500, 4)).await;
        ledger.insert_product(product(2, 700, 4)).await;
        ledger
            .set_cart(UserId::new(1), vec![line(2, 1)])
            .await;

        service(&ledger)
            .place_order(&actor(1), request(vec![line(1, 1)]))
            .await
            .unwrap();

        assert_eq!(ledger.cart_lines(UserId::new(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let ledger = MemoryLedger::new();
        let err = service(&ledger)
            .place_order(&actor(1), request(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::EmptyCart));
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 500, 4)).await;

        let err = service(&ledger)
            .place_order(&actor(1), request(vec![line(1, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_blank_shipping_rejected() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 500, 4)).await;

        let mut req = request(vec![line(1, 1)]);
        req.shipping.postal_code = "  ".to_string();
        let err = service(&ledger)
            .place_order(&actor(1), req)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_inactive_product_rejected() {
        let ledger = MemoryLedger::new();
        let mut inactive = product(1, 500, 4);
        inactive.is_active = false;
        ledger.insert_product(inactive).await;

        let err = service(&ledger)
            .place_order(&actor(1), request(vec![line(1, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::ProductUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_earlier_lines() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 500, 10)).await;
        ledger.insert_product(product(2, 500, 1)).await;

        let err = service(&ledger)
            .place_order(&actor(1), request(vec![line(1, 2), line(2, 5)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InsufficientStock { .. }));

        // The first line's decrement must not survive the failure.
        assert_eq!(ledger.product(ProductId::new(1)).await.unwrap().stock, 10);
        assert!(ledger.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_invoice_failure_aborts_placement() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 500, 4)).await;

        let service = OrderPlacementService::new(
            ledger.clone(),
            ledger.clone(),
            BrokenInvoices,
            TracingNotifier,
        );
        let err = service
            .place_order(&actor(1), request(vec![line(1, 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::System(_)));

        assert_eq!(ledger.product(ProductId::new(1)).await.unwrap().stock, 4);
        assert!(ledger.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_addresses_the_buyer() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 500, 4)).await;

        let notifier = RecordingNotifier::default();
        let service = OrderPlacementService::new(
            ledger.clone(),
            ledger.clone(),
            ReferenceInvoiceGenerator,
            notifier.clone(),
        );
        let order = service
            .place_order(&actor(1), request(vec![line(1, 1)]))
            .await
            .unwrap();

        assert_eq!(order.customer_email.as_str(), "buyer@example.com");
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Notification::OrderConfirmation { recipient, order: sent_order } => {
                assert_eq!(recipient.as_str(), "buyer@example.com");
                assert_eq!(sent_order.id, order.id);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_order() {
        let ledger = MemoryLedger::new();
        ledger.insert_product(product(1, 500, 4)).await;

        let service = OrderPlacementService::new(
            ledger.clone(),
            ledger.clone(),
            ReferenceInvoiceGenerator,
            BrokenNotifier,
        );
        let order = service
            .place_order(&actor(1), request(vec![line(1, 1)]))
            .await
            .unwrap();

        assert_eq!(ledger.orders().await.len(), 1);
        assert_eq!(ledger.orders().await[0].id, order.id);
    }

    #[tokio::test]
    async fn test_actor_without_permission_rejected() {
        let ledger = MemoryLedger::new();
        let no_perms = Actor::new(
            UserId::new(1),
            Email::parse("viewer@example.com").unwrap(),
            std::collections::HashSet::new(),
        );

        let err = service(&ledger)
            .place_order(&no_perms, request(vec![line(1, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Forbidden(_)));
    }
}
