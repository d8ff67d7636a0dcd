//! Order lifecycle services.
//!
//! Placement has its own module; everything after placement (listing,
//! status moves, cancellation, delivery confirmation, payment recording
//! and the dashboard) lives in [`OrderService`].

use sqlx::PgPool;

use clementine_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus};

use crate::activity;
use crate::auth::{Actor, Permission};
use crate::db::OrderRepository;
use crate::error::{CommerceError, Result};
use crate::models::{DashboardStats, Order, OrderFilter, OrderWithItems, Page, Pagination,
    PaymentOutcome};
use crate::notify::{Notification, NotificationDispatcher};

pub mod placement;

pub use placement::{OrderPlacementService, PlacementRequest};

/// Whether an admin may move an order from one status to another.
///
/// Fulfillment only moves forward (pending, processing, shipped,
/// delivered); any non-terminal order may still be cancelled.
#[must_use]
pub fn valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::{Cancelled, Delivered, Pending, Processing, Shipped};

    if from.is_terminal() || from == to {
        return false;
    }
    matches!(
        (from, to),
        (Pending | Processing | Shipped, Cancelled)
            | (Pending, Processing)
            | (Processing, Shipped)
            | (Shipped, Delivered)
    )
}

/// Order lifecycle operations over the database.
pub struct OrderService<N> {
    pool: PgPool,
    notifier: N,
}

impl<N: NotificationDispatcher> OrderService<N> {
    pub const fn new(pool: PgPool, notifier: N) -> Self {
        Self { pool, notifier }
    }

    fn repo(&self) -> OrderRepository<'_> {
        OrderRepository::new(&self.pool)
    }

    /// List orders. Actors without `ManageOrders` only ever see their own.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` if the actor may not view orders at all.
    pub async fn list(
        &self,
        actor: &Actor,
        mut filter: OrderFilter,
        pagination: Pagination,
    ) -> Result<Page<Order>> {
        if !actor.has(Permission::ManageOrders) {
            actor.require(Permission::ViewOwnOrders)?;
            filter.user_id = Some(actor.user_id());
        }
        Ok(self.repo().list(&filter, pagination).await?)
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids and `Forbidden` when the actor
    /// neither owns the order nor manages orders.
    pub async fn get(&self, actor: &Actor, id: OrderId) -> Result<OrderWithItems> {
        let order = self
            .repo()
            .get_with_items(id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("order {id}")))?;
        actor.require_owner_or(order.order.user_id, Permission::ManageOrders)?;
        Ok(order)
    }

    /// Move an order to a new fulfillment status (admin flow).
    ///
    /// Setting the status it already has is a no-op: nothing is written
    /// and no notification goes out. A tracking number may accompany the
    /// move to shipped and is recorded on the order.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for transitions that are not allowed, or for
    /// a tracking number on a transition other than shipped.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: OrderId,
        to: OrderStatus,
        tracking_number: Option<String>,
    ) -> Result<Order> {
        actor.require(Permission::ManageOrders)?;

        if tracking_number.is_some() && to != OrderStatus::Shipped {
            return Err(CommerceError::Validation(
                "tracking number only applies when shipping".to_string(),
            ));
        }

        let order = self.fetch(id).await?;
        if order.status == to {
            return Ok(order);
        }
        if !valid_transition(order.status, to) {
            return Err(CommerceError::Validation(format!(
                "cannot move order from {} to {to}",
                order.status
            )));
        }

        self.repo().update_status(id, to).await?;
        if let Some(tracking_number) = tracking_number {
            self.repo().set_tracking_number(id, &tracking_number).await?;
        }
        activity::order_status_changed(actor, id, order.status, to);
        self.notify_status(order, to).await;

        self.fetch(id).await
    }

    /// Public tracking lookup by order number, e.g. `ORD-000042`.
    ///
    /// No actor is required; order numbers are the customer-facing
    /// reference printed on confirmations.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for malformed or unknown order numbers.
    pub async fn track(&self, order_number: &str) -> Result<Order> {
        let id = Order::parse_order_number(order_number)
            .ok_or_else(|| CommerceError::NotFound(format!("order {order_number}")))?;
        self.fetch(id).await
    }

    /// Cancel a pending order (customer flow).
    ///
    /// Stock consumed by the order is not restored; restocking is a
    /// manual decision for operators.
    ///
    /// # Errors
    ///
    /// Returns `Validation` once the order is past pending.
    pub async fn cancel(&self, actor: &Actor, id: OrderId) -> Result<Order> {
        let order = self.fetch(id).await?;
        actor.require_owner_or(order.user_id, Permission::ManageOrders)?;

        if !order.status.is_cancellable() {
            return Err(CommerceError::Validation(format!(
                "order in status {} can no longer be cancelled",
                order.status
            )));
        }

        self.repo().update_status(id, OrderStatus::Cancelled).await?;
        activity::order_status_changed(actor, id, order.status, OrderStatus::Cancelled);
        self.notify_status(order, OrderStatus::Cancelled).await;

        self.fetch(id).await
    }

    /// Customer confirms their shipped order arrived.
    ///
    /// Cash-on-delivery orders are marked paid at the same time, since
    /// delivery is when the cash changes hands.
    ///
    /// # Errors
    ///
    /// Returns `Validation` unless the order is currently shipped.
    pub async fn confirm_delivery(&self, actor: &Actor, id: OrderId) -> Result<Order> {
        let order = self.fetch(id).await?;
        actor.require_owner_or(order.user_id, Permission::ManageOrders)?;

        if order.status != OrderStatus::Shipped {
            return Err(CommerceError::Validation(format!(
                "only shipped orders can be confirmed, order is {}",
                order.status
            )));
        }

        self.repo().update_status(id, OrderStatus::Delivered).await?;
        activity::order_status_changed(actor, id, order.status, OrderStatus::Delivered);

        if order.payment_method == PaymentMethod::CashOnDelivery
            && order.payment_status == PaymentStatus::Pending
        {
            self.repo()
                .update_payment_status(id, PaymentStatus::Paid)
                .await?;
            activity::payment_recorded(actor, id, order.payment_status, PaymentStatus::Paid);
        }

        self.notify_status(order, OrderStatus::Delivered).await;
        self.fetch(id).await
    }

    /// Record the outcome reported by the payment flow.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the payment status cannot move to the
    /// outcome's target (for example refunding an unpaid order).
    pub async fn record_payment(
        &self,
        actor: &Actor,
        id: OrderId,
        outcome: PaymentOutcome,
    ) -> Result<Order> {
        actor.require(Permission::ManageOrders)?;

        let order = self.fetch(id).await?;
        let target = outcome.target_status();
        if !order.payment_status.can_become(target) {
            return Err(CommerceError::Validation(format!(
                "payment cannot move from {} to {target}",
                order.payment_status
            )));
        }

        self.repo().update_payment_status(id, target).await?;
        activity::payment_recorded(actor, id, order.payment_status, target);

        self.fetch(id).await
    }

    /// Dashboard aggregates.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without the `ViewDashboard` permission.
    pub async fn stats(&self, actor: &Actor) -> Result<DashboardStats> {
        actor.require(Permission::ViewDashboard)?;
        Ok(self.repo().stats().await?)
    }

    async fn fetch(&self, id: OrderId) -> Result<Order> {
        self.repo()
            .get(id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("order {id}")))
    }

    async fn notify_status(&self, order: Order, status: OrderStatus) {
        let order_id = order.id;
        let recipient = order.customer_email.clone();
        if let Err(e) = self
            .notifier
            .dispatch(Notification::OrderStatusUpdated {
                recipient,
                order,
                status,
            })
            .await
        {
            tracing::warn!(order_id = %order_id, error = %e, "status notification not sent");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        use OrderStatus::{Delivered, Pending, Processing, Shipped};

        assert!(valid_transition(Pending, Processing));
        assert!(valid_transition(Processing, Shipped));
        assert!(valid_transition(Shipped, Delivered));
    }

    #[test]
    fn test_cancel_allowed_until_delivered() {
        use OrderStatus::{Cancelled, Delivered, Pending, Processing, Shipped};

        assert!(valid_transition(Pending, Cancelled));
        assert!(valid_transition(Processing, Cancelled));
        assert!(valid_transition(Shipped, Cancelled));
        assert!(!valid_transition(Delivered, Cancelled));
        assert!(!valid_transition(Cancelled, Cancelled));
    }

    #[test]
    fn test_no_backwards_or_skipping_moves() {
        use OrderStatus::{Delivered, Pending, Processing, Shipped};

        assert!(!valid_transition(Processing, Pending));
        assert!(!valid_transition(Pending, Shipped));
        assert!(!valid_transition(Pending, Delivered));
        assert!(!valid_transition(Delivered, Shipped));
    }
}
