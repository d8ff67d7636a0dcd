//! Customer notification seam.
//!
//! Delivery (mail, push, webhooks) lives outside this crate. Dispatch
//! happens after commit and failures are logged, never propagated: a
//! placed order is placed whether or not the confirmation went out.

use std::future::Future;

use clementine_core::{Email, OrderStatus};

use crate::models::Order;

/// Notification could not be dispatched.
#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// What to tell the customer, and where.
///
/// The recipient comes from the email snapshotted on the order, so
/// dispatchers never need to resolve a user id against the external
/// user directory.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Their order was placed.
    OrderConfirmation { recipient: Email, order: Order },
    /// Their order moved to a new status.
    OrderStatusUpdated {
        recipient: Email,
        order: Order,
        status: OrderStatus,
    },
}

/// Dispatches customer notifications.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Dispatcher that only logs; the default until a delivery channel is
/// wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationDispatcher for TracingNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::OrderConfirmation { recipient, order } => {
                tracing::info!(
                    order_number = %order.order_number(),
                    recipient = %recipient,
                    total = %order.total_amount,
                    "order confirmation"
                );
            }
            Notification::OrderStatusUpdated {
                recipient,
                order,
                status,
            } => {
                tracing::info!(
                    order_number = %order.order_number(),
                    recipient = %recipient,
                    status = %status,
                    "order status update"
                );
            }
        }
        Ok(())
    }
}
