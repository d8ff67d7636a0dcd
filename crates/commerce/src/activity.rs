//! Activity logging.
//!
//! Structured `tracing` events under the `activity` target, with entity ids
//! as fields so operators can follow what happened to an order or product.
//! Persisting these events is a concern of the logging backend, not of this
//! crate.

use clementine_core::{OrderId, OrderStatus, PaymentStatus, ProductId, UserId};

use crate::auth::Actor;
use crate::models::Order;

/// Log a successfully placed order.
pub fn order_placed(actor: &Actor, order: &Order, item_count: usize) {
    tracing::info!(
        target: "activity",
        action = "order_placed",
        order_id = %order.id,
        order_number = %order.order_number(),
        user_id = %actor.user_id(),
        total_amount = %order.total_amount,
        item_count,
        "order placed"
    );
}

/// Log an order status change.
pub fn order_status_changed(
    actor: &Actor,
    order_id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
) {
    tracing::info!(
        target: "activity",
        action = "order_status_changed",
        order_id = %order_id,
        user_id = %actor.user_id(),
        from = %from,
        to = %to,
        "order status changed"
    );
}

/// Log a payment status change.
pub fn payment_recorded(actor: &Actor, order_id: OrderId, from: PaymentStatus, to: PaymentStatus) {
    tracing::info!(
        target: "activity",
        action = "payment_recorded",
        order_id = %order_id,
        user_id = %actor.user_id(),
        from = %from,
        to = %to,
        "payment recorded"
    );
}

/// Log a product write (create/update/delete).
pub fn product_changed(actor: &Actor, action: &'static str, product_id: ProductId) {
    tracing::info!(
        target: "activity",
        action,
        product_id = %product_id,
        user_id = %actor.user_id(),
        "product changed"
    );
}

/// Log a category write (create/update/delete).
pub fn category_changed(actor: &Actor, action: &'static str, category_id: i32) {
    tracing::info!(
        target: "activity",
        action,
        category_id,
        user_id = %actor.user_id(),
        "category changed"
    );
}

/// Log a cart mutation.
pub fn cart_changed(user_id: UserId, action: &'static str, product_id: Option<ProductId>) {
    tracing::info!(
        target: "activity",
        action,
        user_id = %user_id,
        product_id = product_id.map(|id| id.as_i32()),
        "cart changed"
    );
}
