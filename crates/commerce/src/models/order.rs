//! Order models, filters and dashboard aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clementine_core::{
    Email, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, Price, ProductId,
    UserId,
};

/// A placed order.
///
/// `total_amount` is immutable after creation; status and payment status
/// are mutated by the lifecycle operations. The customer email is
/// snapshotted at placement (the user directory lives outside this crate)
/// so lifecycle notifications always have a recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer_email: Email,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub total_amount: Price,
    pub shipping: ShippingAddress,
    /// Reference to the generated invoice document.
    pub invoice_ref: Option<String>,
    /// Carrier tracking reference, set when the order ships.
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Human-facing order number, e.g. `ORD-000042`.
    #[must_use]
    pub fn order_number(&self) -> String {
        format!("ORD-{:06}", self.id.as_i32())
    }

    /// Parse an order number back into an id, for the public tracking
    /// lookup.
    #[must_use]
    pub fn parse_order_number(s: &str) -> Option<OrderId> {
        let id: i32 = s.strip_prefix("ORD-")?.parse().ok()?;
        (id > 0).then_some(OrderId::new(id))
    }

    /// Whether the order has been paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Shipping destination captured at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Basic structural validation of the destination fields.
    ///
    /// # Errors
    ///
    /// Returns the name of the first empty field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.address.trim().is_empty() {
            return Err("shipping_address");
        }
        if self.city.trim().is_empty() {
            return Err("shipping_city");
        }
        if self.postal_code.trim().is_empty() {
            return Err("shipping_postal_code");
        }
        if self.country.trim().is_empty() {
            return Err("shipping_country");
        }
        Ok(())
    }
}

/// One line of a placed order, with price snapshots taken at placement.
///
/// The product reference may outlive the live product; the snapshots keep
/// the order self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    /// Unit price at the time the order was placed.
    pub unit_price: Price,
    /// `unit_price * quantity`, stored so totals stay auditable.
    pub line_total: Price,
}

/// An order together with its items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A requested order line before validation and pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Validated, priced line ready for persistence.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

/// Result of the external payment flow, recorded against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid,
    Failed,
    Refunded,
}

impl PaymentOutcome {
    /// The payment status this outcome transitions to.
    #[must_use]
    pub const fn target_status(self) -> PaymentStatus {
        match self {
            Self::Paid => PaymentStatus::Paid,
            Self::Failed => PaymentStatus::Failed,
            Self::Refunded => PaymentStatus::Refunded,
        }
    }
}

/// Order listing filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Restrict to one user's orders; the service sets this for non-admin actors.
    pub user_id: Option<UserId>,
    pub placed_after: Option<DateTime<Utc>>,
    pub placed_before: Option<DateTime<Utc>>,
}

/// Per-status order counts for the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub shipped: i64,
    pub delivered: i64,
    pub cancelled: i64,
}

/// Aggregated order figures for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_orders: i64,
    pub total_revenue: Price,
    pub average_order_value: Price,
    pub status_counts: StatusCounts,
    pub paid_orders: i64,
    pub pending_payments: i64,
    pub failed_payments: i64,
    pub refunded_payments: i64,
    /// Orders placed in the last 30 days.
    pub recent_orders: i64,
    /// Revenue from the last 30 days.
    pub recent_revenue: Price,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_padding() {
        let order = Order {
            id: OrderId::new(42),
            user_id: UserId::new(1),
            customer_email: Email::parse("buyer@example.com").unwrap(),
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::Online,
            payment_status: PaymentStatus::Pending,
            total_amount: Price::from_cents(100),
            shipping: ShippingAddress {
                address: "1 Main St".to_string(),
                city: "Lyon".to_string(),
                postal_code: "69000".to_string(),
                country: "FR".to_string(),
            },
            invoice_ref: None,
            tracking_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(order.order_number(), "ORD-000042");
    }

    #[test]
    fn test_parse_order_number() {
        assert_eq!(
            Order::parse_order_number("ORD-000042"),
            Some(OrderId::new(42))
        );
        assert_eq!(
            Order::parse_order_number("ORD-1000042"),
            Some(OrderId::new(1_000_042))
        );
        assert_eq!(Order::parse_order_number("000042"), None);
        assert_eq!(Order::parse_order_number("ORD-"), None);
        assert_eq!(Order::parse_order_number("ORD-0"), None);
        assert_eq!(Order::parse_order_number("ORD-abc"), None);
    }

    #[test]
    fn test_shipping_address_validate() {
        let mut shipping = ShippingAddress {
            address: "1 Main St".to_string(),
            city: "Lyon".to_string(),
            postal_code: "69000".to_string(),
            country: "FR".to_string(),
        };
        assert!(shipping.validate().is_ok());

        shipping.city = "  ".to_string();
        assert_eq!(shipping.validate(), Err("shipping_city"));
    }

    #[test]
    fn test_payment_outcome_targets() {
        assert_eq!(PaymentOutcome::Paid.target_status(), PaymentStatus::Paid);
        assert_eq!(
            PaymentOutcome::Refunded.target_status(),
            PaymentStatus::Refunded
        );
    }
}
