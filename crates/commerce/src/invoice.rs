//! Invoice generation seam.
//!
//! Rendering and storage of the actual document happen elsewhere; the
//! placement flow only needs a stable reference to record on the order.
//! Generation runs before commit, so a failure aborts the whole
//! placement rather than leaving an order without an invoice.

use std::future::Future;

use uuid::Uuid;

use crate::models::{NewOrderItem, Order};

/// Invoice generation failed.
#[derive(Debug, thiserror::Error)]
#[error("invoice generation failed: {0}")]
pub struct InvoiceError(pub String);

/// Produces an invoice reference for a freshly placed order.
pub trait InvoiceGenerator: Send + Sync {
    /// Generate the invoice and return its reference.
    fn generate(
        &self,
        order: &Order,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<String, InvoiceError>> + Send;
}

/// Issues `INV-{order_number}-{uuid}` references without rendering a
/// document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceInvoiceGenerator;

impl InvoiceGenerator for ReferenceInvoiceGenerator {
    async fn generate(
        &self,
        order: &Order,
        _items: &[NewOrderItem],
    ) -> Result<String, InvoiceError> {
        Ok(format!(
            "INV-{}-{}",
            order.order_number(),
            Uuid::new_v4().simple()
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use clementine_core::{Email, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Price, UserId};

    use super::*;
    use crate::models::ShippingAddress;

    #[tokio::test]
    async fn test_reference_embeds_order_number() {
        let order = Order {
            id: OrderId::new(7),
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

        let reference = ReferenceInvoiceGenerator
            .generate(&order, &[])
            .await
            .unwrap();
        assert!(reference.starts_with("INV-ORD-000007-"));
    }
}
