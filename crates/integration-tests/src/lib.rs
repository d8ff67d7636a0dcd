//! Integration tests for Clementine.
//!
//! These tests run the commerce services against the in-memory ledger and
//! cache store, so they need no running database. The in-memory ledger
//! mirrors the transactional semantics of the `PostgreSQL` one (rollback
//! on drop, serialized placements), which is what the concurrency tests
//! rely on.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p clementine-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::Utc;

use clementine_core::{Email, PaymentMethod, Price, ProductId, UserId};

use clementine_commerce::auth::Actor;
use clementine_commerce::invoice::ReferenceInvoiceGenerator;
use clementine_commerce::ledger::MemoryLedger;
use clementine_commerce::models::{OrderLine, Product, ShippingAddress};
use clementine_commerce::notify::TracingNotifier;
use clementine_commerce::orders::{OrderPlacementService, PlacementRequest};

/// Default placement service wiring over a shared in-memory ledger.
pub type TestPlacementService =
    OrderPlacementService<MemoryLedger, MemoryLedger, ReferenceInvoiceGenerator, TracingNotifier>;

/// A customer actor for tests.
///
/// # Panics
///
/// Panics if the fixture email fails to parse, which it never does.
#[must_use]
pub fn customer(id: i32) -> Actor {
    let email = Email::parse(&format!("customer{id}@example.com")).expect("valid fixture email");
    Actor::customer(UserId::new(id), email)
}

/// A product fixture with the given price and stock.
#[must_use]
pub fn product(id: i32, price_cents: i64, stock: i32) -> Product {
    let now = Utc::now();
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        slug: format!("product-{id}"),
        description: String::new(),
        price: Price::from_cents(price_cents),
        stock,
        image: None,
        category_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// A single order line.
#[must_use]
pub const fn line(product_id: i32, quantity: u32) -> OrderLine {
    OrderLine {
        product_id: ProductId::new(product_id),
        quantity,
    }
}

/// A placement request with a valid shipping address.
#[must_use]
pub fn request(lines: Vec<OrderLine>) -> PlacementRequest {
    PlacementRequest {
        lines,
        payment_method: PaymentMethod::Online,
        shipping: ShippingAddress {
            address: "12 Rue de la Paix".to_string(),
            city: "Paris".to_string(),
            postal_code: "75002".to_string(),
            country: "FR".to_string(),
        },
    }
}

/// Placement service sharing the given ledger for storage and carts.
#[must_use]
pub fn placement_service(ledger: &MemoryLedger) -> TestPlacementService {
    OrderPlacementService::new(
        ledger.clone(),
        ledger.clone(),
        ReferenceInvoiceGenerator,
        TracingNotifier,
    )
}
