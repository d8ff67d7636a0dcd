//! Cart models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clementine_core::{CartId, CartItemId, Price, ProductId, UserId};

/// A user's shopping cart with its items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Whether the cart holds no items.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One product line in a cart.
///
/// The stored price is informational (shown in the cart view); order
/// placement re-reads the live product price inside the transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub price: Price,
}
