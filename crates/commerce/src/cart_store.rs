//! Cart lookup seam for order placement.
//!
//! Placement only ever needs a user's cart as order lines; the full cart
//! CRUD lives in [`crate::db::CartRepository`].

use std::future::Future;

use sqlx::PgPool;

use clementine_core::UserId;

use crate::db::{CartRepository, RepositoryError};
use crate::ledger::MemoryLedger;
use crate::models::OrderLine;

/// Reads a user's cart as order lines.
pub trait CartStore: Send + Sync {
    /// The user's cart contents, empty if they have no cart.
    fn lines_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<OrderLine>, RepositoryError>> + Send;
}

/// [`CartStore`] over the `PostgreSQL` cart tables.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CartStore for PgCartStore {
    async fn lines_for_user(&self, user_id: UserId) -> Result<Vec<OrderLine>, RepositoryError> {
        let repo = CartRepository::new(&self.pool);
        let cart = repo.get_or_create(user_id).await?;
        repo.lines(cart.id).await
    }
}

/// The in-memory ledger doubles as a cart store so tests share one state.
impl CartStore for MemoryLedger {
    async fn lines_for_user(&self, user_id: UserId) -> Result<Vec<OrderLine>, RepositoryError> {
        Ok(self.cart_lines(user_id).await)
    }
}
