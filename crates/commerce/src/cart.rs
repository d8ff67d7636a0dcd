//! Cart service.
//!
//! Carts always belong to the acting user, so there is no separate
//! ownership check; the actor's id is the cart key. Stock is checked
//! here only as a courtesy to the shopper; the authoritative check
//! happens inside the placement transaction.

use sqlx::PgPool;

use clementine_core::{CartItemId, ProductId};

use crate::activity;
use crate::auth::{Actor, Permission};
use crate::db::{CartRepository, ProductRepository};
use crate::error::{CommerceError, Result};
use crate::models::{Cart, Product};

/// Cart reads and mutations for the acting user.
pub struct CartService {
    pool: PgPool,
}

impl CartService {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn carts(&self) -> CartRepository<'_> {
        CartRepository::new(&self.pool)
    }

    /// The actor's cart, created empty on first access.
    ///
    /// # Errors
    ///
    /// Returns `Repository` errors from the database.
    pub async fn view(&self, actor: &Actor) -> Result<Cart> {
        Ok(self.carts().get_or_create(actor.user_id()).await?)
    }

    /// Add a product to the actor's cart, summing quantities on repeat
    /// adds.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a zero quantity, `NotFound` /
    /// `ProductUnavailable` / `InsufficientStock` for products that
    /// cannot be added.
    pub async fn add_item(
        &self,
        actor: &Actor,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        actor.require(Permission::PlaceOrders)?;
        if quantity == 0 {
            return Err(CommerceError::Validation(
                "quantity must be positive".to_string(),
            ));
        }

        let product = self.sellable_product(product_id).await?;
        if !product.has_stock(quantity) {
            return Err(CommerceError::InsufficientStock { name: product.name });
        }

        let cart = self.carts().get_or_create(actor.user_id()).await?;
        self.carts()
            .add_item(cart.id, product_id, quantity, product.price)
            .await?;
        activity::cart_changed(actor.user_id(), "cart_item_added", Some(product_id));

        self.view(actor).await
    }

    /// Set the quantity of an item in the actor's cart.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the item isn't in the cart,
    /// `InsufficientStock` if the new quantity exceeds stock on hand.
    pub async fn update_item(
        &self,
        actor: &Actor,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart> {
        actor.require(Permission::PlaceOrders)?;
        if quantity == 0 {
            return Err(CommerceError::Validation(
                "quantity must be positive".to_string(),
            ));
        }

        let cart = self.carts().get_or_create(actor.user_id()).await?;
        let item = cart
            .items
            .iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| CommerceError::NotFound(format!("cart item {item_id}")))?;

        let product = self.sellable_product(item.product_id).await?;
        if !product.has_stock(quantity) {
            return Err(CommerceError::InsufficientStock { name: product.name });
        }

        self.carts().update_item(cart.id, item_id, quantity).await?;
        activity::cart_changed(actor.user_id(), "cart_item_updated", Some(item.product_id));

        self.view(actor).await
    }

    /// Remove an item from the actor's cart.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the item isn't in the cart.
    pub async fn remove_item(&self, actor: &Actor, item_id: CartItemId) -> Result<Cart> {
        actor.require(Permission::PlaceOrders)?;

        let cart = self.carts().get_or_create(actor.user_id()).await?;
        self.carts().remove_item(cart.id, item_id).await?;
        activity::cart_changed(actor.user_id(), "cart_item_removed", None);

        self.view(actor).await
    }

    /// Empty the actor's cart.
    ///
    /// # Errors
    ///
    /// Returns `Repository` errors from the database.
    pub async fn clear(&self, actor: &Actor) -> Result<Cart> {
        actor.require(Permission::PlaceOrders)?;

        let cart = self.carts().get_or_create(actor.user_id()).await?;
        self.carts().clear(cart.id).await?;
        activity::cart_changed(actor.user_id(), "cart_cleared", None);

        self.view(actor).await
    }

    async fn sellable_product(&self, id: ProductId) -> Result<Product> {
        let product = ProductRepository::new(&self.pool)
            .get(id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("product {id}")))?;
        if !product.is_active {
            return Err(CommerceError::ProductUnavailable { name: product.name });
        }
        Ok(product)
    }
}
