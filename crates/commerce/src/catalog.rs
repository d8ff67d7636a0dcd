//! Catalog service: cached reads, invalidating writes.
//!
//! Every read goes through the read-through cache; every write to an
//! entity drops all cached entries for that entity before returning, so
//! readers never see a listing older than the last write (TTLs only cap
//! staleness if invalidation is missed).

use sqlx::PgPool;

use clementine_core::{CategoryId, ProductId};

use crate::activity;
use crate::auth::{Actor, Permission};
use crate::cache::{CacheKey, CacheStore, ReadThroughCache};
use crate::db::{CategoryRepository, ProductRepository};
use crate::error::{CommerceError, Result};
use crate::models::{
    Category, CategoryUpdate, NewCategory, NewProduct, Page, Pagination, Product, ProductFilter,
    ProductUpdate,
};

const PRODUCTS: &str = "products";
const CATEGORIES: &str = "categories";

/// Catalog reads and admin writes.
pub struct CatalogService<S> {
    pool: PgPool,
    cache: ReadThroughCache<S>,
}

impl<S: CacheStore> CatalogService<S> {
    pub const fn new(pool: PgPool, cache: ReadThroughCache<S>) -> Self {
        Self { pool, cache }
    }

    fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(&self.pool)
    }

    fn categories(&self) -> CategoryRepository<'_> {
        CategoryRepository::new(&self.pool)
    }

    /// List products, served from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `Repository` errors from the database; cache failures
    /// degrade to a direct read.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<Product>> {
        let key = CacheKey::listing(
            PRODUCTS,
            &filter.cache_params(pagination.page(), pagination.per_page()),
        );
        self.cache
            .get_or_load(&key, || async {
                self.products()
                    .list(filter, pagination)
                    .await
                    .map_err(CommerceError::from)
            })
            .await
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown or deactivated ids; this is the
    /// storefront read path and inactive products are not visible on it.
    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        let key = CacheKey::detail(PRODUCTS, id.as_i32());
        self.cache
            .get_or_load(&key, || async {
                self.products()
                    .get(id)
                    .await?
                    .filter(|product| product.is_active)
                    .ok_or_else(|| CommerceError::NotFound(format!("product {id}")))
            })
            .await
    }

    /// Get a product by its slug (storefront URLs).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown slugs.
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<Product> {
        let key = CacheKey::listing(PRODUCTS, &[("slug", slug.to_string())]);
        self.cache
            .get_or_load(&key, || async {
                self.products()
                    .get_by_slug(slug)
                    .await?
                    .filter(|product| product.is_active)
                    .ok_or_else(|| CommerceError::NotFound(format!("product '{slug}'")))
            })
            .await
    }

    /// Create a product and drop cached product reads.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageProducts`, `Validation` for a
    /// blank name or negative price/stock.
    pub async fn create_product(&self, actor: &Actor, new: NewProduct) -> Result<Product> {
        actor.require(Permission::ManageProducts)?;
        validate_product_fields(Some(&new.name), Some(new.price), Some(new.stock))?;

        let product = self.products().create(&new).await?;
        self.cache.invalidate_entity(PRODUCTS).await;
        activity::product_changed(actor, "product_created", product.id);
        Ok(product)
    }

    /// Update a product and drop cached product reads.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids, `Validation` for invalid fields.
    pub async fn update_product(
        &self,
        actor: &Actor,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product> {
        actor.require(Permission::ManageProducts)?;
        validate_product_fields(update.name.as_deref(), update.price, update.stock)?;

        let product = self.products().update(id, &update).await?;
        self.cache.invalidate_entity(PRODUCTS).await;
        activity::product_changed(actor, "product_updated", id);
        Ok(product)
    }

    /// Delete a product and drop cached product reads.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub async fn delete_product(&self, actor: &Actor, id: ProductId) -> Result<()> {
        actor.require(Permission::ManageProducts)?;

        if !self.products().delete(id).await? {
            return Err(CommerceError::NotFound(format!("product {id}")));
        }
        self.cache.invalidate_entity(PRODUCTS).await;
        activity::product_changed(actor, "product_deleted", id);
        Ok(())
    }

    /// List all categories, cached.
    ///
    /// # Errors
    ///
    /// Returns `Repository` errors from the database.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let key = CacheKey::listing(CATEGORIES, &[]);
        self.cache
            .get_or_load(&key, || async {
                self.categories().list().await.map_err(CommerceError::from)
            })
            .await
    }

    /// Get a category by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub async fn get_category(&self, id: CategoryId) -> Result<Category> {
        let key = CacheKey::detail(CATEGORIES, id.as_i32());
        self.cache
            .get_or_load(&key, || async {
                self.categories()
                    .get(id)
                    .await?
                    .ok_or_else(|| CommerceError::NotFound(format!("category {id}")))
            })
            .await
    }

    /// Create a category and drop cached category reads.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` without `ManageCategories`, `Validation` for a
    /// blank name.
    pub async fn create_category(&self, actor: &Actor, new: NewCategory) -> Result<Category> {
        actor.require(Permission::ManageCategories)?;
        if new.name.trim().is_empty() {
            return Err(CommerceError::Validation(
                "name must not be empty".to_string(),
            ));
        }

        let category = self.categories().create(&new).await?;
        self.cache.invalidate_entity(CATEGORIES).await;
        activity::category_changed(actor, "category_created", category.id.as_i32());
        Ok(category)
    }

    /// Update a category and drop cached category reads.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub async fn update_category(
        &self,
        actor: &Actor,
        id: CategoryId,
        update: CategoryUpdate,
    ) -> Result<Category> {
        actor.require(Permission::ManageCategories)?;
        if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(CommerceError::Validation(
                "name must not be empty".to_string(),
            ));
        }

        let category = self.categories().update(id, &update).await?;
        self.cache.invalidate_entity(CATEGORIES).await;
        activity::category_changed(actor, "category_updated", id.as_i32());
        Ok(category)
    }

    /// Delete a category. Products keep existing without one.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub async fn delete_category(&self, actor: &Actor, id: CategoryId) -> Result<()> {
        actor.require(Permission::ManageCategories)?;

        if !self.categories().delete(id).await? {
            return Err(CommerceError::NotFound(format!("category {id}")));
        }
        self.cache.invalidate_entity(CATEGORIES).await;
        // Product listings filter by category id, so cached pages may
        // reference the deleted category.
        self.cache.invalidate_entity(PRODUCTS).await;
        activity::category_changed(actor, "category_deleted", id.as_i32());
        Ok(())
    }
}

fn validate_product_fields(
    name: Option<&str>,
    price: Option<clementine_core::Price>,
    stock: Option<i32>,
) -> Result<()> {
    if name.is_some_and(|name| name.trim().is_empty()) {
        return Err(CommerceError::Validation(
            "name must not be empty".to_string(),
        ));
    }
    if price.is_some_and(|price| price.is_negative()) {
        return Err(CommerceError::Validation(
            "price must not be negative".to_string(),
        ));
    }
    if stock.is_some_and(|stock| stock < 0) {
        return Err(CommerceError::Validation(
            "stock must not be negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clementine_core::Price;

    use super::*;

    #[test]
    fn test_validate_product_fields() {
        assert!(
            validate_product_fields(Some("Widget"), Some(Price::from_cents(100)), Some(3)).is_ok()
        );
        assert!(validate_product_fields(None, None, None).is_ok());
        assert!(validate_product_fields(Some("  "), None, None).is_err());
        assert!(validate_product_fields(Some("Widget"), Some(Price::from_cents(-1)), None).is_err());
        assert!(validate_product_fields(Some("Widget"), None, Some(-2)).is_err());
    }
}
