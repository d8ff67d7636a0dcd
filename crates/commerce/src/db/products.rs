//! Product repository.
//!
//! Listing queries are built at runtime with `QueryBuilder` because the
//! filter combinations are arbitrary; sort columns go through the
//! [`ProductSort`](crate::models::ProductSort) whitelist, never raw input.

use sqlx::{PgPool, Postgres, QueryBuilder};

use clementine_core::{CategoryId, Price, ProductId};

use super::RepositoryError;
use crate::models::{NewProduct, Page, Pagination, Product, ProductFilter, ProductUpdate, slugify};

/// How many suffixed slugs to try before giving up on a unique one.
const MAX_SLUG_ATTEMPTS: u32 = 50;

const PRODUCT_COLUMNS: &str =
    "id, name, slug, description, price, stock, image, category_id, is_active, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: String,
    price: Price,
    stock: i32,
    image: Option<String>,
    category_id: Option<CategoryId>,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            stock: row.stock,
            image: row.image,
            category_id: row.category_id,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active products matching the filter, newest first by default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<Product>, RepositoryError> {
        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products WHERE is_active = TRUE");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = TRUE"
        ));
        push_filters(&mut query, filter);
        query.push(format!(
            " ORDER BY {} {}",
            filter.sort_by.column(),
            filter.sort_order.keyword()
        ));
        query.push(" LIMIT ");
        query.push_bind(pagination.limit());
        query.push(" OFFSET ");
        query.push_bind(pagination.offset());

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.pool).await?;
        let items = rows.into_iter().map(Product::from).collect();

        Ok(Page::new(items, total, pagination))
    }

    /// Get a product by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Create a product, deriving a unique slug from its name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no free slug could be found,
    /// `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let base_slug = slugify(&new.name);

        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let slug = if attempt == 0 {
                base_slug.clone()
            } else {
                format!("{base_slug}-{attempt}")
            };

            let result: Result<ProductRow, sqlx::Error> = sqlx::query_as(&format!(
                "INSERT INTO products (name, slug, description, price, stock, image, category_id, is_active) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 RETURNING {PRODUCT_COLUMNS}"
            ))
            .bind(&new.name)
            .bind(&slug)
            .bind(&new.description)
            .bind(new.price)
            .bind(new.stock)
            .bind(&new.image)
            .bind(new.category_id)
            .bind(new.is_active)
            .fetch_one(self.pool)
            .await;

            match result {
                Ok(row) => return Ok(row.into()),
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {}
                Err(e) => return Err(RepositoryError::Database(e)),
            }
        }

        Err(RepositoryError::Conflict(format!(
            "could not derive a unique slug for '{}'",
            new.name
        )))
    }

    /// Apply a partial update; a new name refreshes the slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist,
    /// `RepositoryError::Conflict` if a unique slug could not be derived.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        if update.is_empty() {
            return self.get(id).await?.ok_or(RepositoryError::NotFound);
        }

        let base_slug = update.name.as_deref().map(slugify);

        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let slug = base_slug.as_ref().map(|base| {
                if attempt == 0 {
                    base.clone()
                } else {
                    format!("{base}-{attempt}")
                }
            });

            let result = self.try_update(id, update, slug.as_deref()).await;
            match result {
                Err(RepositoryError::Database(sqlx::Error::Database(db_err)))
                    if db_err.is_unique_violation() && base_slug.is_some() => {}
                other => return other,
            }
        }

        Err(RepositoryError::Conflict(
            "could not derive a unique slug".to_string(),
        ))
    }

    async fn try_update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
        slug: Option<&str>,
    ) -> Result<Product, RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE products SET updated_at = now()");

        if let Some(name) = &update.name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(slug) = slug {
            query.push(", slug = ").push_bind(slug);
        }
        if let Some(description) = &update.description {
            query.push(", description = ").push_bind(description);
        }
        if let Some(price) = update.price {
            query.push(", price = ").push_bind(price);
        }
        if let Some(stock) = update.stock {
            query.push(", stock = ").push_bind(stock);
        }
        if let Some(image) = &update.image {
            query.push(", image = ").push_bind(image);
        }
        if let Some(category_id) = update.category_id {
            query.push(", category_id = ").push_bind(category_id);
        }
        if let Some(is_active) = update.is_active {
            query.push(", is_active = ").push_bind(is_active);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        let row: Option<ProductRow> = query.build_query_as().fetch_optional(self.pool).await?;
        row.map(Product::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a product.
    ///
    /// # Returns
    ///
    /// Returns `true` if the product was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if let Some(category_id) = filter.category_id {
        query.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        query
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(min_price) = filter.min_price {
        query.push(" AND price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        query.push(" AND price <= ").push_bind(max_price);
    }
    if filter.in_stock {
        query.push(" AND stock > 0");
    }
}
