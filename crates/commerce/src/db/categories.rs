//! Category repository.

use sqlx::{PgPool, Postgres, QueryBuilder};

use clementine_core::CategoryId;

use super::RepositoryError;
use crate::models::{Category, CategoryUpdate, NewCategory, slugify};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, created_at, updated_at";

const MAX_SLUG_ATTEMPTS: u32 = 50;

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all categories, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Get a category by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Create a category, deriving a unique slug from its name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no free slug could be found.
    pub async fn create(&self, new: &NewCategory) -> Result<Category, RepositoryError> {
        let base_slug = slugify(&new.name);

        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let slug = if attempt == 0 {
                base_slug.clone()
            } else {
                format!("{base_slug}-{attempt}")
            };

            let result: Result<CategoryRow, sqlx::Error> = sqlx::query_as(&format!(
                "INSERT INTO categories (name, slug, description) VALUES ($1, $2, $3) \
                 RETURNING {CATEGORY_COLUMNS}"
            ))
            .bind(&new.name)
            .bind(&slug)
            .bind(&new.description)
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
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn update(
        &self,
        id: CategoryId,
        update: &CategoryUpdate,
    ) -> Result<Category, RepositoryError> {
        if update.name.is_none() && update.description.is_none() {
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
        id: CategoryId,
        update: &CategoryUpdate,
        slug: Option<&str>,
    ) -> Result<Category, RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE categories SET updated_at = now()");

        if let Some(name) = &update.name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(slug) = slug {
            query.push(", slug = ").push_bind(slug);
        }
        if let Some(description) = &update.description {
            query.push(", description = ").push_bind(description);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(format!(" RETURNING {CATEGORY_COLUMNS}"));

        let row: Option<CategoryRow> = query.build_query_as().fetch_optional(self.pool).await?;
        row.map(Category::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete a category. Products referencing it fall back to no category.
    ///
    /// # Returns
    ///
    /// Returns `true` if the category was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
