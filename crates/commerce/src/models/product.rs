//! Product model, write payloads and listing filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clementine_core::{CategoryId, Price, ProductId};

/// A sellable product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Price,
    /// Sellable units on hand. Never negative; decrements go through the
    /// ledger's conditional update.
    pub stock: i32,
    pub image: Option<String>,
    pub category_id: Option<CategoryId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether any units are on hand.
    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Whether at least `quantity` units are on hand.
    #[must_use]
    pub fn has_stock(&self, quantity: u32) -> bool {
        i64::from(self.stock) >= i64::from(quantity)
    }
}

/// Payload for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock: i32,
    pub image: Option<String>,
    pub category_id: Option<CategoryId>,
    pub is_active: bool,
}

/// Partial update for a product; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub stock: Option<i32>,
    pub image: Option<String>,
    pub category_id: Option<CategoryId>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    /// Whether the update carries no changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.image.is_none()
            && self.category_id.is_none()
            && self.is_active.is_none()
    }
}

/// Sortable product listing columns (whitelist).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Name,
    Price,
    #[default]
    CreatedAt,
    Stock,
}

impl ProductSort {
    /// SQL column name for the sort key.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::CreatedAt => "created_at",
            Self::Stock => "stock",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword for the direction.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Product listing filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Substring match over name and description.
    pub search: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub in_stock: bool,
    pub sort_by: ProductSort,
    pub sort_order: SortOrder,
}

impl ProductFilter {
    /// Canonical cache-key parameters for this filter.
    ///
    /// Keys are emitted in a fixed order and unset filters are omitted, so
    /// equivalent filter sets derive the same cache key.
    #[must_use]
    pub fn cache_params(&self, page: u32, per_page: u32) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(id) = self.category_id {
            params.push(("category", id.to_string()));
        }
        if self.in_stock {
            params.push(("in_stock", "1".to_string()));
        }
        if let Some(max) = self.max_price {
            params.push(("max_price", max.to_string()));
        }
        if let Some(min) = self.min_price {
            params.push(("min_price", min.to_string()));
        }
        params.push(("page", page.to_string()));
        params.push(("per_page", per_page.to_string()));
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        params.push(("sort", self.sort_by.column().to_string()));
        params.push(("order", self.sort_order.keyword().to_string()));
        params
    }
}

/// Derive a URL-safe slug from a product or category name.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_has_stock() {
        let product = Product {
            id: ProductId::new(1),
            name: "Widget".to_string(),
            slug: "widget".to_string(),
            description: String::new(),
            price: Price::from_cents(1000),
            stock: 2,
            image: None,
            category_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(product.has_stock(2));
        assert!(!product.has_stock(3));
        assert!(product.is_in_stock());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Blue Widget"), "blue-widget");
        assert_eq!(slugify("  Déjà  Vu!  "), "d-j-vu");
        assert_eq!(slugify("CAFÉ 2000"), "caf-2000");
        assert_eq!(slugify("trailing---"), "trailing");
    }

    #[test]
    fn test_cache_params_are_order_stable() {
        let a = ProductFilter {
            category_id: Some(CategoryId::new(2)),
            search: Some("mug".to_string()),
            min_price: Some(Price::from_cents(100)),
            max_price: None,
            in_stock: true,
            sort_by: ProductSort::Price,
            sort_order: SortOrder::Asc,
        };
        let b = a.clone();
        assert_eq!(a.cache_params(1, 12), b.cache_params(1, 12));
        assert_ne!(a.cache_params(1, 12), b.cache_params(2, 12));
    }

    #[test]
    fn test_product_update_is_empty() {
        assert!(ProductUpdate::default().is_empty());
        let update = ProductUpdate {
            stock: Some(5),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
