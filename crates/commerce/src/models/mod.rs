//! Domain models for the commerce services.

pub mod cart;
pub mod category;
pub mod order;
pub mod product;

pub use cart::{Cart, CartItem};
pub use category::{Category, CategoryUpdate, NewCategory};
pub use order::{
    DashboardStats, NewOrderItem, Order, OrderFilter, OrderItem, OrderLine, OrderWithItems,
    PaymentOutcome, ShippingAddress, StatusCounts,
};
pub use product::{
    NewProduct, Product, ProductFilter, ProductSort, ProductUpdate, SortOrder, slugify,
};

use serde::{Deserialize, Serialize};

/// Maximum page size accepted from callers.
pub const MAX_PER_PAGE: u32 = 50;

/// 1-based pagination parameters, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    page: u32,
    per_page: u32,
}

impl Pagination {
    /// Create pagination, clamping `page` to at least 1 and `per_page`
    /// to `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// The 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Items per page.
    #[must_use]
    pub const fn per_page(&self) -> u32 {
        self.per_page
    }

    /// SQL `LIMIT` value.
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.per_page as i64
    }

    /// SQL `OFFSET` value.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 12)
    }
}

/// One page of results with the total row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Assemble a page from items and the total count.
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page(),
            per_page: pagination.per_page(),
        }
    }

    /// Number of pages needed for `total` items.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        if self.total <= 0 {
            return 0;
        }
        let per_page = i64::from(self.per_page.max(1));
        u32::try_from(self.total.div_euclid(per_page) + i64::from(self.total % per_page != 0))
            .unwrap_or(u32::MAX)
    }
}
