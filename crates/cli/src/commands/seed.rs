//! Seed the catalog with demo data for local development.

use tracing::info;

use clementine_core::Price;

use clementine_commerce::config::CommerceConfig;
use clementine_commerce::db::{self, CategoryRepository, ProductRepository};
use clementine_commerce::models::{NewCategory, NewProduct};

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    price_cents: i64,
    stock: i32,
}

struct SeedCategory {
    name: &'static str,
    description: &'static str,
    products: &'static [SeedProduct],
}

const CATALOG: &[SeedCategory] = &[
    SeedCategory {
        name: "Electronics",
        description: "Gadgets and devices",
        products: &[
            SeedProduct {
                name: "Wireless Headphones",
                description: "Over-ear, noise cancelling, 30h battery",
                price_cents: 7999,
                stock: 25,
            },
            SeedProduct {
                name: "Mechanical Keyboard",
                description: "Tenkeyless, hot-swappable switches",
                price_cents: 12900,
                stock: 15,
            },
            SeedProduct {
                name: "USB-C Hub",
                description: "7-in-1 with HDMI and card reader",
                price_cents: 3450,
                stock: 40,
            },
        ],
    },
    SeedCategory {
        name: "Home & Kitchen",
        description: "Everyday household items",
        products: &[
            SeedProduct {
                name: "Ceramic Mug Set",
                description: "Set of four stoneware mugs",
                price_cents: 2400,
                stock: 60,
            },
            SeedProduct {
                name: "French Press",
                description: "1L borosilicate glass press",
                price_cents: 2999,
                stock: 30,
            },
        ],
    },
    SeedCategory {
        name: "Books",
        description: "Paperbacks and hardcovers",
        products: &[
            SeedProduct {
                name: "The Art of Bread",
                description: "A practical guide to home baking",
                price_cents: 1850,
                stock: 12,
            },
            SeedProduct {
                name: "Systems Field Notes",
                description: "Essays on building reliable software",
                price_cents: 2200,
                stock: 18,
            },
        ],
    },
];

/// Seed demo categories and products.
///
/// # Errors
///
/// Returns an error if configuration is missing or a database operation
/// fails.
pub async fn run(fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = CommerceConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;

    if fresh {
        info!("Clearing existing catalog...");
        sqlx::query("DELETE FROM products").execute(&pool).await?;
        sqlx::query("DELETE FROM categories").execute(&pool).await?;
    }

    let categories = CategoryRepository::new(&pool);
    let products = ProductRepository::new(&pool);

    for seed_category in CATALOG {
        let category = categories
            .create(&NewCategory {
                name: seed_category.name.to_string(),
                description: Some(seed_category.description.to_string()),
            })
            .await?;
        info!(category = seed_category.name, "Created category");

        for seed_product in seed_category.products {
            products
                .create(&NewProduct {
                    name: seed_product.name.to_string(),
                    description: seed_product.description.to_string(),
                    price: Price::from_cents(seed_product.price_cents),
                    stock: seed_product.stock,
                    image: None,
                    category_id: Some(category.id),
                    is_active: true,
                })
                .await?;
        }
        info!(
            category = seed_category.name,
            count = seed_category.products.len(),
            "Created products"
        );
    }

    info!("Seeding complete!");
    Ok(())
}
