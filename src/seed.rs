use chrono::Utc;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, Set, TransactionTrait};
use uuid::Uuid;

use crate::entities::{
    category, category::Entity as CategoryEntity, product, product::Entity as ProductEntity,
    product_variant, product_variant::Entity as ProductVariantEntity,
};

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    //(color, price_in_cents)
    variants: &'static [(&'static str, i32)],
}

struct SeedCategory {
    name: &'static str,
    products: &'static [SeedProduct],
}

const IMAGE_BASE_URL: &str = "https://cdn.attire-static.com/products";

const CATALOG: &[SeedCategory] = &[
    SeedCategory {
        name: "Accessories",
        products: &[
            SeedProduct {
                name: "Trail Backpack",
                description: "A 22 liter backpack with a padded laptop sleeve and water resistant shell.",
                variants: &[("Black", 14999), ("White", 14999)],
            },
            SeedProduct {
                name: "Crew Socks",
                description: "Ribbed cotton crew socks, sold as a pair.",
                variants: &[("White", 1999), ("Black", 1999)],
            },
            SeedProduct {
                name: "Curved Cap",
                description: "Six panel cap with a curved brim and adjustable strap.",
                variants: &[("Blue", 3499), ("Beige", 3499), ("Green", 3799)],
            },
        ],
    },
    SeedCategory {
        name: "Shorts",
        products: &[
            SeedProduct {
                name: "Active Shorts",
                description: "Lightweight training shorts with a zipped back pocket.",
                variants: &[("Black", 7999), ("Blue", 7999), ("Green", 8499)],
            },
            SeedProduct {
                name: "Core Shorts",
                description: "Everyday cotton twill shorts with a relaxed fit.",
                variants: &[("Green", 8999), ("Black", 8999), ("Blue", 8999)],
            },
        ],
    },
    SeedCategory {
        name: "Pants",
        products: &[
            SeedProduct {
                name: "Club Joggers",
                description: "Brushed fleece joggers with an elasticated cuff.",
                variants: &[("Beige", 12999), ("Black", 12999), ("Burgundy", 13499)],
            },
            SeedProduct {
                name: "Knit Pants",
                description: "Heavy knit pants with a tapered leg.",
                variants: &[("Black", 15999), ("White", 15999)],
            },
        ],
    },
    SeedCategory {
        name: "Sweatshirts",
        products: &[
            SeedProduct {
                name: "Fleece Hoodie",
                description: "Mid weight fleece hoodie with a double lined hood.",
                variants: &[("Black", 18999), ("Grey", 18999), ("Burgundy", 19499)],
            },
            SeedProduct {
                name: "Half Zip Sweat",
                description: "Half zip sweatshirt with a stand collar.",
                variants: &[("Grey", 17499), ("Blue", 17499)],
            },
        ],
    },
];

/// Wipes the catalog tables and reinserts the static dataset. Cart items
/// referencing the wiped variants disappear through the cascade; user,
/// session and address tables are untouched.
pub async fn seed_catalog(db: &DatabaseConnection) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    ProductVariantEntity::delete_many().exec(&txn).await?;
    ProductEntity::delete_many().exec(&txn).await?;
    CategoryEntity::delete_many().exec(&txn).await?;

    let now = Utc::now();
    let mut categories = Vec::new();
    let mut products = Vec::new();
    let mut variants = Vec::new();

    for seed_category in CATALOG {
        let category_id = Uuid::new_v4();
        categories.push(category::ActiveModel {
            id: Set(category_id),
            name: Set(seed_category.name.to_owned()),
            slug: Set(slugify(seed_category.name)),
            created_at: Set(now),
        });

        for seed_product in seed_category.products {
            let product_id = Uuid::new_v4();
            let product_slug = slugify(seed_product.name);
            products.push(product::ActiveModel {
                id: Set(product_id),
                category_id: Set(category_id),
                name: Set(seed_product.name.to_owned()),
                slug: Set(product_slug.clone()),
                description: Set(seed_product.description.to_owned()),
                created_at: Set(now),
            });

            for (color, price_in_cents) in seed_product.variants {
                let color_slug = slugify(color);
                variants.push(product_variant::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product_id),
                    name: Set(seed_product.name.to_owned()),
                    slug: Set(format!("{}-{}", product_slug, color_slug)),
                    color: Set((*color).to_owned()),
                    price_in_cents: Set(*price_in_cents),
                    image_url: Set(format!(
                        "{}/{}/{}.jpg",
                        IMAGE_BASE_URL, product_slug, color_slug
                    )),
                    created_at: Set(now),
                });
            }
        }
    }

    CategoryEntity::insert_many(categories).exec(&txn).await?;
    ProductEntity::insert_many(products).exec(&txn).await?;
    ProductVariantEntity::insert_many(variants).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!("Seeded catalog dataset");
    Ok(())
}

pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut prev_dash = false;

    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash && !slug.is_empty() {
            slug.push('-');
            prev_dash = true;
        }
    }

    if slug.ends_with('-') {
        slug.pop();
    }

    slug
}
