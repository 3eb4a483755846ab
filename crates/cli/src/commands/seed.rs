//! Seed a fresh database with starter data.
//!
//! Inserts part conditions, a handful of brands and categories, sample
//! products, and the default public settings. Every insert skips rows that
//! already exist, so the command can be re-run after manual edits.

use rust_decimal::Decimal;
use serde_json::{Value as JsonValue, json};
use sqlx::PgPool;
use tracing::info;

use spareline_core::slugify;

use super::{CommandError, connect};

const CONDITIONS: &[(&str, &str)] = &[
    ("New", "Unused part in original packaging"),
    ("Used", "Removed from a running vehicle and inspected"),
    ("Refurbished", "Reconditioned and tested to factory specification"),
];

const BRANDS: &[&str] = &["Bosch", "Brembo", "Mann-Filter", "NGK", "Valeo"];

const CATEGORIES: &[&str] = &["Brakes", "Filters", "Ignition", "Electrical", "Cooling"];

struct SampleProduct {
    name: &'static str,
    part_number: &'static str,
    price_cents: i64,
    stock: i32,
    brand: &'static str,
    category: &'static str,
    condition: &'static str,
    fits: &'static [(&'static str, &'static str, i32, i32)],
}

const PRODUCTS: &[SampleProduct] = &[
    SampleProduct {
        name: "Front Brake Disc 280mm",
        part_number: "09.A426.11",
        price_cents: 5490,
        stock: 24,
        brand: "Brembo",
        category: "Brakes",
        condition: "New",
        fits: &[("Volkswagen", "Golf", 2012, 2020), ("Skoda", "Octavia", 2013, 2020)],
    },
    SampleProduct {
        name: "Ceramic Brake Pad Set",
        part_number: "P 85 075",
        price_cents: 3890,
        stock: 40,
        brand: "Brembo",
        category: "Brakes",
        condition: "New",
        fits: &[("Volkswagen", "Golf", 2012, 2020)],
    },
    SampleProduct {
        name: "Oil Filter",
        part_number: "HU 719/7 x",
        price_cents: 990,
        stock: 120,
        brand: "Mann-Filter",
        category: "Filters",
        condition: "New",
        fits: &[("Volkswagen", "Passat", 2005, 2014), ("Audi", "A4", 2004, 2012)],
    },
    SampleProduct {
        name: "Iridium Spark Plug",
        part_number: "ILZKR7B11",
        price_cents: 1450,
        stock: 3,
        brand: "NGK",
        category: "Ignition",
        condition: "New",
        fits: &[("Honda", "Civic", 2006, 2015)],
    },
    SampleProduct {
        name: "Alternator 14V 140A",
        part_number: "0 124 525 035",
        price_cents: 18900,
        stock: 2,
        brand: "Bosch",
        category: "Electrical",
        condition: "Refurbished",
        fits: &[("BMW", "3 Series", 2005, 2011)],
    },
    SampleProduct {
        name: "Radiator Fan Assembly",
        part_number: "696021",
        price_cents: 9500,
        stock: 1,
        brand: "Valeo",
        category: "Cooling",
        condition: "Used",
        fits: &[("Renault", "Megane", 2008, 2016)],
    },
];

fn default_settings() -> Vec<(&'static str, JsonValue)> {
    vec![
        ("site.name", json!("Spareline")),
        ("site.tagline", json!("Quality spare parts, quoted fast")),
        ("site.currency", json!("EUR")),
        ("contact.email", json!("parts@spareline.example")),
        ("contact.phone", json!("+351 210 000 000")),
        ("cms.hero_slides", json!([])),
        ("legal.terms", json!("")),
        ("legal.privacy", json!("")),
    ]
}

/// Seed starter data.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or an insert fails.
pub async fn run(with_products: bool) -> Result<(), CommandError> {
    let pool = connect().await?;

    let conditions = seed_conditions(&pool).await?;
    let brands = seed_taxon(&pool, "shop.brands", BRANDS).await?;
    let categories = seed_taxon(&pool, "shop.categories", CATEGORIES).await?;
    info!(conditions, brands, categories, "Taxonomy seeded");

    if with_products {
        let products = seed_products(&pool).await?;
        info!(products, "Sample products seeded");
    }

    let settings = seed_settings(&pool).await?;
    info!(settings, "Default settings seeded");

    info!("Seeding complete!");
    Ok(())
}

async fn seed_conditions(pool: &PgPool) -> Result<u64, CommandError> {
    let mut inserted = 0;
    for (name, description) in CONDITIONS {
        inserted += sqlx::query(
            "INSERT INTO shop.conditions (name, slug, description) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(name)
        .bind(slugify(name))
        .bind(description)
        .execute(pool)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

/// `table` is one of the fixed taxonomy tables above.
async fn seed_taxon(pool: &PgPool, table: &str, names: &[&str]) -> Result<u64, CommandError> {
    let sql = format!("INSERT INTO {table} (name, slug) VALUES ($1, $2) ON CONFLICT DO NOTHING");
    let mut inserted = 0;
    for name in names {
        inserted += sqlx::query(&sql)
            .bind(name)
            .bind(slugify(name))
            .execute(pool)
            .await?
            .rows_affected();
    }
    Ok(inserted)
}

async fn seed_products(pool: &PgPool) -> Result<u64, CommandError> {
    let mut inserted = 0;
    for product in PRODUCTS {
        let fitments: Vec<JsonValue> = product
            .fits
            .iter()
            .map(|(make, model, from, to)| {
                json!({"make": make, "model": model, "year_from": from, "year_to": to})
            })
            .collect();

        inserted += sqlx::query(
            r"
            INSERT INTO shop.products
                (name, slug, part_number, price, stock_quantity, compatibility,
                 brand_id, category_id, condition_id)
            SELECT $1, $2, $3, $4, $5, $6, b.id, c.id, k.id
            FROM shop.brands b, shop.categories c, shop.conditions k
            WHERE b.slug = $7 AND c.slug = $8 AND k.slug = $9
            ON CONFLICT (slug) DO NOTHING
            ",
        )
        .bind(product.name)
        .bind(slugify(&format!("{} {}", product.name, product.part_number)))
        .bind(product.part_number)
        .bind(Decimal::new(product.price_cents, 2))
        .bind(product.stock)
        .bind(JsonValue::Array(fitments))
        .bind(slugify(product.brand))
        .bind(slugify(product.category))
        .bind(slugify(product.condition))
        .execute(pool)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

async fn seed_settings(pool: &PgPool) -> Result<u64, CommandError> {
    let mut inserted = 0;
    for (key, value) in default_settings() {
        inserted += sqlx::query(
            "INSERT INTO shop.settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use spareline_core::is_valid_slug;
    use spareline_server::models::setting::{is_public_key, is_valid_key};

    use super::*;

    #[test]
    fn test_seed_slugs_are_valid() {
        for name in BRANDS.iter().chain(CATEGORIES) {
            assert!(is_valid_slug(&slugify(name)), "{name}");
        }
        for product in PRODUCTS {
            let slug = slugify(&format!("{} {}", product.name, product.part_number));
            assert!(is_valid_slug(&slug), "{slug}");
        }
    }

    #[test]
    fn test_products_reference_seeded_taxonomy() {
        for product in PRODUCTS {
            assert!(BRANDS.contains(&product.brand));
            assert!(CATEGORIES.contains(&product.category));
            assert!(CONDITIONS.iter().any(|(name, _)| *name == product.condition));
        }
    }

    #[test]
    fn test_default_settings_are_public() {
        for (key, _) in default_settings() {
            assert!(is_valid_key(key), "{key}");
            assert!(is_public_key(key), "{key}");
        }
    }
}
