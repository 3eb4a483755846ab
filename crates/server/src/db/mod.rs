//! Database access for the `shop` `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `shop.users` - Customer and staff accounts (garage, addresses and
//!   favorites are JSONB columns)
//! - `shop.brands`, `shop.categories`, `shop.conditions` - Catalog taxonomy
//! - `shop.products`, `shop.reviews` - Catalog
//! - `shop.quotes`, `shop.quote_items` - Requests for quote
//! - `shop.orders` - Orders converted from quotes
//! - `shop.settings` - Key/value site configuration (JSONB)
//! - `shop.chat_conversations`, `shop.chat_messages` - Live chat
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations live in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p spareline-cli -- migrate
//! ```

pub mod chat;
pub mod orders;
pub mod products;
pub mod quotes;
pub mod reviews;
pub mod settings;
pub mod stats;
pub mod taxonomy;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use chat::ChatRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use quotes::QuoteRepository;
pub use reviews::ReviewRepository;
pub use settings::SettingsRepository;
pub use stats::StatsRepository;
pub use taxonomy::TaxonomyRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("{0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign-key violations to `Conflict` with `message`.
    pub(crate) fn from_constraint(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Liveness check used by `/health/ready`.
///
/// # Errors
///
/// Returns `sqlx::Error` if the database does not answer.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
