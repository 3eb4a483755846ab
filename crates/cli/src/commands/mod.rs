//! CLI subcommands.

pub mod migrate;
pub mod seed;
pub mod staff;

use secrecy::SecretString;
use sqlx::PgPool;

/// Connection string from `SPARELINE_DATABASE_URL`, falling back to
/// `DATABASE_URL` like the server does.
fn database_url() -> Option<SecretString> {
    std::env::var("SPARELINE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Load `.env` and connect with the server's pool settings.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();
    let url = database_url().ok_or(CommandError::MissingEnvVar("SPARELINE_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(spareline_server::db::create_pool(&url).await?)
}

/// Errors shared by the database commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
