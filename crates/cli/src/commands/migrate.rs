//! Database migration command.
//!
//! Migrations live in `crates/api/migrations/` and are embedded at build
//! time.

use sqlx::PgPool;

use super::CliError;

/// Run all pending migrations.
pub async fn run(pool: &PgPool) -> Result<(), CliError> {
    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(pool).await?;
    tracing::info!("Migrations complete!");
    Ok(())
}
