//! Token housekeeping.

use sqlx::PgPool;

use vastra_api::db::TokenRepository;
use vastra_core::PrincipalKind;

use super::CliError;

/// Delete expired bearer tokens and spent reset tokens of both principal
/// kinds.
pub async fn purge(pool: &PgPool) -> Result<(), CliError> {
    for kind in [PrincipalKind::Customer, PrincipalKind::Panel] {
        let removed = TokenRepository::new(pool, kind).purge_expired().await?;
        tracing::info!(principal = %kind, removed, "Purged tokens");
    }
    Ok(())
}
