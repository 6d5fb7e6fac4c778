use std::collections::HashSet;

use sqlx::SqlitePool;

use crate::clients::bga::Authenticator;
use crate::config::RunPolicy;
use crate::db::matches;
use crate::error::ScrapeError;
use crate::identity::IdentityPool;

/// State shared by every step of one collection run.
pub struct RunContext<A> {
    pub identities: IdentityPool<A>,
    /// Table ids stored before the run started. Read once.
    pub exclusion: HashSet<i64>,
    pub policy: RunPolicy,
}

impl<A: Authenticator> RunContext<A> {
    pub async fn load(
        store: &SqlitePool,
        identities: IdentityPool<A>,
        policy: RunPolicy,
    ) -> Result<Self, ScrapeError> {
        let exclusion = matches::unique_table_ids(store).await?;
        tracing::info!(known_tables = exclusion.len(), "Loaded exclusion set");
        Ok(Self {
            identities,
            exclusion,
            policy,
        })
    }
}
