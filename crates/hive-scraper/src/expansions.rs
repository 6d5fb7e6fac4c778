//! Re-derive expansion flags for stored matches and overwrite them.

use hive_core::ExpansionFlags;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::clients::bga::{Authenticator, BgaApi};
use crate::clients::entomology::GameArchive;
use crate::config::RunPolicy;
use crate::db::matches::{self, BGA_IDS};
use crate::error::ScrapeError;
use crate::fetch::expansion_flags;
use crate::identity::IdentityPool;
use crate::pipeline::{reconnect, StopReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionSummary {
    pub updated: usize,
    pub skipped: Vec<i64>,
    /// Tables left untouched because the pass stopped early.
    pub remaining: Vec<i64>,
    pub stop: StopReason,
}

impl Default for CorrectionSummary {
    fn default() -> Self {
        Self {
            updated: 0,
            skipped: Vec::new(),
            remaining: Vec::new(),
            stop: StopReason::Completed,
        }
    }
}

/// BGA tables: flags from table info. A transport failure reconnects the
/// current identity under `policy`; any other failed request retires it and
/// the same table is retried with the next one.
pub async fn correct_bga<A: Authenticator>(
    identities: &mut IdentityPool<A>,
    store: &SqlitePool,
    table_ids: &[i64],
    policy: &RunPolicy,
    cancel: &CancellationToken,
) -> Result<CorrectionSummary, ScrapeError> {
    let mut summary = CorrectionSummary::default();
    let bga_ids: Vec<i64> = table_ids.iter().copied().filter(|id| BGA_IDS.contains(id)).collect();
    tracing::info!(count = bga_ids.len(), "Updating BGA table flags");

    let mut current = identities.next_identity().await;
    let mut index = 0;
    let mut reconnects = 0;

    summary.stop = loop {
        let Some(&table_id) = bga_ids.get(index) else {
            break StopReason::Completed;
        };
        if cancel.is_cancelled() {
            break StopReason::Interrupted;
        }
        let Some(identity) = current.as_mut() else {
            break StopReason::IdentitiesExhausted;
        };

        match identity.session.table_info(table_id).await {
            Ok(info) => {
                match expansion_flags(&info) {
                    Ok(flags) => {
                        matches::update_expansion_flags(store, table_id, flags).await?;
                        tracing::debug!(table_id, flags = %flags.letters(), "Flags updated");
                        summary.updated += 1;
                    }
                    Err(reason) => {
                        tracing::warn!(table_id, reason = %reason, "Skipping table");
                        summary.skipped.push(table_id);
                    }
                }
                index += 1;
                reconnects = 0;
            }
            Err(e) if e.is_transport() => {
                tracing::warn!(table_id, error = %e, "Connection lost");
                if let Err(stop) = reconnect(identities, policy, identity, &mut reconnects, &e, cancel).await {
                    break stop;
                }
            }
            Err(e) => {
                tracing::warn!(
                    table_id,
                    email = %identity.email,
                    error = %e,
                    accounts_left = identities.remaining(),
                    "Table info failed, switching account"
                );
                current = identities.next_identity().await;
                reconnects = 0;
            }
        }
    };

    summary.remaining = bga_ids[index..].to_vec();
    Ok(summary)
}

/// Entomology tables: flags from the metadata `variant` of the uuid at each
/// table id's index.
pub async fn correct_entomology<G: GameArchive>(
    archive: &G,
    store: &SqlitePool,
    uuids: &[String],
    table_ids: &[i64],
) -> Result<CorrectionSummary, ScrapeError> {
    let mut summary = CorrectionSummary::default();

    for &table_id in table_ids.iter().filter(|id| !BGA_IDS.contains(id)) {
        let Some(uuid) = usize::try_from(table_id).ok().and_then(|i| uuids.get(i)) else {
            tracing::warn!(table_id, "No uuid at this index");
            summary.skipped.push(table_id);
            continue;
        };

        let variant = match archive.metadata(uuid).await {
            Ok(Some(meta)) => meta.get("variant").and_then(Value::as_str).map(str::to_string),
            Ok(None) => None,
            Err(e) if e.is_transport() => return Err(e),
            Err(e) => {
                tracing::warn!(table_id, uuid = %uuid, error = %e, "Metadata unavailable");
                None
            }
        };
        let Some(variant) = variant else {
            summary.skipped.push(table_id);
            continue;
        };

        let flags = ExpansionFlags::from_variant(&variant);
        matches::update_expansion_flags(store, table_id, flags).await?;
        tracing::debug!(table_id, flags = %flags.letters(), "Flags updated");
        summary.updated += 1;
    }

    Ok(summary)
}
