//! The BoardGameArena collection run: one identity at a time, one table at a
//! time, every result stored before the next request goes out.

use chrono::Utc;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::clients::bga::Authenticator;
use crate::config::{RunPolicy, WindowSource};
use crate::context::RunContext;
use crate::db::matches;
use crate::discovery::{self, DiscoveryWindow, HistoryScan};
use crate::error::ScrapeError;
use crate::fetch::{fetch, FetchOutcome};
use crate::identity::{Identity, IdentityPool};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    IdentitiesExhausted,
    Interrupted,
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: Vec<i64>,
    /// Candidates never settled, in discovery order.
    pub remaining: Vec<i64>,
    /// (email, tables stored) for every identity that was used.
    pub per_identity: Vec<(String, usize)>,
    pub stop: StopReason,
}

impl RunSummary {
    fn empty(stop: StopReason) -> Self {
        Self {
            processed: 0,
            skipped: Vec::new(),
            remaining: Vec::new(),
            per_identity: Vec::new(),
            stop,
        }
    }

    pub fn log(&self) {
        tracing::info!(
            processed = self.processed,
            skipped = self.skipped.len(),
            remaining = self.remaining.len(),
            stop = ?self.stop,
            "Scraping finished"
        );
        for (email, handled) in &self.per_identity {
            tracing::info!(email = %email, handled, "Identity usage");
        }
        if !self.remaining.is_empty() {
            tracing::info!(ids = ?self.remaining, "Remaining table ids");
        }
    }
}

/// Full run: log in, find the top players, discover their tables, fetch them.
pub async fn run_bga<A: Authenticator>(
    ctx: &mut RunContext<A>,
    store: &SqlitePool,
    window: &WindowSource,
    ranking_players: usize,
    cancel: &CancellationToken,
) -> Result<RunSummary, ScrapeError> {
    let Some(mut identity) = ctx.identities.next_identity().await else {
        return Ok(RunSummary::empty(StopReason::IdentitiesExhausted));
    };

    match discover_candidates(ctx, store, &mut identity, window, ranking_players, cancel).await {
        Ok(candidates) => {
            tracing::info!(count = candidates.len(), "Processing table ids");
            process_candidates(ctx, store, identity, &candidates, cancel).await
        }
        Err(stop) => {
            let mut summary = RunSummary::empty(stop);
            summary.per_identity.push((identity.email, identity.matches_handled));
            summary.log();
            Ok(summary)
        }
    }
}

/// Season, ranking and history lookups. A history page that fails in transit
/// is retried in place once the session is back.
async fn discover_candidates<A: Authenticator>(
    ctx: &RunContext<A>,
    store: &SqlitePool,
    identity: &mut Identity<A::Session>,
    source: &WindowSource,
    ranking_players: usize,
    cancel: &CancellationToken,
) -> Result<Vec<i64>, StopReason> {
    let mut attempts = 0;

    let window: DiscoveryWindow = loop {
        match discovery::resolve_window(&identity.session, source, Utc::now()).await {
            Ok(window) => break window,
            Err(e) => recover(ctx, identity, &mut attempts, e, cancel).await?,
        }
    };
    tracing::info!(start = window.start, end = window.end, "Discovery window");

    attempts = 0;
    let players = loop {
        match discovery::top_ranked_players(&identity.session, store, ranking_players).await {
            Ok(players) => break players,
            Err(e) => recover(ctx, identity, &mut attempts, e, cancel).await?,
        }
    };

    attempts = 0;
    let mut scan = HistoryScan::new(&players, window, &ctx.exclusion, ctx.policy.max_history_pages);
    loop {
        if cancel.is_cancelled() {
            tracing::warn!("Interrupted during discovery");
            return Err(StopReason::Interrupted);
        }
        match scan.step(&identity.session).await {
            Ok(true) => attempts = 0,
            Ok(false) => break,
            Err(e) => recover(ctx, identity, &mut attempts, e, cancel).await?,
        }
    }
    Ok(scan.finish())
}

async fn recover<A: Authenticator>(
    ctx: &RunContext<A>,
    identity: &mut Identity<A::Session>,
    attempts: &mut u32,
    error: ScrapeError,
    cancel: &CancellationToken,
) -> Result<(), StopReason> {
    if !error.is_transport() {
        tracing::error!(error = %error, "Discovery failed");
        return Err(StopReason::Fatal(error.to_string()));
    }
    tracing::warn!(error = %error, "Connection lost during discovery");
    reconnect(&ctx.identities, &ctx.policy, identity, attempts, &error, cancel).await
}

/// Spend one reconnect attempt: wait `reconnect_delay`, then log in again
/// with the same account. Gives the reason to stop instead once more than
/// `max_reconnects` attempts were made in a row, or when cancelled.
pub(crate) async fn reconnect<A: Authenticator>(
    identities: &IdentityPool<A>,
    policy: &RunPolicy,
    identity: &mut Identity<A::Session>,
    attempts: &mut u32,
    error: &ScrapeError,
    cancel: &CancellationToken,
) -> Result<(), StopReason> {
    *attempts += 1;
    if *attempts > policy.max_reconnects {
        return Err(StopReason::Fatal(format!(
            "gave up after {} reconnects: {error}",
            policy.max_reconnects
        )));
    }
    tracing::info!(
        email = %identity.email,
        attempt = *attempts,
        delay_secs = policy.reconnect_delay.as_secs(),
        "Reconnecting"
    );

    let interrupted = tokio::select! {
        _ = tokio::time::sleep(policy.reconnect_delay) => false,
        _ = cancel.cancelled() => true,
    };
    if interrupted {
        return Err(StopReason::Interrupted);
    }
    if let Err(e) = identities.reauthenticate(identity).await {
        tracing::warn!(email = %identity.email, error = %e, "Re-login failed");
    }
    Ok(())
}

/// Fetch and store every candidate in order.
///
/// An exhausted identity is replaced and the same table retried. Transport
/// failures wait `reconnect_delay`, log in again with the same account and
/// retry, up to `max_reconnects` times in a row.
pub async fn process_candidates<A: Authenticator>(
    ctx: &mut RunContext<A>,
    store: &SqlitePool,
    identity: Identity<A::Session>,
    candidates: &[i64],
    cancel: &CancellationToken,
) -> Result<RunSummary, ScrapeError> {
    let mut summary = RunSummary::empty(StopReason::Completed);
    let mut current = Some(identity);
    let mut index = 0;
    let mut reconnects = 0;

    let stop = loop {
        let Some(&table_id) = candidates.get(index) else {
            break StopReason::Completed;
        };
        if cancel.is_cancelled() {
            tracing::warn!(index, table_id, "Interrupted");
            break StopReason::Interrupted;
        }
        let Some(identity) = current.as_mut() else {
            break StopReason::IdentitiesExhausted;
        };

        match fetch(&identity.session, table_id).await {
            Ok(FetchOutcome::Parsed(data)) => {
                if let Err(e) = matches::insert_match_data(store, &data).await {
                    break StopReason::Fatal(format!("storing table {table_id}: {e}"));
                }
                tracing::debug!(table_id, actions = data.actions.len(), "Stored table");
                identity.matches_handled += 1;
                summary.processed += 1;
                index += 1;
                reconnects = 0;
            }
            Ok(FetchOutcome::Skip { table_id, .. }) => {
                summary.skipped.push(table_id);
                index += 1;
                reconnects = 0;
            }
            Ok(FetchOutcome::IdentityExhausted(reason)) => {
                tracing::info!(
                    email = %identity.email,
                    handled = identity.matches_handled,
                    reason = %reason,
                    accounts_left = ctx.identities.remaining(),
                    "Identity exhausted, switching account"
                );
                summary
                    .per_identity
                    .push((identity.email.clone(), identity.matches_handled));
                current = ctx.identities.next_identity().await;
            }
            Ok(FetchOutcome::Fatal(reason)) => {
                tracing::error!(table_id, reason = %reason, "Fatal answer from platform");
                break StopReason::Fatal(reason);
            }
            Err(e) if e.is_transport() => {
                tracing::warn!(index, table_id, error = %e, "Connection lost");
                if let Err(stop) =
                    reconnect(&ctx.identities, &ctx.policy, identity, &mut reconnects, &e, cancel).await
                {
                    break stop;
                }
            }
            Err(e) => {
                tracing::error!(table_id, error = %e, "Unrecoverable error");
                break StopReason::Fatal(e.to_string());
            }
        }
    };

    if let Some(identity) = current {
        summary.per_identity.push((identity.email, identity.matches_handled));
    }
    summary.remaining = candidates[index..].to_vec();
    summary.stop = stop;
    summary.log();
    Ok(summary)
}
