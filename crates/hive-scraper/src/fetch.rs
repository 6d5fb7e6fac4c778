//! Fetching one table's replay and deciding what the run does next.

use hive_core::replay::{self, int_value};
use hive_core::{ExpansionFlags, MatchData, MatchRecord};
use serde_json::Value;

use crate::clients::bga::BgaApi;
use crate::error::ScrapeError;

const QUOTA_EXHAUSTED: &str = "you have reached a limit (replay)";
const ACCESS_DENIED: &str = "registered more than 24 hours";
const ARCHIVE_LOST: &str = "the replay for this game has been lost";
const BANNED: &str = "disabled for your account";

const MOSQUITO_OPTION: &str = "100";
const LADYBUG_OPTION: &str = "101";
const PILLBUG_OPTION: &str = "102";
const OPTION_ENABLED: i64 = 2;

/// Every shape a replay log answer can take.
#[derive(Debug, PartialEq)]
pub enum ReplayResponse<'a> {
    Success(&'a Value),
    QuotaExhausted,
    AccessDenied,
    ArchiveLost,
    Banned,
    UnknownError(String),
    MalformedPayload,
}

impl<'a> ReplayResponse<'a> {
    pub fn classify(body: &'a Value) -> Self {
        if let Some(error) = body.get("error") {
            let text = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let lowered = text.to_lowercase();
            return if lowered.contains(QUOTA_EXHAUSTED) {
                ReplayResponse::QuotaExhausted
            } else if lowered.contains(ACCESS_DENIED) {
                ReplayResponse::AccessDenied
            } else if lowered.contains(ARCHIVE_LOST) {
                ReplayResponse::ArchiveLost
            } else if lowered.contains(BANNED) {
                ReplayResponse::Banned
            } else {
                ReplayResponse::UnknownError(text)
            };
        }

        match body.get("data") {
            Some(data) if !data.is_null() => ReplayResponse::Success(data),
            _ => ReplayResponse::MalformedPayload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Parsed(MatchData),
    /// This table will never yield a replay; move on.
    Skip { table_id: i64, reason: String },
    /// The current account can't fetch any more replays.
    IdentityExhausted(String),
    /// The platform answered in a way the run can't continue from.
    Fatal(String),
}

/// Expansion flags from a table info answer. `Err` carries the reason the
/// table has to be skipped.
pub fn expansion_flags(info: &Value) -> Result<ExpansionFlags, String> {
    if let Some(error) = info.get("error") {
        return Err(format!("table info error: {error}"));
    }

    let options = info
        .get("data")
        .and_then(|d| d.get("options"))
        .ok_or_else(|| "table info without options".to_string())?;

    let enabled = |key: &str| -> Result<bool, String> {
        options
            .get(key)
            .and_then(|o| o.get("value"))
            .and_then(int_value)
            .map(|v| v == OPTION_ENABLED)
            .ok_or_else(|| format!("table info without option {key}"))
    };

    Ok(ExpansionFlags::new(
        enabled(MOSQUITO_OPTION)?,
        enabled(LADYBUG_OPTION)?,
        enabled(PILLBUG_OPTION)?,
    ))
}

/// Fetch, classify and extract one table.
///
/// `Err` is reserved for failures the caller may cure by reconnecting or
/// that are not the platform's doing (HTTP, status, I/O). A body that is not
/// JSON at all maps to [`FetchOutcome::Fatal`].
pub async fn fetch<S: BgaApi>(session: &S, table_id: i64) -> Result<FetchOutcome, ScrapeError> {
    let info = match session.table_info(table_id).await {
        Err(ScrapeError::Json(e)) => return Ok(FetchOutcome::Fatal(format!("table info is not JSON: {e}"))),
        other => other?,
    };
    let expansions = match expansion_flags(&info) {
        Ok(flags) => flags,
        Err(reason) => return Ok(skip(table_id, reason)),
    };

    session.request_archive(table_id).await?;
    let body = match session.replay_log(table_id).await {
        Err(ScrapeError::Json(e)) => return Ok(FetchOutcome::Fatal(format!("replay log is not JSON: {e}"))),
        other => other?,
    };

    let data = match ReplayResponse::classify(&body) {
        ReplayResponse::Success(data) => data,
        ReplayResponse::QuotaExhausted => {
            return Ok(FetchOutcome::IdentityExhausted("replay quota reached".into()))
        }
        ReplayResponse::AccessDenied => {
            return Ok(FetchOutcome::IdentityExhausted("account may not view replays".into()))
        }
        ReplayResponse::Banned => return Ok(FetchOutcome::IdentityExhausted("account disabled".into())),
        ReplayResponse::ArchiveLost => return Ok(skip(table_id, "replay has been lost".into())),
        ReplayResponse::UnknownError(text) => {
            tracing::warn!(table_id, error = %text, "Unknown replay error");
            return Ok(skip(table_id, format!("unknown error: {text}")));
        }
        ReplayResponse::MalformedPayload => {
            return Ok(skip(table_id, "replay answer has neither data nor error".into()))
        }
    };

    match replay::extract(data) {
        Ok(extracted) => Ok(FetchOutcome::Parsed(MatchData {
            record: MatchRecord {
                table_id,
                white: extracted.white,
                black: extracted.black,
                outcome: extracted.outcome,
                expansions,
            },
            actions: extracted.actions,
        })),
        Err(e) => Ok(skip(table_id, format!("unreadable replay: {e}"))),
    }
}

fn skip(table_id: i64, reason: String) -> FetchOutcome {
    tracing::info!(table_id, reason = %reason, "Skipping table");
    FetchOutcome::Skip { table_id, reason }
}
