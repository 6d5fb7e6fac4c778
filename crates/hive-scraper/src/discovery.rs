//! Finding candidate tables: ranked players, their finished games inside a
//! time window, minus what is already stored.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Months, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::clients::bga::BgaApi;
use crate::config::WindowSource;
use crate::db::players;
use crate::error::ScrapeError;

const RANKING_PAGE_SIZE: usize = 10;

/// Unix-second bounds passed to the games endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiscoveryWindow {
    pub start: i64,
    pub end: i64,
}

impl DiscoveryWindow {
    pub fn last_months(now: DateTime<Utc>, months: u32) -> Self {
        let start = now
            .checked_sub_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            start: start.timestamp(),
            end: now.timestamp(),
        }
    }
}

pub async fn resolve_window<S: BgaApi>(
    session: &S,
    source: &WindowSource,
    now: DateTime<Utc>,
) -> Result<DiscoveryWindow, ScrapeError> {
    match source {
        WindowSource::Explicit { start, end } => Ok(DiscoveryWindow {
            start: *start,
            end: *end,
        }),
        WindowSource::LastMonths(months) => Ok(DiscoveryWindow::last_months(now, *months)),
        WindowSource::CurrentSeason => current_season(&session.game_panel().await?),
    }
}

/// Season bounds from the game panel's `currentArenaTimeSpan`.
pub fn current_season(panel: &Value) -> Result<DiscoveryWindow, ScrapeError> {
    let span = panel
        .get("currentArenaTimeSpan")
        .or_else(|| panel.get("data").and_then(|d| d.get("currentArenaTimeSpan")))
        .ok_or_else(|| ScrapeError::Platform("game panel has no currentArenaTimeSpan".into()))?;

    let bound = |key: &str| {
        span.get(key)
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .ok_or_else(|| ScrapeError::Platform(format!("unreadable season {key}: {span}")))
    };

    Ok(DiscoveryWindow {
        start: bound("start")?,
        end: bound("end")?,
    })
}

fn parse_timestamp(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().timestamp())
}

/// Ids of the top `count` arena players, in ranking order. Each is recorded
/// as searched.
pub async fn top_ranked_players<S: BgaApi>(
    session: &S,
    pool: &SqlitePool,
    count: usize,
) -> Result<Vec<String>, ScrapeError> {
    let mut players_found: Vec<String> = Vec::with_capacity(count);

    for start in (0..count).step_by(RANKING_PAGE_SIZE) {
        let page = session.ranking_page(start).await?;
        let ranks = page["data"]["ranks"].as_array().cloned().unwrap_or_default();
        if ranks.is_empty() {
            break;
        }

        for rank in ranks {
            if players_found.len() >= count {
                break;
            }
            if let Some(id) = rank.get("id").and_then(hive_core::replay::id_string) {
                if !players_found.contains(&id) {
                    players_found.push(id);
                }
            }
        }
    }

    let now = Utc::now();
    for player_id in &players_found {
        if let Some(previous) = players::last_seen(pool, player_id).await? {
            tracing::debug!(player_id = %player_id, previous, "Player searched before");
        }
        players::mark_player_seen(pool, player_id, now).await?;
    }

    tracing::info!(count = players_found.len(), "Found top ranking players");
    Ok(players_found)
}

/// Non-conceded table ids on one page of a player's history, or `None` when
/// the page is empty (end of history).
fn page_tables(page: &Value) -> Option<Vec<i64>> {
    let tables = page["data"]["tables"].as_array()?;
    if tables.is_empty() {
        return None;
    }
    Some(
        tables
            .iter()
            .filter(|t| t["concede"].as_str() != Some("1") && t["concede"].as_i64() != Some(1))
            .filter_map(|t| t.get("table_id").and_then(hive_core::replay::int_value))
            .collect(),
    )
}

/// Walk through the players' histories one page at a time.
///
/// A failed request leaves the position untouched, so the caller can
/// re-establish its session and call [`HistoryScan::step`] again to retry the
/// same page.
pub struct HistoryScan<'a> {
    player_ids: &'a [String],
    window: DiscoveryWindow,
    exclusion: &'a HashSet<i64>,
    max_pages: u32,
    player: usize,
    page: u32,
    found: BTreeSet<i64>,
}

impl<'a> HistoryScan<'a> {
    pub fn new(
        player_ids: &'a [String],
        window: DiscoveryWindow,
        exclusion: &'a HashSet<i64>,
        max_pages: u32,
    ) -> Self {
        Self {
            player_ids,
            window,
            exclusion,
            max_pages,
            player: 0,
            page: 1,
            found: BTreeSet::new(),
        }
    }

    /// Request the next history page. `Ok(false)` once every player is done.
    pub async fn step<S: BgaApi>(&mut self, session: &S) -> Result<bool, ScrapeError> {
        let player_ids = self.player_ids;
        let Some(player_id) = player_ids.get(self.player) else {
            return Ok(false);
        };

        if self.page > self.max_pages {
            tracing::warn!(player_id = %player_id, max_pages = self.max_pages, "Stopped paging history at the page ceiling");
            self.next_player();
            return Ok(true);
        }

        let data = session.games_page(player_id, self.page, self.window).await?;
        match page_tables(&data) {
            Some(ids) => {
                let exclusion = self.exclusion;
                self.found.extend(ids.into_iter().filter(|id| !exclusion.contains(id)));
                self.page += 1;
            }
            None => {
                tracing::debug!(player_id = %player_id, pages = self.page - 1, "Player history scanned");
                self.next_player();
            }
        }
        Ok(true)
    }

    fn next_player(&mut self) {
        self.player += 1;
        self.page = 1;
    }

    /// Candidate ids found so far, sorted ascending.
    pub fn finish(self) -> Vec<i64> {
        tracing::info!(candidates = self.found.len(), excluded = self.exclusion.len(), "Discovery finished");
        self.found.into_iter().collect()
    }
}

/// Every finished, non-conceded table the players took part in during
/// `window`, excluding ids in `exclusion`. Sorted ascending.
pub async fn discover<S: BgaApi>(
    session: &S,
    player_ids: &[String],
    window: DiscoveryWindow,
    exclusion: &HashSet<i64>,
    max_pages: u32,
) -> Result<Vec<i64>, ScrapeError> {
    let mut scan = HistoryScan::new(player_ids, window, exclusion, max_pages);
    while scan.step(session).await? {}
    Ok(scan.finish())
}
