#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use hive_scraper::clients::bga::{Authenticator, BgaApi};
use hive_scraper::clients::entomology::GameArchive;
use hive_scraper::clients::webdriver::PageRenderer;
use hive_scraper::config::{EntomologyConfig, RunPolicy};
use hive_scraper::db::pool::{create_pool, run_migrations};
use hive_scraper::discovery::DiscoveryWindow;
use hive_scraper::error::ScrapeError;
use hive_scraper::identity::Credentials;
use serde_json::{json, Value};
use sqlx::SqlitePool;

pub const QUOTA_ERROR: &str = "You have reached a limit (replay)";
pub const LOST_ERROR: &str = "Unfortunately the replay for this game has been lost";

/// Fresh in-memory store with the schema applied.
pub async fn memory_store() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

pub fn fast_policy() -> RunPolicy {
    RunPolicy {
        max_history_pages: 500,
        reconnect_delay: Duration::from_millis(0),
        max_reconnects: 2,
    }
}

pub fn accounts(emails: &[&str]) -> Vec<Credentials> {
    emails
        .iter()
        .map(|e| Credentials {
            email: e.to_string(),
            password: "secret".into(),
        })
        .collect()
}

pub fn service_down() -> ScrapeError {
    ScrapeError::Status {
        status: 503,
        url: "https://boardgamearena.test/archive/archive/logs.html".into(),
    }
}

/// Replay log answer for a short game between players 1001 (white) and
/// 2002 (black). `winner` adds a closing queenSurr event.
pub fn replay_body(moves: &[&str], winner: Option<&str>) -> Value {
    let mut logs: Vec<Value> = moves
        .iter()
        .enumerate()
        .map(|(i, m)| {
            json!({
                "move_id": (i + 1).to_string(),
                "data": [{"type": "tokenPlayed", "log": "${player_name} moves", "args": {"notation": m}}]
            })
        })
        .collect();
    if let Some(winner) = winner {
        logs.push(json!({
            "move_id": (moves.len() + 1).to_string(),
            "data": [{"type": "queenSurr", "log": "queen surrounded", "args": {"winner": winner}}]
        }));
    }
    json!({"status": 1, "data": {
        "players": [{"id": "2002", "color": "#000000"}, {"id": "1001", "color": "#FFFFFF"}],
        "logs": logs
    }})
}

/// Scripted BoardGameArena. Sessions share one state so tests can inspect
/// what each account asked for.
#[derive(Default)]
pub struct BgaState {
    pub replays: HashMap<i64, Value>,
    /// Replays each account may still view; accounts not listed are unlimited.
    pub quota: HashMap<String, usize>,
    /// Accounts whose login fails.
    pub locked: HashSet<String>,
    /// Accounts refused table info with a 403.
    pub info_fails_for: HashSet<String>,
    /// The next N table info requests fail with a 503.
    pub info_outages: usize,
    /// Tables whose table info carries an error.
    pub no_info: HashSet<i64>,
    /// Tables whose replay answer is not JSON.
    pub broken_json: HashSet<i64>,
    /// The next N replay requests fail with a 503.
    pub transport_failures: usize,
    pub ranking: Vec<String>,
    /// Player id to pages of `{table_id, concede}` rows.
    pub histories: HashMap<String, Vec<Vec<Value>>>,
    /// Players whose history never ends; page N holds table 100 + N.
    pub endless: HashSet<String>,
    /// (player id, page) requests that fail with a 503 this many more times.
    pub history_failures: HashMap<(String, u32), usize>,
    pub logins: Vec<String>,
    /// (email, table id) for every replay actually served.
    pub served: Vec<(String, i64)>,
    pub pages_requested: Vec<(String, u32)>,
}

#[derive(Clone, Default)]
pub struct FakeBga {
    pub state: Rc<RefCell<BgaState>>,
}

impl FakeBga {
    pub fn with_replays(replays: impl IntoIterator<Item = (i64, Value)>) -> Self {
        let fake = Self::default();
        fake.state.borrow_mut().replays.extend(replays);
        fake
    }

    pub fn served(&self) -> Vec<(String, i64)> {
        self.state.borrow().served.clone()
    }
}

pub struct FakeSession {
    email: String,
    state: Rc<RefCell<BgaState>>,
}

impl Authenticator for FakeBga {
    type Session = FakeSession;

    async fn authenticate(&self, credentials: &Credentials) -> Result<FakeSession, ScrapeError> {
        let mut state = self.state.borrow_mut();
        state.logins.push(credentials.email.clone());
        if state.locked.contains(&credentials.email) {
            return Err(ScrapeError::Auth {
                email: credentials.email.clone(),
                reason: "no request token on the login page".into(),
            });
        }
        Ok(FakeSession {
            email: credentials.email.clone(),
            state: self.state.clone(),
        })
    }
}

pub fn table_info_body(flags: &str) -> Value {
    let value = |letter: char| if flags.contains(letter) { "2" } else { "1" };
    json!({"status": 1, "data": {"options": {
        "100": {"value": value('M')},
        "101": {"value": value('L')},
        "102": {"value": value('P')}
    }}})
}

impl BgaApi for FakeSession {
    async fn ranking_page(&self, start: usize) -> Result<Value, ScrapeError> {
        let state = self.state.borrow();
        let ranks: Vec<Value> = state
            .ranking
            .iter()
            .skip(start)
            .take(10)
            .map(|id| json!({"id": id}))
            .collect();
        Ok(json!({"status": 1, "data": {"ranks": ranks}}))
    }

    async fn game_panel(&self) -> Result<Value, ScrapeError> {
        Ok(json!({"currentArenaTimeSpan": {"start": "2024-01-01 00:00:00", "end": "2024-03-31 23:59:59"}}))
    }

    async fn games_page(&self, player_id: &str, page: u32, _window: DiscoveryWindow) -> Result<Value, ScrapeError> {
        let mut state = self.state.borrow_mut();
        state.pages_requested.push((player_id.to_string(), page));
        if let Some(left) = state.history_failures.get_mut(&(player_id.to_string(), page)) {
            if *left > 0 {
                *left -= 1;
                return Err(service_down());
            }
        }
        if state.endless.contains(player_id) {
            return Ok(json!({"status": 1, "data": {"tables": [
                {"table_id": (100 + page).to_string(), "concede": "0"}
            ]}}));
        }
        let tables = state
            .histories
            .get(player_id)
            .and_then(|pages| pages.get(page as usize - 1))
            .cloned()
            .unwrap_or_default();
        Ok(json!({"status": 1, "data": {"tables": tables}}))
    }

    async fn table_info(&self, table_id: i64) -> Result<Value, ScrapeError> {
        let mut state = self.state.borrow_mut();
        if state.info_outages > 0 {
            state.info_outages -= 1;
            return Err(service_down());
        }
        if state.info_fails_for.contains(&self.email) {
            return Err(ScrapeError::Status {
                status: 403,
                url: format!("https://boardgamearena.test/table/table/tableinfos.html?id={table_id}"),
            });
        }
        if state.no_info.contains(&table_id) {
            return Ok(json!({"status": 0, "error": "Table not found"}));
        }
        Ok(table_info_body("MLP"))
    }

    async fn request_archive(&self, _table_id: i64) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn replay_log(&self, table_id: i64) -> Result<Value, ScrapeError> {
        let mut state = self.state.borrow_mut();
        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            return Err(service_down());
        }
        if state.broken_json.contains(&table_id) {
            let err = serde_json::from_str::<Value>("<html>maintenance</html>").unwrap_err();
            return Err(ScrapeError::Json(err));
        }
        if let Some(left) = state.quota.get_mut(&self.email) {
            if *left == 0 {
                return Ok(json!({"status": 0, "error": QUOTA_ERROR}));
            }
            *left -= 1;
        }
        state.served.push((self.email.clone(), table_id));
        Ok(state
            .replays
            .get(&table_id)
            .cloned()
            .unwrap_or_else(|| json!({"status": 0, "error": LOST_ERROR})))
    }
}

/// Entomology metadata served from memory.
#[derive(Default)]
pub struct FakeArchive {
    pub metadata: HashMap<String, Value>,
    pub reconnects: usize,
}

impl GameArchive for FakeArchive {
    async fn metadata(&self, uuid: &str) -> Result<Option<Value>, ScrapeError> {
        Ok(self.metadata.get(uuid).cloned())
    }

    fn board_url(&self, uuid: &str) -> String {
        format!("https://entomology.test/hive.html?game={uuid}")
    }

    fn reconnect(&mut self) -> Result<(), ScrapeError> {
        self.reconnects += 1;
        Ok(())
    }
}

/// Board pages keyed by uuid. Fails the first `failures` renders.
#[derive(Default)]
pub struct FakeRenderer {
    pub pages: HashMap<String, String>,
    pub failures: usize,
    pub rendered: Vec<String>,
    pub reconnects: usize,
}

impl PageRenderer for FakeRenderer {
    async fn render(&mut self, url: &str, selector: &str, _timeout: Duration) -> Result<String, ScrapeError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(ScrapeError::WebDriver("chrome not reachable".into()));
        }
        let uuid = url.rsplit("game=").next().unwrap_or_default().to_string();
        self.rendered.push(uuid.clone());
        self.pages
            .get(&uuid)
            .cloned()
            .ok_or_else(|| ScrapeError::RenderTimeout(format!("{selector} on {url}")))
    }

    async fn reconnect(&mut self) -> Result<(), ScrapeError> {
        self.reconnects += 1;
        Ok(())
    }
}

pub fn board_page(moves: &[&str]) -> String {
    let items: String = moves.iter().map(|m| format!("<li>{m}</li>")).collect();
    format!(r#"<html><body><div id="moves"><ol>{items}</ol></div></body></html>"#)
}

pub fn entomology_config(dir: &Path) -> EntomologyConfig {
    EntomologyConfig {
        base_url: "https://entomology.test/".into(),
        webdriver_url: "http://localhost:9515".into(),
        uuids_path: dir.join("uuids.json"),
        progress_path: dir.join("progress.txt"),
        variant: "lmp".into(),
        ranked_only: true,
        tournament_only: false,
        render_timeout: Duration::from_secs(10),
    }
}
