//! Scraper configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use hive_core::ExpansionFlags;

use crate::db::matches::ExportFilter;
use crate::error::ScrapeError;

/// Knobs that shape a run. None of these come from the platforms; they are
/// guesses at what keeps a run polite and bounded.
#[derive(Clone, Debug)]
pub struct RunPolicy {
    /// Give up paging one player's history after this many pages.
    pub max_history_pages: u32,
    /// Pause before re-establishing a connection after a transport failure.
    pub reconnect_delay: Duration,
    /// Consecutive transport failures tolerated on one candidate before the run halts.
    pub max_reconnects: u32,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            max_history_pages: 500,
            reconnect_delay: Duration::from_secs(60),
            max_reconnects: 3,
        }
    }
}

/// How the discovery time window is chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WindowSource {
    /// Fixed unix-second bounds.
    Explicit { start: i64, end: i64 },
    /// The last N months up to now.
    LastMonths(u32),
    /// The platform's current arena season.
    CurrentSeason,
}

#[derive(Clone, Debug)]
pub struct EntomologyConfig {
    pub base_url: String,
    pub webdriver_url: String,
    pub uuids_path: PathBuf,
    pub progress_path: PathBuf,
    /// Required variant string; empty accepts any.
    pub variant: String,
    pub ranked_only: bool,
    pub tournament_only: bool,
    pub render_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ScraperConfig {
    pub database_url: String,
    pub bga_base_url: String,
    pub accounts_path: PathBuf,
    pub ranking_players: usize,
    pub window: WindowSource,
    pub policy: RunPolicy,
    pub entomology: EntomologyConfig,
    pub output_dir: PathBuf,
    pub export: ExportFilter,
}

impl ScraperConfig {
    pub fn from_env() -> Result<Self, ScrapeError> {
        let window = match (env::var("DISCOVERY_START").ok(), env::var("DISCOVERY_END").ok()) {
            (Some(start), Some(end)) => WindowSource::Explicit {
                start: parse_var("DISCOVERY_START", &start)?,
                end: parse_var("DISCOVERY_END", &end)?,
            },
            (None, None) if env_flag("DISCOVERY_CURRENT_SEASON", false) => WindowSource::CurrentSeason,
            (None, None) => WindowSource::LastMonths(env_or("DISCOVERY_MONTHS", 12)),
            _ => {
                return Err(ScrapeError::Config(
                    "DISCOVERY_START and DISCOVERY_END must be set together".into(),
                ))
            }
        };

        let defaults = RunPolicy::default();
        let policy = RunPolicy {
            max_history_pages: env_or("MAX_HISTORY_PAGES", defaults.max_history_pages),
            reconnect_delay: Duration::from_secs(env_or(
                "RECONNECT_DELAY_SECS",
                defaults.reconnect_delay.as_secs(),
            )),
            max_reconnects: env_or("MAX_RECONNECTS", defaults.max_reconnects),
        };

        let entomology = EntomologyConfig {
            base_url: env::var("ENTOMOLOGY_BASE_URL")
                .unwrap_or_else(|_| "https://entomology.gitlab.io/".to_string()),
            webdriver_url: env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".to_string()),
            uuids_path: env_path("ENTOMOLOGY_UUIDS_PATH", "entomology_uuids.json"),
            progress_path: env_path("ENTOMOLOGY_PROGRESS_PATH", "entomology_uuids.txt"),
            variant: env::var("ENTOMOLOGY_VARIANT").unwrap_or_else(|_| "lmp".to_string()),
            ranked_only: env_flag("ENTOMOLOGY_RANKED", true),
            tournament_only: env_flag("ENTOMOLOGY_TOURNAMENT", false),
            render_timeout: Duration::from_secs(env_or("RENDER_TIMEOUT_SECS", 10)),
        };

        let export = ExportFilter {
            expansions: ExpansionFlags::from_variant(
                &env::var("EXPORT_EXPANSIONS").unwrap_or_else(|_| "MLP".to_string()),
            ),
            include_bots: env_flag("EXPORT_INCLUDE_BOTS", false),
            include_bga: env_flag("EXPORT_INCLUDE_BGA", true),
            include_entomology: env_flag("EXPORT_INCLUDE_ENTOMOLOGY", false),
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://hivemind.db?mode=rwc".to_string()),
            bga_base_url: env::var("BGA_BASE_URL")
                .unwrap_or_else(|_| "https://boardgamearena.com".to_string()),
            accounts_path: env_path("BGA_ACCOUNTS_PATH", "accounts.json"),
            ranking_players: env_or("RANKING_PLAYERS", 10),
            window,
            policy,
            entomology,
            output_dir: env_path("GAME_STRINGS_DIR", "./game_strings/"),
            export,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key).map(|v| v.to_ascii_lowercase()) {
        Ok(v) if matches!(v.as_str(), "1" | "true" | "yes") => true,
        Ok(v) if matches!(v.as_str(), "0" | "false" | "no") => false,
        _ => default,
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ScrapeError> {
    value
        .trim()
        .parse()
        .map_err(|_| ScrapeError::Config(format!("{key} is not a valid number: {value}")))
}
