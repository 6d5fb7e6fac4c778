//! BoardGameArena HTTP client.
//!
//! Every endpoint answers JSON with an optional top-level `error` string;
//! interpreting that string is left to the callers.

use std::sync::Arc;

use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::discovery::DiscoveryWindow;
use crate::error::ScrapeError;
use crate::identity::Credentials;

pub const GAME_ID: u32 = 79;

const USER_AGENT: &str = "hivemind/0.1";

const ACCOUNT: &str = "/account";
const LOGIN: &str = "/account/account/login.html";
const RANKING: &str = "/gamepanel/gamepanel/getRanking.html";
const GAME_PANEL: &str = "/gamepanel";
const GAMES: &str = "/gamestats/gamestats/getGames.html";
const TABLE_INFO: &str = "/table/table/tableinfos.html";
const ARCHIVE: &str = "/gamereview/gamereview/requestTableArchive.html";
const REPLAY: &str = "/archive/archive/logs.html";

/// The remote calls the pipeline needs from an authenticated session.
#[allow(async_fn_in_trait)]
pub trait BgaApi {
    /// Arena ranking, 10 entries starting at `start`.
    async fn ranking_page(&self, start: usize) -> Result<Value, ScrapeError>;

    /// Game panel info, including the current arena season bounds.
    async fn game_panel(&self) -> Result<Value, ScrapeError>;

    /// One page (1-based) of a player's finished matches inside `window`.
    async fn games_page(&self, player_id: &str, page: u32, window: DiscoveryWindow) -> Result<Value, ScrapeError>;

    async fn table_info(&self, table_id: i64) -> Result<Value, ScrapeError>;

    /// Must precede `replay_log`, or the log comes back empty.
    async fn request_archive(&self, table_id: i64) -> Result<(), ScrapeError>;

    async fn replay_log(&self, table_id: i64) -> Result<Value, ScrapeError>;
}

/// Turns a credential pair into an authenticated session.
#[allow(async_fn_in_trait)]
pub trait Authenticator {
    type Session: BgaApi;

    async fn authenticate(&self, credentials: &Credentials) -> Result<Self::Session, ScrapeError>;
}

pub struct BgaSession {
    client: Client,
    base_url: String,
}

impl BgaSession {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ScrapeError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl BgaApi for BgaSession {
    async fn ranking_page(&self, start: usize) -> Result<Value, ScrapeError> {
        self.get_json(
            RANKING,
            &[
                ("game", GAME_ID.to_string()),
                ("mode", "arena".to_string()),
                ("start", start.to_string()),
            ],
        )
        .await
    }

    async fn game_panel(&self) -> Result<Value, ScrapeError> {
        self.get_json(
            GAME_PANEL,
            &[
                ("game", "hive".to_string()),
                ("game_id", GAME_ID.to_string()),
                ("with_ranking_info", "false".to_string()),
            ],
        )
        .await
    }

    async fn games_page(&self, player_id: &str, page: u32, window: DiscoveryWindow) -> Result<Value, ScrapeError> {
        self.get_json(
            GAMES,
            &[
                ("page", page.to_string()),
                ("player", player_id.to_string()),
                ("game_id", GAME_ID.to_string()),
                ("start_date", window.start.to_string()),
                ("end_date", window.end.to_string()),
                ("finished", "1".to_string()),
                ("updateStats", "0".to_string()),
            ],
        )
        .await
    }

    async fn table_info(&self, table_id: i64) -> Result<Value, ScrapeError> {
        self.get_json(TABLE_INFO, &[("id", table_id.to_string())]).await
    }

    async fn request_archive(&self, table_id: i64) -> Result<(), ScrapeError> {
        let url = format!("{}{}", self.base_url, ARCHIVE);
        self.client
            .get(&url)
            .query(&[("table", table_id.to_string())])
            .send()
            .await?;
        Ok(())
    }

    async fn replay_log(&self, table_id: i64) -> Result<Value, ScrapeError> {
        self.get_json(
            REPLAY,
            &[
                ("table", table_id.to_string()),
                ("translated", "true".to_string()),
            ],
        )
        .await
    }
}

/// Logs in through the account page form.
pub struct BgaLogin {
    base_url: String,
}

impl BgaLogin {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Authenticator for BgaLogin {
    type Session = BgaSession;

    async fn authenticate(&self, credentials: &Credentials) -> Result<BgaSession, ScrapeError> {
        let jar = Arc::new(Jar::default());
        let bootstrap = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_provider(jar.clone())
            .build()?;

        // The login form carries the anti-forgery token every later call must echo.
        let page = bootstrap
            .get(format!("{}{}", self.base_url, ACCOUNT))
            .send()
            .await?
            .text()
            .await?;
        let token = extract_request_token(&page).ok_or_else(|| ScrapeError::Auth {
            email: credentials.email.clone(),
            reason: "no request token on the login page".into(),
        })?;

        let resp = bootstrap
            .post(format!("{}{}", self.base_url, LOGIN))
            .form(&[
                ("email", credentials.email.as_str()),
                ("password", credentials.password.as_str()),
                ("rememberme", "off"),
                ("redirect", "join"),
                ("form_id", "loginform"),
                ("request_token", token.as_str()),
            ])
            .send()
            .await?;
        tracing::debug!(email = %credentials.email, status = %resp.status(), "Login form submitted");

        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Request-Token",
            HeaderValue::from_str(&token).map_err(|e| ScrapeError::Auth {
                email: credentials.email.clone(),
                reason: format!("unusable request token: {e}"),
            })?,
        );
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_provider(jar)
            .default_headers(headers)
            .build()?;

        Ok(BgaSession {
            client,
            base_url: self.base_url.clone(),
        })
    }
}

/// Pull the anti-forgery token out of the account page: the hidden
/// `#request_token` input, or failing that the `requestToken: '...'`
/// assignment in an inline script.
pub fn extract_request_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("#request_token").ok()?;
    let from_input = document
        .select(&selector)
        .find_map(|el| el.value().attr("value"))
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    if from_input.is_some() {
        return from_input;
    }

    let re = Regex::new(r#"requestToken:\s*['"]([^'"]+)['"]"#).ok()?;
    Some(re.captures(html)?.get(1)?.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_from_hidden_input() {
        let html = r#"<html><body><form id="loginform">
            <input type="hidden" id="request_token" name="request_token" value="Ab3xZ9"/>
        </form></body></html>"#;
        assert_eq!(extract_request_token(html).as_deref(), Some("Ab3xZ9"));
    }

    #[test]
    fn test_token_from_inline_script() {
        let html = r#"<script>var bgaConfig = { requestToken: 'tok-123', lang: 'en' };</script>"#;
        assert_eq!(extract_request_token(html).as_deref(), Some("tok-123"));
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(extract_request_token("<html><body>maintenance</body></html>"), None);
    }
}
