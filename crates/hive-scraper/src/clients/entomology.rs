//! Entomology game archive: per-game JSON metadata served as static files,
//! and a board page whose move list is only present after rendering.

use reqwest::Client;
use serde_json::Value;

use crate::error::ScrapeError;

const BOARD: &str = "hive.html";

/// Metadata lookups against the archive.
#[allow(async_fn_in_trait)]
pub trait GameArchive {
    /// Metadata for one game; `None` when the archive returns nothing usable.
    async fn metadata(&self, uuid: &str) -> Result<Option<Value>, ScrapeError>;

    /// Board page rendering the move list of `uuid`.
    fn board_url(&self, uuid: &str) -> String;

    /// Drop the current connection and start a fresh one.
    fn reconnect(&mut self) -> Result<(), ScrapeError>;
}

pub struct EntomologyClient {
    client: Client,
    base_url: String,
}

impl EntomologyClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ScrapeError> {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            client: build_client()?,
            base_url,
        })
    }
}

fn build_client() -> Result<Client, ScrapeError> {
    Ok(Client::builder().user_agent("hivemind/0.1").build()?)
}

impl GameArchive for EntomologyClient {
    async fn metadata(&self, uuid: &str) -> Result<Option<Value>, ScrapeError> {
        let url = format!("{}{}", self.base_url, xhr_path(uuid));
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body: Value = serde_json::from_str(&resp.text().await?)?;
        let empty = match &body {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        Ok(if empty { None } else { Some(body) })
    }

    fn board_url(&self, uuid: &str) -> String {
        format!("{}{}?game={}", self.base_url, BOARD, uuid)
    }

    fn reconnect(&mut self) -> Result<(), ScrapeError> {
        self.client = build_client()?;
        Ok(())
    }
}

/// Static path of a game's metadata: `a/b/rest` for uuid `abrest`. A first
/// character that isn't an ASCII digit or lowercase letter is written as `x`
/// followed by its code point in hex.
pub fn xhr_path(uuid: &str) -> String {
    let mut chars = uuid.chars();
    let (Some(first), Some(second)) = (chars.next(), chars.next()) else {
        return uuid.to_string();
    };
    let rest = chars.as_str();

    let first = if first.is_ascii_digit() || first.is_lowercase() {
        first.to_string()
    } else {
        format!("x{:x}", first as u32)
    };

    format!("{first}/{second}/{rest}")
}
