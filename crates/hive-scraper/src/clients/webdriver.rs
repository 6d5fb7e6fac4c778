//! Minimal W3C WebDriver client (chromedriver, geckodriver) for pages that
//! only build their content in the browser.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};

use crate::error::ScrapeError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[allow(async_fn_in_trait)]
pub trait PageRenderer {
    /// Load `url`, wait up to `timeout` for `selector` to match at least one
    /// element, and return the rendered markup.
    async fn render(&mut self, url: &str, selector: &str, timeout: Duration) -> Result<String, ScrapeError>;

    /// Tear down the browser session and open a new one.
    async fn reconnect(&mut self) -> Result<(), ScrapeError>;
}

pub struct WebDriverRenderer {
    client: Client,
    endpoint: String,
    session_id: Option<String>,
}

impl WebDriverRenderer {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ScrapeError> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            session_id: None,
        })
    }

    async fn command(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Result<Value, ScrapeError> {
        let url = format!("{}{}", self.endpoint, path);
        let mut req = self.client.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let data: Value = serde_json::from_str(&req.send().await?.text().await?)?;
        let value = data.get("value").cloned().unwrap_or(Value::Null);

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            let message = value.get("message").and_then(Value::as_str).unwrap_or("");
            return Err(ScrapeError::WebDriver(format!("{error}: {message}")));
        }
        Ok(value)
    }

    async fn session(&mut self) -> Result<String, ScrapeError> {
        if let Some(id) = &self.session_id {
            return Ok(id.clone());
        }

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": ["--headless", "--disable-gpu"] }
                }
            }
        });
        let value = self
            .command(reqwest::Method::POST, "/session", Some(capabilities))
            .await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ScrapeError::WebDriver("new session response without sessionId".into()))?
            .to_string();

        tracing::info!(session_id = %id, "WebDriver session started");
        self.session_id = Some(id.clone());
        Ok(id)
    }

    pub async fn quit(&mut self) {
        if let Some(id) = self.session_id.take() {
            if let Err(e) = self
                .command(reqwest::Method::DELETE, &format!("/session/{id}"), None)
                .await
            {
                tracing::warn!(error = %e, "Failed to close WebDriver session");
            }
        }
    }
}

impl PageRenderer for WebDriverRenderer {
    async fn render(&mut self, url: &str, selector: &str, timeout: Duration) -> Result<String, ScrapeError> {
        let id = self.session().await?;

        self.command(
            reqwest::Method::POST,
            &format!("/session/{id}/url"),
            Some(json!({ "url": url })),
        )
        .await?;

        let deadline = Instant::now() + timeout;
        loop {
            let found = self
                .command(
                    reqwest::Method::POST,
                    &format!("/session/{id}/elements"),
                    Some(json!({ "using": "css selector", "value": selector })),
                )
                .await?;
            if found.as_array().is_some_and(|els| !els.is_empty()) {
                break;
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::RenderTimeout(format!("{selector} on {url}")));
            }
            sleep(POLL_INTERVAL).await;
        }

        let source = self
            .command(reqwest::Method::GET, &format!("/session/{id}/source"), None)
            .await?;
        source
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ScrapeError::WebDriver("page source is not a string".into()))
    }

    async fn reconnect(&mut self) -> Result<(), ScrapeError> {
        self.quit().await;
        self.session().await.map(|_| ())
    }
}
