// crates/session-client/src/api.rs

//! Plain request/response helper for the non-realtime endpoints.
//!
//! Every response body is an envelope `{ code, message, value }`; callers
//! get `value`. A non-2xx status, a transport failure and an undecodable
//! body are all just failures.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use session_core::game::LeaderboardResponse;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[allow(dead_code)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    value: T,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// `base` + `path`, with exactly one slash between them.
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let request = self.http.get(&url);
        self.execute(url, request).await
    }

    pub async fn post<V: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &V) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(%url, "POST");
        let request = self.http.post(&url).json(body);
        self.execute(url, request).await
    }

    /// Top `count` leaderboard entries.
    pub async fn leaderboard(&self, count: u32) -> Result<LeaderboardResponse, ApiError> {
        self.get(&format!("leaderboard/ranks?count={count}")).await
    }

    async fn execute<T: DeserializeOwned>(&self, url: String, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let response = match request.send().await {
            Ok(r) => r,
            Err(source) => return Err(ApiError::Transport { url, source }),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
            });
        }

        match response.json::<Envelope<T>>().await {
            Ok(envelope) => {
                if let Some(message) = envelope.message.as_deref() {
                    debug!(%url, %message, "api response");
                }
                Ok(envelope.value)
            }
            Err(source) => Err(ApiError::Decode { url, source }),
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
