// Steam Web API: current concurrent-player count for an app id.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

const STEAM_API_BASE_URL: &str = "https://api.steampowered.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SteamApiError {
    /// Upstream reported zero players; treated as a failed observation, never a valid sample.
    #[error("Steam API returned 0 players - treating as failed request")]
    ZeroPlayers,
    #[error("Steam API request timeout")]
    Timeout,
    #[error("Steam API error: {status}")]
    Status { status: reqwest::StatusCode },
    #[error("Invalid response format from Steam API")]
    InvalidResponse,
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
}

/// Source of the live player count. Implemented by the HTTP client and by test fakes.
#[async_trait]
pub trait PlayerCountSource: Send + Sync {
    async fn current_player_count(&self, app_id: u32) -> Result<u32, SteamApiError>;
}

#[derive(Debug, Deserialize)]
struct PlayerCountEnvelope {
    response: PlayerCountResponse,
}

#[derive(Debug, Deserialize)]
struct PlayerCountResponse {
    player_count: Option<u32>,
}

pub struct SteamApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl SteamApiClient {
    pub fn new() -> Result<Self, SteamApiError> {
        Self::with_base_url(STEAM_API_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, SteamApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SteamApiError::Network)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PlayerCountSource for SteamApiClient {
    #[instrument(skip(self), fields(api = "steam", operation = "current_player_count"))]
    async fn current_player_count(&self, app_id: u32) -> Result<u32, SteamApiError> {
        let url = format!(
            "{}/ISteamUserStats/GetNumberOfCurrentPlayers/v1/",
            self.base_url
        );
        let response = self
            .http
            .get(&url)
            .query(&[("appid", app_id)])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SteamApiError::Status { status });
        }

        let body: PlayerCountEnvelope = response
            .json()
            .await
            .map_err(|_| SteamApiError::InvalidResponse)?;
        validate_player_count(body.response.player_count)
    }
}

fn map_transport_error(e: reqwest::Error) -> SteamApiError {
    if e.is_timeout() {
        SteamApiError::Timeout
    } else {
        SteamApiError::Network(e)
    }
}

/// Missing count is a malformed response; a count of exactly 0 is rejected by policy.
pub fn validate_player_count(count: Option<u32>) -> Result<u32, SteamApiError> {
    match count {
        None => Err(SteamApiError::InvalidResponse),
        Some(0) => Err(SteamApiError::ZeroPlayers),
        Some(n) => Ok(n),
    }
}
