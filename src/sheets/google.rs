// Google Sheets v4 REST client (values get/update/append/clear, addSheet).
// Authenticates with a service-account key (tokens minted and refreshed by gcp_auth) or,
// for local runs, a pre-issued bearer token.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use super::{SheetsError, TabularClient};

const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// What a credentials file holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    /// Service-account key JSON (`client_email` + `private_key`).
    ServiceAccount(String),
    /// Bearer token used as is; it is not refreshed.
    AccessToken(String),
}

/// Classifies credentials file contents: a service-account key, a JSON object with
/// `access_token`, or the raw token text.
pub fn parse_credentials(raw: &str) -> Result<CredentialsSource, SheetsError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => {
            if map.contains_key("private_key") && map.contains_key("client_email") {
                return Ok(CredentialsSource::ServiceAccount(raw.to_string()));
            }
            match map.get("access_token").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => {
                    Ok(CredentialsSource::AccessToken(token.to_string()))
                }
                _ => Err(SheetsError::Credentials(
                    "expected a service-account key or an access_token".into(),
                )),
            }
        }
        _ => match raw.trim() {
            "" => Err(SheetsError::Credentials("no access token".into())),
            token => Ok(CredentialsSource::AccessToken(token.to_string())),
        },
    }
}

enum Auth {
    Static(String),
    ServiceAccount(CustomServiceAccount),
}

impl Auth {
    /// Current bearer token. Service-account tokens are cached and refreshed before expiry.
    async fn bearer(&self) -> Result<String, SheetsError> {
        match self {
            Auth::Static(token) => Ok(token.clone()),
            Auth::ServiceAccount(account) => {
                let token = account
                    .token(&[SHEETS_SCOPE])
                    .await
                    .map_err(|e| SheetsError::Credentials(e.to_string()))?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    auth: Auth,
}

impl GoogleSheetsClient {
    pub async fn from_credentials_file(
        spreadsheet_id: impl Into<String>,
        credentials_path: &Path,
    ) -> Result<Self, SheetsError> {
        let with_path =
            |msg: String| SheetsError::Credentials(format!("{}: {}", credentials_path.display(), msg));
        let raw = tokio::fs::read_to_string(credentials_path)
            .await
            .map_err(|e| with_path(e.to_string()))?;
        let source = match parse_credentials(&raw) {
            Ok(source) => source,
            Err(SheetsError::Credentials(msg)) => return Err(with_path(msg)),
            Err(e) => return Err(e),
        };
        let auth = match source {
            CredentialsSource::ServiceAccount(key) => {
                let account =
                    CustomServiceAccount::from_json(&key).map_err(|e| with_path(e.to_string()))?;
                info!(path = %credentials_path.display(), "using service-account credentials");
                Auth::ServiceAccount(account)
            }
            CredentialsSource::AccessToken(token) => Auth::Static(token),
        };
        Self::with_auth(SHEETS_API_BASE_URL, spreadsheet_id, auth)
    }

    /// Client with a fixed bearer token.
    pub fn new(
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, SheetsError> {
        Self::with_auth(base_url, spreadsheet_id, Auth::Static(access_token.into()))
    }

    fn with_auth(
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        auth: Auth,
    ) -> Result<Self, SheetsError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SheetsError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
            auth,
        })
    }

    /// `{base}/{spreadsheet_id}/values/{range}{suffix}` with the range percent-encoded.
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, SheetsError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| SheetsError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    fn batch_update_url(&self) -> Result<Url, SheetsError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| SheetsError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .push(&format!("{}:batchUpdate", self.spreadsheet_id));
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        range: &str,
    ) -> Result<reqwest::Response, SheetsError> {
        let token = self.auth.bearer().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SheetsError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_error(status, &body, range))
    }
}

/// Maps an error response to a `SheetsError`. Sheets signals a missing tab with a
/// range-parse failure.
pub fn classify_error(status: reqwest::StatusCode, body: &str, range: &str) -> SheetsError {
    if body.contains("Unable to parse range") {
        SheetsError::RangeNotFound(range.to_string())
    } else if body.contains("already exists") {
        SheetsError::SheetExists(range.to_string())
    } else {
        SheetsError::Api {
            status: status.as_u16(),
            message: body.to_string(),
        }
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TabularClient for GoogleSheetsClient {
    #[instrument(skip(self), fields(client = "google_sheets", operation = "get_values"))]
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.values_url(range, "")?;
        let response = self.send(self.http.get(url), range).await?;
        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| SheetsError::Transport(e.to_string()))?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    #[instrument(skip(self, rows), fields(client = "google_sheets", operation = "update_values", rows = rows.len()))]
    async fn update_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), SheetsError> {
        let url = self.values_url(range, "")?;
        let request = self
            .http
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": range, "values": rows }));
        self.send(request, range).await?;
        Ok(())
    }

    #[instrument(skip(self, rows), fields(client = "google_sheets", operation = "append_values", rows = rows.len()))]
    async fn append_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), SheetsError> {
        let url = self.values_url(range, ":append")?;
        let request = self
            .http
            .post(url)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": rows }));
        self.send(request, range).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(client = "google_sheets", operation = "clear_values"))]
    async fn clear_values(&self, range: &str) -> Result<(), SheetsError> {
        let url = self.values_url(range, ":clear")?;
        self.send(self.http.post(url).json(&json!({})), range)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(client = "google_sheets", operation = "add_sheet"))]
    async fn add_sheet(&self, title: &str) -> Result<(), SheetsError> {
        let url = self.batch_update_url()?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        self.send(self.http.post(url).json(&body), title).await?;
        debug!(sheet = title, "sheet created");
        Ok(())
    }
}
