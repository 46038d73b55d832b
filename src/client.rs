//! GraphQL-over-HTTP client for the remote service.
//!
//! [`GraphQlClient`] is the production [`ContentSource`] and
//! [`ScenarioPublisher`]. Every request goes through [`GraphQlClient::post`],
//! which owns the retry policy:
//!
//! - HTTP 429 or 5xx → retry with exponential backoff (1s, 2s, 4s, … 32s)
//! - HTTP 4xx (not 429) → fail immediately with [`HarvestError::Http`]
//! - Network error or timeout → retry
//!
//! After `max_retries` retries the call fails with
//! [`HarvestError::Transient`].
//!
//! A response that arrives but carries no `data` (the service reports
//! application errors in an `errors` array) is treated as "no result":
//! search yields an empty page and fetch-by-id yields `None`.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{ApiConfig, Credentials};
use crate::error::HarvestError;
use crate::models::{ContentKind, Item};
use crate::queries;
use crate::source::ContentSource;
use crate::upload::ScenarioPublisher;

const TOKEN_HEADER: &str = "x-access-token";

pub struct GraphQlClient {
    http: reqwest::Client,
    url: String,
    max_retries: u32,
    token: Option<String>,
}

impl GraphQlClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("aids-harvest/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            http,
            url: config.url.clone(),
            max_retries: config.max_retries,
            token: None,
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// Exchange credentials for an access token, sent on every later request.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), HarvestError> {
        let response = self
            .post(&queries::login(&credentials.username, &credentials.password))
            .await?;
        let token = data_envelope(response)
            .as_ref()
            .and_then(access_token)
            .ok_or_else(|| HarvestError::Auth("login returned no access token".to_string()))?;

        self.token = Some(token);
        info!("Logged in as {}", credentials.username);
        Ok(())
    }

    /// Post one GraphQL payload, retrying transient failures.
    pub async fn post(&self, payload: &Value) -> Result<Value, HarvestError> {
        let mut last_err = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff(attempt);
                debug!(attempt, ?delay, "Retrying request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.http.post(&self.url).json(payload);
            if let Some(token) = &self.token {
                request = request.header(TOKEN_HEADER, token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .map_err(|e| HarvestError::Decode(e.to_string()));
                    }

                    let body = response.text().await.unwrap_or_default();

                    // Rate limited or server error
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!("Server returned {}, will retry", status);
                        last_err = format!("HTTP {}: {}", status, body);
                        continue;
                    }

                    return Err(HarvestError::Http {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    warn!("Request failed: {}", e);
                    last_err = e.to_string();
                    continue;
                }
            }
        }

        Err(HarvestError::Transient {
            attempts: self.max_retries + 1,
            message: last_err,
        })
    }
}

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, … capped at 32s.
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

/// The `data` member of a GraphQL response, or `None` when it is missing
/// or null. Any `errors` reported alongside are logged.
pub fn data_envelope(response: Value) -> Option<Value> {
    let Value::Object(mut fields) = response else {
        warn!("GraphQL response is not an object");
        return None;
    };

    match fields.remove("data") {
        Some(data) if !data.is_null() => Some(data),
        _ => {
            let errors = fields
                .get("errors")
                .and_then(Value::as_array)
                .map(|errors| {
                    errors
                        .iter()
                        .filter_map(|e| e.get("message").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .unwrap_or_default();
            warn!("There was no data: {}", errors);
            None
        }
    }
}

fn access_token(data: &Value) -> Option<String> {
    data.pointer("/login/accessToken")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_search(data: &Value) -> Result<Vec<Item>, HarvestError> {
    match data.pointer("/user/search") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(results) => serde_json::from_value(results.clone())
            .map_err(|e| HarvestError::Decode(format!("search results: {}", e))),
    }
}

/// The record under the kind's root field. A record the model cannot
/// decode is logged and treated like a missing one, so a single bad
/// record only costs its own branch.
pub fn parse_record(data: &Value, kind: ContentKind) -> Option<Item> {
    let record = data.get(queries::record_field(kind)).filter(|r| !r.is_null())?;
    match serde_json::from_value(record.clone()) {
        Ok(item) => Some(item),
        Err(e) => {
            let id = record
                .get("publicId")
                .and_then(Value::as_str)
                .unwrap_or("?");
            warn!(id, "Could not decode {} record, skipping: {}", kind, e);
            None
        }
    }
}

fn created_public_id(data: &Value) -> Option<String> {
    data.pointer("/createScenario/publicId")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ContentSource for GraphQlClient {
    async fn search_page(
        &self,
        kind: ContentKind,
        term: &str,
        offset: usize,
    ) -> Result<Vec<Item>, HarvestError> {
        let response = self.post(&queries::search(kind, term, offset)).await?;
        match data_envelope(response) {
            Some(data) => parse_search(&data),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_by_id(&self, kind: ContentKind, id: &str) -> Result<Option<Item>, HarvestError> {
        let response = self.post(&queries::get_by_id(kind, id)).await?;
        Ok(data_envelope(response).and_then(|data| parse_record(&data, kind)))
    }
}

#[async_trait]
impl ScenarioPublisher for GraphQlClient {
    async fn create_scenario(&self) -> Result<String, HarvestError> {
        let response = self.post(&queries::create_scenario()).await?;
        data_envelope(response)
            .as_ref()
            .and_then(created_public_id)
            .ok_or_else(|| HarvestError::Decode("createScenario returned no publicId".to_string()))
    }

    async fn update_scenario(&self, public_id: &str, scenario: &Item) -> Result<(), HarvestError> {
        let response = self
            .post(&queries::update_scenario(public_id, scenario))
            .await?;
        match data_envelope(response) {
            Some(_) => Ok(()),
            None => Err(HarvestError::Decode(format!(
                "updateScenario returned no data for {}",
                public_id
            ))),
        }
    }
}
