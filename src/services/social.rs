use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when talking to the ingestion service
#[derive(Debug, Error)]
pub enum SocialError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Client for the social-ingestion service's raw-text endpoint
///
/// The ingestion service aggregates a user's imported social content into
/// one text blob; this service only reads it to build the training corpus
/// for the cluster model.
pub struct RawTextClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RawTextClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            api_key,
            client,
        }
    }

    /// Fetch the aggregated raw text for a user
    ///
    /// Returns an empty string when the user has no ingested content.
    pub async fn get_raw_text(&self, user_id: &str) -> Result<String, SocialError> {
        let url = format!(
            "{}/users/{}/raw-text",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(user_id)
        );

        tracing::debug!("Fetching raw text from: {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {}
            404 => return Err(SocialError::NotFound(format!("user {}", user_id))),
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(SocialError::ApiError(format!("status {}: {}", status, body)));
            }
        }

        let body: Value = response.json().await?;
        let text = body
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| SocialError::InvalidResponse("missing 'text' field".to_string()))?;

        Ok(text.to_string())
    }
}
