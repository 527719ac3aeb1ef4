//! REST client for full-book snapshots and listen-key lifecycle calls.

use crate::constants;
use crate::wire::{DepthResponse, ListenKeyResponse};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("deserialization failed: {0}")]
    DeserializeFailed(String),
}

pub type Result<T> = std::result::Result<T, RestError>;

/// Thin typed wrapper over the exchange's REST endpoints.
pub struct BitrueRestClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl BitrueRestClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(constants::REST_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Fetch the full order book for an exchange symbol.
    pub async fn depth(&self, symbol: &str, limit: u32) -> Result<DepthResponse> {
        let url = format!("{}{}", self.base_url, constants::ORDER_BOOK_PATH);
        let limit = limit.to_string();

        debug!("fetching order book for {} from {}", symbol, url);

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("limit", limit.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RestError::ApiError(format!(
                "depth request for {} returned {}",
                symbol,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RestError::DeserializeFailed(e.to_string()))
    }

    /// Create a listen key for the private stream.
    pub async fn create_listen_key(&self) -> Result<String> {
        let url = format!("{}{}", self.base_url, constants::LISTEN_KEY_PATH);

        let response = self
            .client
            .post(&url)
            .header(constants::API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RestError::ApiError(format!(
                "listen key create returned {}",
                response.status()
            )));
        }

        let body: ListenKeyResponse = response
            .json()
            .await
            .map_err(|e| RestError::DeserializeFailed(e.to_string()))?;

        Ok(body.data.listen_key)
    }

    /// Extend the listen key's expiry window.
    pub async fn keepalive_listen_key(&self, listen_key: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, constants::LISTEN_KEY_PATH);

        let response = self
            .client
            .put(&url)
            .header(constants::API_KEY_HEADER, &self.api_key)
            .query(&[("listenKey", listen_key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RestError::ApiError(format!(
                "listen key keepalive returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Invalidate the listen key.
    pub async fn close_listen_key(&self, listen_key: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, constants::LISTEN_KEY_PATH);

        let response = self
            .client
            .delete(&url)
            .header(constants::API_KEY_HEADER, &self.api_key)
            .query(&[("listenKey", listen_key)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RestError::ApiError(format!(
                "listen key close returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
