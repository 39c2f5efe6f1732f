//! Collection service client.
//!
//! # Architecture
//!
//! - One thin wrapper per operation: `list`, `add`, `set_quantity`,
//!   `remove`, `clear_all`, `bulk_sync`
//! - Every call carries the shopper's bearer credential
//! - No retries and no cache: the engine reloads after each mutation, so the
//!   service stays the single source of truth for authenticated collections
//!
//! | Operation | Method | Path |
//! |---|---|---|
//! | list | GET | `/{collection}` |
//! | add | POST | `/{collection}` |
//! | set_quantity | PUT | `/{collection}/{itemId}` |
//! | remove | DELETE | `/{collection}/{itemId}` |
//! | clear_all | DELETE | `/{collection}` |
//! | bulk_sync | POST | `/{collection}/sync` |

mod types;

use std::sync::Arc;

use cartsync_core::ItemId;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::collection::CollectionKind;

pub use types::{BulkSyncRequest, ListResponse, QuantityUpdate};

/// Maximum number of response body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Errors that can occur when talking to the collection service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Credential was refused.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Base URL cannot carry path segments.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl RemoteError {
    /// Transport failures, throttling and server errors are worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Unauthorized(_) | Self::Parse(_) | Self::InvalidBaseUrl(_) => false,
        }
    }
}

// =============================================================================
// CollectionClient
// =============================================================================

/// Client for the collection service.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct CollectionClient {
    inner: Arc<CollectionClientInner>,
}

struct CollectionClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for CollectionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl CollectionClient {
    /// Create a client for the service rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` cannot carry path segments or the HTTP
    /// client fails to build.
    pub fn new(base_url: Url) -> Result<Self, RemoteError> {
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("cartsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(CollectionClientInner { client, base_url }),
        })
    }

    /// List every line of collection `C`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body cannot be decoded.
    #[instrument(skip(self, credential), fields(collection = C::RESOURCE))]
    pub async fn list<C: CollectionKind>(
        &self,
        credential: &SecretString,
    ) -> Result<Vec<C::Item>, RemoteError> {
        let url = self.endpoint(&[C::RESOURCE])?;
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(credential.expose_secret())
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.text().await?;
        let list: ListResponse<C::Item> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body),
                "Failed to parse collection listing"
            );
            RemoteError::Parse(e.to_string())
        })?;
        Ok(list.into_items())
    }

    /// Add a line. The service aggregates duplicates by identity key.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, credential, line), fields(collection = C::RESOURCE))]
    pub async fn add<C: CollectionKind>(
        &self,
        credential: &SecretString,
        line: &C::Line,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&[C::RESOURCE])?;
        let response = self
            .inner
            .client
            .post(url)
            .bearer_auth(credential.expose_secret())
            .json(line)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Set the quantity of one line.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, credential), fields(collection = C::RESOURCE, item_id = %id))]
    pub async fn set_quantity<C: CollectionKind>(
        &self,
        credential: &SecretString,
        id: &ItemId,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&[C::RESOURCE, id.as_str()])?;
        let response = self
            .inner
            .client
            .put(url)
            .bearer_auth(credential.expose_secret())
            .json(&QuantityUpdate { quantity })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Remove one line.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, credential), fields(collection = C::RESOURCE, item_id = %id))]
    pub async fn remove<C: CollectionKind>(
        &self,
        credential: &SecretString,
        id: &ItemId,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&[C::RESOURCE, id.as_str()])?;
        let response = self
            .inner
            .client
            .delete(url)
            .bearer_auth(credential.expose_secret())
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, credential), fields(collection = C::RESOURCE))]
    pub async fn clear_all<C: CollectionKind>(
        &self,
        credential: &SecretString,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&[C::RESOURCE])?;
        let response = self
            .inner
            .client
            .delete(url)
            .bearer_auth(credential.expose_secret())
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Submit a batch of lines in one request. The service merges them into
    /// the authenticated collection by identity key, summing quantities.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(
        skip(self, credential, lines),
        fields(collection = C::RESOURCE, lines = lines.len())
    )]
    pub async fn bulk_sync<C: CollectionKind>(
        &self,
        credential: &SecretString,
        lines: &[C::Line],
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&[C::RESOURCE, "sync"])?;
        let response = self
            .inner
            .client
            .post(url)
            .bearer_auth(credential.expose_secret())
            .json(&BulkSyncRequest { items: lines })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidBaseUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Map non-success statuses to `RemoteError`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(RemoteError::RateLimited(retry_after));
    }

    let body = response.text().await.unwrap_or_default();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(RemoteError::Unauthorized(if body.is_empty() {
            "credential rejected".to_string()
        } else {
            truncate(&body)
        }));
    }

    tracing::error!(
        status = %status,
        body = %truncate(&body),
        "Collection service returned non-success status"
    );
    Err(RemoteError::Api {
        status: status.as_u16(),
        message: truncate(&body),
    })
}

fn truncate(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}
