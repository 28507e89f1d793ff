//! REST implementation of the gateways.
//!
//! Uses `reqwest` with JSON bodies. Status codes are mapped onto
//! [`GatewayError`] once, in [`HttpGateway::check`].

use std::sync::Arc;

use greenhouse_core::{
    CartEntryId, CartSnapshotDocument, NotificationId, NotificationPageDocument, ProductId,
    Quantity, UnreadCountDocument,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};
use url::Url;

use super::{CartGateway, CartSnapshot, NotificationGateway, NotificationSnapshot, PageRequest};
use crate::cache::Snapshot;
use crate::config::ApiConfig;
use crate::error::GatewayError;

/// Longest server error text kept in a [`GatewayError`].
const MAX_ERROR_TEXT: usize = 200;

// =============================================================================
// HttpGateway
// =============================================================================

/// Client for the Greenhouse REST backend.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpGateway {
    inner: Arc<HttpGatewayInner>,
}

struct HttpGatewayInner {
    client: reqwest::Client,
    base_url: Url,
    session_token: Option<SecretString>,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.inner.base_url.as_str())
            .field("authenticated", &self.inner.session_token.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct AddItemBody<'a> {
    #[serde(rename = "produitId")]
    product_id: &'a ProductId,
    #[serde(rename = "quantite")]
    quantity: Quantity,
}

#[derive(Serialize)]
struct UpdateQuantityBody {
    #[serde(rename = "quantite")]
    quantity: Quantity,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpGateway {
    /// Create a gateway for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Network`] if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(HttpGatewayInner {
                client,
                base_url: config.base_url.clone(),
                session_token: config.session_token.clone(),
            }),
        })
    }

    /// Build an endpoint URL below the base URL, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                GatewayError::Network(format!(
                    "base URL cannot carry a path: {}",
                    self.inner.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.inner.client.request(method, url);
        match &self.inner.session_token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and decode its JSON body.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = Self::check(request.send().await?).await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            GatewayError::Parse(e.to_string())
        })
    }

    /// Send a request whose body carries nothing but a status.
    async fn execute_status(&self, request: RequestBuilder) -> Result<(), GatewayError> {
        Self::check(request.send().await?).await?;
        Ok(())
    }

    /// Map non-success statuses onto [`GatewayError`].
    async fn check(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        debug!(status = %status, message = %message, "Backend returned non-success status");

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized,
            StatusCode::NOT_FOUND => GatewayError::NotFound(message),
            s if s.is_client_error() => GatewayError::ValidationRejected(message),
            s => GatewayError::Server {
                status: s.as_u16(),
                message,
            },
        })
    }

    async fn cart_request(&self, request: RequestBuilder) -> Result<CartSnapshot, GatewayError> {
        let document: CartSnapshotDocument = self.execute(request).await?;
        Ok(cart_snapshot(document))
    }
}

// =============================================================================
// Cart
// =============================================================================

impl CartGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<CartSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "cart"])?;
        self.cart_request(self.request(Method::GET, url)).await
    }

    #[instrument(skip_all, fields(product_id = %product_id, quantity = %quantity))]
    async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "cart", "items"])?;
        let request = self.request(Method::POST, url).json(&AddItemBody {
            product_id,
            quantity,
        });
        self.cart_request(request).await
    }

    #[instrument(skip_all, fields(entry_id = %entry_id, quantity = %quantity))]
    async fn update_quantity(
        &self,
        entry_id: &CartEntryId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "cart", "items", entry_id.as_str()])?;
        let request = self
            .request(Method::PUT, url)
            .json(&UpdateQuantityBody { quantity });
        self.cart_request(request).await
    }

    #[instrument(skip_all, fields(entry_id = %entry_id))]
    async fn remove_item(&self, entry_id: &CartEntryId) -> Result<CartSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "cart", "items", entry_id.as_str()])?;
        self.cart_request(self.request(Method::DELETE, url)).await
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<CartSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "cart"])?;
        self.cart_request(self.request(Method::DELETE, url)).await
    }
}

// =============================================================================
// Notifications
// =============================================================================

impl NotificationGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn fetch_page(&self, page: PageRequest) -> Result<NotificationSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "notifications"])?;
        let request = self
            .request(Method::GET, url)
            .query(&[("skip", page.skip.to_string()), ("limit", page.limit.to_string())]);
        let document: NotificationPageDocument = self.execute(request).await?;
        Ok(notification_snapshot(document, page))
    }

    #[instrument(skip(self))]
    async fn fetch_unread_count(&self) -> Result<u64, GatewayError> {
        let url = self.endpoint(&["api", "notifications", "unread-count"])?;
        let document: UnreadCountDocument = self.execute(self.request(Method::GET, url)).await?;
        Ok(document.count)
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn mark_as_read(
        &self,
        id: &NotificationId,
        window: PageRequest,
    ) -> Result<NotificationSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "notifications", id.as_str(), "read"])?;
        self.execute_status(self.request(Method::PATCH, url)).await?;
        self.fetch_page(window).await
    }

    #[instrument(skip(self))]
    async fn mark_all_as_read(
        &self,
        window: PageRequest,
    ) -> Result<NotificationSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "notifications", "read-all"])?;
        self.execute_status(self.request(Method::PATCH, url)).await?;
        self.fetch_page(window).await
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn delete(
        &self,
        id: &NotificationId,
        window: PageRequest,
    ) -> Result<NotificationSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "notifications", id.as_str()])?;
        self.execute_status(self.request(Method::DELETE, url)).await?;
        self.fetch_page(window).await
    }

    #[instrument(skip(self))]
    async fn delete_all_read(
        &self,
        window: PageRequest,
    ) -> Result<NotificationSnapshot, GatewayError> {
        let url = self.endpoint(&["api", "notifications", "read"])?;
        self.execute_status(self.request(Method::DELETE, url)).await?;
        self.fetch_page(window).await
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn cart_snapshot(document: CartSnapshotDocument) -> CartSnapshot {
    Snapshot::complete(document.items, document.total)
}

fn notification_snapshot(
    document: NotificationPageDocument,
    page: PageRequest,
) -> NotificationSnapshot {
    Snapshot {
        cursor: page.skip + document.notifications.len() as u64,
        items: document.notifications,
        aggregate: document.unread_count,
        has_more: document.has_more,
    }
}

/// Extract a displayable message from an error response body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && !parsed.message.trim().is_empty()
    {
        return parsed.message;
    }

    let text = body.trim();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        text.chars().take(MAX_ERROR_TEXT).collect()
    }
}
