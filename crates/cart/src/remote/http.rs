//! Storefront REST API binding for the remote cart.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use tidewear_core::{CartLine, Credential, Product, ProductId, Size};

use super::types::{AddItemBody, UpdateItemBody, WireCart, WireProduct, convert_cart};
use super::{AddItem, RemoteCartGateway, RemoteError};

/// Maximum characters of an error body kept in [`RemoteError::Status`].
const ERROR_BODY_LIMIT: usize = 200;

/// Client for the storefront cart and catalog endpoints.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpCartGateway {
    inner: Arc<HttpCartGatewayInner>,
}

struct HttpCartGatewayInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCartGateway {
    /// Create a gateway rooted at `base_url` (e.g. `http://localhost:8000/api/`).
    ///
    /// A missing trailing slash is added so relative paths join under it.
    #[must_use]
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            inner: Arc::new(HttpCartGatewayInner {
                client: reqwest::Client::new(),
                base_url,
            }),
        }
    }

    /// Base URL all endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Look up a catalog product. No credential needed.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` for an unknown product, or any
    /// transport/parse error.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, RemoteError> {
        let url = self.endpoint(&format!("products/{product_id}"), None)?;
        let product: WireProduct = self
            .send(self.inner.client.request(Method::GET, url))
            .await?;
        Ok(Product::from(product))
    }

    fn endpoint(&self, path: &str, size: Option<&Size>) -> Result<Url, RemoteError> {
        let mut url = self.inner.base_url.join(path)?;
        if let Some(size) = size {
            url.query_pairs_mut().append_pair("size", size.as_str());
        }
        Ok(url)
    }

    fn authorized(&self, method: Method, url: Url, credential: &Credential) -> RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .bearer_auth(credential.expose())
    }

    /// Send a request and decode a JSON body, mapping error statuses.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            let detail = error_detail(&body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized,
                StatusCode::NOT_FOUND => RemoteError::NotFound(detail),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    RemoteError::Rejected(detail)
                }
                _ => {
                    tracing::error!(
                        status = %status,
                        body = %body.chars().take(500).collect::<String>(),
                        "Cart API returned non-success status"
                    );
                    RemoteError::Status {
                        status: status.as_u16(),
                        body: detail,
                    }
                }
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse cart API response"
            );
            RemoteError::Parse(e)
        })
    }

    async fn send_cart(&self, request: RequestBuilder) -> Result<Vec<CartLine>, RemoteError> {
        let cart: WireCart = self.send(request).await?;
        debug!(cart_id = %cart.id, items = cart.items.len(), "Received remote cart");
        Ok(convert_cart(cart))
    }
}

/// Pull `detail` out of a JSON error body, falling back to the truncated body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or_else(|| body.chars().take(ERROR_BODY_LIMIT).collect())
}

#[async_trait]
impl RemoteCartGateway for HttpCartGateway {
    #[instrument(skip(self, credential))]
    async fn fetch(&self, credential: &Credential) -> Result<Vec<CartLine>, RemoteError> {
        let url = self.endpoint("cart/", None)?;
        self.send_cart(self.authorized(Method::GET, url, credential))
            .await
    }

    #[instrument(skip(self, credential))]
    async fn add_item(
        &self,
        credential: &Credential,
        item: &AddItem,
    ) -> Result<Vec<CartLine>, RemoteError> {
        let url = self.endpoint("cart/items", None)?;
        let body = AddItemBody {
            product_id: item.product_id,
            quantity: item.quantity,
            size: item.size.to_string(),
        };
        self.send_cart(self.authorized(Method::POST, url, credential).json(&body))
            .await
    }

    #[instrument(skip(self, credential))]
    async fn update_item(
        &self,
        credential: &Credential,
        product_id: ProductId,
        size: &Size,
        quantity: u32,
    ) -> Result<Vec<CartLine>, RemoteError> {
        let url = self.endpoint(&format!("cart/items/{product_id}"), Some(size))?;
        let body = UpdateItemBody {
            quantity: i64::from(quantity),
        };
        self.send_cart(self.authorized(Method::PUT, url, credential).json(&body))
            .await
    }

    #[instrument(skip(self, credential))]
    async fn remove_item(
        &self,
        credential: &Credential,
        product_id: ProductId,
        size: &Size,
    ) -> Result<Vec<CartLine>, RemoteError> {
        let url = self.endpoint(&format!("cart/items/{product_id}"), Some(size))?;
        self.send_cart(self.authorized(Method::DELETE, url, credential))
            .await
    }

    #[instrument(skip(self, credential))]
    async fn clear(&self, credential: &Credential) -> Result<(), RemoteError> {
        let url = self.endpoint("cart/", None)?;
        // The API echoes the emptied cart; only success matters here.
        let _: serde_json::Value = self
            .send(self.authorized(Method::DELETE, url, credential))
            .await?;
        Ok(())
    }
}
