// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::cart::models::{CartItem, Credential, RemoteCart};
use crate::executor::{RequestError, RequestExecutor};
use crate::sync::traits::{GatewayError, RemoteCartGateway};
use crate::transport::{HttpRequest, Method};

/// [`RemoteCartGateway`] speaking the `/api/carts` REST contract
pub struct HttpCartGateway {
    executor: RequestExecutor,
}

impl HttpCartGateway {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    fn build_request(&self, method: Method, segments: &[&str], credential: &Credential) -> Result<HttpRequest, GatewayError> {
        Ok(HttpRequest::new(method, encode_path(segments)?).bearer(credential.token.clone()))
    }

    async fn send(&self, request: HttpRequest) -> Result<String, GatewayError> {
        match self.executor.execute(&request).await {
            Ok(response) => Ok(response.body),
            Err(RequestError::Network(error)) => Err(GatewayError::Network(error)),
            Err(RequestError::Rejected { status, body }) => Err(GatewayError::Rejected { status, message: body }),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, GatewayError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

/// Join path segments, percent-encoding each one
fn encode_path(segments: &[&str]) -> Result<String, GatewayError> {
    let mut url = Url::parse("cartsync:/").map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| GatewayError::InvalidRequest("base path cannot hold segments".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.path().to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateItemRequest<'a> {
    product_key: &'a str,
    quantity: u32,
}

#[derive(Serialize)]
struct UpdateQuantityRequest {
    quantity: u32,
}

#[async_trait]
impl RemoteCartGateway for HttpCartGateway {
    async fn list_carts(&self, credential: &Credential) -> Result<Vec<RemoteCart>, GatewayError> {
        let request = self.build_request(Method::Get, &["api", "carts"], credential)?;
        let carts: Vec<RemoteCart> = self.fetch(request).await?;
        debug!(count = carts.len(), user_id = %credential.user_id, "Fetched remote carts");
        Ok(carts)
    }

    async fn list_items(&self, cart_id: &str, credential: &Credential) -> Result<Vec<CartItem>, GatewayError> {
        let request = self.build_request(Method::Get, &["api", "carts", cart_id, "items"], credential)?;
        let items: Vec<CartItem> = self.fetch(request).await?;
        info!(cart_id = %cart_id, count = items.len(), "Fetched remote cart items");
        Ok(items)
    }

    async fn create_item(
        &self,
        cart_id: &str,
        credential: &Credential,
        product_key: &str,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        let request = self
            .build_request(Method::Post, &["api", "carts", cart_id, "items"], credential)?
            .json(&CreateItemRequest { product_key, quantity })
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        self.send(request).await?;
        info!(cart_id = %cart_id, product_key = %product_key, quantity, "Created remote cart item");
        Ok(())
    }

    async fn update_item_quantity(
        &self,
        cart_id: &str,
        credential: &Credential,
        product_key: &str,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        let request = self
            .build_request(Method::Put, &["api", "carts", cart_id, "items", product_key], credential)?
            .json(&UpdateQuantityRequest { quantity })
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        self.send(request).await?;
        info!(cart_id = %cart_id, product_key = %product_key, quantity, "Updated remote cart item");
        Ok(())
    }

    async fn delete_item(&self, cart_id: &str, credential: &Credential, product_key: &str) -> Result<(), GatewayError> {
        let request = self.build_request(Method::Delete, &["api", "carts", cart_id, "items", product_key], credential)?;
        self.send(request).await?;
        info!(cart_id = %cart_id, product_key = %product_key, "Deleted remote cart item");
        Ok(())
    }
}
