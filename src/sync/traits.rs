// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;

use crate::cart::models::{CartItem, Credential, RemoteCart};
use crate::executor::NetworkError;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Remote cart rejected request: status={status} message={message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode remote cart response: {0}")]
    Decode(String),

    #[error("Invalid remote cart request: {0}")]
    InvalidRequest(String),
}

/// Typed operations against the remote cart service.
///
/// Implementations do not retry on their own; that belongs to the
/// request executor underneath.
#[async_trait]
pub trait RemoteCartGateway: Send + Sync {
    /// List the user's carts. Empty means no remote cart exists yet.
    async fn list_carts(&self, credential: &Credential) -> Result<Vec<RemoteCart>, GatewayError>;

    /// List the items of one cart
    async fn list_items(&self, cart_id: &str, credential: &Credential) -> Result<Vec<CartItem>, GatewayError>;

    /// Add `quantity` units of a product to a cart
    async fn create_item(
        &self,
        cart_id: &str,
        credential: &Credential,
        product_key: &str,
        quantity: u32,
    ) -> Result<(), GatewayError>;

    /// Set the quantity of an existing line
    async fn update_item_quantity(
        &self,
        cart_id: &str,
        credential: &Credential,
        product_key: &str,
        quantity: u32,
    ) -> Result<(), GatewayError>;

    /// Remove a line from a cart
    async fn delete_item(&self, cart_id: &str, credential: &Credential, product_key: &str) -> Result<(), GatewayError>;
}
