// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single line in the cart, identified by `product_key`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_key: String,
    pub name: String,
    #[serde(default)]
    pub image_ref: String,
    pub unit_price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub retailer: String,
}

impl CartItem {
    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Catalog entry a caller hands to `add_item`; quantity is supplied separately
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_key: String,
    pub name: String,
    #[serde(default)]
    pub image_ref: String,
    pub unit_price: f64,
    #[serde(default)]
    pub retailer: String,
}

impl Product {
    pub fn into_item(self, quantity: u32) -> CartItem {
        CartItem {
            product_key: self.product_key,
            name: self.name,
            image_ref: self.image_ref,
            unit_price: self.unit_price,
            quantity,
            retailer: self.retailer,
        }
    }
}

/// Remote cart header as returned by `GET /api/carts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCart {
    pub id: String,
}

/// Opaque token plus the identity it belongs to
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    pub token: String,
}

impl Credential {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

// Keep tokens out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// One immutable version of the cart. Mutations produce a new snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CartSnapshot {
    pub cart_id: Option<String>,
    pub items: Arc<[CartItem]>,
}

impl CartSnapshot {
    pub fn new(cart_id: Option<String>, items: Vec<CartItem>) -> Self {
        Self {
            cart_id,
            items: items.into(),
        }
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn get(&self, product_key: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_key == product_key)
    }
}

/// Read-only projection handed to UI subscribers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CartState {
    pub cart_id: Option<String>,
    pub items: Arc<[CartItem]>,
    pub is_loading: bool,
    pub is_offline: bool,
    /// Time of the last successful reconciliation with the remote cart
    pub last_synced_at: Option<DateTime<Utc>>,
}
