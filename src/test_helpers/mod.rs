// SPDX-License-Identifier: GPL-3.0-only
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use serde::Deserialize;

use crate::cart::error::CartError;
use crate::cart::models::{CartItem, Product};
use crate::cart::store::LocalCartStore;
use crate::config::Config;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};

/// Catalog product with a fixed price
pub fn product(key: &str) -> Product {
    Product {
        product_key: key.to_string(),
        name: format!("Product {}", key),
        image_ref: String::new(),
        unit_price: 2.0,
        retailer: "Acme".to_string(),
    }
}

/// Remote-side line as the fake server would store it
pub fn remote_item(key: &str, quantity: u32) -> CartItem {
    product(key).into_item(quantity)
}

/// Configuration with the default timings and a local base URL
pub fn create_test_config() -> Config {
    Config {
        api_base_url: "http://127.0.0.1:0".to_string(),
        log_level: "error".to_string(), // Reduce log noise in tests
        ..Config::default()
    }
}

/// One caller action against a cart, over a small key space so that
/// sequences collide on the same lines
#[derive(Debug, Clone)]
pub enum CartOp {
    Add { key: usize, quantity: u32 },
    Update { key: usize, quantity: i64 },
    Remove { key: usize },
}

impl CartOp {
    pub fn key(&self) -> String {
        let key = match self {
            CartOp::Add { key, .. } | CartOp::Update { key, .. } | CartOp::Remove { key } => key,
        };
        format!("p{}", key)
    }

    pub fn apply_to_store(&self, store: &mut LocalCartStore) -> Result<(), CartError> {
        match self {
            CartOp::Add { quantity, .. } => store.add(product(&self.key()), *quantity).map(|_| ()),
            CartOp::Update { quantity, .. } => store.update_quantity(&self.key(), *quantity).map(|_| ()),
            CartOp::Remove { .. } => store.remove(&self.key()).map(|_| ()),
        }
    }
}

/// Add, update and remove over five keys, including invalid quantities
pub fn cart_op() -> impl Strategy<Value = CartOp> {
    prop_oneof![
        (0usize..5, 0u32..4).prop_map(|(key, quantity)| CartOp::Add { key, quantity }),
        (0usize..5, -1i64..4).prop_map(|(key, quantity)| CartOp::Update { key, quantity }),
        (0usize..5).prop_map(|key| CartOp::Remove { key }),
    ]
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(HttpResponse),
    Fail(TransportError),
    /// Never completes; only the executor's deadline ends it
    Hang,
}

/// Transport that replays a script, then repeats a fallback
pub struct FakeTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Scripted::Fail(TransportError::Connection("script exhausted".to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front().unwrap_or_else(|| self.fallback.clone());
        match next {
            Scripted::Respond(response) => Ok(response),
            Scripted::Fail(error) => Err(error),
            Scripted::Hang => std::future::pending().await,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    product_key: String,
    quantity: u32,
}

#[derive(Deserialize)]
struct UpdateBody {
    quantity: u32,
}

/// In-memory implementation of the `/api/carts` contract.
///
/// `set_offline(true)` makes every request fail at the transport level.
#[derive(Default)]
pub struct FakeCartServer {
    carts: Mutex<Vec<(String, Vec<CartItem>)>>,
    offline: AtomicBool,
    rejected: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<Method, Duration>>,
    requests: Mutex<Vec<(Method, String)>>,
}

impl FakeCartServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cart(self, cart_id: &str, items: Vec<CartItem>) -> Self {
        self.carts.lock().unwrap().push((cart_id.to_string(), items));
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Answer 404 to any attempt to add this product
    pub fn reject_product(&self, product_key: &str) {
        self.rejected.lock().unwrap().insert(product_key.to_string());
    }

    /// Hold every `method` request for `delay` before answering
    pub fn delay(&self, method: Method, delay: Duration) {
        self.delays.lock().unwrap().insert(method, delay);
    }

    pub fn items(&self, cart_id: &str) -> Vec<CartItem> {
        self.carts
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == cart_id)
            .map(|(_, items)| items.clone())
            .unwrap_or_default()
    }

    pub fn set_items(&self, cart_id: &str, items: Vec<CartItem>) {
        let mut carts = self.carts.lock().unwrap();
        match carts.iter_mut().find(|(id, _)| id == cart_id) {
            Some((_, existing)) => *existing = items,
            None => carts.push((cart_id.to_string(), items)),
        }
    }

    pub fn request_count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, p)| *m == method && p == path)
            .count()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        let segments: Vec<&str> = request.path.split('/').filter(|s| !s.is_empty()).collect();
        let mut carts = self.carts.lock().unwrap();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["api", "carts"]) => {
                let ids: Vec<_> = carts.iter().map(|(id, _)| serde_json::json!({ "id": id })).collect();
                HttpResponse::new(200, serde_json::Value::Array(ids).to_string())
            }
            (method, ["api", "carts", cart_id, "items", rest @ ..]) => {
                let Some((_, items)) = carts.iter_mut().find(|(id, _)| id == cart_id) else {
                    return HttpResponse::new(404, "cart not found");
                };
                match (method, rest) {
                    (Method::Get, []) => HttpResponse::new(200, serde_json::to_string(&*items).unwrap()),
                    (Method::Post, []) => {
                        let body: CreateBody = serde_json::from_value(request.body.clone().unwrap()).unwrap();
                        if self.rejected.lock().unwrap().contains(&body.product_key) {
                            return HttpResponse::new(404, "unknown product");
                        }
                        match items.iter_mut().find(|i| i.product_key == body.product_key) {
                            Some(item) => item.quantity += body.quantity,
                            None => items.push(remote_item(&body.product_key, body.quantity)),
                        }
                        HttpResponse::new(201, "")
                    }
                    (Method::Put, [key]) => {
                        let body: UpdateBody = serde_json::from_value(request.body.clone().unwrap()).unwrap();
                        match items.iter_mut().find(|i| i.product_key == *key) {
                            Some(item) => {
                                item.quantity = body.quantity;
                                HttpResponse::new(200, "")
                            }
                            None => HttpResponse::new(404, "item not found"),
                        }
                    }
                    (Method::Delete, [key]) => match items.iter().position(|i| i.product_key == *key) {
                        Some(index) => {
                            items.remove(index);
                            HttpResponse::new(204, "")
                        }
                        None => HttpResponse::new(404, "item not found"),
                    },
                    _ => HttpResponse::new(405, "method not allowed"),
                }
            }
            _ => HttpResponse::new(404, "no route"),
        }
    }
}

#[async_trait]
impl Transport for FakeCartServer {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push((request.method, request.path.clone()));
        let delay = self.delays.lock().unwrap().get(&request.method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("network unreachable".to_string()));
        }
        Ok(self.route(request))
    }
}
