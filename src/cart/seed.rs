// SPDX-License-Identifier: GPL-3.0-only
use crate::cart::models::CartItem;

/// Supplies the items shown to anonymous users and used as the fallback
/// when a signed-in user's remote cart cannot be fetched.
pub trait SeedProvider: Send + Sync {
    fn seed_items(&self) -> Vec<CartItem>;
}

/// Built-in placeholder dataset
#[derive(Debug, Clone, Default)]
pub struct DemoSeed;

impl SeedProvider for DemoSeed {
    fn seed_items(&self) -> Vec<CartItem> {
        vec![
            demo_item("demo-organic-bananas", "Organic Bananas", 1.29, 3, "FreshMart"),
            demo_item("demo-whole-milk-1l", "Whole Milk 1L", 0.99, 2, "DairyDirect"),
            demo_item("demo-sourdough-loaf", "Sourdough Loaf", 3.49, 1, "Corner Bakery"),
        ]
    }
}

fn demo_item(key: &str, name: &str, unit_price: f64, quantity: u32, retailer: &str) -> CartItem {
    CartItem {
        product_key: key.to_string(),
        name: name.to_string(),
        image_ref: format!("demo/{}.png", key),
        unit_price,
        quantity,
        retailer: retailer.to_string(),
    }
}

/// Fixed seed, mostly useful to start from an empty guest cart
#[derive(Debug, Clone, Default)]
pub struct StaticSeed(pub Vec<CartItem>);

impl SeedProvider for StaticSeed {
    fn seed_items(&self) -> Vec<CartItem> {
        self.0.clone()
    }
}
