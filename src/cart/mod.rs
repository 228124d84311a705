// SPDX-License-Identifier: GPL-3.0-only
pub mod error;
pub mod models;
pub mod seed;
pub mod store;

pub use error::CartError;
pub use models::{CartItem, CartSnapshot, CartState, Credential, Product, RemoteCart};
pub use seed::{DemoSeed, SeedProvider, StaticSeed};
pub use store::{LocalCartStore, Rollback};
