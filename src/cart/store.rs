// SPDX-License-Identifier: GPL-3.0-only
use tracing::debug;

use crate::cart::error::CartError;
use crate::cart::models::{CartItem, CartSnapshot, Product};

/// Undo record for a single optimistic change.
///
/// Reverting restores only the touched line, and only while that line still
/// holds `applied` and no wholesale replace happened since.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollback {
    pub product_key: String,
    pub previous: Option<CartItem>,
    /// The line as the change left it
    pub applied: CartItem,
    generation: u64,
}

/// In-memory cart contents. Authoritative while offline or in guest mode.
#[derive(Debug, Default)]
pub struct LocalCartStore {
    snapshot: CartSnapshot,
    /// Bumped by `replace` and `clear`
    generation: u64,
}

impl LocalCartStore {
    pub fn new(snapshot: CartSnapshot) -> Self {
        Self { snapshot, generation: 0 }
    }

    fn rollback(&self, previous: Option<CartItem>, applied: CartItem) -> Rollback {
        Rollback {
            product_key: applied.product_key.clone(),
            previous,
            applied,
            generation: self.generation,
        }
    }

    pub fn snapshot(&self) -> CartSnapshot {
        self.snapshot.clone()
    }

    pub fn cart_id(&self) -> Option<&str> {
        self.snapshot.cart_id.as_deref()
    }

    /// Merge `quantity` units of `product` into the cart.
    ///
    /// Returns the resulting line and the rollback for the change.
    pub fn add(&mut self, product: Product, quantity: u32) -> Result<(CartItem, Rollback), CartError> {
        validate_key(&product.product_key)?;
        validate_quantity(quantity)?;
        if !product.unit_price.is_finite() || product.unit_price < 0.0 {
            return Err(CartError::validation(format!(
                "unit price must be a non-negative number, got {}",
                product.unit_price
            )));
        }

        let mut items = self.snapshot.items.to_vec();
        let previous = items.iter().position(|i| i.product_key == product.product_key);
        let (line, rollback) = match previous {
            Some(index) => {
                let before = items[index].clone();
                items[index].quantity = before.quantity.saturating_add(quantity);
                let line = items[index].clone();
                (line.clone(), self.rollback(Some(before), line))
            }
            None => {
                let item = product.into_item(quantity);
                items.push(item.clone());
                (item.clone(), self.rollback(None, item))
            }
        };

        debug!(product_key = %line.product_key, quantity = line.quantity, "Applied local add");
        self.commit(items);
        Ok((line, rollback))
    }

    /// Set the quantity of an existing line.
    pub fn update_quantity(&mut self, product_key: &str, quantity: i64) -> Result<Rollback, CartError> {
        validate_key(product_key)?;
        if quantity <= 0 {
            return Err(CartError::validation(format!(
                "quantity must be at least 1, got {} (use remove_item instead)",
                quantity
            )));
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| CartError::validation(format!("quantity {} is too large", quantity)))?;

        let mut items = self.snapshot.items.to_vec();
        let line = items
            .iter_mut()
            .find(|i| i.product_key == product_key)
            .ok_or_else(|| CartError::validation(format!("product '{}' is not in the cart", product_key)))?;

        let before = line.clone();
        line.quantity = quantity;
        let applied = line.clone();

        debug!(product_key = %product_key, quantity, "Applied local quantity update");
        self.commit(items);
        Ok(self.rollback(Some(before), applied))
    }

    /// Remove a line. Returns the removed item, or `None` if it was absent.
    pub fn remove(&mut self, product_key: &str) -> Result<Option<CartItem>, CartError> {
        validate_key(product_key)?;

        let mut items = self.snapshot.items.to_vec();
        let Some(index) = items.iter().position(|i| i.product_key == product_key) else {
            return Ok(None);
        };
        let removed = items.remove(index);

        debug!(product_key = %product_key, "Applied local remove");
        self.commit(items);
        Ok(Some(removed))
    }

    /// Empty the cart, keeping the remote cart identity.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.commit(Vec::new());
    }

    /// Replace the whole cart. Duplicate keys from the source are collapsed
    /// into the first occurrence.
    pub fn replace(&mut self, snapshot: CartSnapshot) {
        let mut items: Vec<CartItem> = Vec::with_capacity(snapshot.items.len());
        for item in snapshot.items.iter() {
            if item.quantity == 0 {
                continue;
            }
            match items.iter_mut().find(|i| i.product_key == item.product_key) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
                None => items.push(item.clone()),
            }
        }
        self.generation += 1;
        self.snapshot = CartSnapshot::new(snapshot.cart_id, items);
    }

    /// Undo a single optimistic change. Returns `false` when the line has
    /// moved on since, in which case nothing is touched.
    pub fn revert(&mut self, rollback: Rollback) -> bool {
        let mut items = self.snapshot.items.to_vec();
        let index = items.iter().position(|i| i.product_key == rollback.product_key);
        let current = index.map(|index| &items[index]);
        if rollback.generation != self.generation || current != Some(&rollback.applied) {
            debug!(product_key = %rollback.product_key, "Line changed since, keeping it");
            return false;
        }

        match (index, rollback.previous) {
            (Some(index), Some(previous)) => items[index] = previous,
            (Some(index), None) => {
                items.remove(index);
            }
            (None, _) => return false,
        }
        debug!(product_key = %rollback.product_key, "Reverted local change");
        self.commit(items);
        true
    }

    fn commit(&mut self, items: Vec<CartItem>) {
        self.snapshot = CartSnapshot::new(self.snapshot.cart_id.clone(), items);
    }
}

fn validate_key(product_key: &str) -> Result<(), CartError> {
    if product_key.trim().is_empty() {
        return Err(CartError::validation("product key must not be empty"));
    }
    Ok(())
}

fn validate_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 {
        return Err(CartError::validation("quantity must be at least 1"));
    }
    Ok(())
}
