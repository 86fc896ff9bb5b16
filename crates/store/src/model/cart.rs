use chrono::{DateTime, Utc};
use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A user's shopping cart. Each product appears at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for the user.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Returns the quantity of a product currently in the cart.
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|i| i.product_id == product_id)
            .map(|i| i.quantity)
            .unwrap_or(0)
    }

    /// Sets a product's quantity, inserting or removing the line as needed.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            self.items.retain(|i| i.product_id != product_id);
        } else if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = quantity;
        } else {
            self.items.push(CartItem {
                product_id,
                quantity,
            });
        }
        self.updated_at = Utc::now();
    }

    /// Removes a product line. Returns false if it was not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.updated_at = Utc::now();
        self.items.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_quantity_inserts_updates_and_removes() {
        let mut cart = Cart::empty(UserId::new());
        let product = ProductId::new();

        cart.set_quantity(product, 2);
        assert_eq!(cart.quantity_of(product), 2);

        cart.set_quantity(product, 5);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.quantity_of(product), 5);

        cart.set_quantity(product, 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_reports_missing_lines() {
        let mut cart = Cart::empty(UserId::new());
        assert!(!cart.remove(ProductId::new()));
    }
}
