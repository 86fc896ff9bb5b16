//! Order commands.

use common::ProductId;

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl LineRequest {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to place a new order for the requester.
#[derive(Debug, Clone, Default)]
pub struct PlaceOrder {
    /// The requested lines. Repeated products are merged.
    pub items: Vec<LineRequest>,

    pub shipping_address: Option<String>,

    pub billing_address: Option<String>,
}

impl PlaceOrder {
    /// Creates a PlaceOrder command without addresses.
    pub fn new(items: Vec<LineRequest>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    /// Sets the shipping and billing addresses.
    pub fn with_addresses(
        mut self,
        shipping_address: Option<String>,
        billing_address: Option<String>,
    ) -> Self {
        self.shipping_address = shipping_address;
        self.billing_address = billing_address;
        self
    }

    /// Returns the lines with repeated products summed, in first-seen order.
    pub(crate) fn merged_items(&self) -> Vec<LineRequest> {
        let mut merged: Vec<LineRequest> = Vec::with_capacity(self.items.len());
        for line in &self.items {
            match merged.iter_mut().find(|m| m.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity)
                }
                None => merged.push(*line),
            }
        }
        merged
    }
}
