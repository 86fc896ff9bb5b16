//! Catalog commands.

use common::Money;
use store::Product;

/// Command to add a product to the catalog.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub category: String,
}

/// Partial product update. `None` leaves the field unchanged.
///
/// Stock is not patchable; it moves only through stock adjustments and the
/// order workflows.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub category: Option<String>,
}

impl ProductPatch {
    pub(crate) fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
    }
}
