use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    /// Remaining purchasable quantity.
    pub stock: u32,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product with a fresh id and current timestamps.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        stock: u32,
        category: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            name: name.into(),
            description: description.into(),
            price,
            stock,
            category: category.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Optional predicates applied when listing products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
}

impl ProductFilter {
    /// Returns true if the product satisfies every set predicate.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(ref category) = self.category
            && &product.category != category
        {
            return false;
        }
        if let Some(ref search) = self.search
            && !product
                .name
                .to_lowercase()
                .contains(&search.to_lowercase())
        {
            return false;
        }
        if let Some(min) = self.min_price
            && product.price < min
        {
            return false;
        }
        if let Some(max) = self.max_price
            && product.price > max
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> Product {
        Product::new("Blue Widget", "", Money::from_cents(1000), 5, "widgets")
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(ProductFilter::default().matches(&widget()));
    }

    #[test]
    fn filter_by_category_and_search() {
        let filter = ProductFilter {
            category: Some("widgets".into()),
            search: Some("blue".into()),
            ..Default::default()
        };
        assert!(filter.matches(&widget()));

        let filter = ProductFilter {
            category: Some("gadgets".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&widget()));
    }

    #[test]
    fn filter_by_price_range() {
        let filter = ProductFilter {
            min_price: Some(Money::from_cents(500)),
            max_price: Some(Money::from_cents(1000)),
            ..Default::default()
        };
        assert!(filter.matches(&widget()));

        let filter = ProductFilter {
            max_price: Some(Money::from_cents(999)),
            ..Default::default()
        };
        assert!(!filter.matches(&widget()));
    }
}
