//! Catalog service.

use chrono::Utc;
use common::{Money, Page, PageRequest, ProductId};
use store::{Product, ProductFilter, Store, StoreExt};

use super::{NewProduct, ProductPatch};
use crate::auth::Requester;
use crate::error::{DomainError, Result};

/// Service for reading and administering the catalog.
#[derive(Clone)]
pub struct ProductService<S: Store> {
    store: S,
}

/// Highest unit price the catalog accepts: $100,000,000.00.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;

fn validate(product: &Product) -> Result<()> {
    if product.name.trim().is_empty() {
        return Err(DomainError::validation("product name must not be empty"));
    }
    if !product.price.is_positive() {
        return Err(DomainError::validation("price must be greater than 0"));
    }
    if product.price.cents() > MAX_PRICE_CENTS {
        return Err(DomainError::Validation(format!(
            "price must not exceed {}",
            Money::from_cents(MAX_PRICE_CENTS)
        )));
    }
    Ok(())
}

impl<S: Store> ProductService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, cmd), fields(name = %cmd.name))]
    pub async fn create_product(&self, requester: &Requester, cmd: NewProduct) -> Result<Product> {
        requester.ensure_admin()?;
        let product = Product::new(
            cmd.name.trim(),
            cmd.description,
            cmd.price,
            cmd.stock,
            cmd.category,
        );
        validate(&product)?;
        self.store.insert_product(&product).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        Ok(self.store.require_product(id).await?)
    }

    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        if let (Some(min), Some(max)) = (filter.min_price, filter.max_price)
            && min > max
        {
            return Err(DomainError::validation("min_price must not exceed max_price"));
        }
        Ok(self.store.list_products(filter, page).await?)
    }

    /// Applies a patch, validating the merged product before saving.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        requester: &Requester,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product> {
        requester.ensure_admin()?;
        let mut product = self.store.require_product(id).await?;
        patch.apply(&mut product);
        validate(&product)?;
        product.updated_at = Utc::now();
        self.store.update_product(&product).await?;
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, requester: &Requester, id: ProductId) -> Result<()> {
        requester.ensure_admin()?;
        self.store.delete_product(id).await?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Adds a signed delta to stock; the result may not go below zero.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        requester: &Requester,
        id: ProductId,
        delta: i64,
    ) -> Result<Product> {
        requester.ensure_admin()?;
        Ok(self.store.adjust_stock(id, delta).await?)
    }
}
