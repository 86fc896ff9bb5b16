//! Cart service.

use common::ProductId;
use store::{Cart, Order, Store, StoreExt};

use crate::auth::Requester;
use crate::error::{DomainError, Result};
use crate::order::{LineRequest, OrderService, PlaceOrder};

/// Service for the requester's cart. Checkout goes through [`OrderService`].
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
    orders: OrderService<S>,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            store,
        }
    }

    /// Returns the requester's cart; an absent cart reads as empty.
    pub async fn get_cart(&self, requester: &Requester) -> Result<Cart> {
        Ok(self
            .store
            .get_cart(requester.user_id)
            .await?
            .unwrap_or_else(|| Cart::empty(requester.user_id)))
    }

    /// Adds to the quantity already in the cart.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        requester: &Requester,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be greater than 0"));
        }
        let mut cart = self.get_cart(requester).await?;
        let total = cart.quantity_of(product_id).saturating_add(quantity);
        self.check_stock(product_id, total).await?;

        cart.set_quantity(product_id, total);
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Replaces a line's quantity. Zero removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        requester: &Requester,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        let mut cart = self.get_cart(requester).await?;
        if quantity > 0 {
            self.check_stock(product_id, quantity).await?;
        }
        cart.set_quantity(product_id, quantity);
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    pub async fn remove_item(&self, requester: &Requester, product_id: ProductId) -> Result<Cart> {
        let mut cart = self.get_cart(requester).await?;
        if !cart.remove(product_id) {
            return Err(DomainError::NotFound(format!(
                "product {product_id} is not in the cart"
            )));
        }
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    pub async fn clear(&self, requester: &Requester) -> Result<()> {
        Ok(self.store.delete_cart(requester.user_id).await?)
    }

    /// Places an order for the cart's lines and empties the cart.
    ///
    /// The cart is left untouched if the order is rejected.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(
        &self,
        requester: &Requester,
        shipping_address: Option<String>,
        billing_address: Option<String>,
    ) -> Result<Order> {
        let cart = self.get_cart(requester).await?;
        if cart.is_empty() {
            return Err(DomainError::validation("cart is empty"));
        }

        let lines = cart
            .items
            .iter()
            .map(|item| LineRequest::new(item.product_id, item.quantity))
            .collect();
        let cmd = PlaceOrder::new(lines).with_addresses(shipping_address, billing_address);
        let order = self.orders.place_order(requester, cmd).await?;

        self.store.delete_cart(requester.user_id).await?;
        Ok(order)
    }

    async fn check_stock(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let product = self.store.require_product(product_id).await?;
        if quantity > product.stock {
            return Err(DomainError::Validation(format!(
                "insufficient stock for product {product_id}: requested {quantity}, available {}",
                product.stock
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, UserId};
    use store::{InMemoryStore, OrderStatus, Product, ProductRepository, Role};

    use super::*;

    async fn setup(stock: u32) -> (CartService<InMemoryStore>, InMemoryStore, Requester, Product) {
        let store = InMemoryStore::new();
        let product = Product::new("Widget", "", Money::from_cents(750), stock, "tools");
        store.insert_product(&product).await.unwrap();
        let requester = Requester::new(UserId::new(), Role::User);
        (CartService::new(store.clone()), store, requester, product)
    }

    #[tokio::test]
    async fn test_add_item_merges_and_respects_stock() {
        let (service, _store, requester, product) = setup(3).await;

        service.add_item(&requester, product.id, 2).await.unwrap();
        let cart = service.add_item(&requester, product.id, 1).await.unwrap();
        assert_eq!(cart.quantity_of(product.id), 3);
        assert_eq!(cart.items.len(), 1);

        assert!(matches!(
            service.add_item(&requester, product.id, 1).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes_line() {
        let (service, _store, requester, product) = setup(3).await;
        service.add_item(&requester, product.id, 2).await.unwrap();

        let cart = service.set_quantity(&requester, product.id, 0).await.unwrap();
        assert!(cart.is_empty());
        assert!(matches!(
            service.remove_item(&requester, product.id).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_checkout_places_order_and_empties_cart() {
        let (service, store, requester, product) = setup(5).await;
        service.add_item(&requester, product.id, 2).await.unwrap();

        let order = service
            .checkout(&requester, Some("1 Main St".to_string()), None)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Money::from_cents(1500));
        assert_eq!(order.shipping_address.as_deref(), Some("1 Main St"));
        assert!(service.get_cart(&requester).await.unwrap().is_empty());
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_failed_checkout_keeps_cart() {
        let (service, store, requester, product) = setup(5).await;
        service.add_item(&requester, product.id, 4).await.unwrap();

        // Someone else buys most of the stock in the meantime.
        store.adjust_stock(product.id, -3).await.unwrap();

        assert!(matches!(
            service.checkout(&requester, None, None).await,
            Err(DomainError::Validation(_))
        ));
        assert_eq!(
            service.get_cart(&requester).await.unwrap().quantity_of(product.id),
            4
        );
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let (service, _store, requester, _product) = setup(5).await;
        assert!(matches!(
            service.checkout(&requester, None, None).await,
            Err(DomainError::Validation(_))
        ));
    }
}
