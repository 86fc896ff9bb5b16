//! Order service.

use common::{OrderId, Page, PageRequest};
use store::{Order, OrderItem, OrderStatus, Store, StoreExt};

use super::PlaceOrder;
use crate::auth::Requester;
use crate::error::{DomainError, Result};

/// Service for placing and managing orders.
///
/// Stock checks happen here so callers get precise errors; the decrement
/// itself is re-checked atomically by the store when the order is placed.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order for the requester.
    ///
    /// Each line is priced at the product's current price. Either every line's
    /// stock is decremented and the order is stored, or nothing changes.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %requester.user_id, lines = cmd.items.len()))]
    pub async fn place_order(&self, requester: &Requester, cmd: PlaceOrder) -> Result<Order> {
        let result = self.try_place_order(requester, cmd).await;
        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(order_id = %order.id, total = %order.total, "order placed");
            }
            Err(e) => {
                metrics::counter!("order_creation_failures_total").increment(1);
                tracing::debug!(error = %e, "order rejected");
            }
        }
        result
    }

    async fn try_place_order(&self, requester: &Requester, cmd: PlaceOrder) -> Result<Order> {
        if cmd.items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        if cmd.items.iter().any(|line| line.quantity == 0) {
            return Err(DomainError::validation("quantity must be greater than 0"));
        }

        let mut items = Vec::new();
        for line in cmd.merged_items() {
            let product = self.store.require_product(line.product_id).await?;
            if line.quantity > product.stock {
                return Err(DomainError::Validation(format!(
                    "insufficient stock for product {}: requested {}, available {}",
                    product.id, line.quantity, product.stock
                )));
            }
            items.push(OrderItem::new(product.id, line.quantity, product.price));
        }

        let order = Order::try_new(requester.user_id, items)
            .ok_or_else(|| DomainError::validation("order total out of range"))?
            .with_addresses(cmd.shipping_address, cmd.billing_address);
        self.store.place_order(&order).await?;
        Ok(order)
    }

    /// Loads an order visible to the requester.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, requester: &Requester, id: OrderId) -> Result<Order> {
        let order = self.store.require_order(id).await?;
        requester.ensure_owner_or_admin(order.user_id, "order")?;
        Ok(order)
    }

    /// Lists the requester's own orders, newest first.
    pub async fn list_orders(&self, requester: &Requester, page: PageRequest) -> Result<Page<Order>> {
        Ok(self
            .store
            .list_orders_for_user(requester.user_id, page)
            .await?)
    }

    /// Lists every order. Admin only.
    pub async fn list_all_orders(
        &self,
        requester: &Requester,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        requester.ensure_admin()?;
        Ok(self.store.list_orders(page).await?)
    }

    /// Moves an order along the fulfilment path. Admin only.
    ///
    /// `cancelled` and `paid` are reachable only through cancellation and
    /// payment, which keep stock and payment records consistent. The store
    /// refuses the write if the order was cancelled in the meantime.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        requester: &Requester,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order> {
        requester.ensure_admin()?;
        if !matches!(
            status,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        ) {
            return Err(DomainError::Validation(format!(
                "status cannot be set to {status} directly"
            )));
        }

        let order = self.store.require_order(id).await?;
        if order.status == OrderStatus::Cancelled {
            return Err(DomainError::validation("order is cancelled"));
        }
        Ok(self.store.update_order_status(id, status).await?)
    }

    /// Cancels an order and returns its items to stock.
    ///
    /// An order whose payment still stands cannot be cancelled, whatever its
    /// fulfilment status; the payment has to be refunded first.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, requester: &Requester, id: OrderId) -> Result<Order> {
        let order = self.store.require_order(id).await?;
        requester.ensure_owner_or_admin(order.user_id, "order")?;

        if order.status == OrderStatus::Cancelled {
            return Err(DomainError::validation("order is already cancelled"));
        }
        if !order.status.can_cancel() {
            return Err(DomainError::Validation(format!(
                "order cannot be cancelled once {}",
                order.status
            )));
        }
        if let Some(payment) = self.store.get_payment_for_order(id).await?
            && payment.status.settles_order()
        {
            return Err(DomainError::validation(
                "order has an outstanding payment, refund it before cancelling",
            ));
        }

        let cancelled = self.store.cancel_order(id).await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %id, "order cancelled");
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, UserId};
    use store::{InMemoryStore, Product, ProductRepository, Role};

    use super::*;
    use crate::order::LineRequest;

    async fn setup() -> (OrderService<InMemoryStore>, InMemoryStore, Requester) {
        let store = InMemoryStore::new();
        let service = OrderService::new(store.clone());
        let requester = Requester::new(UserId::new(), Role::User);
        (service, store, requester)
    }

    async fn product(store: &InMemoryStore, cents: i64, stock: u32) -> Product {
        let p = Product::new("Widget", "", Money::from_cents(cents), stock, "tools");
        store.insert_product(&p).await.unwrap();
        p
    }

    #[tokio::test]
    async fn test_place_order_prices_lines_from_catalog() {
        let (service, store, requester) = setup().await;
        let a = product(&store, 1000, 5).await;

        let order = service
            .place_order(&requester, PlaceOrder::new(vec![LineRequest::new(a.id, 3)]))
            .await
            .unwrap();

        assert_eq!(order.user_id, requester.user_id);
        assert_eq!(order.items[0].price, a.price);
        assert_eq!(order.total.cents(), 3000);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_place_order_rejects_empty_and_zero_quantity() {
        let (service, store, requester) = setup().await;
        let a = product(&store, 1000, 5).await;

        let err = service
            .place_order(&requester, PlaceOrder::new(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = service
            .place_order(&requester, PlaceOrder::new(vec![LineRequest::new(a.id, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_place_order_unknown_product() {
        let (service, _store, requester) = setup().await;
        let err = service
            .place_order(
                &requester,
                PlaceOrder::new(vec![LineRequest::new(common::ProductId::new(), 1)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_overflowing_total_is_validation_and_keeps_stock() {
        let (service, store, requester) = setup().await;
        let pricey = product(&store, i64::MAX / 2 + 1, 2).await;

        let err = service
            .place_order(&requester, PlaceOrder::new(vec![LineRequest::new(pricey.id, 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref msg) if msg.contains("out of range")));

        let stored = store.get_product(pricey.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, 2);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_stranger_cannot_read_or_cancel() {
        let (service, store, requester) = setup().await;
        let a = product(&store, 1000, 5).await;
        let order = service
            .place_order(&requester, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();

        let stranger = Requester::new(UserId::new(), Role::User);
        assert!(matches!(
            service.get_order(&stranger, order.id).await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            service.cancel_order(&stranger, order.id).await,
            Err(DomainError::Forbidden(_))
        ));

        let admin = Requester::new(UserId::new(), Role::Admin);
        assert!(service.cancel_order(&admin, order.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_status_rules() {
        let (service, store, requester) = setup().await;
        let a = product(&store, 1000, 5).await;
        let order = service
            .place_order(&requester, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();
        let admin = Requester::new(UserId::new(), Role::Admin);

        assert!(matches!(
            service
                .update_status(&requester, order.id, OrderStatus::Shipped)
                .await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            service
                .update_status(&admin, order.id, OrderStatus::Paid)
                .await,
            Err(DomainError::Validation(_))
        ));

        let shipped = service
            .update_status(&admin, order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);

        // shipped orders have left the cancellable window
        assert!(matches!(
            service.cancel_order(&requester, order.id).await,
            Err(DomainError::Validation(_))
        ));
    }
}
