//! Payment service.

use common::{OrderId, Page, PageRequest, PaymentId};
use store::{OrderStatus, Payment, PaymentMethod, PaymentStatus, Store, StoreExt};

use super::ProcessPayment;
use crate::auth::Requester;
use crate::error::{DomainError, Result};

/// Service for paying for orders. No gateway is involved: a payment that
/// passes validation is recorded as completed.
#[derive(Clone)]
pub struct PaymentService<S: Store> {
    store: S,
}

impl<S: Store> PaymentService<S> {
    /// Creates a new payment service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Pays for one of the requester's orders.
    ///
    /// The amount must equal the order total exactly. Recording the payment
    /// and marking the order paid happen atomically.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, method = %cmd.method))]
    pub async fn process_payment(
        &self,
        requester: &Requester,
        cmd: ProcessPayment,
    ) -> Result<Payment> {
        let method: PaymentMethod = cmd
            .method
            .parse()
            .map_err(|_| DomainError::Validation(format!("unsupported payment method: {}", cmd.method)))?;

        let order = self.store.require_order(cmd.order_id).await?;
        if order.user_id != requester.user_id {
            return Err(DomainError::forbidden("not allowed to pay for this order"));
        }
        match order.status {
            OrderStatus::Paid => return Err(DomainError::validation("order is already paid")),
            OrderStatus::Cancelled => return Err(DomainError::validation("order is cancelled")),
            _ => {}
        }
        if cmd.amount != order.total {
            return Err(DomainError::Validation(format!(
                "payment amount {} does not match order total {}",
                cmd.amount, order.total
            )));
        }

        let payment = Payment::completed(order.id, requester.user_id, cmd.amount, method);
        self.store.record_payment(&payment).await?;

        metrics::counter!("payments_processed_total", "method" => method.as_str()).increment(1);
        tracing::info!(payment_id = %payment.id, transaction_id = %payment.transaction_id, "payment recorded");
        Ok(payment)
    }

    /// Loads a payment visible to the requester.
    pub async fn get_payment(&self, requester: &Requester, id: PaymentId) -> Result<Payment> {
        let payment = self.store.require_payment(id).await?;
        requester.ensure_owner_or_admin(payment.user_id, "payment")?;
        Ok(payment)
    }

    /// Loads the payment recorded against an order.
    pub async fn get_payment_for_order(
        &self,
        requester: &Requester,
        order_id: OrderId,
    ) -> Result<Payment> {
        let order = self.store.require_order(order_id).await?;
        requester.ensure_owner_or_admin(order.user_id, "order")?;
        self.store
            .get_payment_for_order(order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("no payment for order {order_id}")))
    }

    /// Lists the requester's payments, newest first.
    pub async fn list_payments(
        &self,
        requester: &Requester,
        page: PageRequest,
    ) -> Result<Page<Payment>> {
        Ok(self
            .store
            .list_payments_for_user(requester.user_id, page)
            .await?)
    }

    /// Marks a completed payment refunded. Of two concurrent refunds only one
    /// succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn refund(&self, requester: &Requester, id: PaymentId) -> Result<Payment> {
        let payment = self.store.require_payment(id).await?;
        requester.ensure_owner_or_admin(payment.user_id, "payment")?;
        if payment.status != PaymentStatus::Completed {
            return Err(DomainError::Validation(format!(
                "only completed payments can be refunded, this one is {}",
                payment.status
            )));
        }

        let refunded = self
            .store
            .update_payment_status(id, PaymentStatus::Completed, PaymentStatus::Refunded)
            .await?;
        metrics::counter!("payments_refunded_total").increment(1);
        Ok(refunded)
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, UserId};
    use store::{InMemoryStore, Order, OrderItem, OrderRepository, Product, ProductRepository, Role};

    use super::*;

    async fn setup() -> (PaymentService<InMemoryStore>, InMemoryStore, Requester, Order) {
        let store = InMemoryStore::new();
        let product = Product::new("Widget", "", Money::from_cents(2000), 5, "tools");
        store.insert_product(&product).await.unwrap();

        let requester = Requester::new(UserId::new(), Role::User);
        let order = Order::try_new(
            requester.user_id,
            vec![OrderItem::new(product.id, 1, product.price)],
        )
        .unwrap();
        store.place_order(&order).await.unwrap();

        (PaymentService::new(store.clone()), store, requester, order)
    }

    #[tokio::test]
    async fn test_payment_marks_order_paid() {
        let (service, store, requester, order) = setup().await;

        let payment = service
            .process_payment(
                &requester,
                ProcessPayment::new(order.id, Money::from_cents(2000), "credit_card"),
            )
            .await
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.transaction_id.starts_with("txn_"));
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_amount_mismatch_leaves_order_pending() {
        let (service, store, requester, order) = setup().await;

        let err = service
            .process_payment(
                &requester,
                ProcessPayment::new(order.id, Money::from_cents(2500), "paypal"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_method_is_rejected() {
        let (service, _store, requester, order) = setup().await;
        let err = service
            .process_payment(
                &requester,
                ProcessPayment::new(order.id, order.total, "bitcoin"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref m) if m.contains("bitcoin")));
    }

    #[tokio::test]
    async fn test_refund_only_once() {
        let (service, _store, requester, order) = setup().await;
        let payment = service
            .process_payment(
                &requester,
                ProcessPayment::new(order.id, order.total, "paypal"),
            )
            .await
            .unwrap();

        let refunded = service.refund(&requester, payment.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert!(matches!(
            service.refund(&requester, payment.id).await,
            Err(DomainError::Validation(_))
        ));
    }
}
