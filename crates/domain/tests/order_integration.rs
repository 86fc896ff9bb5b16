//! Integration tests for the order workflows.
//!
//! These tests drive the services against the in-memory store and check the
//! stock, total and status invariants across placement, cancellation and
//! payment.

use common::{Money, PageRequest, ProductId, UserId};
use domain::{
    DomainError, LineRequest, PlaceOrder, ProcessPayment, Requester, Services, TokenService,
};
use store::{
    InMemoryStore, OrderStatus, PaymentStatus, Product, ProductRepository, Role, StoreExt,
};

struct Fixture {
    store: InMemoryStore,
    services: Services<InMemoryStore>,
    customer: Requester,
}

fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    let services = Services::new(store.clone(), TokenService::new(b"test-secret", 3600));
    Fixture {
        store,
        services,
        customer: Requester::new(UserId::new(), Role::User),
    }
}

async fn add_product(store: &InMemoryStore, price_cents: i64, stock: u32) -> Product {
    let product = Product::new("Item", "", Money::from_cents(price_cents), stock, "misc");
    store.insert_product(&product).await.unwrap();
    product
}

async fn stock_of(store: &InMemoryStore, id: ProductId) -> u32 {
    store.require_product(id).await.unwrap().stock
}

mod placement {
    use super::*;

    #[tokio::test]
    async fn totals_and_stock_follow_the_catalog() {
        let f = fixture();
        let a = add_product(&f.store, 1000, 10).await;
        let b = add_product(&f.store, 500, 4).await;

        let order = f
            .services
            .orders
            .place_order(
                &f.customer,
                PlaceOrder::new(vec![LineRequest::new(a.id, 2), LineRequest::new(b.id, 1)]),
            )
            .await
            .unwrap();

        assert_eq!(order.total, Money::from_cents(2500));
        assert_eq!(order.total.to_string(), "$25.00");
        assert_eq!(stock_of(&f.store, a.id).await, 8);
        assert_eq!(stock_of(&f.store, b.id).await, 3);
    }

    #[tokio::test]
    async fn total_is_sum_of_line_totals() {
        let f = fixture();
        let a = add_product(&f.store, 1999, 10).await;
        let b = add_product(&f.store, 1, 10).await;
        let c = add_product(&f.store, 250_00, 10).await;

        let order = f
            .services
            .orders
            .place_order(
                &f.customer,
                PlaceOrder::new(vec![
                    LineRequest::new(a.id, 3),
                    LineRequest::new(b.id, 7),
                    LineRequest::new(c.id, 1),
                ]),
            )
            .await
            .unwrap();

        let expected = Money::checked_sum(order.items.iter().map(|i| i.line_total().unwrap()));
        assert_eq!(Some(order.total), expected);
        assert_eq!(order.total.cents(), 3 * 1999 + 7 + 25_000);
    }

    #[tokio::test]
    async fn any_line_over_stock_changes_nothing() {
        let f = fixture();
        let a = add_product(&f.store, 1000, 10).await;
        let b = add_product(&f.store, 500, 1).await;

        let err = f
            .services
            .orders
            .place_order(
                &f.customer,
                PlaceOrder::new(vec![LineRequest::new(a.id, 2), LineRequest::new(b.id, 2)]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(ref m) if m.contains("insufficient stock")));
        assert_eq!(stock_of(&f.store, a.id).await, 10);
        assert_eq!(stock_of(&f.store, b.id).await, 1);
        assert_eq!(f.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn repeated_lines_are_checked_together() {
        let f = fixture();
        let a = add_product(&f.store, 1000, 3).await;

        let err = f
            .services
            .orders
            .place_order(
                &f.customer,
                PlaceOrder::new(vec![LineRequest::new(a.id, 2), LineRequest::new(a.id, 2)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(stock_of(&f.store, a.id).await, 3);
    }

    #[tokio::test]
    async fn total_beyond_cents_range_is_refused() {
        let f = fixture();
        let a = add_product(&f.store, domain::MAX_PRICE_CENTS, 1_000_000_000).await;

        let err = f
            .services
            .orders
            .place_order(
                &f.customer,
                PlaceOrder::new(vec![LineRequest::new(a.id, 1_000_000_000)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref m) if m.contains("out of range")));
        assert_eq!(stock_of(&f.store, a.id).await, 1_000_000_000);
        assert_eq!(f.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn later_price_changes_do_not_touch_placed_orders() {
        let f = fixture();
        let mut a = add_product(&f.store, 1000, 10).await;

        let order = f
            .services
            .orders
            .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();

        a.price = Money::from_cents(5000);
        f.store.update_product(&a).await.unwrap();

        let reloaded = f.services.orders.get_order(&f.customer, order.id).await.unwrap();
        assert_eq!(reloaded.total, Money::from_cents(1000));
        assert_eq!(reloaded.items[0].price, Money::from_cents(1000));
    }
}

mod cancellation {
    use super::*;

    #[tokio::test]
    async fn cancelling_restores_every_line() {
        let f = fixture();
        let a = add_product(&f.store, 1000, 10).await;
        let b = add_product(&f.store, 500, 4).await;

        let order = f
            .services
            .orders
            .place_order(
                &f.customer,
                PlaceOrder::new(vec![LineRequest::new(a.id, 2), LineRequest::new(b.id, 4)]),
            )
            .await
            .unwrap();
        assert_eq!(stock_of(&f.store, b.id).await, 0);

        let cancelled = f
            .services
            .orders
            .cancel_order(&f.customer, order.id)
            .await
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&f.store, a.id).await, 10);
        assert_eq!(stock_of(&f.store, b.id).await, 4);
    }

    #[tokio::test]
    async fn cancelling_twice_fails_without_double_restock() {
        let f = fixture();
        let a = add_product(&f.store, 1000, 10).await;
        let order = f
            .services
            .orders
            .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 3)]))
            .await
            .unwrap();

        f.services
            .orders
            .cancel_order(&f.customer, order.id)
            .await
            .unwrap();
        let err = f
            .services
            .orders
            .cancel_order(&f.customer, order.id)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(ref m) if m.contains("already cancelled")));
        assert_eq!(stock_of(&f.store, a.id).await, 10);
    }

    #[tokio::test]
    async fn paid_orders_cannot_be_cancelled() {
        let f = fixture();
        let a = add_product(&f.store, 1000, 10).await;
        let order = f
            .services
            .orders
            .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();
        f.services
            .payments
            .process_payment(
                &f.customer,
                ProcessPayment::new(order.id, order.total, "credit_card"),
            )
            .await
            .unwrap();

        assert!(matches!(
            f.services.orders.cancel_order(&f.customer, order.id).await,
            Err(DomainError::Validation(_))
        ));
        assert_eq!(stock_of(&f.store, a.id).await, 9);
    }

    #[tokio::test]
    async fn paid_orders_stay_uncancellable_after_moving_to_processing() {
        let f = fixture();
        let admin = Requester::new(UserId::new(), Role::Admin);
        let a = add_product(&f.store, 1000, 5).await;
        let order = f
            .services
            .orders
            .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 2)]))
            .await
            .unwrap();
        let payment = f
            .services
            .payments
            .process_payment(
                &f.customer,
                ProcessPayment::new(order.id, order.total, "credit_card"),
            )
            .await
            .unwrap();
        f.services
            .orders
            .update_status(&admin, order.id, OrderStatus::Processing)
            .await
            .unwrap();

        let err = f
            .services
            .orders
            .cancel_order(&f.customer, order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref m) if m.contains("outstanding payment")));
        assert_eq!(stock_of(&f.store, a.id).await, 3);
        assert_eq!(
            f.store.require_payment(payment.id).await.unwrap().status,
            PaymentStatus::Completed
        );

        // once refunded the order may be cancelled and restocked
        f.services
            .payments
            .refund(&f.customer, payment.id)
            .await
            .unwrap();
        let cancelled = f
            .services
            .orders
            .cancel_order(&f.customer, order.id)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&f.store, a.id).await, 5);
    }

    #[tokio::test]
    async fn cancelled_orders_do_not_move_again() {
        let f = fixture();
        let admin = Requester::new(UserId::new(), Role::Admin);
        let a = add_product(&f.store, 1000, 5).await;
        let order = f
            .services
            .orders
            .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();
        f.services
            .orders
            .cancel_order(&f.customer, order.id)
            .await
            .unwrap();

        assert!(matches!(
            f.services
                .orders
                .update_status(&admin, order.id, OrderStatus::Shipped)
                .await,
            Err(DomainError::Validation(_))
        ));
        assert_eq!(
            f.store.require_order(order.id).await.unwrap().status,
            OrderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn missing_order() {
        let f = fixture();
        assert!(matches!(
            f.services
                .orders
                .cancel_order(&f.customer, common::OrderId::new())
                .await,
            Err(DomainError::NotFound(_))
        ));
    }
}

mod payments {
    use super::*;

    #[tokio::test]
    async fn wrong_amount_is_rejected_and_status_unchanged() {
        let f = fixture();
        let a = add_product(&f.store, 2000, 10).await;
        let order = f
            .services
            .orders
            .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();

        let err = f
            .services
            .payments
            .process_payment(
                &f.customer,
                ProcessPayment::new(order.id, Money::from_cents(2500), "credit_card"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        let reloaded = f.store.require_order(order.id).await.unwrap();
        assert_eq!(reloaded.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn second_payment_is_rejected() {
        let f = fixture();
        let a = add_product(&f.store, 2000, 10).await;
        let order = f
            .services
            .orders
            .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();

        let payment = f
            .services
            .payments
            .process_payment(
                &f.customer,
                ProcessPayment::new(order.id, order.total, "paypal"),
            )
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(
            f.store.require_order(order.id).await.unwrap().status,
            OrderStatus::Paid
        );

        let err = f
            .services
            .payments
            .process_payment(
                &f.customer,
                ProcessPayment::new(order.id, order.total, "paypal"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref m) if m.contains("already paid")));
    }

    #[tokio::test]
    async fn only_the_owner_pays() {
        let f = fixture();
        let a = add_product(&f.store, 2000, 10).await;
        let order = f
            .services
            .orders
            .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();

        let stranger = Requester::new(UserId::new(), Role::User);
        assert!(matches!(
            f.services
                .payments
                .process_payment(
                    &stranger,
                    ProcessPayment::new(order.id, order.total, "paypal"),
                )
                .await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_orders_cannot_be_paid() {
        let f = fixture();
        let a = add_product(&f.store, 2000, 10).await;
        let order = f
            .services
            .orders
            .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();
        f.services
            .orders
            .cancel_order(&f.customer, order.id)
            .await
            .unwrap();

        assert!(matches!(
            f.services
                .payments
                .process_payment(
                    &f.customer,
                    ProcessPayment::new(order.id, order.total, "paypal"),
                )
                .await,
            Err(DomainError::Validation(_))
        ));
    }
}

mod pagination {
    use super::*;

    #[tokio::test]
    async fn pages_reconstruct_the_order_history() {
        let f = fixture();
        let a = add_product(&f.store, 100, 100).await;

        let mut placed = Vec::new();
        for _ in 0..7 {
            let order = f
                .services
                .orders
                .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
                .await
                .unwrap();
            placed.push(order.id);
        }

        let mut seen = Vec::new();
        for page in 1..=3 {
            let result = f
                .services
                .orders
                .list_orders(&f.customer, PageRequest::new(page, 3))
                .await
                .unwrap();
            assert!(result.items.len() <= 3);
            assert_eq!(result.total, 7);
            seen.extend(result.items.into_iter().map(|o| o.id));
        }

        seen.sort();
        placed.sort();
        assert_eq!(seen, placed);
    }

    #[tokio::test]
    async fn other_users_orders_are_not_listed() {
        let f = fixture();
        let a = add_product(&f.store, 100, 100).await;
        let other = Requester::new(UserId::new(), Role::User);

        f.services
            .orders
            .place_order(&other, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();

        let mine = f
            .services
            .orders
            .list_orders(&f.customer, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(mine.total, 0);
        assert!(mine.items.is_empty());
    }
}

mod concurrency {
    use futures_util::future::join_all;

    use super::*;

    #[tokio::test]
    async fn concurrent_orders_never_oversell() {
        let f = fixture();
        let product_id = add_product(&f.store, 1000, 5).await.id;

        let attempts = (0..20).map(|_| {
            let orders = f.services.orders.clone();
            let requester = Requester::new(UserId::new(), Role::User);
            async move {
                orders
                    .place_order(&requester, PlaceOrder::new(vec![LineRequest::new(product_id, 1)]))
                    .await
            }
        });
        let results = join_all(attempts).await;

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 5);
        assert_eq!(stock_of(&f.store, product_id).await, 0);
        assert_eq!(f.store.order_count().await, 5);
    }

    #[tokio::test]
    async fn concurrent_orders_on_spawned_tasks() {
        let f = fixture();
        let product_id = add_product(&f.store, 1000, 3).await.id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orders = f.services.orders.clone();
                tokio::spawn(async move {
                    let requester = Requester::new(UserId::new(), Role::User);
                    orders
                        .place_order(&requester, PlaceOrder::new(vec![LineRequest::new(product_id, 1)]))
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 3);
        assert_eq!(stock_of(&f.store, product_id).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refunds_succeed_once() {
        let f = fixture();
        let a = add_product(&f.store, 1000, 5).await;
        let order = f
            .services
            .orders
            .place_order(&f.customer, PlaceOrder::new(vec![LineRequest::new(a.id, 1)]))
            .await
            .unwrap();
        let payment = f
            .services
            .payments
            .process_payment(&f.customer, ProcessPayment::new(order.id, order.total, "paypal"))
            .await
            .unwrap();

        let payment_id = payment.id;
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let payments = f.services.payments.clone();
                let customer = f.customer;
                tokio::spawn(async move { payments.refund(&customer, payment_id).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(refunded) => {
                    assert_eq!(refunded.status, PaymentStatus::Refunded);
                    succeeded += 1;
                }
                Err(e) => assert!(matches!(e, DomainError::Validation(_))),
            }
        }
        assert_eq!(succeeded, 1);
    }
}
