use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, ContactId, OrderId, Page, PageRequest, PaymentId, ProductId, UserId};

use crate::model::{
    Address, Cart, Contact, Order, OrderStatus, Payment, PaymentStatus, Product, ProductFilter,
    User,
};
use crate::{Result, StoreError};

/// Catalog persistence.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert_product(&self, product: &Product) -> Result<()>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products matching the filter, newest first.
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>>;

    /// Overwrites every mutable column except stock, which only moves through
    /// `adjust_stock` and the order workflows. Fails with `NotFound` if the row is gone.
    async fn update_product(&self, product: &Product) -> Result<()>;

    async fn delete_product(&self, id: ProductId) -> Result<()>;

    /// Adds a signed delta to the stock in a single statement.
    ///
    /// Fails with `InsufficientStock` if the result would be negative.
    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product>;
}

/// Order persistence, including the multi-entity order workflows.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Decrements stock for every line and inserts the order, atomically.
    ///
    /// Each decrement is conditional on `stock >= quantity`. If any line
    /// cannot be satisfied the whole operation fails and no stock changes.
    async fn place_order(&self, order: &Order) -> Result<()>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders_for_user(&self, user_id: UserId, page: PageRequest)
    -> Result<Page<Order>>;

    /// Lists every order, newest first.
    async fn list_orders(&self, page: PageRequest) -> Result<Page<Order>>;

    /// Sets the status of an order that is not cancelled.
    ///
    /// The cancelled check and the write are one atomic step; a cancelled
    /// order fails with `Conflict`.
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Marks the order cancelled and returns each line's quantity to stock,
    /// atomically. Fails with `Conflict` if the order is no longer cancellable
    /// or a payment still settles it.
    async fn cancel_order(&self, id: OrderId) -> Result<Order>;
}

/// Payment persistence.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts the payment and marks its order paid, atomically.
    ///
    /// Fails with `Duplicate` if the order already has a payment and with
    /// `Conflict` if the order is no longer payable.
    async fn record_payment(&self, payment: &Payment) -> Result<()>;

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    async fn get_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    async fn list_payments_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Payment>>;

    /// Moves a payment from `from` to `to`. Fails with `Conflict` if the
    /// payment is no longer in `from`.
    async fn update_payment_status(
        &self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Payment>;
}

/// Account persistence. Reads never return soft-deleted users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Duplicate` if a live user already has the email.
    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn update_user(&self, user: &User) -> Result<()>;

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<()>;

    async fn soft_delete_user(&self, id: UserId, at: DateTime<Utc>) -> Result<()>;

    async fn list_users(&self, page: PageRequest) -> Result<Page<User>>;
}

/// Address persistence.
///
/// Writing an address with `is_default` set clears the flag on the user's
/// other addresses in the same atomic operation.
#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn insert_address(&self, address: &Address) -> Result<()>;

    async fn get_address(&self, id: AddressId) -> Result<Option<Address>>;

    /// Lists a user's addresses, oldest first.
    async fn list_addresses(&self, user_id: UserId) -> Result<Vec<Address>>;

    async fn update_address(&self, address: &Address) -> Result<()>;

    async fn delete_address(&self, id: AddressId) -> Result<()>;
}

/// Contact persistence, with the same default toggling as addresses.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn insert_contact(&self, contact: &Contact) -> Result<()>;

    async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>>;

    async fn list_contacts(&self, user_id: UserId) -> Result<Vec<Contact>>;

    async fn update_contact(&self, contact: &Contact) -> Result<()>;

    async fn delete_contact(&self, id: ContactId) -> Result<()>;
}

/// Cart persistence. One cart per user.
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>>;

    /// Inserts or replaces the cart and all its lines.
    async fn save_cart(&self, cart: &Cart) -> Result<()>;

    async fn delete_cart(&self, user_id: UserId) -> Result<()>;
}

/// Backend reachability.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Round-trips to the backend. Fails if it cannot serve queries.
    async fn ping(&self) -> Result<()>;
}

/// Every repository the services need, implemented by one backend.
pub trait Store:
    ProductRepository
    + OrderRepository
    + PaymentRepository
    + UserRepository
    + AddressRepository
    + ContactRepository
    + CartRepository
    + HealthCheck
    + Clone
    + 'static
{
}

impl<T> Store for T where
    T: ProductRepository
        + OrderRepository
        + PaymentRepository
        + UserRepository
        + AddressRepository
        + ContactRepository
        + CartRepository
        + HealthCheck
        + Clone
        + 'static
{
}

/// Extension trait turning missing rows into `NotFound` errors.
#[async_trait]
pub trait StoreExt: Store {
    async fn require_product(&self, id: ProductId) -> Result<Product> {
        self.get_product(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Product", id))
    }

    async fn require_order(&self, id: OrderId) -> Result<Order> {
        self.get_order(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Order", id))
    }

    async fn require_payment(&self, id: PaymentId) -> Result<Payment> {
        self.get_payment(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Payment", id))
    }

    async fn require_user(&self, id: UserId) -> Result<User> {
        self.get_user(id)
            .await?
            .ok_or_else(|| StoreError::not_found("User", id))
    }
}

// Blanket implementation for all Store implementations
impl<T: Store> StoreExt for T {}
