use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, ContactId, OrderId, Page, PageRequest, PaymentId, ProductId, UserId};
use tokio::sync::RwLock;

use crate::model::{
    Address, Cart, Contact, Order, OrderStatus, Payment, PaymentStatus, Product, ProductFilter,
    User,
};
use crate::repository::{
    AddressRepository, CartRepository, ContactRepository, HealthCheck, OrderRepository,
    PaymentRepository, ProductRepository, UserRepository,
};
use crate::{Result, StoreError};

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
    users: HashMap<UserId, User>,
    addresses: HashMap<AddressId, Address>,
    contacts: HashMap<ContactId, Contact>,
    carts: HashMap<UserId, Cart>,
}

/// In-memory store implementation for tests and database-less runs.
///
/// All tables sit behind one lock, so every multi-row operation is atomic
/// exactly like its transactional PostgreSQL counterpart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored products.
    pub async fn product_count(&self) -> usize {
        self.tables.read().await.products.len()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Clears every table.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

/// Sorts by creation time descending, ties broken by ascending key.
fn newest_first<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> (DateTime<Utc>, K)) -> Vec<T> {
    rows.sort_by(|a, b| {
        let (created_a, id_a) = key(a);
        let (created_b, id_b) = key(b);
        created_b.cmp(&created_a).then(id_a.cmp(&id_b))
    });
    rows
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.products.contains_key(&product.id) {
            return Err(StoreError::Duplicate(format!("product {}", product.id)));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        let tables = self.tables.read().await;
        let rows: Vec<_> = tables
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        let rows = newest_first(rows, |p| (p.created_at, p.id));
        Ok(Page::from_slice(&rows, page))
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.products.get_mut(&product.id) {
            Some(existing) => {
                let stock = existing.stock;
                *existing = product.clone();
                existing.stock = stock;
                Ok(())
            }
            None => Err(StoreError::not_found("Product", product.id)),
        }
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("Product", id))?;
        for cart in tables.carts.values_mut() {
            cart.items.retain(|i| i.product_id != id);
        }
        Ok(())
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Product", id))?;

        let new_stock = i64::from(product.stock).saturating_add(delta);
        if new_stock < 0 {
            return Err(StoreError::InsufficientStock {
                product_id: id,
                requested: u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX),
                available: product.stock,
            });
        }
        product.stock = u32::try_from(new_stock)
            .map_err(|_| StoreError::Conflict(format!("stock overflow for product {id}")))?;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn place_order(&self, order: &Order) -> Result<()> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        if tables.orders.contains_key(&order.id) {
            return Err(StoreError::Duplicate(format!("order {}", order.id)));
        }

        // Validate every line before touching any stock.
        let mut requested: HashMap<ProductId, u32> = HashMap::new();
        for item in &order.items {
            let total = requested.entry(item.product_id).or_default();
            *total = total.saturating_add(item.quantity);
        }
        for (&product_id, &quantity) in &requested {
            let product = tables
                .products
                .get(&product_id)
                .ok_or_else(|| StoreError::not_found("Product", product_id))?;
            if product.stock < quantity {
                return Err(StoreError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available: product.stock,
                });
            }
        }

        let now = Utc::now();
        for (product_id, quantity) in requested {
            if let Some(product) = tables.products.get_mut(&product_id) {
                product.stock -= quantity;
                product.updated_at = now;
            }
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_orders_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        let tables = self.tables.read().await;
        let rows: Vec<_> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        let rows = newest_first(rows, |o| (o.created_at, o.id));
        Ok(Page::from_slice(&rows, page))
    }

    async fn list_orders(&self, page: PageRequest) -> Result<Page<Order>> {
        let tables = self.tables.read().await;
        let rows: Vec<_> = tables.orders.values().cloned().collect();
        let rows = newest_first(rows, |o| (o.created_at, o.id));
        Ok(Page::from_slice(&rows, page))
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        if order.status == OrderStatus::Cancelled {
            return Err(StoreError::Conflict(format!("order {id} is cancelled")));
        }
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn cancel_order(&self, id: OrderId) -> Result<Order> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        if tables
            .payments
            .values()
            .any(|p| p.order_id == id && p.status.settles_order())
        {
            return Err(StoreError::Conflict(format!(
                "order {id} has an outstanding payment and cannot be cancelled"
            )));
        }
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        if !order.status.can_cancel() {
            return Err(StoreError::Conflict(format!(
                "order {id} is {} and cannot be cancelled",
                order.status
            )));
        }

        let now = Utc::now();
        order.status = OrderStatus::Cancelled;
        order.updated_at = now;

        // Products deleted since the order was placed are skipped.
        for item in &order.items {
            if let Some(product) = tables.products.get_mut(&item.product_id) {
                product.stock = product.stock.saturating_add(item.quantity);
                product.updated_at = now;
            }
        }
        Ok(order.clone())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn record_payment(&self, payment: &Payment) -> Result<()> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let order = tables
            .orders
            .get_mut(&payment.order_id)
            .ok_or_else(|| StoreError::not_found("Order", payment.order_id))?;
        if !order.status.is_payable() {
            return Err(StoreError::Conflict(format!(
                "order {} is {} and cannot be paid",
                order.id, order.status
            )));
        }
        if tables
            .payments
            .values()
            .any(|p| p.order_id == payment.order_id || p.transaction_id == payment.transaction_id)
        {
            return Err(StoreError::Duplicate(format!(
                "payment for order {}",
                payment.order_id
            )));
        }

        order.status = OrderStatus::Paid;
        order.updated_at = Utc::now();
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn get_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn list_payments_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Payment>> {
        let tables = self.tables.read().await;
        let rows: Vec<_> = tables
            .payments
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        let rows = newest_first(rows, |p| (p.created_at, p.id));
        Ok(Page::from_slice(&rows, page))
    }

    async fn update_payment_status(
        &self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Payment> {
        let mut tables = self.tables.write().await;
        let payment = tables
            .payments
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Payment", id))?;
        if payment.status != from {
            return Err(StoreError::Conflict(format!(
                "payment {id} is {}, expected {from}",
                payment.status
            )));
        }
        payment.status = to;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.is_live() && u.email == user.email)
        {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).filter(|u| u.is_live()).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.is_live() && u.email == email)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.is_live() && u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        match tables.users.get_mut(&user.id).filter(|u| u.is_live()) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("User", user.id)),
        }
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .filter(|u| u.is_live())
            .ok_or_else(|| StoreError::not_found("User", id))?;
        user.last_login = Some(at);
        Ok(())
    }

    async fn soft_delete_user(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .filter(|u| u.is_live())
            .ok_or_else(|| StoreError::not_found("User", id))?;
        user.deleted_at = Some(at);
        user.is_active = false;
        user.updated_at = at;
        Ok(())
    }

    async fn list_users(&self, page: PageRequest) -> Result<Page<User>> {
        let tables = self.tables.read().await;
        let rows: Vec<_> = tables
            .users
            .values()
            .filter(|u| u.is_live())
            .cloned()
            .collect();
        let rows = newest_first(rows, |u| (u.created_at, u.id));
        Ok(Page::from_slice(&rows, page))
    }
}

#[async_trait]
impl AddressRepository for InMemoryStore {
    async fn insert_address(&self, address: &Address) -> Result<()> {
        let mut tables = self.tables.write().await;
        if address.is_default {
            for other in tables.addresses.values_mut() {
                if other.user_id == address.user_id {
                    other.is_default = false;
                }
            }
        }
        tables.addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn get_address(&self, id: AddressId) -> Result<Option<Address>> {
        Ok(self.tables.read().await.addresses.get(&id).cloned())
    }

    async fn list_addresses(&self, user_id: UserId) -> Result<Vec<Address>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .addresses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update_address(&self, address: &Address) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.addresses.contains_key(&address.id) {
            return Err(StoreError::not_found("Address", address.id));
        }
        if address.is_default {
            for other in tables.addresses.values_mut() {
                if other.user_id == address.user_id {
                    other.is_default = false;
                }
            }
        }
        tables.addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn delete_address(&self, id: AddressId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .addresses
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("Address", id))
    }
}

#[async_trait]
impl ContactRepository for InMemoryStore {
    async fn insert_contact(&self, contact: &Contact) -> Result<()> {
        let mut tables = self.tables.write().await;
        if contact.is_default {
            for other in tables.contacts.values_mut() {
                if other.user_id == contact.user_id {
                    other.is_default = false;
                }
            }
        }
        tables.contacts.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
        Ok(self.tables.read().await.contacts.get(&id).cloned())
    }

    async fn list_contacts(&self, user_id: UserId) -> Result<Vec<Contact>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .contacts
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update_contact(&self, contact: &Contact) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.contacts.contains_key(&contact.id) {
            return Err(StoreError::not_found("Contact", contact.id));
        }
        if contact.is_default {
            for other in tables.contacts.values_mut() {
                if other.user_id == contact.user_id {
                    other.is_default = false;
                }
            }
        }
        tables.contacts.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn delete_contact(&self, id: ContactId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .contacts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("Contact", id))
    }
}

#[async_trait]
impl HealthCheck for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self.tables.read().await.carts.get(&user_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.carts.insert(cart.user_id, cart.clone());
        Ok(())
    }

    async fn delete_cart(&self, user_id: UserId) -> Result<()> {
        self.tables.write().await.carts.remove(&user_id);
        Ok(())
    }
}
