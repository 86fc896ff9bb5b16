use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AddressId, ContactId, Money, OrderId, Page, PageRequest, PaymentId, ProductId, UserId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::model::{
    Address, Cart, CartItem, Contact, Order, OrderItem, OrderStatus, Payment, PaymentStatus,
    Product, ProductFilter, User,
};
use crate::repository::{
    AddressRepository, CartRepository, ContactRepository, HealthCheck, OrderRepository,
    PaymentRepository, ProductRepository, UserRepository,
};
use crate::{Result, StoreError};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price_cents, stock, category, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, total_cents, status, shipping_address, billing_address, created_at, updated_at";
const PAYMENT_COLUMNS: &str = "id, order_id, user_id, amount_cents, method, status, transaction_id, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, is_active, last_login, created_at, updated_at, deleted_at";
const ADDRESS_COLUMNS: &str = "id, user_id, label, title, address_line, city, state, country, postal_code, is_default, created_at";
const CONTACT_COLUMNS: &str = "id, user_id, label, title, phone_number, is_default, created_at";

/// Largest stock value a product row may hold; reads map the column to `u32`.
const MAX_STOCK: i64 = u32::MAX as i64;

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn load_items(&self, orders: &mut [Order]) -> Result<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, price_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id: Uuid = row.try_get("order_id")?;
            by_order.entry(order_id).or_default().push(OrderItem {
                product_id: ProductId::from_uuid(row.try_get("product_id")?),
                quantity: to_u32(row.try_get("quantity")?, "quantity")?,
                price: Money::from_cents(row.try_get("price_cents")?),
            });
        }
        for order in orders.iter_mut() {
            order.items = by_order.remove(&order.id.as_uuid()).unwrap_or_default();
        }
        Ok(())
    }

    async fn count(&self, sql: &str, bind: Option<Uuid>) -> Result<u64> {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        if let Some(id) = bind {
            query = query.bind(id);
        }
        let total = query.fetch_one(&self.pool).await?;
        to_u64(total)
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::Decode(format!("{column} out of range: {value}")))
}

fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| StoreError::Decode(format!("negative count: {value}")))
}

fn parse_column<T>(raw: String) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse().map_err(|e: T::Err| StoreError::Decode(e.to_string()))
}

/// Maps unique-constraint violations onto `Duplicate`.
fn map_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StoreError::Duplicate(what());
    }
    StoreError::Database(err)
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32(row.try_get("stock")?, "stock")?,
        category: row.try_get("category")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Maps the order header; items are attached separately.
fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        items: Vec::new(),
        total: Money::from_cents(row.try_get("total_cents")?),
        status: parse_column(row.try_get("status")?)?,
        shipping_address: row.try_get("shipping_address")?,
        billing_address: row.try_get("billing_address")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_payment(row: PgRow) -> Result<Payment> {
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        method: parse_column(row.try_get("method")?)?,
        status: parse_column(row.try_get("status")?)?,
        transaction_id: row.try_get("transaction_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_user(row: PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role: parse_column(row.try_get("role")?)?,
        is_active: row.try_get("is_active")?,
        last_login: row.try_get("last_login")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn row_to_address(row: PgRow) -> Result<Address> {
    Ok(Address {
        id: AddressId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        label: parse_column(row.try_get("label")?)?,
        title: row.try_get("title")?,
        address_line: row.try_get("address_line")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        country: row.try_get("country")?,
        postal_code: row.try_get("postal_code")?,
        is_default: row.try_get("is_default")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_contact(row: PgRow) -> Result<Contact> {
    Ok(Contact {
        id: ContactId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        label: parse_column(row.try_get("label")?)?,
        title: row.try_get("title")?,
        phone_number: row.try_get("phone_number")?,
        is_default: row.try_get("is_default")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Locks the order row and returns its status.
async fn lock_order_status(tx: &mut Transaction<'_, Postgres>, id: OrderId) -> Result<OrderStatus> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;
    match status {
        Some(status) => parse_column(status),
        None => Err(StoreError::not_found("Order", id)),
    }
}

#[async_trait]
impl ProductRepository for PostgresStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, stock, category, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(&product.category)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, || format!("product {}", product.id)))?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_product).transpose()
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>> {
        let mut where_clause = String::from(" WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic filter
        if filter.category.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND category = ${param_count}"));
        }
        if filter.search.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND name ILIKE ${param_count}"));
        }
        if filter.min_price.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND price_cents >= ${param_count}"));
        }
        if filter.max_price.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND price_cents <= ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM products{where_clause}");
        let list_sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products{where_clause} ORDER BY created_at DESC, id ASC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );

        let pattern = filter.search.as_deref().map(like_pattern);

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut list_query = sqlx::query(&list_sql);
        if let Some(category) = &filter.category {
            count_query = count_query.bind(category);
            list_query = list_query.bind(category);
        }
        if let Some(pattern) = &pattern {
            count_query = count_query.bind(pattern);
            list_query = list_query.bind(pattern);
        }
        if let Some(min) = filter.min_price {
            count_query = count_query.bind(min.cents());
            list_query = list_query.bind(min.cents());
        }
        if let Some(max) = filter.max_price {
            count_query = count_query.bind(max.cents());
            list_query = list_query.bind(max.cents());
        }
        list_query = list_query
            .bind(page.limit() as i64)
            .bind(page.offset() as i64);

        let total = to_u64(count_query.fetch_one(&self.pool).await?)?;
        let rows = list_query.fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(row_to_product)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price_cents = $4, category = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.category)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", product.id));
        }
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", id));
        }
        Ok(())
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product> {
        // Deltas beyond the stock range fail the guard either way; clamping
        // keeps `stock + $2` inside BIGINT.
        let delta = delta.clamp(-MAX_STOCK - 1, MAX_STOCK + 1);
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1 AND stock + $2 BETWEEN 0 AND $3
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(delta)
        .bind(MAX_STOCK)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return row_to_product(row);
        }

        // Nothing updated: either the product is gone or the guard failed.
        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match available {
            Some(_) if delta > 0 => Err(StoreError::Conflict(format!(
                "stock overflow for product {id}"
            ))),
            Some(stock) => Err(StoreError::InsufficientStock {
                product_id: id,
                requested: u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX),
                available: to_u32(stock, "stock")?,
            }),
            None => Err(StoreError::not_found("Product", id)),
        }
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn place_order(&self, order: &Order) -> Result<()> {
        // Sorted so concurrent orders lock product rows in the same sequence.
        let mut requested: BTreeMap<ProductId, u32> = BTreeMap::new();
        for item in &order.items {
            let total = requested.entry(item.product_id).or_default();
            *total = total.saturating_add(item.quantity);
        }

        // Start a transaction; dropping it without commit rolls back.
        let mut tx = self.pool.begin().await?;

        for (&product_id, &quantity) in &requested {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - $2, updated_at = NOW()
                WHERE id = $1 AND stock >= $2
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(i64::from(quantity))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                        .bind(product_id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?;
                return Err(match available {
                    Some(stock) => StoreError::InsufficientStock {
                        product_id,
                        requested: quantity,
                        available: to_u32(stock, "stock")?,
                    },
                    None => StoreError::not_found("Product", product_id),
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_cents, status, shipping_address, billing_address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, || format!("order {}", order.id)))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, quantity, price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_uuid())
            .bind(i64::from(item.quantity))
            .bind(item.price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = vec![row_to_order(row)?];
        self.load_items(&mut orders).await?;
        Ok(orders.pop())
    }

    async fn list_orders_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>> {
        let total = self
            .count(
                "SELECT COUNT(*) FROM orders WHERE user_id = $1",
                Some(user_id.as_uuid()),
            )
            .await?;
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.as_uuid())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = rows
            .into_iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        self.load_items(&mut orders).await?;
        Ok(Page::new(orders, total, page))
    }

    async fn list_orders(&self, page: PageRequest) -> Result<Page<Order>> {
        let total = self.count("SELECT COUNT(*) FROM orders", None).await?;
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = rows
            .into_iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        self.load_items(&mut orders).await?;
        Ok(Page::new(orders, total, page))
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 AND status <> $3",
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(OrderStatus::Cancelled.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
            return Err(match exists {
                Some(_) => StoreError::Conflict(format!("order {id} is cancelled")),
                None => StoreError::not_found("Order", id),
            });
        }
        self.get_order(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Order", id))
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_order(&self, id: OrderId) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let status = lock_order_status(&mut tx, id).await?;
        if !status.can_cancel() {
            return Err(StoreError::Conflict(format!(
                "order {id} is {status} and cannot be cancelled"
            )));
        }

        // Payments are recorded under the same order row lock.
        let payment_status: Option<String> =
            sqlx::query_scalar("SELECT status FROM payments WHERE order_id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(payment_status) = payment_status
            && parse_column::<PaymentStatus>(payment_status)?.settles_order()
        {
            return Err(StoreError::Conflict(format!(
                "order {id} has an outstanding payment and cannot be cancelled"
            )));
        }

        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(OrderStatus::Cancelled.as_str())
            .execute(&mut *tx)
            .await?;

        let lines = sqlx::query(
            r#"
            SELECT product_id, SUM(quantity)::BIGINT AS quantity
            FROM order_items
            WHERE order_id = $1
            GROUP BY product_id
            ORDER BY product_id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await?;

        // Products deleted since the order was placed match no row.
        for line in lines {
            let product_id: Uuid = line.try_get("product_id")?;
            let quantity: i64 = line.try_get("quantity")?;
            sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
                .bind(product_id)
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get_order(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Order", id))
    }
}

#[async_trait]
impl PaymentRepository for PostgresStore {
    #[tracing::instrument(skip(self, payment), fields(order_id = %payment.order_id))]
    async fn record_payment(&self, payment: &Payment) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let status = lock_order_status(&mut tx, payment.order_id).await?;
        if !status.is_payable() {
            return Err(StoreError::Conflict(format!(
                "order {} is {status} and cannot be paid",
                payment.order_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, user_id, amount_cents, method, status, transaction_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.user_id.as_uuid())
        .bind(payment.amount.cents())
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, || format!("payment for order {}", payment.order_id)))?;

        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(payment.order_id.as_uuid())
            .bind(OrderStatus::Paid.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_payment).transpose()
    }

    async fn get_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_payment).transpose()
    }

    async fn list_payments_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Payment>> {
        let total = self
            .count(
                "SELECT COUNT(*) FROM payments WHERE user_id = $1",
                Some(user_id.as_uuid()),
            )
            .await?;
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC, id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.as_uuid())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(row_to_payment)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    async fn update_payment_status(
        &self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Payment> {
        let row = sqlx::query(&format!(
            "UPDATE payments SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2 RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = row {
            return row_to_payment(row);
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM payments WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        match current {
            Some(current) => Err(StoreError::Conflict(format!(
                "payment {id} is {current}, expected {from}"
            ))),
            None => Err(StoreError::not_found("Payment", id)),
        }
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role, is_active, last_login, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.last_login)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, || format!("email {}", user.email)))?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_user).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_user).transpose()
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, first_name = $4, last_name = $5,
                role = $6, is_active = $7, updated_at = $8
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, || format!("email {}", user.email)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("User", user.id));
        }
        Ok(())
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1 AND deleted_at IS NULL")
                .bind(id.as_uuid())
                .bind(at)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("User", id));
        }
        Ok(())
    }

    async fn soft_delete_user(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = $2, is_active = FALSE, updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("User", id));
        }
        Ok(())
    }

    async fn list_users(&self, page: PageRequest) -> Result<Page<User>> {
        let total = self
            .count("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL", None)
            .await?;
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY created_at DESC, id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(row_to_user)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }
}

#[async_trait]
impl AddressRepository for PostgresStore {
    async fn insert_address(&self, address: &Address) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1")
                .bind(address.user_id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO addresses (id, user_id, label, title, address_line, city, state, country, postal_code, is_default, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(address.id.as_uuid())
        .bind(address.user_id.as_uuid())
        .bind(address.label.as_str())
        .bind(&address.title)
        .bind(&address.address_line)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.country)
        .bind(&address.postal_code)
        .bind(address.is_default)
        .bind(address.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, || format!("address {}", address.id)))?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_address(&self, id: AddressId) -> Result<Option<Address>> {
        let row = sqlx::query(&format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_address).transpose()
    }

    async fn list_addresses(&self, user_id: UserId) -> Result<Vec<Address>> {
        let rows = sqlx::query(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_address).collect()
    }

    async fn update_address(&self, address: &Address) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND id <> $2")
                .bind(address.user_id.as_uuid())
                .bind(address.id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE addresses
            SET label = $2, title = $3, address_line = $4, city = $5, state = $6,
                country = $7, postal_code = $8, is_default = $9
            WHERE id = $1
            "#,
        )
        .bind(address.id.as_uuid())
        .bind(address.label.as_str())
        .bind(&address.title)
        .bind(&address.address_line)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.country)
        .bind(&address.postal_code)
        .bind(address.is_default)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Address", address.id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_address(&self, id: AddressId) -> Result<()> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Address", id));
        }
        Ok(())
    }
}

#[async_trait]
impl ContactRepository for PostgresStore {
    async fn insert_contact(&self, contact: &Contact) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if contact.is_default {
            sqlx::query("UPDATE contacts SET is_default = FALSE WHERE user_id = $1")
                .bind(contact.user_id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO contacts (id, user_id, label, title, phone_number, is_default, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(contact.id.as_uuid())
        .bind(contact.user_id.as_uuid())
        .bind(contact.label.as_str())
        .bind(&contact.title)
        .bind(&contact.phone_number)
        .bind(contact.is_default)
        .bind(contact.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, || format!("contact {}", contact.id)))?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
        let row = sqlx::query(&format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_contact).transpose()
    }

    async fn list_contacts(&self, user_id: UserId) -> Result<Vec<Contact>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE user_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_contact).collect()
    }

    async fn update_contact(&self, contact: &Contact) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if contact.is_default {
            sqlx::query("UPDATE contacts SET is_default = FALSE WHERE user_id = $1 AND id <> $2")
                .bind(contact.user_id.as_uuid())
                .bind(contact.id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET label = $2, title = $3, phone_number = $4, is_default = $5
            WHERE id = $1
            "#,
        )
        .bind(contact.id.as_uuid())
        .bind(contact.label.as_str())
        .bind(&contact.title)
        .bind(&contact.phone_number)
        .bind(contact.is_default)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Contact", contact.id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_contact(&self, id: ContactId) -> Result<()> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Contact", id));
        }
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for PostgresStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CartRepository for PostgresStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        let updated_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT updated_at FROM carts WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        let Some(updated_at) = updated_at else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY position",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(CartItem {
                    product_id: ProductId::from_uuid(row.try_get("product_id")?),
                    quantity: to_u32(row.try_get("quantity")?, "quantity")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Cart {
            user_id,
            items,
            updated_at,
        }))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO carts (user_id, updated_at)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cart.user_id.as_uuid())
        .bind(cart.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(cart.user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        for (position, item) in cart.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (user_id, product_id, quantity, position)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(cart.user_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(i64::from(item.quantity))
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_cart(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
