//! Persistence for the storefront.
//!
//! Services talk to the [`Store`] trait; [`InMemoryStore`] backs tests and
//! database-less runs, [`PostgresStore`] backs production. Every workflow that
//! touches more than one row (placing, cancelling and paying for an order,
//! toggling a default address or contact) is a single repository call so that
//! each backend can make it atomic.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Address, Cart, CartItem, Contact, Label, Order, OrderItem, OrderStatus, Payment,
    PaymentMethod, PaymentStatus, Product, ProductFilter, Role, UnknownVariant, User,
};
pub use postgres::PostgresStore;
pub use repository::{
    AddressRepository, CartRepository, ContactRepository, HealthCheck, OrderRepository,
    PaymentRepository, ProductRepository, Store, StoreExt, UserRepository,
};
