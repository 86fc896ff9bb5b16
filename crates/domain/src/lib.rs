//! Domain layer for the storefront.
//!
//! This crate provides one service per entity, each generic over the
//! [`store::Store`] backend:
//! - `ProductService` for the catalog
//! - `UserService` for accounts, login, addresses and contacts
//! - `CartService` for carts and checkout
//! - `OrderService` for placing, reading and cancelling orders
//! - `PaymentService` for payments and refunds
//!
//! Services receive the authenticated [`Requester`] and enforce ownership and
//! admin rules themselves.

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod order;
pub mod payment;

pub use account::{
    AddressPatch, ContactPatch, NewAddress, NewContact, RegisterUser, Session, UserPatch,
    UserService,
};
pub use auth::{Claims, IssuedToken, Requester, TokenService};
pub use cart::CartService;
pub use catalog::{MAX_PRICE_CENTS, NewProduct, ProductPatch, ProductService};
pub use error::{DomainError, Result};
pub use order::{LineRequest, OrderService, PlaceOrder};
pub use payment::{PaymentService, ProcessPayment};

use store::Store;

/// Every service, wired to one store.
#[derive(Clone)]
pub struct Services<S: Store> {
    pub products: ProductService<S>,
    pub users: UserService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub payments: PaymentService<S>,
}

impl<S: Store> Services<S> {
    pub fn new(store: S, tokens: TokenService) -> Self {
        Self {
            products: ProductService::new(store.clone()),
            users: UserService::new(store.clone(), tokens),
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            payments: PaymentService::new(store),
        }
    }
}
