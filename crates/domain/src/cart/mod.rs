//! Shopping carts and checkout.

mod service;

pub use service::CartService;
