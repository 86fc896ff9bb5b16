//! Product catalog management.

mod commands;
mod service;

pub use commands::{NewProduct, ProductPatch};
pub use service::{MAX_PRICE_CENTS, ProductService};
