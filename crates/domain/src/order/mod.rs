//! Order placement, listing, status changes and cancellation.

mod commands;
mod service;

pub use commands::{LineRequest, PlaceOrder};
pub use service::OrderService;
