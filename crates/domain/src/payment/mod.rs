//! Payment processing, reads and refunds.

mod commands;
mod service;

pub use commands::ProcessPayment;
pub use service::PaymentService;
