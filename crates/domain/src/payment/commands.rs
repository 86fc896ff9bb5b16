//! Payment commands.

use common::{Money, OrderId};

/// Command to pay for an order.
///
/// The method stays a raw string until the service parses it, so an unknown
/// method is reported as a validation failure.
#[derive(Debug, Clone)]
pub struct ProcessPayment {
    pub order_id: OrderId,
    pub amount: Money,
    pub method: String,
}

impl ProcessPayment {
    pub fn new(order_id: OrderId, amount: Money, method: impl Into<String>) -> Self {
        Self {
            order_id,
            amount,
            method: method.into(),
        }
    }
}
