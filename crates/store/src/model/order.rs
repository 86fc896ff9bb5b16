use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::string_enum;

/// Status of an order.
///
/// ```text
/// Pending ──► Processing ──► Shipped ──► Delivered
///    │             │
///    ├──► Paid ────┘
///    └──► Cancelled
/// ```
///
/// `Paid` is only reached through payment processing and `Cancelled` only
/// through cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Paid,
}

string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Paid => "paid",
});

impl OrderStatus {
    /// Returns true if the order can still be cancelled and restocked.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Returns true if a payment may be recorded against the order.
    pub fn is_payable(&self) -> bool {
        !matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }
}

/// A line item: product, quantity and the price captured at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price copied from the product when the order was placed.
    pub price: Money,
}

impl OrderItem {
    pub fn new(product_id: ProductId, quantity: u32, price: Money) -> Self {
        Self {
            product_id,
            quantity,
            price,
        }
    }

    /// Returns `price * quantity`, or `None` if it does not fit in cents.
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// A user's order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a pending order whose total is the sum of its line totals.
    ///
    /// Returns `None` if a line total or the order total overflows.
    pub fn try_new(user_id: UserId, items: Vec<OrderItem>) -> Option<Self> {
        let now = Utc::now();
        let total = items
            .iter()
            .map(OrderItem::line_total)
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line?))?;
        Some(Self {
            id: OrderId::new(),
            user_id,
            items,
            total,
            status: OrderStatus::Pending,
            shipping_address: None,
            billing_address: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_addresses(
        mut self,
        shipping_address: Option<String>,
        billing_address: Option<String>,
    ) -> Self {
        self.shipping_address = shipping_address;
        self.billing_address = billing_address;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_sum_of_line_totals() {
        let order = Order::try_new(
            UserId::new(),
            vec![
                OrderItem::new(ProductId::new(), 2, Money::from_cents(1000)),
                OrderItem::new(ProductId::new(), 1, Money::from_cents(500)),
            ],
        )
        .unwrap();
        assert_eq!(order.total.cents(), 2500);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);
        let line = OrderItem::new(ProductId::new(), 2, huge);
        assert_eq!(line.line_total(), None);
        assert!(Order::try_new(UserId::new(), vec![line]).is_none());

        let split = vec![
            OrderItem::new(ProductId::new(), 1, huge),
            OrderItem::new(ProductId::new(), 1, huge),
        ];
        assert!(Order::try_new(UserId::new(), split).is_none());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Paid,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn cancellable_states() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Processing.can_cancel());
        assert!(!OrderStatus::Paid.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Shipped).unwrap();
        assert_eq!(json, "\"shipped\"");
    }
}
