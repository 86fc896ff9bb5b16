use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::string_enum;

/// Accepted payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
}

string_enum!(PaymentMethod, "payment method", {
    CreditCard => "credit_card",
    Paypal => "paypal",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
});

impl PaymentStatus {
    /// Returns true while the payment still settles its order, which keeps
    /// the order from being cancelled.
    pub fn settles_order(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Completed
        )
    }
}

/// Bookkeeping record asserting that an order's total was settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a completed payment with a freshly generated transaction id.
    pub fn completed(
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
        method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            order_id,
            user_id,
            amount,
            method,
            status: PaymentStatus::Completed,
            transaction_id: format!("txn_{}", uuid::Uuid::new_v4().simple()),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_methods_only() {
        assert_eq!(
            "credit_card".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::CreditCard
        );
        assert_eq!("paypal".parse::<PaymentMethod>().unwrap(), PaymentMethod::Paypal);
        let err = "bitcoin".parse::<PaymentMethod>().unwrap_err();
        assert_eq!(err.kind, "payment method");
    }

    #[test]
    fn refunded_and_failed_payments_release_the_order() {
        assert!(PaymentStatus::Completed.settles_order());
        assert!(PaymentStatus::Pending.settles_order());
        assert!(!PaymentStatus::Refunded.settles_order());
        assert!(!PaymentStatus::Failed.settles_order());
    }

    #[test]
    fn completed_payment_has_transaction_id() {
        let p1 = Payment::completed(
            OrderId::new(),
            UserId::new(),
            Money::from_cents(100),
            PaymentMethod::Paypal,
        );
        let p2 = Payment::completed(
            OrderId::new(),
            UserId::new(),
            Money::from_cents(100),
            PaymentMethod::Paypal,
        );
        assert_eq!(p1.status, PaymentStatus::Completed);
        assert!(p1.transaction_id.starts_with("txn_"));
        assert_eq!(p1.transaction_id.len(), 36);
        assert_ne!(p1.transaction_id, p2.transaction_id);
    }
}
