//! Records persisted by the store.

mod cart;
mod order;
mod payment;
mod product;
mod user;

pub use cart::{Cart, CartItem};
pub use order::{Order, OrderItem, OrderStatus};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use product::{Product, ProductFilter};
pub use user::{Address, Contact, Label, Role, User};

use thiserror::Error;

/// Returned when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Implements `as_str`, `Display` and `FromStr` for a string-valued enum.
macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Returns the stored string form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::model::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err($crate::model::UnknownVariant::new($kind, other)),
                }
            }
        }
    };
}

pub(crate) use string_enum;
