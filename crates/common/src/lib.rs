//! Shared types used across the storefront crates.

pub mod ids;
pub mod money;
pub mod pagination;

pub use ids::{AddressId, ContactId, OrderId, PaymentId, ProductId, UserId};
pub use money::Money;
pub use pagination::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, Page, PageRequest};
