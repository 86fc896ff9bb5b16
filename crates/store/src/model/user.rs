use chrono::{DateTime, Utc};
use common::{AddressId, ContactId, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::string_enum;

/// Authorization role carried in access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

string_enum!(Role, "role", {
    User => "user",
    Admin => "admin",
});

/// Label attached to addresses and contacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[default]
    Home,
    Work,
}

string_enum!(Label, "label", {
    Home => "home",
    Work => "work",
});

/// A registered account. Soft-deleted users keep their row with `deleted_at` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Creates an active user with the default role.
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email: email.into(),
            password_hash: password_hash.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            role: Role::User,
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Returns true if the user has not been soft-deleted.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A saved postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub label: Label,
    pub title: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// A saved phone contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Contact {
    pub id: ContactId,
    pub user_id: UserId,
    pub label: Label,
    pub title: String,
    pub phone_number: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}
