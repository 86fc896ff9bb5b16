//! Account commands and patches.

use store::{Address, Contact, Label, User};

#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Partial profile update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAddress {
    pub label: Label,
    pub title: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AddressPatch {
    pub label: Option<Label>,
    pub title: Option<String>,
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub is_default: Option<bool>,
}

impl AddressPatch {
    pub(crate) fn apply(self, address: &mut Address) {
        if let Some(label) = self.label {
            address.label = label;
        }
        if let Some(title) = self.title {
            address.title = title;
        }
        if let Some(line) = self.address_line {
            address.address_line = line;
        }
        if let Some(city) = self.city {
            address.city = city;
        }
        if let Some(state) = self.state {
            address.state = state;
        }
        if let Some(country) = self.country {
            address.country = country;
        }
        if let Some(postal_code) = self.postal_code {
            address.postal_code = postal_code;
        }
        if let Some(is_default) = self.is_default {
            address.is_default = is_default;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub label: Label,
    pub title: String,
    pub phone_number: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub label: Option<Label>,
    pub title: Option<String>,
    pub phone_number: Option<String>,
    pub is_default: Option<bool>,
}

impl ContactPatch {
    pub(crate) fn apply(self, contact: &mut Contact) {
        if let Some(label) = self.label {
            contact.label = label;
        }
        if let Some(title) = self.title {
            contact.title = title;
        }
        if let Some(phone_number) = self.phone_number {
            contact.phone_number = phone_number;
        }
        if let Some(is_default) = self.is_default {
            contact.is_default = is_default;
        }
    }
}

/// Trims and lowercases an email address.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn apply_names(user: &mut User, first_name: Option<String>, last_name: Option<String>) {
    if let Some(first) = first_name {
        user.first_name = first.trim().to_string();
    }
    if let Some(last) = last_name {
        user.last_name = last.trim().to_string();
    }
}
