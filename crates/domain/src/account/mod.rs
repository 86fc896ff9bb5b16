//! Accounts: registration, login, profiles, addresses and contacts.

mod commands;
mod service;

pub use commands::{AddressPatch, ContactPatch, NewAddress, NewContact, RegisterUser, UserPatch};
pub use service::{Session, UserService};
