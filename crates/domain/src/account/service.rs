//! Account service: registration, login, profiles and the address book.

use chrono::{DateTime, Utc};
use common::{AddressId, ContactId, Page, PageRequest};
use store::{Address, Contact, Role, Store, StoreExt, User};

use super::commands::{apply_names, normalize_email};
use super::{AddressPatch, ContactPatch, NewAddress, NewContact, RegisterUser, UserPatch};
use crate::auth::{Requester, TokenService, hash_password, verify_password};
use crate::error::{DomainError, Result};

const MIN_PASSWORD_LEN: usize = 8;
const MIN_PHONE_DIGITS: usize = 7;

/// A successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Service for accounts and everything hanging off them.
#[derive(Clone)]
pub struct UserService<S: Store> {
    store: S,
    tokens: TokenService,
}

fn validate_email(email: &str) -> Result<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::validation("email must be a valid address")),
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_address(address: &Address) -> Result<()> {
    let required = [
        ("title", &address.title),
        ("address_line", &address.address_line),
        ("city", &address.city),
        ("country", &address.country),
        ("postal_code", &address.postal_code),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(DomainError::Validation(format!("{field} must not be empty")));
        }
    }
    Ok(())
}

fn validate_contact(contact: &Contact) -> Result<()> {
    if contact.title.trim().is_empty() {
        return Err(DomainError::validation("title must not be empty"));
    }
    let phone = contact.phone_number.trim();
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
    if !allowed || digits < MIN_PHONE_DIGITS {
        return Err(DomainError::validation("phone_number is not a valid phone number"));
    }
    Ok(())
}

impl<S: Store> UserService<S> {
    pub fn new(store: S, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    /// Registers a new account with the `user` role.
    #[tracing::instrument(skip(self, cmd), fields(email = %cmd.email))]
    pub async fn register(&self, cmd: RegisterUser) -> Result<User> {
        self.create_user(cmd, Role::User).await
    }

    /// Creates the admin account unless a live account already has the email.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.store.find_user_by_email(&normalize_email(email)).await? {
            return Ok(existing);
        }
        let cmd = RegisterUser {
            email: email.to_string(),
            password: password.to_string(),
            first_name: "Admin".to_string(),
            last_name: String::new(),
        };
        let admin = self.create_user(cmd, Role::Admin).await?;
        tracing::info!(user_id = %admin.id, "admin account created");
        Ok(admin)
    }

    async fn create_user(&self, cmd: RegisterUser, role: Role) -> Result<User> {
        let email = normalize_email(&cmd.email);
        validate_email(&email)?;
        validate_password(&cmd.password)?;

        let hash = hash_password(&cmd.password)?;
        let user = User::new(email, hash, cmd.first_name.trim(), cmd.last_name.trim())
            .with_role(role);
        self.store.insert_user(&user).await?;
        Ok(user)
    }

    /// Checks credentials and issues a bearer token.
    ///
    /// Unknown emails, wrong passwords and inactive accounts all fail the same way.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(DomainError::validation("email and password are required"));
        }
        let invalid = || DomainError::Unauthorized("invalid credentials".to_string());

        let user = self
            .store
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid)?;
        if !user.is_active || !verify_password(password, &user.password_hash) {
            return Err(invalid());
        }

        let now = Utc::now();
        self.store.record_login(user.id, now).await?;
        let issued = self.tokens.issue(&user)?;
        tracing::info!(user_id = %user.id, "login succeeded");

        Ok(Session {
            token: issued.token,
            expires_at: issued.expires_at,
            user: User {
                last_login: Some(now),
                ..user
            },
        })
    }

    /// Resolves a bearer token to the requester it was issued for.
    ///
    /// The account must still be live and active; the role comes from the
    /// account, not the token, so demotions apply immediately.
    pub async fn authenticate(&self, token: &str) -> Result<Requester> {
        let claims = self.tokens.verify(token)?;
        let user = self
            .store
            .get_user(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| DomainError::Unauthorized("account is no longer active".to_string()))?;
        Ok(Requester::from(&user))
    }

    pub async fn profile(&self, requester: &Requester) -> Result<User> {
        Ok(self.store.require_user(requester.user_id).await?)
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update_profile(&self, requester: &Requester, patch: UserPatch) -> Result<User> {
        let mut user = self.store.require_user(requester.user_id).await?;
        if let Some(email) = patch.email {
            let email = normalize_email(&email);
            validate_email(&email)?;
            user.email = email;
        }
        if let Some(password) = patch.password {
            validate_password(&password)?;
            user.password_hash = hash_password(&password)?;
        }
        apply_names(&mut user, patch.first_name, patch.last_name);
        user.updated_at = Utc::now();

        self.store.update_user(&user).await?;
        Ok(user)
    }

    /// Soft-deletes the requester's account and drops their cart.
    #[tracing::instrument(skip(self))]
    pub async fn delete_account(&self, requester: &Requester) -> Result<()> {
        self.store
            .soft_delete_user(requester.user_id, Utc::now())
            .await?;
        self.store.delete_cart(requester.user_id).await?;
        tracing::info!(user_id = %requester.user_id, "account deleted");
        Ok(())
    }

    /// Lists live accounts. Admin only.
    pub async fn list_users(&self, requester: &Requester, page: PageRequest) -> Result<Page<User>> {
        requester.ensure_admin()?;
        Ok(self.store.list_users(page).await?)
    }

    // Addresses

    pub async fn list_addresses(&self, requester: &Requester) -> Result<Vec<Address>> {
        Ok(self.store.list_addresses(requester.user_id).await?)
    }

    /// Adds an address. A user's first address always becomes the default.
    pub async fn add_address(&self, requester: &Requester, cmd: NewAddress) -> Result<Address> {
        let is_first = self.store.list_addresses(requester.user_id).await?.is_empty();
        let address = Address {
            id: AddressId::new(),
            user_id: requester.user_id,
            label: cmd.label,
            title: cmd.title,
            address_line: cmd.address_line,
            city: cmd.city,
            state: cmd.state,
            country: cmd.country,
            postal_code: cmd.postal_code,
            is_default: cmd.is_default || is_first,
            created_at: Utc::now(),
        };
        validate_address(&address)?;
        self.store.insert_address(&address).await?;
        Ok(address)
    }

    async fn own_address(&self, requester: &Requester, id: AddressId) -> Result<Address> {
        // Other users' addresses are reported missing rather than forbidden.
        self.store
            .get_address(id)
            .await?
            .filter(|a| a.user_id == requester.user_id)
            .ok_or_else(|| DomainError::NotFound(format!("Address not found: {id}")))
    }

    pub async fn update_address(
        &self,
        requester: &Requester,
        id: AddressId,
        patch: AddressPatch,
    ) -> Result<Address> {
        let mut address = self.own_address(requester, id).await?;
        patch.apply(&mut address);
        validate_address(&address)?;
        self.store.update_address(&address).await?;
        Ok(address)
    }

    pub async fn set_default_address(&self, requester: &Requester, id: AddressId) -> Result<Address> {
        let patch = AddressPatch {
            is_default: Some(true),
            ..Default::default()
        };
        self.update_address(requester, id, patch).await
    }

    /// Deletes an address. If it was the default, the oldest remaining one takes over.
    pub async fn delete_address(&self, requester: &Requester, id: AddressId) -> Result<()> {
        let address = self.own_address(requester, id).await?;
        self.store.delete_address(id).await?;

        if address.is_default
            && let Some(mut next) = self
                .store
                .list_addresses(requester.user_id)
                .await?
                .into_iter()
                .next()
        {
            next.is_default = true;
            self.store.update_address(&next).await?;
        }
        Ok(())
    }

    // Contacts

    pub async fn list_contacts(&self, requester: &Requester) -> Result<Vec<Contact>> {
        Ok(self.store.list_contacts(requester.user_id).await?)
    }

    /// Adds a contact. A user's first contact always becomes the default.
    pub async fn add_contact(&self, requester: &Requester, cmd: NewContact) -> Result<Contact> {
        let is_first = self.store.list_contacts(requester.user_id).await?.is_empty();
        let contact = Contact {
            id: ContactId::new(),
            user_id: requester.user_id,
            label: cmd.label,
            title: cmd.title,
            phone_number: cmd.phone_number.trim().to_string(),
            is_default: cmd.is_default || is_first,
            created_at: Utc::now(),
        };
        validate_contact(&contact)?;
        self.store.insert_contact(&contact).await?;
        Ok(contact)
    }

    async fn own_contact(&self, requester: &Requester, id: ContactId) -> Result<Contact> {
        self.store
            .get_contact(id)
            .await?
            .filter(|c| c.user_id == requester.user_id)
            .ok_or_else(|| DomainError::NotFound(format!("Contact not found: {id}")))
    }

    pub async fn update_contact(
        &self,
        requester: &Requester,
        id: ContactId,
        patch: ContactPatch,
    ) -> Result<Contact> {
        let mut contact = self.own_contact(requester, id).await?;
        patch.apply(&mut contact);
        validate_contact(&contact)?;
        self.store.update_contact(&contact).await?;
        Ok(contact)
    }

    pub async fn set_default_contact(&self, requester: &Requester, id: ContactId) -> Result<Contact> {
        let patch = ContactPatch {
            is_default: Some(true),
            ..Default::default()
        };
        self.update_contact(requester, id, patch).await
    }

    /// Deletes a contact. If it was the default, the oldest remaining one takes over.
    pub async fn delete_contact(&self, requester: &Requester, id: ContactId) -> Result<()> {
        let contact = self.own_contact(requester, id).await?;
        self.store.delete_contact(id).await?;

        if contact.is_default
            && let Some(mut next) = self
                .store
                .list_contacts(requester.user_id)
                .await?
                .into_iter()
                .next()
        {
            next.is_default = true;
            self.store.update_contact(&next).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use store::InMemoryStore;

    use super::*;

    fn service() -> UserService<InMemoryStore> {
        UserService::new(InMemoryStore::new(), TokenService::new(b"test", 3600))
    }

    fn registration(email: &str) -> RegisterUser {
        RegisterUser {
            email: email.to_string(),
            password: "hunter2hunter2".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_normalizes_and_rejects_duplicates() {
        let service = service();
        let user = service
            .register(registration("  Ada@Example.com "))
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, Role::User);
        assert_ne!(user.password_hash, "hunter2hunter2");

        let err = service
            .register(registration("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let service = service();
        assert!(matches!(
            service.register(registration("no-at-sign")).await,
            Err(DomainError::Validation(_))
        ));

        let mut short = registration("a@example.com");
        short.password = "short".to_string();
        assert!(matches!(
            service.register(short).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let service = service();
        let user = service.register(registration("a@example.com")).await.unwrap();

        let session = service
            .login("A@example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert!(session.user.last_login.is_some());

        let requester = service.authenticate(&session.token).await.unwrap();
        assert_eq!(requester.user_id, user.id);
        assert_eq!(requester.role, Role::User);

        assert!(matches!(
            service.login("a@example.com", "wrong-password").await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            service.login("nobody@example.com", "hunter2hunter2").await,
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_account_cannot_log_in_or_authenticate() {
        let service = service();
        service.register(registration("a@example.com")).await.unwrap();
        let session = service
            .login("a@example.com", "hunter2hunter2")
            .await
            .unwrap();
        let requester = service.authenticate(&session.token).await.unwrap();

        service.delete_account(&requester).await.unwrap();

        assert!(matches!(
            service.authenticate(&session.token).await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            service.login("a@example.com", "hunter2hunter2").await,
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let service = service();
        let first = service
            .ensure_admin("admin@example.com", "admin-password")
            .await
            .unwrap();
        let second = service
            .ensure_admin("admin@example.com", "admin-password")
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_first_address_is_default_and_default_moves() {
        let service = service();
        let user = service.register(registration("a@example.com")).await.unwrap();
        let requester = Requester::from(&user);

        let new_address = |title: &str| NewAddress {
            title: title.to_string(),
            address_line: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            country: "US".to_string(),
            postal_code: "12345".to_string(),
            ..Default::default()
        };

        let home = service
            .add_address(&requester, new_address("Home"))
            .await
            .unwrap();
        assert!(home.is_default);

        let work = service
            .add_address(&requester, new_address("Work"))
            .await
            .unwrap();
        assert!(!work.is_default);

        service.set_default_address(&requester, work.id).await.unwrap();
        let defaults: Vec<_> = service
            .list_addresses(&requester)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect();
        assert_eq!(defaults, vec![work.id]);

        service.delete_address(&requester, work.id).await.unwrap();
        let remaining = service.list_addresses(&requester).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].is_default);
    }

    #[tokio::test]
    async fn test_contacts_are_private_and_validated() {
        let service = service();
        let owner = Requester::from(&service.register(registration("a@example.com")).await.unwrap());
        let other = Requester::from(&service.register(registration("b@example.com")).await.unwrap());

        let bad = NewContact {
            title: "Mobile".to_string(),
            phone_number: "call me".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            service.add_contact(&owner, bad).await,
            Err(DomainError::Validation(_))
        ));

        let contact = service
            .add_contact(
                &owner,
                NewContact {
                    title: "Mobile".to_string(),
                    phone_number: "+1 (555) 123-4567".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(contact.is_default);

        assert!(matches!(
            service.delete_contact(&other, contact.id).await,
            Err(DomainError::NotFound(_))
        ));
    }
}
