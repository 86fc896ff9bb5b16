//! Profile, address book and contact endpoints for the caller's account.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AddressId, ContactId, Page, UserId};
use domain::{AddressPatch, ContactPatch, NewAddress, NewContact, UserPatch};
use serde::{Deserialize, Serialize};
use store::{Address, Contact, Label, Role, Store, User};
use utoipa::ToSchema;

use super::{PageQuery, parse_id};
use crate::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiJson, ApiQuery, ErrorBody};

// -- Request types --

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateAddressRequest {
    #[serde(default)]
    pub label: Label,
    pub title: String,
    pub address_line: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub country: String,
    pub postal_code: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateAddressRequest {
    pub label: Option<Label>,
    pub title: Option<String>,
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateContactRequest {
    #[serde(default)]
    pub label: Label,
    pub title: String,
    pub phone_number: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateContactRequest {
    pub label: Option<Label>,
    pub title: Option<String>,
    pub phone_number: Option<String>,
    pub is_default: Option<bool>,
}

// -- Response types --

/// Public view of an account. The password hash never leaves the server.
#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// -- Profile --

/// GET /users/me
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The caller's profile", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn me<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.services.users.profile(&requester).await?;
    Ok(Json(user.into()))
}

/// PUT /users/me: partial profile update.
#[utoipa::path(
    put,
    path = "/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Invalid field", body = ErrorBody),
        (status = 409, description = "Email taken", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req))]
pub async fn update_me<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let patch = UserPatch {
        email: req.email,
        password: req.password,
        first_name: req.first_name,
        last_name: req.last_name,
    };
    let user = state
        .services
        .users
        .update_profile(&requester, patch)
        .await?;
    Ok(Json(user.into()))
}

/// DELETE /users/me: soft-deletes the account.
#[utoipa::path(
    delete,
    path = "/users/me",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Account deleted"),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn delete_me<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
) -> Result<StatusCode, ApiError> {
    state.services.users.delete_account(&requester).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users: every live account. Admin only.
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(PageQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "One page of accounts", body = Page<UserResponse>),
        (status = 403, description = "Admin only", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Page<UserResponse>>, ApiError> {
    let page = state
        .services
        .users
        .list_users(&requester, query.request())
        .await?;
    Ok(Json(page.map(UserResponse::from)))
}

// -- Addresses --

/// GET /users/me/addresses
#[utoipa::path(
    get,
    path = "/users/me/addresses",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Saved addresses, oldest first", body = [Address]),
    )
)]
pub async fn list_addresses<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
) -> Result<Json<Vec<Address>>, ApiError> {
    Ok(Json(state.services.users.list_addresses(&requester).await?))
}

/// POST /users/me/addresses
#[utoipa::path(
    post,
    path = "/users/me/addresses",
    tag = "users",
    request_body = CreateAddressRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Address saved", body = Address),
        (status = 400, description = "Missing field", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req))]
pub async fn add_address<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiJson(req): ApiJson<CreateAddressRequest>,
) -> Result<(StatusCode, Json<Address>), ApiError> {
    let cmd = NewAddress {
        label: req.label,
        title: req.title,
        address_line: req.address_line,
        city: req.city,
        state: req.state,
        country: req.country,
        postal_code: req.postal_code,
        is_default: req.is_default,
    };
    let address = state.services.users.add_address(&requester, cmd).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// PUT /users/me/addresses/{id}
#[utoipa::path(
    put,
    path = "/users/me/addresses/{id}",
    tag = "users",
    params(("id" = String, Path, description = "Address id")),
    request_body = UpdateAddressRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Address updated", body = Address),
        (status = 404, description = "No such address", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req))]
pub async fn update_address<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateAddressRequest>,
) -> Result<Json<Address>, ApiError> {
    let id: AddressId = parse_id(&id)?;
    let patch = AddressPatch {
        label: req.label,
        title: req.title,
        address_line: req.address_line,
        city: req.city,
        state: req.state,
        country: req.country,
        postal_code: req.postal_code,
        is_default: req.is_default,
    };
    let address = state
        .services
        .users
        .update_address(&requester, id, patch)
        .await?;
    Ok(Json(address))
}

/// POST /users/me/addresses/{id}/default
#[utoipa::path(
    post,
    path = "/users/me/addresses/{id}/default",
    tag = "users",
    params(("id" = String, Path, description = "Address id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Address is now the default", body = Address),
        (status = 404, description = "No such address", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn set_default_address<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Address>, ApiError> {
    let id: AddressId = parse_id(&id)?;
    let address = state
        .services
        .users
        .set_default_address(&requester, id)
        .await?;
    Ok(Json(address))
}

/// DELETE /users/me/addresses/{id}
#[utoipa::path(
    delete,
    path = "/users/me/addresses/{id}",
    tag = "users",
    params(("id" = String, Path, description = "Address id")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Address deleted"),
        (status = 404, description = "No such address", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn delete_address<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: AddressId = parse_id(&id)?;
    state.services.users.delete_address(&requester, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Contacts --

/// GET /users/me/contacts
#[utoipa::path(
    get,
    path = "/users/me/contacts",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Saved contacts, oldest first", body = [Contact]),
    )
)]
pub async fn list_contacts<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
) -> Result<Json<Vec<Contact>>, ApiError> {
    Ok(Json(state.services.users.list_contacts(&requester).await?))
}

/// POST /users/me/contacts
#[utoipa::path(
    post,
    path = "/users/me/contacts",
    tag = "users",
    request_body = CreateContactRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Contact saved", body = Contact),
        (status = 400, description = "Invalid phone number", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req))]
pub async fn add_contact<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiJson(req): ApiJson<CreateContactRequest>,
) -> Result<(StatusCode, Json<Contact>), ApiError> {
    let cmd = NewContact {
        label: req.label,
        title: req.title,
        phone_number: req.phone_number,
        is_default: req.is_default,
    };
    let contact = state.services.users.add_contact(&requester, cmd).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// PUT /users/me/contacts/{id}
#[utoipa::path(
    put,
    path = "/users/me/contacts/{id}",
    tag = "users",
    params(("id" = String, Path, description = "Contact id")),
    request_body = UpdateContactRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Contact updated", body = Contact),
        (status = 404, description = "No such contact", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req))]
pub async fn update_contact<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateContactRequest>,
) -> Result<Json<Contact>, ApiError> {
    let id: ContactId = parse_id(&id)?;
    let patch = ContactPatch {
        label: req.label,
        title: req.title,
        phone_number: req.phone_number,
        is_default: req.is_default,
    };
    let contact = state
        .services
        .users
        .update_contact(&requester, id, patch)
        .await?;
    Ok(Json(contact))
}

/// POST /users/me/contacts/{id}/default
#[utoipa::path(
    post,
    path = "/users/me/contacts/{id}/default",
    tag = "users",
    params(("id" = String, Path, description = "Contact id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Contact is now the default", body = Contact),
        (status = 404, description = "No such contact", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn set_default_contact<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Contact>, ApiError> {
    let id: ContactId = parse_id(&id)?;
    let contact = state
        .services
        .users
        .set_default_contact(&requester, id)
        .await?;
    Ok(Json(contact))
}

/// DELETE /users/me/contacts/{id}
#[utoipa::path(
    delete,
    path = "/users/me/contacts/{id}",
    tag = "users",
    params(("id" = String, Path, description = "Contact id")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Contact deleted"),
        (status = 404, description = "No such contact", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn delete_contact<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ContactId = parse_id(&id)?;
    state.services.users.delete_contact(&requester, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
