//! The caller's shopping cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ProductId;
use serde::Deserialize;
use store::{Cart, Store};
use utoipa::ToSchema;

use super::orders::OrderResponse;
use super::parse_id;
use crate::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiJson, ErrorBody};

#[derive(Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
}

/// GET /cart
#[utoipa::path(
    get,
    path = "/cart",
    tag = "cart",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The caller's cart", body = Cart),
    )
)]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.services.carts.get_cart(&requester).await?))
}

/// DELETE /cart
#[utoipa::path(
    delete,
    path = "/cart",
    tag = "cart",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Cart emptied"),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
) -> Result<StatusCode, ApiError> {
    state.services.carts.clear(&requester).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cart/items: adds to whatever quantity is already in the cart.
#[utoipa::path(
    post,
    path = "/cart/items",
    tag = "cart",
    request_body = AddItemRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated cart", body = Cart),
        (status = 400, description = "Invalid quantity or not enough stock", body = ErrorBody),
        (status = 404, description = "Unknown product", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req), fields(product_id = %req.product_id))]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiJson(req): ApiJson<AddItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .services
        .carts
        .add_item(&requester, req.product_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// PUT /cart/items/{product_id}
#[utoipa::path(
    put,
    path = "/cart/items/{product_id}",
    tag = "cart",
    params(("product_id" = String, Path, description = "Product id")),
    request_body = SetQuantityRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated cart", body = Cart),
        (status = 400, description = "Not enough stock", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req))]
pub async fn set_quantity<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(product_id): Path<String>,
    ApiJson(req): ApiJson<SetQuantityRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .services
        .carts
        .set_quantity(&requester, parse_id(&product_id)?, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /cart/items/{product_id}
#[utoipa::path(
    delete,
    path = "/cart/items/{product_id}",
    tag = "cart",
    params(("product_id" = String, Path, description = "Product id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated cart", body = Cart),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(product_id): Path<String>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .services
        .carts
        .remove_item(&requester, parse_id(&product_id)?)
        .await?;
    Ok(Json(cart))
}

/// POST /cart/checkout: turns the cart into an order.
#[utoipa::path(
    post,
    path = "/cart/checkout",
    tag = "cart",
    request_body = CheckoutRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Order placed from the cart", body = OrderResponse),
        (status = 400, description = "Empty cart or insufficient stock", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req))]
pub async fn checkout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiJson(req): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .services
        .carts
        .checkout(&requester, req.shipping_address, req.billing_address)
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}
