//! Order placement, lookup, status and cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, Page, PageRequest, ProductId, UserId};
use domain::{LineRequest, PlaceOrder};
use serde::{Deserialize, Serialize};
use store::{Order, OrderItem, OrderStatus, Store};
use utoipa::{IntoParams, ToSchema};

use super::parse_id;
use crate::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiJson, ApiQuery, ErrorBody};

// -- Request types --

#[derive(Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Admins only: list every user's orders.
    #[serde(default)]
    pub all: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// `processing`, `shipped` or `delivered`.
    pub status: String,
}

// -- Response types --

#[derive(Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price_cents: i64,
    /// `null` only if the line total does not fit in 64-bit cents.
    pub line_total_cents: Option<i64>,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            price_cents: item.price.cents(),
            line_total_cents: item.line_total().map(|total| total.cents()),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            items: order.items.iter().map(OrderItemResponse::from).collect(),
            total_cents: order.total.cents(),
            shipping_address: order.shipping_address,
            billing_address: order.billing_address,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders: place an order, reserving stock for every line.
#[utoipa::path(
    post,
    path = "/orders",
    tag = "orders",
    request_body = CreateOrderRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Empty order, insufficient stock or total out of range", body = ErrorBody),
        (status = 404, description = "Unknown product", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req), fields(lines = req.items.len()))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let lines = req
        .items
        .iter()
        .map(|item| LineRequest::new(item.product_id, item.quantity))
        .collect();
    let cmd = PlaceOrder::new(lines).with_addresses(req.shipping_address, req.billing_address);
    let order = state.services.orders.place_order(&requester, cmd).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders: the caller's orders, or everyone's with `?all=true` (admin).
#[utoipa::path(
    get,
    path = "/orders",
    tag = "orders",
    params(OrderListQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "One page of orders", body = Page<OrderResponse>),
        (status = 403, description = "`all` requires an admin", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> Result<Json<Page<OrderResponse>>, ApiError> {
    let page = PageRequest::from_query(query.page, query.limit);
    let orders = if query.all {
        state.services.orders.list_all_orders(&requester, page).await?
    } else {
        state.services.orders.list_orders(&requester, page).await?
    };
    Ok(Json(orders.map(OrderResponse::from)))
}

/// GET /orders/{id}
#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "orders",
    params(("id" = String, Path, description = "Order id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The order", body = OrderResponse),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "No such order", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .services
        .orders
        .get_order(&requester, parse_id(&id)?)
        .await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/status
#[utoipa::path(
    put,
    path = "/orders/{id}/status",
    tag = "orders",
    params(("id" = String, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 400, description = "Status not allowed or order cancelled", body = ErrorBody),
        (status = 403, description = "Admin only", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req), fields(status = %req.status))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&id)?;
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let order = state
        .services
        .orders
        .update_status(&requester, id, status)
        .await?;
    Ok(Json(order.into()))
}

/// DELETE /orders/{id}: cancel and restock.
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    tag = "orders",
    params(("id" = String, Path, description = "Order id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 400, description = "Order is no longer cancellable", body = ErrorBody),
        (status = 403, description = "Not the owner", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .services
        .orders
        .cancel_order(&requester, parse_id(&id)?)
        .await?;
    Ok(Json(order.into()))
}
