//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, Page, PaymentId, UserId};
use domain::ProcessPayment;
use serde::{Deserialize, Serialize};
use store::{Payment, PaymentMethod, PaymentStatus, Store};
use utoipa::ToSchema;

use super::{PageQuery, parse_id};
use crate::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiJson, ApiQuery, ErrorBody};

#[derive(Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub order_id: OrderId,
    pub amount_cents: i64,
    /// `credit_card` or `paypal`.
    pub method: String,
}

#[derive(Serialize, ToSchema)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            order_id: payment.order_id,
            user_id: payment.user_id,
            amount_cents: payment.amount.cents(),
            method: payment.method,
            status: payment.status,
            transaction_id: payment.transaction_id,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

/// POST /payments: pay a pending order in full.
#[utoipa::path(
    post,
    path = "/payments",
    tag = "payments",
    request_body = CreatePaymentRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Payment recorded", body = PaymentResponse),
        (status = 400, description = "Wrong amount, unknown method or order not payable", body = ErrorBody),
        (status = 403, description = "Not the owner", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req), fields(order_id = %req.order_id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiJson(req): ApiJson<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let cmd = ProcessPayment::new(req.order_id, Money::from_cents(req.amount_cents), req.method);
    let payment = state
        .services
        .payments
        .process_payment(&requester, cmd)
        .await?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// GET /payments
#[utoipa::path(
    get,
    path = "/payments",
    tag = "payments",
    params(PageQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "One page of the caller's payments", body = Page<PaymentResponse>),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Page<PaymentResponse>>, ApiError> {
    let payments = state
        .services
        .payments
        .list_payments(&requester, query.request())
        .await?;
    Ok(Json(payments.map(PaymentResponse::from)))
}

/// GET /payments/{id}
#[utoipa::path(
    get,
    path = "/payments/{id}",
    tag = "payments",
    params(("id" = String, Path, description = "Payment id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The payment", body = PaymentResponse),
        (status = 404, description = "No such payment", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .services
        .payments
        .get_payment(&requester, parse_id(&id)?)
        .await?;
    Ok(Json(payment.into()))
}

/// GET /orders/{id}/payment
#[utoipa::path(
    get,
    path = "/orders/{id}/payment",
    tag = "payments",
    params(("id" = String, Path, description = "Order id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The order's payment", body = PaymentResponse),
        (status = 404, description = "Order missing or unpaid", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn for_order<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .services
        .payments
        .get_payment_for_order(&requester, parse_id(&id)?)
        .await?;
    Ok(Json(payment.into()))
}

/// POST /payments/{id}/refund
#[utoipa::path(
    post,
    path = "/payments/{id}/refund",
    tag = "payments",
    params(("id" = String, Path, description = "Payment id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Payment refunded", body = PaymentResponse),
        (status = 400, description = "Payment is not completed", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn refund<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .services
        .payments
        .refund(&requester, parse_id(&id)?)
        .await?;
    Ok(Json(payment.into()))
}
