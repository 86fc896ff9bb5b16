//! Catalog endpoints. Reads are public; writes need an admin token.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, Page, PageRequest, ProductId};
use domain::{NewProduct, ProductPatch};
use serde::{Deserialize, Serialize};
use store::{Product, ProductFilter, Store};
use utoipa::{IntoParams, ToSchema};

use super::parse_id;
use crate::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiJson, ApiQuery, ErrorBody};

// -- Request types --

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
}

impl ProductQuery {
    fn filter(&self) -> ProductFilter {
        ProductFilter {
            category: self.category.clone().filter(|c| !c.trim().is_empty()),
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            min_price: self.min_price_cents.map(Money::from_cents),
            max_price: self.max_price_cents.map(Money::from_cents),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    pub stock: u32,
    #[serde(default)]
    pub category: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

// -- Response types --

#[derive(Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: u32,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price_cents: product.price.cents(),
            stock: product.stock,
            category: product.category,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

// -- Handlers --

/// GET /products: filtered, paginated listing, newest first.
#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    params(ProductQuery),
    responses(
        (status = 200, description = "One page of products", body = Page<ProductResponse>),
        (status = 400, description = "Invalid filter", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Page<ProductResponse>>, ApiError> {
    let page = PageRequest::from_query(query.page, query.limit);
    let products = state
        .services
        .products
        .list_products(&query.filter(), page)
        .await?;
    Ok(Json(products.map(ProductResponse::from)))
}

/// GET /products/{id}
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product", body = ProductResponse),
        (status = 404, description = "No such product", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.services.products.get_product(parse_id(&id)?).await?;
    Ok(Json(product.into()))
}

/// POST /products
#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    request_body = CreateProductRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid product", body = ErrorBody),
        (status = 403, description = "Admin only", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let cmd = NewProduct {
        name: req.name,
        description: req.description,
        price: Money::from_cents(req.price_cents),
        stock: req.stock,
        category: req.category,
    };
    let product = state
        .services
        .products
        .create_product(&requester, cmd)
        .await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /products/{id}: partial update. Stock moves only through `/stock`.
#[utoipa::path(
    put,
    path = "/products/{id}",
    tag = "products",
    params(("id" = String, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, description = "Invalid product", body = ErrorBody),
        (status = 403, description = "Admin only", body = ErrorBody),
        (status = 404, description = "No such product", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let patch = ProductPatch {
        name: req.name,
        description: req.description,
        price: req.price_cents.map(Money::from_cents),
        category: req.category,
    };
    let product = state
        .services
        .products
        .update_product(&requester, parse_id(&id)?, patch)
        .await?;
    Ok(Json(product.into()))
}

/// DELETE /products/{id}
#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    params(("id" = String, Path, description = "Product id")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 403, description = "Admin only", body = ErrorBody),
        (status = 404, description = "No such product", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .services
        .products
        .delete_product(&requester, parse_id(&id)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/{id}/stock: `{"delta": n}` with n signed.
#[utoipa::path(
    post,
    path = "/products/{id}/stock",
    tag = "products",
    params(("id" = String, Path, description = "Product id")),
    request_body = AdjustStockRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Stock adjusted", body = ProductResponse),
        (status = 400, description = "Stock would leave the valid range", body = ErrorBody),
        (status = 403, description = "Admin only", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, requester, req), fields(delta = req.delta))]
pub async fn adjust_stock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(requester): AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AdjustStockRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .services
        .products
        .adjust_stock(&requester, parse_id(&id)?, req.delta)
        .await?;
    Ok(Json(product.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_filters_are_ignored() {
        let query = ProductQuery {
            category: Some("  ".to_string()),
            search: Some("lamp".to_string()),
            min_price_cents: Some(100),
            ..Default::default()
        };
        let filter = query.filter();
        assert_eq!(filter.category, None);
        assert_eq!(filter.search.as_deref(), Some("lamp"));
        assert_eq!(filter.min_price, Some(Money::from_cents(100)));
        assert_eq!(filter.max_price, None);
    }
}
