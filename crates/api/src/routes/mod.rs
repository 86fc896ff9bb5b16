//! HTTP handlers, one module per resource.

pub mod auth;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod openapi;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

use std::str::FromStr;

use common::PageRequest;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;

/// `?page=&limit=` on list endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::from_query(self.page, self.limit)
    }
}

fn parse_id<T: FromStr<Err = uuid::Error>>(id: &str) -> Result<T, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
