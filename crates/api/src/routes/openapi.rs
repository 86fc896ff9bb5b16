//! OpenAPI document for the HTTP surface.

use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::ErrorBody;
use crate::routes::{auth, cart, health, orders, payments, products, users};

#[derive(OpenApi)]
#[openapi(
    info(title = "Storefront API", description = "Catalog, cart, orders and payments."),
    paths(
        health::check,
        auth::register,
        auth::login,
        users::me,
        users::update_me,
        users::delete_me,
        users::list,
        users::list_addresses,
        users::add_address,
        users::update_address,
        users::set_default_address,
        users::delete_address,
        users::list_contacts,
        users::add_contact,
        users::update_contact,
        users::set_default_contact,
        users::delete_contact,
        products::list,
        products::get,
        products::create,
        products::update,
        products::delete,
        products::adjust_stock,
        cart::get,
        cart::clear,
        cart::add_item,
        cart::set_quantity,
        cart::remove_item,
        cart::checkout,
        orders::create,
        orders::list,
        orders::get,
        orders::update_status,
        orders::cancel,
        payments::create,
        payments::list,
        payments::get,
        payments::for_order,
        payments::refund,
    ),
    components(schemas(
        ErrorBody,
        health::HealthResponse,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::LoginResponse,
        users::UserResponse,
        products::ProductResponse,
        orders::OrderResponse,
        payments::PaymentResponse,
        store::Cart,
        store::Address,
        store::Contact,
        store::OrderStatus,
        store::PaymentMethod,
        store::PaymentStatus,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and store reachability"),
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "Profiles, addresses and contacts"),
        (name = "products", description = "Catalog and inventory"),
        (name = "cart", description = "Shopping cart and checkout"),
        (name = "orders", description = "Order placement and lifecycle"),
        (name = "payments", description = "Payments and refunds"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme the authenticated paths refer to.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// GET /openapi.json
pub async fn get() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_resource() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/auth/login",
            "/users/me",
            "/products",
            "/cart/checkout",
            "/orders/{id}/status",
            "/payments/{id}/refund",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
