//! HTTP routes
//!
//! Every response uses the `{success, message?, data?, errors?}` envelope.

pub mod admin;
pub mod auth;
pub mod categories;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod settings;
pub mod shipping;

use axum::{
    extract::{FromRequest, Request},
    http::{HeaderValue, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use validator::Validate;

use crate::db::Page;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, message: None, data: Some(data) })
}

pub fn ok_with<T: Serialize>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, message: Some(message.into()), data: Some(data) })
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok_with(message, data))
}

pub fn message(message: impl Into<String>) -> Json<ApiResponse<()>> {
    Json(ApiResponse { success: true, message: Some(message.into()), data: None })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: i64,
    pub items_per_page: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(page: Page, total: i64) -> Self {
        let limit = i64::from(page.limit);
        let total_pages = u32::try_from((total.max(0) + limit - 1) / limit).unwrap_or(u32::MAX);
        Self {
            current_page: page.page,
            total_pages,
            total_items: total,
            items_per_page: page.limit,
            has_next_page: page.page < total_pages,
            has_prev_page: page.page > 1,
        }
    }
}

/// Failure for a `#[validate(custom = ...)]` rule
pub(crate) fn rule(code: &'static str, message: &'static str) -> validator::ValidationError {
    let mut e = validator::ValidationError::new(code);
    e.message = Some(message.into());
    e
}

/// JSON body that is deserialized and then validated; both failures answer
/// in the error envelope.
pub struct ValidJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

fn cors(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(allowed).allow_methods(Any).allow_headers(Any)
}

pub fn create_router(state: AppState) -> Router {
    let auth = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/change-password", put(auth::change_password))
        .route("/logout", post(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let products = Router::new()
        .route("/", get(products::list).post(products::create))
        .route("/:id", get(products::get).put(products::update).delete(products::delete))
        .route("/:id/price", get(products::price));

    let categories = Router::new()
        .route("/", get(categories::list).post(categories::create))
        .route("/:id", get(categories::get).put(categories::update).delete(categories::delete));

    let orders = Router::new()
        .route("/", get(orders::list_mine).post(orders::place))
        .route("/:id", get(orders::get))
        .route("/:id/cancel", post(orders::cancel))
        .route("/:id/status", put(orders::update_status));

    let admin = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/products", get(admin::products))
        .route("/products/low-stock", get(admin::low_stock))
        .route("/products/:id/stock", put(admin::update_stock))
        .route("/orders", get(admin::orders))
        .route("/orders/:id/status", put(admin::update_order_status))
        .route("/orders/:id/refund", post(admin::refund))
        .route("/users", get(admin::users))
        .route("/users/:id/status", put(admin::update_user_status))
        .route("/users/:id/role", put(admin::update_user_role))
        .route("/settings", get(settings::get_all).put(settings::update))
        .route("/analytics", get(admin::analytics));

    let settings = Router::new().route("/", get(settings::get_public).put(settings::update));

    let shipping = Router::new()
        .route("/methods", get(shipping::methods))
        .route("/methods/:id", put(shipping::update_method))
        .route("/calculate", post(shipping::calculate))
        .route("/track/:tracking_number", get(shipping::track));

    let payments = Router::new()
        .route("/methods", get(payments::methods))
        .route("/process", post(payments::process))
        .route("/verify", post(payments::verify));

    let cors = cors(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/auth", auth)
        .nest("/api/products", products)
        .nest("/api/categories", categories)
        .nest("/api/orders", orders)
        .nest("/api/admin", admin)
        .nest("/api/settings", settings)
        .nest("/api/shipping", shipping)
        .nest("/api/payments", payments)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(Page { page: 2, limit: 10 }, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(p.has_prev_page);

        let empty = Pagination::new(Page { page: 1, limit: 10 }, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
        assert!(!empty.has_prev_page);
    }

    #[test]
    fn test_envelope_omits_empty_parts() {
        let body = serde_json::to_value(message("done").0).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "message": "done" }));
    }
}
