//! HTTP error type
//!
//! `ApiError` is what handlers return. Domain and storage errors convert into
//! it with `?`; storage failures are logged here and reach the client as a
//! generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::domain::aggregates::{OrderError, SettingsError};
use crate::domain::payment::PaymentError;
use crate::domain::shipping::ShippingError;
use crate::EcommerceError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self { Self::BadRequest(message.into()) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => serde_json::json!({
                "success": false,
                "message": self.to_string(),
                "errors": errors,
            }),
            _ => serde_json::json!({ "success": false, "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<EcommerceError> for ApiError {
    fn from(e: EcommerceError) -> Self {
        match e {
            EcommerceError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            EcommerceError::Conflict(msg) => ApiError::Conflict(msg),
            EcommerceError::Payment(PaymentError::UnknownTransaction) => ApiError::NotFound(e.to_string()),
            EcommerceError::Shipping(ShippingError::UnknownMethod(_))
            | EcommerceError::InsufficientStock { .. }
            | EcommerceError::ProductUnavailable(_)
            | EcommerceError::InvalidQuantity
            | EcommerceError::CategoryCycle
            | EcommerceError::Invalid(_)
            | EcommerceError::Order(_)
            | EcommerceError::Payment(_)
            | EcommerceError::Shipping(_)
            | EcommerceError::Settings(_) => ApiError::BadRequest(e.to_string()),
            EcommerceError::Storage(db_err) => {
                tracing::error!(error = %db_err, "Storage error");
                ApiError::Internal
            }
        }
    }
}

macro_rules! via_domain {
    ($($ty:ty),*) => {$(
        impl From<$ty> for ApiError {
            fn from(e: $ty) -> Self { EcommerceError::from(e).into() }
        }
    )*};
}

via_domain!(OrderError, PaymentError, ShippingError, SettingsError);

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self { EcommerceError::from(e).into() }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        let mut out = Vec::new();
        flatten("", &e, &mut out);
        out.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::Validation(out)
    }
}

fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() { field.to_string() } else { format!("{prefix}.{field}") };
        match kind {
            ValidationErrorsKind::Field(list) => out.extend(list.iter().map(|err| FieldError {
                field: path.clone(),
                message: err.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| format!("{path} is invalid")),
            })),
            ValidationErrorsKind::Struct(inner) => flatten(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (i, inner) in items {
                    flatten(&format!("{path}[{i}]"), inner, out);
                }
            }
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "Please provide a valid email"))]
        email: String,
        #[validate(length(min = 6))]
        password: String,
    }

    #[test]
    fn test_validation_errors_are_listed_per_field() {
        let err: ApiError = Signup { email: "nope".into(), password: "123".into() }.validate().unwrap_err().into();
        let ApiError::Validation(fields) = err else { panic!("expected validation error") };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], FieldError { field: "email".into(), message: "Please provide a valid email".into() });
        assert_eq!(fields[1].message, "password is invalid");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(EcommerceError::NotFound("Order")).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(EcommerceError::CategoryCycle).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(EcommerceError::Conflict("dup".into())).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(EcommerceError::Storage(sqlx::Error::PoolTimedOut)).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
