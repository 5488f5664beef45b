//! Kervan Wholesale E-commerce
//!
//! Multilingual (Georgian, English, Turkish) wholesale storefront backend.
//!
//! ## Features
//! - Product catalog with tiered quantity pricing
//! - Category hierarchy with breadcrumbs
//! - Orders with daily sequential numbering and status history
//! - Inventory tracking
//! - Admin dashboard, analytics and store settings

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod publisher;
pub mod state;

use thiserror::Error;

use crate::domain::aggregates::{OrderError, SettingsError};
use crate::domain::payment::PaymentError;
use crate::domain::shipping::ShippingError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient stock for {code}: {available} available")]
    InsufficientStock { code: String, available: u32 },

    #[error("Product {0} is not available")]
    ProductUnavailable(String),

    #[error("Invalid quantity")]
    InvalidQuantity,

    #[error("A category cannot be moved under itself or its own subcategories")]
    CategoryCycle,

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Shipping(#[from] ShippingError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Storage error: {0}")]
    Storage(sqlx::Error),
}

impl From<sqlx::Error> for EcommerceError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let what = match db.constraint() {
                    Some(c) if c.contains("email") => "A user with this email already exists",
                    Some(c) if c.contains("code") => "A product with this code already exists",
                    Some(c) if c.contains("slug") => "An entry with this slug already exists",
                    Some(c) if c.contains("order_number") => "Order number already issued",
                    _ => "Duplicate entry",
                };
                EcommerceError::Conflict(what.to_string())
            }
            _ => EcommerceError::Storage(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
