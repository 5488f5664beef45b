//! Payment endpoints
//!
//! No gateway is called; capture checks the method and amount against the
//! order and records the transaction on it.

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{ok, ok_with, ApiResponse, ValidJson};
use crate::auth::AuthUser;
use crate::db;
use crate::domain::aggregates::settings::PaymentMethodOption;
use crate::domain::aggregates::{Order, PaymentMethod};
use crate::domain::events::DomainEvent;
use crate::domain::payment::{self, PaymentReceipt, Verification};
use crate::error::ApiResult;
use crate::state::AppState;
use crate::EcommerceError;

/// GET /api/payments/methods
pub async fn methods(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Vec<PaymentMethodOption>>>> {
    let settings = db::settings::load(&state.db).await?;
    Ok(ok(settings.payment.methods.into_iter().filter(|m| m.enabled).collect()))
}

fn visible_to(order: &Order, user: &AuthUser) -> bool {
    user.is_staff() || order.belongs_to(user.id)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub order_id: Uuid,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
}

/// POST /api/payments/process
pub async fn process(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(req): ValidJson<ProcessRequest>,
) -> ApiResult<Json<ApiResponse<PaymentReceipt>>> {
    let settings = db::settings::load(&state.db).await?;

    let mut tx = state.db.begin().await?;
    let mut order = db::orders::find_for_update(&mut tx, req.order_id)
        .await?
        .filter(|o| visible_to(o, &auth))
        .ok_or(EcommerceError::NotFound("Order"))?;
    let receipt = payment::capture(&mut order, req.payment_method, req.amount, &settings.enabled_payment_methods())?;
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        transaction_id = %receipt.transaction_id,
        method = receipt.payment_method.as_str(),
        amount = %receipt.amount,
        "payment captured"
    );
    state.events.publish(DomainEvent::PaymentCompleted {
        order_id: order.id,
        transaction_id: receipt.transaction_id.clone(),
        method: receipt.payment_method,
        amount: receipt.amount,
    });
    Ok(ok_with("Payment processed successfully", receipt))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "Payment id is required"))]
    pub payment_id: String,
    #[validate(length(min = 1, message = "Transaction id is required"))]
    pub transaction_id: String,
}

/// POST /api/payments/verify
pub async fn verify(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(req): ValidJson<VerifyRequest>,
) -> ApiResult<Json<ApiResponse<Verification>>> {
    let order = db::orders::find(&state.db, req.order_id)
        .await?
        .filter(|o| visible_to(o, &auth))
        .ok_or(EcommerceError::NotFound("Order"))?;
    let verification = payment::verify(&order, &req.payment_id, &req.transaction_id)?;
    Ok(ok(verification))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_request_accepts_legacy_method_name() {
        let req: ProcessRequest = serde_json::from_value(serde_json::json!({
            "orderId": Uuid::nil(),
            "paymentMethod": "credit_card",
            "amount": "42.50"
        }))
        .unwrap();
        assert_eq!(req.payment_method, PaymentMethod::Card);
    }

    #[test]
    fn test_verify_request_requires_ids() {
        let req: VerifyRequest = serde_json::from_value(serde_json::json!({
            "orderId": Uuid::nil(),
            "paymentId": "",
            "transactionId": "txn_1"
        }))
        .unwrap();
        assert!(req.validate().unwrap_err().field_errors().contains_key("payment_id"));
    }
}
