//! Shipping methods, quotes and tracking

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{ok, ok_with, rule, ApiResponse, ValidJson};
use crate::auth::Admin;
use crate::db;
use crate::domain::shipping::{self, QuoteItem, ShippingMethod, ShippingQuote, TrackingInfo};
use crate::domain::value_objects::LocalizedText;
use crate::error::ApiResult;
use crate::state::AppState;
use crate::EcommerceError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodList {
    pub methods: Vec<ShippingMethod>,
    pub free_shipping_threshold: Decimal,
}

/// GET /api/shipping/methods
pub async fn methods(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<MethodList>>> {
    let settings = db::settings::load(&state.db).await?;
    Ok(ok(MethodList {
        methods: settings.enabled_shipping_methods(),
        free_shipping_threshold: settings.shipping.free_shipping_threshold,
    }))
}

fn valid_items(items: &Vec<QuoteItem>) -> Result<(), ValidationError> {
    if items.iter().any(|i| i.quantity == 0 || i.price < Decimal::ZERO) {
        return Err(rule("item", "Every item needs a positive quantity and a price"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    #[validate(length(min = 1, message = "Items are required"), custom = "valid_items")]
    pub items: Vec<QuoteItem>,
    #[validate(length(min = 1, message = "Shipping method is required"))]
    pub shipping_method: String,
}

/// POST /api/shipping/calculate
pub async fn calculate(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CalculateRequest>,
) -> ApiResult<Json<ApiResponse<ShippingQuote>>> {
    let settings = db::settings::load(&state.db).await?;
    let quote = shipping::quote(
        &settings.enabled_shipping_methods(),
        &req.shipping_method,
        &req.items,
        settings.shipping.free_shipping_threshold,
    )?;
    Ok(ok(quote))
}

/// GET /api/shipping/track/:tracking_number
pub async fn track(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> ApiResult<Json<ApiResponse<TrackingInfo>>> {
    let order = db::orders::find_by_tracking(&state.db, &tracking_number)
        .await?
        .ok_or(EcommerceError::NotFound("Shipment"))?;
    Ok(ok(shipping::tracking_info(&order, &tracking_number)))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMethodRequest {
    pub display_name: Option<LocalizedText>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub cost: Option<Decimal>,
    #[validate(length(min = 1, max = 20))]
    pub estimated_days: Option<String>,
    pub enabled: Option<bool>,
    pub minimum_order: Option<Decimal>,
}

impl UpdateMethodRequest {
    fn apply(self, m: &mut ShippingMethod) -> crate::Result<()> {
        if self.cost.is_some_and(|c| c < Decimal::ZERO) || self.minimum_order.is_some_and(|c| c < Decimal::ZERO) {
            return Err(EcommerceError::Invalid("Amounts cannot be negative".into()));
        }
        if let Some(v) = self.display_name { m.display_name = v; }
        if let Some(v) = self.description { m.description = Some(v); }
        if let Some(v) = self.cost { m.cost = v; }
        if let Some(v) = self.estimated_days { m.estimated_days = v; }
        if let Some(v) = self.enabled { m.enabled = v; }
        if let Some(v) = self.minimum_order { m.minimum_order = Some(v); }
        Ok(())
    }
}

/// PUT /api/shipping/methods/:id
///
/// Disabled methods can be edited too, which is how they are switched back on.
pub async fn update_method(
    State(state): State<AppState>,
    Admin(user): Admin,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateMethodRequest>,
) -> ApiResult<Json<ApiResponse<ShippingMethod>>> {
    let mut settings = db::settings::load(&state.db).await?;
    let method = settings
        .shipping
        .methods
        .iter_mut()
        .find(|m| m.id == id)
        .ok_or(EcommerceError::NotFound("Shipping method"))?;
    req.apply(method)?;
    let method = method.clone();

    db::settings::save(&state.db, &settings, user.id).await?;
    tracing::info!(method = %method.id, enabled = method.enabled, cost = %method.cost, "shipping method updated");
    Ok(ok_with("Shipping method updated successfully", method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_calculate_request_shape() {
        let req: CalculateRequest = serde_json::from_value(serde_json::json!({
            "items": [{ "price": "4.50", "quantity": 10, "weight": "0.2" }],
            "shippingMethod": "express"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.items[0].weight, Some(dec!(0.2)));

        let empty: CalculateRequest =
            serde_json::from_value(serde_json::json!({ "items": [], "shippingMethod": "express" })).unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_zero_quantity_item_is_invalid() {
        let req: CalculateRequest = serde_json::from_value(serde_json::json!({
            "items": [{ "price": 1, "quantity": 0 }],
            "shippingMethod": "standard"
        }))
        .unwrap();
        assert!(req.validate().unwrap_err().field_errors().contains_key("items"));
    }

    #[test]
    fn test_method_update_applies_given_fields() {
        let mut method = ShippingMethod::defaults().remove(0);
        let req: UpdateMethodRequest = serde_json::from_value(serde_json::json!({ "cost": 7, "enabled": false })).unwrap();
        req.apply(&mut method).unwrap();
        assert_eq!(method.cost, dec!(7));
        assert!(!method.enabled);
        assert_eq!(method.estimated_days, "5-7");

        let negative = UpdateMethodRequest { cost: Some(dec!(-1)), ..UpdateMethodRequest::default() };
        assert!(negative.apply(&mut method).is_err());
    }
}
