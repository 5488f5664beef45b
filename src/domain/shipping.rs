//! Shipping methods, quotes and shipment tracking

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::aggregates::order::{Order, OrderStatus};
use crate::domain::value_objects::LocalizedText;

/// Weight (kg) included in the base price of every method
const BASE_WEIGHT_KG: Decimal = Decimal::from_parts(10, 0, 0, false, 0);
/// Surcharge per kg above the base weight
const OVERWEIGHT_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingMethod {
    pub id: String,
    pub display_name: LocalizedText,
    #[serde(default)]
    pub description: Option<String>,
    pub cost: Decimal,
    pub estimated_days: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub minimum_order: Option<Decimal>,
}

fn enabled_by_default() -> bool { true }

impl ShippingMethod {
    fn new(id: &str, ka: &str, en: &str, description: &str, cost: Decimal, days: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: LocalizedText::new(ka, en),
            description: Some(description.to_string()),
            cost,
            estimated_days: days.to_string(),
            enabled: true,
            minimum_order: None,
        }
    }

    /// The stock method table
    pub fn defaults() -> Vec<Self> {
        let mut free = Self::new("free", "უფასო მიწოდება", "Free Shipping", "Free delivery for orders over 100", Decimal::ZERO, "7-10");
        free.minimum_order = Some(Decimal::from(100));
        vec![
            Self::new("standard", "სტანდარტული მიწოდება", "Standard Shipping", "Delivery within 5-7 business days", Decimal::new(599, 2), "5-7"),
            Self::new("express", "ექსპრეს მიწოდება", "Express Shipping", "Delivery within 2-3 business days", Decimal::new(1299, 2), "2-3"),
            Self::new("overnight", "მეორე დღეს მიწოდება", "Overnight Shipping", "Next business day delivery", Decimal::new(2499, 2), "1"),
            free,
        ]
    }

    /// Upper bound of `estimated_days` ("5-7" -> 7)
    pub fn max_days(&self) -> Option<i64> {
        self.estimated_days.rsplit('-').next().and_then(|d| d.trim().parse().ok())
    }

    pub fn estimated_delivery(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_days().map(|d| from + Duration::days(d))
    }
}

/// One line of a shipping quote request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub price: Decimal,
    pub quantity: u32,
    /// Unit weight in kg; missing weights count as 1
    #[serde(default)]
    pub weight: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub method: String,
    pub cost: Decimal,
    pub estimated_days: String,
    pub total_weight: Decimal,
    pub total_value: Decimal,
}

/// Prices a shipment.
///
/// The method must exist and be enabled; a method with a minimum order rejects
/// carts below it. Weight above 10 kg adds 0.5 per extra kg. A positive
/// `free_threshold` waives the cost once the cart value reaches it.
pub fn quote(methods: &[ShippingMethod], method_id: &str, items: &[QuoteItem], free_threshold: Decimal) -> Result<ShippingQuote, ShippingError> {
    let method = methods
        .iter()
        .find(|m| m.id == method_id && m.enabled)
        .ok_or_else(|| ShippingError::UnknownMethod(method_id.to_string()))?;

    let mut total_weight = Decimal::ZERO;
    let mut total_value = Decimal::ZERO;
    for item in items {
        let qty = Decimal::from(item.quantity);
        total_weight += item.weight.unwrap_or(Decimal::ONE) * qty;
        total_value += item.price * qty;
    }

    if let Some(min) = method.minimum_order {
        if total_value < min { return Err(ShippingError::BelowMinimum { method: method.id.clone(), minimum: min }); }
    }

    let mut cost = method.cost;
    if total_weight > BASE_WEIGHT_KG {
        cost += (total_weight - BASE_WEIGHT_KG) * OVERWEIGHT_RATE;
    }
    if free_threshold > Decimal::ZERO && total_value >= free_threshold {
        cost = Decimal::ZERO;
    }

    Ok(ShippingQuote { method: method.id.clone(), cost, estimated_days: method.estimated_days.clone(), total_weight, total_value })
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub date: DateTime<Utc>,
    pub status: String,
    pub description: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub tracking_number: String,
    pub order_number: String,
    pub status: String,
    pub carrier: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub events: Vec<TrackingEvent>,
}

/// Shipment view of an order: creation plus every recorded status change.
pub fn tracking_info(order: &Order, tracking_number: &str) -> TrackingInfo {
    let mut events = vec![TrackingEvent { date: order.created_at, status: "order_placed".into(), description: format!("Order {} placed", order.order_number) }];
    events.extend(order.status_history.iter().map(|h| TrackingEvent { date: h.date, status: h.status.as_str().to_string(), description: h.note.clone() }));

    let status = match order.status {
        OrderStatus::Shipped => "in_transit",
        OrderStatus::Delivered => "delivered",
        OrderStatus::Cancelled | OrderStatus::Refunded => "cancelled",
        _ => "processing",
    };

    TrackingInfo {
        tracking_number: tracking_number.to_string(),
        order_number: order.order_number.clone(),
        status: status.to_string(),
        carrier: order.shipping.carrier.clone(),
        estimated_delivery: order.shipping.estimated_delivery,
        events,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShippingError { UnknownMethod(String), BelowMinimum { method: String, minimum: Decimal } }
impl std::error::Error for ShippingError {}
impl fmt::Display for ShippingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMethod(m) => write!(f, "Invalid shipping method: {m}"),
            Self::BelowMinimum { method, minimum } => write!(f, "Shipping method {method} requires a minimum order of {minimum}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(price: Decimal, quantity: u32, weight: Option<Decimal>) -> QuoteItem { QuoteItem { price, quantity, weight } }

    #[test]
    fn test_standard_quote_under_base_weight() {
        let q = quote(&ShippingMethod::defaults(), "standard", &[item(dec!(3), 4, None)], Decimal::ZERO).unwrap();
        assert_eq!(q.cost, dec!(5.99));
        assert_eq!(q.total_weight, dec!(4));
        assert_eq!(q.total_value, dec!(12));
    }

    #[test]
    fn test_overweight_surcharge() {
        let q = quote(&ShippingMethod::defaults(), "express", &[item(dec!(1), 8, Some(dec!(2)))], Decimal::ZERO).unwrap();
        assert_eq!(q.total_weight, dec!(16));
        assert_eq!(q.cost, dec!(15.99));
    }

    #[test]
    fn test_free_method_enforces_minimum() {
        let err = quote(&ShippingMethod::defaults(), "free", &[item(dec!(10), 5, None)], Decimal::ZERO).unwrap_err();
        assert!(matches!(err, ShippingError::BelowMinimum { .. }));
        let ok = quote(&ShippingMethod::defaults(), "free", &[item(dec!(10), 10, None)], Decimal::ZERO).unwrap();
        assert_eq!(ok.cost, Decimal::ZERO);
    }

    #[test]
    fn test_disabled_or_unknown_method_rejected() {
        let mut methods = ShippingMethod::defaults();
        methods[1].enabled = false;
        assert_eq!(quote(&methods, "express", &[], Decimal::ZERO).unwrap_err(), ShippingError::UnknownMethod("express".into()));
        assert!(quote(&methods, "teleport", &[], Decimal::ZERO).is_err());
    }

    #[test]
    fn test_free_threshold_waives_cost() {
        let q = quote(&ShippingMethod::defaults(), "overnight", &[item(dec!(50), 4, None)], dec!(200)).unwrap();
        assert_eq!(q.cost, Decimal::ZERO);
    }

    #[test]
    fn test_max_days() {
        let methods = ShippingMethod::defaults();
        assert_eq!(methods[0].max_days(), Some(7));
        assert_eq!(methods[2].max_days(), Some(1));
    }
}
