//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::value_objects::{LocalizedText, ProductCode};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: LocalizedText,
    pub slug: String,
    pub code: ProductCode,
    pub barcode: Option<String>,
    pub description: LocalizedText,
    pub category_id: Uuid,
    pub subcategory_id: Option<Uuid>,
    pub images: Vec<ProductImage>,
    pub pricing: Pricing,
    pub quantity_discounts: Vec<QuantityDiscount>,
    pub inventory: Inventory,
    pub specifications: Specifications,
    pub seo: Seo,
    pub status: ProductStatus,
    pub featured: bool,
    pub tags: Vec<String>,
    pub ratings: Ratings,
    pub sales: Sales,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

/// Three flat price slots, one of which is active
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub price1: Decimal,
    #[serde(default)]
    pub price2: Option<Decimal>,
    #[serde(default)]
    pub price3: Option<Decimal>,
    #[serde(default)]
    pub active_price: PriceSlot,
    #[serde(default = "default_currency")]
    pub currency: String,
}

pub fn default_currency() -> String { "GEL".to_string() }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSlot {
    #[default]
    Price1,
    Price2,
    Price3,
}

impl Pricing {
    /// Price in the active slot; an empty slot falls back to `price1`.
    pub fn active(&self) -> Decimal {
        match self.active_price {
            PriceSlot::Price1 => self.price1,
            PriceSlot::Price2 => self.price2.unwrap_or(self.price1),
            PriceSlot::Price3 => self.price3.unwrap_or(self.price1),
        }
    }
}

/// One quantity band; `max_quantity = None` means open-ended
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityDiscount {
    pub min_quantity: u32,
    /// A stored or submitted 0 reads as open-ended
    #[serde(default, deserialize_with = "zero_is_unbounded")]
    pub max_quantity: Option<u32>,
    pub price: Decimal,
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
}

fn zero_is_unbounded<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(Option::<u32>::deserialize(deserializer)?.filter(|max| *max > 0))
}

impl QuantityDiscount {
    pub fn contains(&self, quantity: u32) -> bool {
        quantity >= self.min_quantity && self.max_quantity.filter(|max| *max > 0).map_or(true, |max| quantity <= max)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub stock: u32,
    #[serde(default = "default_min_stock")]
    pub min_stock_level: u32,
    #[serde(default)]
    pub max_stock_level: Option<u32>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_true")]
    pub track_inventory: bool,
}

fn default_min_stock() -> u32 { 10 }
fn default_unit() -> String { "pcs".to_string() }
fn default_true() -> bool { true }

impl Default for Inventory {
    fn default() -> Self {
        Self { stock: 0, min_stock_level: default_min_stock(), max_stock_level: None, unit: default_unit(), track_inventory: true }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specifications {
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub weight: Option<Weight>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: Option<Decimal>,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    #[serde(default = "default_length_unit")]
    pub unit: String,
}

fn default_length_unit() -> String { "cm".to_string() }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub value: Decimal,
    #[serde(default = "default_weight_unit")]
    pub unit: String,
}

fn default_weight_unit() -> String { "kg".to_string() }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seo {
    #[serde(default)]
    pub meta_title: LocalizedText,
    #[serde(default)]
    pub meta_description: LocalizedText,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    pub average: Decimal,
    pub count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sales {
    pub total_sold: u32,
    pub revenue: Decimal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    OutOfStock,
    Discontinued,
}

impl ProductStatus {
    /// Statuses a shopper can list, open and price
    pub const PUBLIC: [ProductStatus; 2] = [ProductStatus::Active, ProductStatus::OutOfStock];

    pub fn is_public(&self) -> bool { Self::PUBLIC.contains(self) }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::OutOfStock => "out_of_stock",
            Self::Discontinued => "discontinued",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "out_of_stock" => Ok(Self::OutOfStock),
            "discontinued" => Ok(Self::Discontinued),
            other => Err(ProductError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation { Add, Subtract }

impl Product {
    /// Unit price for buying `quantity` pieces.
    ///
    /// Among the discount bands containing `quantity`, the one with the largest
    /// `min_quantity` wins (first listed on ties). No matching band means the
    /// active flat price.
    pub fn price_for_quantity(&self, quantity: u32) -> Decimal {
        let mut best: Option<&QuantityDiscount> = None;
        for tier in self.quantity_discounts.iter().filter(|t| t.contains(quantity)) {
            if best.map_or(true, |b| tier.min_quantity > b.min_quantity) {
                best = Some(tier);
            }
        }
        best.map(|t| t.price).unwrap_or_else(|| self.pricing.active())
    }

    pub fn is_in_stock(&self, quantity: u32) -> bool {
        if !self.inventory.track_inventory { return true; }
        self.inventory.stock >= quantity && self.status == ProductStatus::Active
    }

    /// Applies a stock movement. Stock saturates at zero; the status follows
    /// the out-of-stock boundary in both directions.
    pub fn update_stock(&mut self, quantity: u32, operation: StockOperation) {
        if !self.inventory.track_inventory { return; }
        match operation {
            StockOperation::Subtract => {
                self.inventory.stock = self.inventory.stock.saturating_sub(quantity);
                if self.inventory.stock == 0 { self.status = ProductStatus::OutOfStock; }
            }
            StockOperation::Add => {
                self.inventory.stock = self.inventory.stock.saturating_add(quantity);
                if self.status == ProductStatus::OutOfStock && self.inventory.stock > 0 {
                    self.status = ProductStatus::Active;
                }
            }
        }
        self.touch();
    }

    pub fn record_sale(&mut self, quantity: u32, line_total: Decimal) {
        self.sales.total_sold = self.sales.total_sold.saturating_add(quantity);
        self.sales.revenue += line_total;
    }

    pub fn rename(&mut self, name: LocalizedText) {
        self.slug = crate::domain::value_objects::slugify(&name.en);
        self.name = name;
        self.touch();
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.images.iter().find(|i| i.is_primary).or_else(|| self.images.first()).map(|i| i.url.as_str())
    }

    /// Weight of one unit in kilograms, when the product carries one
    pub fn unit_weight_kg(&self) -> Option<Decimal> {
        let weight = self.specifications.weight.as_ref()?;
        match weight.unit.as_str() {
            "g" => Some(weight.value / Decimal::from(1000)),
            _ => Some(weight.value),
        }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductError { MissingName, UnknownStatus(String) }
impl std::error::Error for ProductError {}
impl fmt::Display for ProductError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingName => write!(f, "Missing name"),
            Self::UnknownStatus(s) => write!(f, "Unknown product status: {s}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_product() -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            name: LocalizedText::new("ყუთი", "Cardboard Box"),
            slug: "cardboard-box".into(),
            code: ProductCode::new("BOX-01").unwrap(),
            barcode: None,
            description: LocalizedText::default(),
            category_id: Uuid::new_v4(),
            subcategory_id: None,
            images: vec![],
            pricing: Pricing { price1: dec!(2.50), price2: Some(dec!(2.20)), price3: None, active_price: PriceSlot::Price1, currency: default_currency() },
            quantity_discounts: vec![
                QuantityDiscount { min_quantity: 100, max_quantity: Some(499), price: dec!(2.10), discount_percent: None },
                QuantityDiscount { min_quantity: 500, max_quantity: None, price: dec!(1.90), discount_percent: None },
            ],
            inventory: Inventory { stock: 20, ..Inventory::default() },
            specifications: Specifications::default(),
            seo: Seo::default(),
            status: ProductStatus::Active,
            featured: false,
            tags: vec![],
            ratings: Ratings::default(),
            sales: Sales::default(),
            created_by: Uuid::new_v4(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_flat_price_below_first_tier() {
        let p = sample_product();
        assert_eq!(p.price_for_quantity(1), dec!(2.50));
        assert_eq!(p.price_for_quantity(99), dec!(2.50));
    }

    #[test]
    fn test_tier_bounds_are_inclusive() {
        let p = sample_product();
        assert_eq!(p.price_for_quantity(100), dec!(2.10));
        assert_eq!(p.price_for_quantity(499), dec!(2.10));
        assert_eq!(p.price_for_quantity(500), dec!(1.90));
        assert_eq!(p.price_for_quantity(10_000), dec!(1.90));
    }

    #[test]
    fn test_overlapping_tiers_prefer_largest_minimum() {
        let mut p = sample_product();
        p.quantity_discounts = vec![
            QuantityDiscount { min_quantity: 10, max_quantity: None, price: dec!(2.40), discount_percent: None },
            QuantityDiscount { min_quantity: 50, max_quantity: Some(60), price: dec!(2.00), discount_percent: None },
            QuantityDiscount { min_quantity: 20, max_quantity: None, price: dec!(2.30), discount_percent: None },
        ];
        assert_eq!(p.price_for_quantity(55), dec!(2.00));
        assert_eq!(p.price_for_quantity(61), dec!(2.30));
        assert_eq!(p.price_for_quantity(15), dec!(2.40));
    }

    #[test]
    fn test_zero_maximum_is_open_ended() {
        let tier: QuantityDiscount =
            serde_json::from_value(serde_json::json!({ "minQuantity": 10, "maxQuantity": 0, "price": "2.00" })).unwrap();
        assert_eq!(tier.max_quantity, None);

        let mut p = sample_product();
        p.quantity_discounts = vec![tier];
        assert_eq!(p.price_for_quantity(1_000), dec!(2.00));
        assert_eq!(p.price_for_quantity(9), dec!(2.50));

        p.quantity_discounts[0].max_quantity = Some(0);
        assert_eq!(p.price_for_quantity(1_000), dec!(2.00));
    }

    #[test]
    fn test_active_slot_and_empty_slot_fallback() {
        let mut p = sample_product();
        p.quantity_discounts.clear();
        p.pricing.active_price = PriceSlot::Price2;
        assert_eq!(p.price_for_quantity(1), dec!(2.20));
        p.pricing.active_price = PriceSlot::Price3;
        assert_eq!(p.price_for_quantity(1), dec!(2.50));
    }

    #[test]
    fn test_subtract_saturates_and_marks_out_of_stock() {
        let mut p = sample_product();
        p.update_stock(25, StockOperation::Subtract);
        assert_eq!(p.inventory.stock, 0);
        assert_eq!(p.status, ProductStatus::OutOfStock);
        assert!(!p.is_in_stock(1));
    }

    #[test]
    fn test_restock_reactivates_only_out_of_stock() {
        let mut p = sample_product();
        p.update_stock(20, StockOperation::Subtract);
        p.update_stock(5, StockOperation::Add);
        assert_eq!(p.status, ProductStatus::Active);
        assert_eq!(p.inventory.stock, 5);

        p.status = ProductStatus::Discontinued;
        p.update_stock(5, StockOperation::Add);
        assert_eq!(p.status, ProductStatus::Discontinued);
    }

    #[test]
    fn test_untracked_inventory_is_always_in_stock() {
        let mut p = sample_product();
        p.inventory.track_inventory = false;
        p.update_stock(1_000, StockOperation::Subtract);
        assert_eq!(p.inventory.stock, 20);
        assert!(p.is_in_stock(1_000));
    }

    #[test]
    fn test_rename_regenerates_slug() {
        let mut p = sample_product();
        p.rename(LocalizedText::new("ყუთი", "Heavy Duty Box"));
        assert_eq!(p.slug, "heavy-duty-box");
    }
}
