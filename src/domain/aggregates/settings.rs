//! Settings document
//!
//! One global record read and written as a whole. Every section deserializes
//! with defaults, so a partial or empty stored document is always usable.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::aggregates::order::PaymentMethod;
use crate::domain::shipping::ShippingMethod;
use crate::domain::value_objects::{Language, LocalizedText};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site: SiteSettings,
    pub contact: ContactSettings,
    pub social: SocialLinks,
    pub homepage: Value,
    pub ecommerce: EcommerceSettings,
    pub payment: PaymentSettings,
    pub shipping: ShippingSettings,
    pub email: EmailSettings,
    pub seo: SeoSettings,
    pub security: SecuritySettings,
    pub maintenance: Maintenance,
    pub system: SystemSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteSettings {
    pub name: LocalizedText,
    pub tagline: LocalizedText,
    pub description: LocalizedText,
    pub logo: Option<Logo>,
    pub favicon: Option<String>,
    pub default_language: Language,
    pub available_languages: Vec<LanguageOption>,
    pub currency: CurrencySettings,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            name: LocalizedText { ka: "კერვანი".into(), en: "KERVAN".into(), tr: Some("KERVAN".into()) },
            tagline: LocalizedText {
                ka: "საბითუმო შეფუთვის გაყიდვები".into(),
                en: "Wholesale Packaging Sales".into(),
                tr: Some("Toptan Ambalaj Satışları".into()),
            },
            description: LocalizedText::default(),
            logo: None,
            favicon: None,
            default_language: Language::Ka,
            available_languages: vec![
                LanguageOption { code: Language::Ka, name: "ქართული".into(), flag: None, enabled: true },
                LanguageOption { code: Language::En, name: "English".into(), flag: None, enabled: true },
                LanguageOption { code: Language::Tr, name: "Türkçe".into(), flag: None, enabled: true },
            ],
            currency: CurrencySettings::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Logo { pub url: String, #[serde(default)] pub alt: Option<String> }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LanguageOption {
    pub code: Language,
    pub name: String,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default = "yes")]
    pub enabled: bool,
}

fn yes() -> bool { true }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencySettings {
    pub primary: String,
    pub symbol: String,
    pub supported: Vec<String>,
}

impl Default for CurrencySettings {
    fn default() -> Self { Self { primary: "GEL".into(), symbol: "₾".into(), supported: vec!["GEL".into()] } }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactSettings {
    pub address: LocalizedText,
    pub phone: ContactPhones,
    pub email: ContactEmails,
    pub working_hours: LocalizedText,
    pub location: Option<Location>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactPhones {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub whatsapp: Option<String>,
    pub telegram: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactEmails {
    pub primary: Option<String>,
    pub support: Option<String>,
    pub orders: Option<String>,
    pub admin: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub google_maps_url: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialLinks {
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcommerceSettings {
    pub inventory: InventorySettings,
    pub pricing: PricingSettings,
    pub orders: OrderSettings,
    pub cart: CartSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InventorySettings {
    pub track_stock: bool,
    pub allow_backorders: bool,
    pub low_stock_threshold: u32,
}

impl Default for InventorySettings {
    fn default() -> Self { Self { track_stock: true, allow_backorders: false, low_stock_threshold: 10 } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PricingSettings {
    pub include_tax: bool,
    pub tax_rate: Decimal,
    pub show_prices_with_tax: bool,
}

impl Default for PricingSettings {
    fn default() -> Self { Self { include_tax: true, tax_rate: Decimal::ZERO, show_prices_with_tax: true } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderSettings {
    pub require_registration: bool,
    pub allow_guest_checkout: bool,
    pub auto_confirm_orders: bool,
    pub order_number_prefix: String,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self { require_registration: false, allow_guest_checkout: true, auto_confirm_orders: false, order_number_prefix: "KRV".into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CartSettings {
    pub persist_cart: bool,
    /// days
    pub cart_expiration: u32,
    pub min_order_amount: Decimal,
}

impl Default for CartSettings {
    fn default() -> Self { Self { persist_cart: true, cart_expiration: 30, min_order_amount: Decimal::ZERO } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentSettings {
    pub methods: Vec<PaymentMethodOption>,
    pub tbc_bank: TbcBank,
    pub bank_transfer: BankTransfer,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        let option = |name, ka: &str, en: &str, description: &str, enabled| PaymentMethodOption {
            name,
            display_name: LocalizedText::new(ka, en),
            description: Some(description.to_string()),
            enabled,
        };
        Self {
            methods: vec![
                option(PaymentMethod::Card, "საბანკო ბარათი", "Credit/Debit Card", "Pay with your credit or debit card", true),
                option(PaymentMethod::BankTransfer, "საბანკო გადარიცხვა", "Bank Transfer", "Transfer money directly from your bank account", true),
                option(PaymentMethod::CashOnDelivery, "ადგილზე გადახდა", "Cash on Delivery", "Pay when you receive your order", true),
                option(PaymentMethod::TbcBank, "თიბისი ბანკი", "TBC Bank", "Pay online through TBC Bank", false),
            ],
            tbc_bank: TbcBank::default(),
            bank_transfer: BankTransfer::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodOption {
    pub name: PaymentMethod,
    pub display_name: LocalizedText,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TbcBank {
    pub enabled: bool,
    pub merchant_id: Option<String>,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub test_mode: bool,
}

impl Default for TbcBank {
    fn default() -> Self { Self { enabled: false, merchant_id: None, api_key: None, secret_key: None, test_mode: true } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BankTransfer {
    pub enabled: bool,
    pub bank_details: BankDetails,
    pub instructions: LocalizedText,
}

impl Default for BankTransfer {
    fn default() -> Self { Self { enabled: true, bank_details: BankDetails::default(), instructions: LocalizedText::default() } }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BankDetails {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    pub iban: Option<String>,
    pub swift: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShippingSettings {
    pub methods: Vec<ShippingMethod>,
    pub free_shipping_threshold: Decimal,
    pub courier_apis: Vec<CourierApi>,
}

impl Default for ShippingSettings {
    fn default() -> Self { Self { methods: ShippingMethod::defaults(), free_shipping_threshold: Decimal::ZERO, courier_apis: vec![] } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierApi {
    pub name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub smtp: Smtp,
    pub templates: EmailTemplates,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Smtp {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for Smtp {
    fn default() -> Self { Self { host: None, port: None, secure: true, username: None, password: None } }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailTemplates {
    pub order_confirmation: EmailTemplate,
    pub order_status_update: EmailTemplate,
    pub welcome_email: EmailTemplate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailTemplate {
    pub enabled: bool,
    pub subject: LocalizedText,
}

impl Default for EmailTemplate {
    fn default() -> Self { Self { enabled: true, subject: LocalizedText::default() } }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeoSettings {
    pub meta_title: LocalizedText,
    pub meta_description: LocalizedText,
    pub keywords: Vec<String>,
    pub google_analytics: Option<String>,
    pub google_tag_manager: Option<String>,
    pub facebook_pixel: Option<String>,
    pub structured_data: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecuritySettings {
    pub rate_limit: RateLimit,
    pub cors: CorsSettings,
    pub jwt: JwtSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimit { pub window_ms: u64, pub max: u32 }

impl Default for RateLimit {
    fn default() -> Self { Self { window_ms: 900_000, max: 100 } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSettings { pub origins: Vec<String>, pub credentials: bool }

impl Default for CorsSettings {
    fn default() -> Self { Self { origins: vec![], credentials: true } }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JwtSettings { pub expires_in: String, pub refresh_expires_in: String }

impl Default for JwtSettings {
    fn default() -> Self { Self { expires_in: "7d".into(), refresh_expires_in: "30d".into() } }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Maintenance {
    pub enabled: bool,
    pub message: LocalizedText,
    pub allowed_ips: Vec<String>,
    pub estimated_time: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemSettings {
    pub version: String,
    pub last_backup: Option<DateTime<Utc>>,
    pub backup_frequency: String,
    pub log_level: String,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self { version: env!("CARGO_PKG_VERSION").into(), last_backup: None, backup_frequency: "daily".into(), log_level: "info".into() }
    }
}

/// The subset of settings safe to hand to anonymous visitors
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSettings {
    pub site: SiteSettings,
    pub contact: PublicContact,
    pub social: SocialLinks,
    pub homepage: Value,
    pub ecommerce: PublicEcommerce,
    pub payment: PublicPayment,
    pub shipping: PublicShipping,
    pub seo: SeoSettings,
    pub maintenance: Maintenance,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicContact {
    pub address: LocalizedText,
    pub phone: ContactPhones,
    pub email: ContactEmails,
    pub working_hours: LocalizedText,
    pub location: Option<Location>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicEcommerce {
    pub track_stock: bool,
    pub allow_backorders: bool,
    pub pricing: PricingSettings,
    pub require_registration: bool,
    pub allow_guest_checkout: bool,
    pub min_order_amount: Decimal,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPayment { pub methods: Vec<PaymentMethodOption> }

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicShipping { pub methods: Vec<ShippingMethod>, pub free_shipping_threshold: Decimal }

impl Settings {
    pub fn public_view(&self) -> PublicSettings {
        PublicSettings {
            site: self.site.clone(),
            contact: PublicContact {
                address: self.contact.address.clone(),
                phone: ContactPhones { secondary: None, ..self.contact.phone.clone() },
                email: ContactEmails { orders: None, admin: None, ..self.contact.email.clone() },
                working_hours: self.contact.working_hours.clone(),
                location: self.contact.location.clone(),
            },
            social: self.social.clone(),
            homepage: self.homepage.clone(),
            ecommerce: PublicEcommerce {
                track_stock: self.ecommerce.inventory.track_stock,
                allow_backorders: self.ecommerce.inventory.allow_backorders,
                pricing: self.ecommerce.pricing.clone(),
                require_registration: self.ecommerce.orders.require_registration,
                allow_guest_checkout: self.ecommerce.orders.allow_guest_checkout,
                min_order_amount: self.ecommerce.cart.min_order_amount,
            },
            payment: PublicPayment { methods: self.payment.methods.iter().filter(|m| m.enabled).cloned().collect() },
            shipping: PublicShipping { methods: self.enabled_shipping_methods(), free_shipping_threshold: self.shipping.free_shipping_threshold },
            seo: self.seo.clone(),
            maintenance: self.maintenance.clone(),
        }
    }

    /// Replaces every top-level section present in `patch`; other sections are
    /// kept. The merged document must still deserialize.
    pub fn merge(&self, patch: &Value) -> Result<Settings, SettingsError> {
        let Value::Object(patch) = patch else { return Err(SettingsError::NotAnObject) };
        let mut current = serde_json::to_value(self).map_err(SettingsError::Invalid)?;
        if let Value::Object(doc) = &mut current {
            for (key, value) in patch {
                doc.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(current).map_err(SettingsError::Invalid)
    }

    pub fn enabled_payment_methods(&self) -> Vec<PaymentMethod> {
        self.payment.methods.iter().filter(|m| m.enabled).map(|m| m.name).collect()
    }

    pub fn enabled_shipping_methods(&self) -> Vec<ShippingMethod> {
        self.shipping.methods.iter().filter(|m| m.enabled).cloned().collect()
    }

    pub fn order_number_prefix(&self) -> &str {
        let prefix = self.ecommerce.orders.order_number_prefix.trim();
        if prefix.is_empty() { "KRV" } else { prefix }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Settings update must be a JSON object")]
    NotAnObject,
    #[error("Invalid settings: {0}")]
    Invalid(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_document_yields_defaults() {
        let s: Settings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(s.order_number_prefix(), "KRV");
        assert_eq!(s.shipping.methods.len(), 4);
        assert_eq!(s.site.currency.primary, "GEL");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let s: Settings = serde_json::from_value(json!({ "ecommerce": { "orders": { "orderNumberPrefix": "WHS" } } })).unwrap();
        assert_eq!(s.order_number_prefix(), "WHS");
        assert!(s.ecommerce.orders.allow_guest_checkout);
        assert_eq!(s.ecommerce.inventory.low_stock_threshold, 10);
    }

    #[test]
    fn test_public_view_hides_secrets_and_disabled_methods() {
        let mut s = Settings::default();
        s.payment.tbc_bank.secret_key = Some("shh".into());
        s.email.smtp.password = Some("smtp-pass".into());
        s.contact.email.admin = Some("admin@kervan.ge".into());
        let public = serde_json::to_string(&s.public_view()).unwrap();
        assert!(!public.contains("shh"));
        assert!(!public.contains("smtp-pass"));
        assert!(!public.contains("admin@kervan.ge"));
        assert!(!public.contains("tbc_bank"));
        assert!(public.contains("cash_on_delivery"));
    }

    #[test]
    fn test_merge_replaces_top_level_sections_only() {
        let s = Settings::default();
        let merged = s.merge(&json!({ "social": { "facebook": "https://fb.com/kervan" } })).unwrap();
        assert_eq!(merged.social.facebook.as_deref(), Some("https://fb.com/kervan"));
        assert_eq!(merged.site, s.site);
    }

    #[test]
    fn test_merge_rejects_bad_shapes() {
        let s = Settings::default();
        assert!(matches!(s.merge(&json!([1, 2])), Err(SettingsError::NotAnObject)));
        assert!(matches!(s.merge(&json!({ "ecommerce": { "pricing": { "taxRate": "lots" } } })), Err(SettingsError::Invalid(_))));
    }
}
