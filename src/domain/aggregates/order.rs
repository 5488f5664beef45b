//! Order Aggregate

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::value_objects::LocalizedText;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub pricing: OrderPricing,
    pub shipping: Shipping,
    pub payment: Payment,
    pub status: OrderStatus,
    pub status_history: Vec<StatusChange>,
    pub notes: OrderNotes,
    pub metadata: OrderMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub guest: Option<GuestContact>,
    #[serde(default)]
    pub is_guest: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Contact details resolved from either a guest record or a registered user
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_guest: bool,
    pub user_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_snapshot: ProductSnapshot,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    #[serde(default)]
    pub applied_discount: Decimal,
}

impl OrderItem {
    /// Builds a line at `unit_price`; `list_price` is the flat price the
    /// discount is measured against.
    pub fn new(product_id: Uuid, snapshot: ProductSnapshot, quantity: u32, unit_price: Decimal, list_price: Decimal) -> Self {
        let qty = Decimal::from(quantity);
        let discount = ((list_price - unit_price) * qty).max(Decimal::ZERO);
        Self { product_id, product_snapshot: snapshot, quantity, unit_price, total_price: unit_price * qty, applied_discount: discount }
    }
}

/// Catalog data frozen at purchase time
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: LocalizedText,
    pub code: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPricing {
    pub subtotal: Decimal,
    pub tax: TaxLine,
    pub shipping: ShippingLine,
    pub discount: DiscountLine,
    pub total: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxLine { pub amount: Decimal, pub rate: Decimal }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingLine { pub amount: Decimal, pub method: Option<String> }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscountLine {
    pub amount: Decimal,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: Option<String>,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default = "default_country")]
    pub country: String,
    pub phone: String,
    pub email: String,
}

fn default_country() -> String { "Georgia".to_string() }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipping {
    pub address: ShippingAddress,
    pub method: String,
    pub cost: Decimal,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[serde(alias = "credit_card")]
    Card,
    BankTransfer,
    CashOnDelivery,
    TbcBank,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::BankTransfer => "bank_transfer",
            Self::CashOnDelivery => "cash_on_delivery",
            Self::TbcBank => "tbc_bank",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Statuses that count towards revenue
    pub fn is_revenue(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Processing | Self::Shipped | Self::Delivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: OrderStatus,
    pub date: DateTime<Utc>,
    pub note: String,
    #[serde(default)]
    pub updated_by: Option<Uuid>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderNotes {
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub admin: Option<String>,
    #[serde(default)]
    pub internal: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMetadata {
    pub source: OrderSource,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    #[default]
    Website,
    Admin,
    Api,
    Import,
}

/// Amounts charged on top of the line items
#[derive(Clone, Debug, Default)]
pub struct Charges {
    pub tax_rate: Decimal,
    pub prices_include_tax: bool,
    pub shipping: Decimal,
    pub discount: Decimal,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        order_number: String,
        customer: Customer,
        items: Vec<OrderItem>,
        shipping: Shipping,
        payment_method: PaymentMethod,
        charges: Charges,
        currency: &str,
        metadata: OrderMetadata,
    ) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(),
            order_number,
            customer,
            items,
            pricing: OrderPricing {
                shipping: ShippingLine { amount: charges.shipping, method: Some(shipping.method.clone()) },
                tax: TaxLine { amount: Decimal::ZERO, rate: charges.tax_rate },
                discount: DiscountLine { amount: charges.discount, ..DiscountLine::default() },
                currency: currency.to_string(),
                ..OrderPricing::default()
            },
            shipping,
            payment: Payment { method: payment_method, status: PaymentStatus::Pending, transaction_id: None, payment_date: None },
            status: OrderStatus::Pending,
            status_history: vec![],
            notes: OrderNotes::default(),
            metadata,
            created_at: now,
            updated_at: now,
        };
        order.calculate_totals();
        if !charges.prices_include_tax {
            order.pricing.tax.amount = (order.pricing.subtotal * charges.tax_rate / Decimal::from(100)).round_dp(2);
            order.calculate_totals();
        }
        Ok(order)
    }

    /// subtotal = sum of line totals; total = subtotal + tax + shipping - discount, never negative
    pub fn calculate_totals(&mut self) {
        self.pricing.subtotal = self.items.iter().map(|i| i.total_price).sum();
        let total = self.pricing.subtotal + self.pricing.tax.amount + self.pricing.shipping.amount - self.pricing.discount.amount;
        self.pricing.total = total.max(Decimal::ZERO);
    }

    /// Moves the order to `status` and appends a history entry; setting the
    /// current status again records nothing and returns `Ok(None)`.
    ///
    /// Cancelled and refunded orders are closed. Refunds only go through
    /// [`Order::refund`], which also settles the payment.
    pub fn change_status(
        &mut self,
        status: OrderStatus,
        note: Option<String>,
        updated_by: Option<Uuid>,
    ) -> Result<Option<OrderStatus>, OrderError> {
        if self.status == status { return Ok(None); }
        if self.is_closed() { return Err(OrderError::Closed(self.status)); }
        if status == OrderStatus::Refunded { return Err(OrderError::RefundOutsideRefundFlow); }
        let previous = self.transition(status, note, updated_by);
        if status == OrderStatus::Cancelled && self.payment.status == PaymentStatus::Pending {
            self.payment.status = PaymentStatus::Cancelled;
        }
        Ok(Some(previous))
    }

    fn transition(&mut self, status: OrderStatus, note: Option<String>, updated_by: Option<Uuid>) -> OrderStatus {
        let previous = std::mem::replace(&mut self.status, status);
        self.status_history.push(StatusChange {
            status,
            date: Utc::now(),
            note: note.unwrap_or_else(|| format!("Status changed to {status}")),
            updated_by,
        });
        self.touch();
        previous
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    pub fn can_be_cancelled(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    pub fn can_be_refunded(&self) -> bool {
        self.status == OrderStatus::Delivered && self.payment.status == PaymentStatus::Completed
    }

    pub fn cancel(&mut self, by: Option<Uuid>, reason: Option<String>) -> Result<(), OrderError> {
        if !self.can_be_cancelled() { return Err(OrderError::CannotCancel); }
        self.transition(OrderStatus::Cancelled, reason, by);
        if self.payment.status == PaymentStatus::Pending { self.payment.status = PaymentStatus::Cancelled; }
        Ok(())
    }

    pub fn refund(&mut self, by: Option<Uuid>) -> Result<(), OrderError> {
        if !self.can_be_refunded() { return Err(OrderError::CannotRefund); }
        self.transition(OrderStatus::Refunded, None, by);
        self.payment.status = PaymentStatus::Refunded;
        Ok(())
    }

    pub fn record_payment(&mut self, transaction_id: String) -> Result<(), OrderError> {
        if self.payment.status == PaymentStatus::Completed { return Err(OrderError::AlreadyPaid); }
        if self.is_closed() { return Err(OrderError::NotPayable); }
        self.payment.status = PaymentStatus::Completed;
        self.payment.transaction_id = Some(transaction_id);
        self.payment.payment_date = Some(Utc::now());
        self.touch();
        Ok(())
    }

    pub fn belongs_to(&self, user_id: Uuid) -> bool { self.customer.user_id == Some(user_id) }

    /// `registered` carries (first name, last name, email, phone) of the linked user.
    pub fn customer_info(&self, registered: Option<(&str, &str, &str, Option<&str>)>) -> CustomerInfo {
        match (&self.customer.guest, registered) {
            (Some(g), _) if self.customer.is_guest => CustomerInfo {
                name: format!("{} {}", g.first_name, g.last_name),
                email: g.email.clone(),
                phone: g.phone.clone(),
                is_guest: true,
                user_id: None,
            },
            (_, Some((first, last, email, phone))) => CustomerInfo {
                name: format!("{first} {last}"),
                email: email.to_string(),
                phone: phone.map(str::to_string),
                is_guest: false,
                user_id: self.customer.user_id,
            },
            _ => {
                let a = &self.shipping.address;
                CustomerInfo {
                    name: format!("{} {}", a.first_name, a.last_name),
                    email: a.email.clone(),
                    phone: Some(a.phone.clone()),
                    is_guest: self.customer.is_guest,
                    user_id: self.customer.user_id,
                }
            }
        }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// `{prefix}{YY}{MM}{DD}`, the part every order number of a day shares
pub fn order_number_day_prefix(prefix: &str, date: NaiveDate) -> String {
    format!("{}{:02}{:02}{:02}", prefix, date.year() % 100, date.month(), date.day())
}

/// Whether a status change hands the order's items back to stock: only the
/// move into `cancelled`, and only once since closed orders cannot reopen.
pub fn releases_stock(previous: Option<OrderStatus>, current: OrderStatus) -> bool {
    matches!(previous, Some(p) if p != OrderStatus::Cancelled) && current == OrderStatus::Cancelled
}

/// Next order number for `date`, given the highest number already issued that day.
///
/// The sequence is everything after the day prefix of `last`, plus one,
/// zero-padded to four digits; it keeps growing past 9999. An absent or
/// unparsable `last` starts the day at 0001.
pub fn next_order_number(prefix: &str, date: NaiveDate, last: Option<&str>) -> String {
    let day = order_number_day_prefix(prefix, date);
    let sequence = last
        .and_then(|l| l.strip_prefix(day.as_str()))
        .and_then(|tail| tail.parse::<u32>().ok())
        .map_or(1, |n| n + 1);
    format!("{day}{sequence:04}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    NoItems,
    CannotCancel,
    CannotRefund,
    AlreadyPaid,
    NotPayable,
    Closed(OrderStatus),
    RefundOutsideRefundFlow,
    UnknownStatus(String),
}
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoItems => write!(f, "Order has no items"),
            Self::CannotCancel => write!(f, "Order can no longer be cancelled"),
            Self::CannotRefund => write!(f, "Order cannot be refunded"),
            Self::AlreadyPaid => write!(f, "Order is already paid"),
            Self::NotPayable => write!(f, "Order is not payable"),
            Self::Closed(s) => write!(f, "Order is {s} and its status can no longer change"),
            Self::RefundOutsideRefundFlow => write!(f, "Refunds go through /api/admin/orders/:id/refund"),
            Self::UnknownStatus(s) => write!(f, "Unknown order status: {s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(qty: u32, unit: Decimal) -> OrderItem {
        OrderItem::new(Uuid::new_v4(), ProductSnapshot::default(), qty, unit, unit)
    }

    fn order(charges: Charges) -> Order {
        let shipping = Shipping { method: "standard".into(), cost: charges.shipping, ..Shipping::default() };
        Order::place(
            "KRV2410180001".into(),
            Customer { user_id: Some(Uuid::new_v4()), ..Customer::default() },
            vec![line(10, dec!(2.50)), line(4, dec!(1.25))],
            shipping,
            PaymentMethod::BankTransfer,
            charges,
            "GEL",
            OrderMetadata::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_order_workflow() {
        let mut o = order(Charges { prices_include_tax: true, shipping: dec!(5.99), ..Charges::default() });
        assert_eq!(o.pricing.subtotal, dec!(30.00));
        assert_eq!(o.pricing.total, dec!(35.99));
        assert_eq!(o.status, OrderStatus::Pending);
        assert!(o.can_be_cancelled());

        o.change_status(OrderStatus::Shipped, None, None).unwrap();
        assert!(!o.can_be_cancelled());
        assert_eq!(o.cancel(None, None), Err(OrderError::CannotCancel));
    }

    #[test]
    fn test_tax_added_when_prices_exclude_it() {
        let o = order(Charges { tax_rate: dec!(18), prices_include_tax: false, discount: dec!(1), ..Charges::default() });
        assert_eq!(o.pricing.tax.amount, dec!(5.40));
        assert_eq!(o.pricing.total, dec!(34.40));
    }

    #[test]
    fn test_total_never_negative() {
        let o = order(Charges { prices_include_tax: true, discount: dec!(100), ..Charges::default() });
        assert_eq!(o.pricing.total, Decimal::ZERO);
    }

    #[test]
    fn test_place_rejects_empty_order() {
        let r = Order::place("X".into(), Customer::default(), vec![], Shipping::default(), PaymentMethod::Card, Charges::default(), "GEL", OrderMetadata::default());
        assert_eq!(r.unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn test_history_appends_on_every_change() {
        let mut o = order(Charges::default());
        o.change_status(OrderStatus::Delivered, None, None).unwrap();
        assert_eq!(o.change_status(OrderStatus::Pending, Some("reopened".into()), None), Ok(Some(OrderStatus::Delivered)));
        assert_eq!(o.change_status(OrderStatus::Pending, None, None), Ok(None));
        let trail: Vec<_> = o.status_history.iter().map(|h| h.status).collect();
        assert_eq!(trail, vec![OrderStatus::Delivered, OrderStatus::Pending]);
        assert_eq!(o.status_history[0].note, "Status changed to delivered");
        assert_eq!(o.status_history[1].note, "reopened");
    }

    #[test]
    fn test_cancelled_order_cannot_reopen() {
        let mut o = order(Charges::default());
        assert_eq!(o.change_status(OrderStatus::Cancelled, None, None), Ok(Some(OrderStatus::Pending)));
        assert_eq!(o.payment.status, PaymentStatus::Cancelled);
        assert_eq!(
            o.change_status(OrderStatus::Pending, None, None),
            Err(OrderError::Closed(OrderStatus::Cancelled))
        );
        assert_eq!(o.change_status(OrderStatus::Cancelled, None, None), Ok(None));
        assert_eq!(o.status_history.len(), 1);
    }

    #[test]
    fn test_staff_cancel_after_customer_cancel_releases_nothing() {
        let mut o = order(Charges::default());
        o.cancel(o.customer.user_id, Some("changed my mind".into())).unwrap();
        let again = o.change_status(OrderStatus::Cancelled, Some("cancelled by staff".into()), None).unwrap();
        assert_eq!(again, None);
        assert!(!releases_stock(again, OrderStatus::Cancelled));
        assert_eq!(o.status_history.len(), 1);
    }

    #[test]
    fn test_only_the_move_into_cancelled_releases_stock() {
        assert!(releases_stock(Some(OrderStatus::Pending), OrderStatus::Cancelled));
        assert!(releases_stock(Some(OrderStatus::Shipped), OrderStatus::Cancelled));
        assert!(!releases_stock(Some(OrderStatus::Cancelled), OrderStatus::Cancelled));
        assert!(!releases_stock(None, OrderStatus::Cancelled));
        assert!(!releases_stock(Some(OrderStatus::Pending), OrderStatus::Confirmed));
    }

    #[test]
    fn test_refunded_is_not_a_plain_status_change() {
        let mut o = order(Charges::default());
        o.change_status(OrderStatus::Delivered, None, None).unwrap();
        o.record_payment("txn_1".into()).unwrap();
        assert_eq!(
            o.change_status(OrderStatus::Refunded, None, None),
            Err(OrderError::RefundOutsideRefundFlow)
        );
        assert_eq!(o.status, OrderStatus::Delivered);
        assert_eq!(o.payment.status, PaymentStatus::Completed);
    }

    #[test]
    fn test_refund_requires_delivery_and_payment() {
        let mut o = order(Charges::default());
        o.change_status(OrderStatus::Delivered, None, None).unwrap();
        assert!(!o.can_be_refunded());
        assert_eq!(o.refund(None), Err(OrderError::CannotRefund));
        o.record_payment("txn_1".into()).unwrap();
        assert!(o.refund(None).is_ok());
        assert_eq!(o.status, OrderStatus::Refunded);
        assert_eq!(o.payment.status, PaymentStatus::Refunded);
        assert_eq!(
            o.change_status(OrderStatus::Delivered, None, None),
            Err(OrderError::Closed(OrderStatus::Refunded))
        );
    }

    #[test]
    fn test_applied_discount_against_list_price() {
        let item = OrderItem::new(Uuid::new_v4(), ProductSnapshot::default(), 100, dec!(2.10), dec!(2.50));
        assert_eq!(item.total_price, dec!(210.00));
        assert_eq!(item.applied_discount, dec!(40.00));
    }

    #[test]
    fn test_order_numbers_increase_within_a_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let first = next_order_number("KRV", day, None);
        assert_eq!(first, "KRV2403070001");
        let second = next_order_number("KRV", day, Some(&first));
        assert_eq!(second, "KRV2403070002");
        assert!(second > first);
        assert_eq!(next_order_number("KRV", day, Some("KRV2403070999")), "KRV2403071000");
    }

    #[test]
    fn test_order_numbers_grow_past_four_digits() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(next_order_number("KRV", day, Some("KRV2403079999")), "KRV24030710000");
        assert_eq!(next_order_number("KRV", day, Some("KRV24030710000")), "KRV24030710001");
    }

    #[test]
    fn test_order_number_restarts_on_a_new_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        assert_eq!(next_order_number("KRV", day, Some("KRV2403070042")), "KRV2403080001");
        assert_eq!(next_order_number("KRV", day, Some("KRV240308abcd")), "KRV2403080001");
    }

    #[test]
    fn test_guest_customer_info() {
        let mut o = order(Charges::default());
        o.customer = Customer {
            user_id: None,
            guest: Some(GuestContact { first_name: "Nino".into(), last_name: "B".into(), email: "n@example.com".into(), phone: None }),
            is_guest: true,
        };
        let info = o.customer_info(None);
        assert!(info.is_guest);
        assert_eq!(info.name, "Nino B");
    }
}
