//! Payment capture rules
//!
//! Gateways are not integrated; a payment is accepted when the method is enabled
//! and the amount matches the order total, and is then recorded on the order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::domain::aggregates::order::{Order, OrderError, PaymentMethod, PaymentStatus};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub id: String,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub payment_id: String,
    pub transaction_id: String,
    pub status: &'static str,
    pub verified_at: DateTime<Utc>,
}

/// Captures `amount` for `order` and records the transaction on it.
pub fn capture(order: &mut Order, method: PaymentMethod, amount: Decimal, enabled: &[PaymentMethod]) -> Result<PaymentReceipt, PaymentError> {
    if !enabled.contains(&method) { return Err(PaymentError::MethodDisabled(method)); }
    if amount != order.pricing.total { return Err(PaymentError::AmountMismatch { expected: order.pricing.total, got: amount }); }

    let transaction_id = format!("txn_{}", Uuid::new_v4().simple());
    order.record_payment(transaction_id.clone()).map_err(PaymentError::Order)?;
    order.payment.method = method;

    Ok(PaymentReceipt {
        id: format!("pay_{}", order.id.simple()),
        order_id: order.id,
        amount,
        payment_method: method,
        status: order.payment.status,
        transaction_id,
        processed_at: order.payment.payment_date.unwrap_or_else(Utc::now),
    })
}

/// Confirms that `transaction_id` is the one recorded on the paid order.
pub fn verify(order: &Order, payment_id: &str, transaction_id: &str) -> Result<Verification, PaymentError> {
    let recorded = order.payment.status == PaymentStatus::Completed
        && order.payment.transaction_id.as_deref() == Some(transaction_id);
    if !recorded { return Err(PaymentError::UnknownTransaction); }
    Ok(Verification { payment_id: payment_id.to_string(), transaction_id: transaction_id.to_string(), status: "verified", verified_at: Utc::now() })
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentError {
    MethodDisabled(PaymentMethod),
    AmountMismatch { expected: Decimal, got: Decimal },
    UnknownTransaction,
    Order(OrderError),
}
impl std::error::Error for PaymentError {}
impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MethodDisabled(m) => write!(f, "Payment method {} is not available", m.as_str()),
            Self::AmountMismatch { expected, got } => write!(f, "Amount {got} does not match order total {expected}"),
            Self::UnknownTransaction => write!(f, "Transaction not found for this order"),
            Self::Order(e) => write!(f, "{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::{Charges, Customer, OrderItem, OrderMetadata, ProductSnapshot, Shipping};
    use rust_decimal_macros::dec;

    fn order() -> Order {
        let item = OrderItem::new(Uuid::new_v4(), ProductSnapshot::default(), 2, dec!(10), dec!(10));
        Order::place("KRV2401010001".into(), Customer::default(), vec![item], Shipping::default(), PaymentMethod::BankTransfer, Charges { prices_include_tax: true, ..Charges::default() }, "GEL", OrderMetadata::default()).unwrap()
    }

    #[test]
    fn test_capture_records_transaction() {
        let mut o = order();
        let receipt = capture(&mut o, PaymentMethod::Card, dec!(20), &[PaymentMethod::Card]).unwrap();
        assert_eq!(o.payment.status, PaymentStatus::Completed);
        assert_eq!(o.payment.method, PaymentMethod::Card);
        assert!(verify(&o, &receipt.id, &receipt.transaction_id).is_ok());
        assert_eq!(verify(&o, &receipt.id, "txn_other").unwrap_err(), PaymentError::UnknownTransaction);
    }

    #[test]
    fn test_capture_rejects_wrong_amount_and_double_payment() {
        let mut o = order();
        assert!(matches!(capture(&mut o, PaymentMethod::Card, dec!(19.99), &[PaymentMethod::Card]), Err(PaymentError::AmountMismatch { .. })));
        capture(&mut o, PaymentMethod::Card, dec!(20), &[PaymentMethod::Card]).unwrap();
        assert_eq!(capture(&mut o, PaymentMethod::Card, dec!(20), &[PaymentMethod::Card]).unwrap_err(), PaymentError::Order(OrderError::AlreadyPaid));
    }

    #[test]
    fn test_capture_rejects_disabled_method() {
        let mut o = order();
        assert_eq!(capture(&mut o, PaymentMethod::TbcBank, dec!(20), &[PaymentMethod::Card]).unwrap_err(), PaymentError::MethodDisabled(PaymentMethod::TbcBank));
    }
}
