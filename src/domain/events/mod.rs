//! Domain events
//!
//! Published on `ecommerce.<name>` subjects; the mailer and any other
//! downstream consumer subscribe there.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::order::{OrderStatus, PaymentMethod};
use crate::domain::value_objects::{Language, ProductCode};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    UserRegistered { user_id: Uuid, email: String, first_name: String, language: Language },
    PasswordResetRequested { user_id: Uuid, email: String, reset_url: String },
    OrderPlaced { order_id: Uuid, order_number: String, email: String, total: Decimal, currency: String },
    OrderStatusChanged { order_id: Uuid, order_number: String, from: OrderStatus, to: OrderStatus, email: Option<String> },
    PaymentCompleted { order_id: Uuid, transaction_id: String, method: PaymentMethod, amount: Decimal },
    StockDepleted { product_id: Uuid, code: ProductCode },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserRegistered { .. } => "user_registered",
            Self::PasswordResetRequested { .. } => "password_reset_requested",
            Self::OrderPlaced { .. } => "order_placed",
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::PaymentCompleted { .. } => "payment_completed",
            Self::StockDepleted { .. } => "stock_depleted",
        }
    }

    pub fn subject(&self) -> String { format!("ecommerce.{}", self.name()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_and_tag_agree() {
        let event = DomainEvent::StockDepleted { product_id: Uuid::nil(), code: ProductCode::new("box-1").unwrap() };
        assert_eq!(event.subject(), "ecommerce.stock_depleted");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stock_depleted");
        assert_eq!(json["code"], "BOX-1");
    }
}
