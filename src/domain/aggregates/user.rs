//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::value_objects::Language;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub is_email_verified: bool,
    pub address: Address,
    pub preferences: Preferences,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Customer => "customer", Self::Manager => "manager", Self::Admin => "admin" }
    }
    pub fn is_staff(&self) -> bool { matches!(self, Self::Manager | Self::Admin) }
}

impl FromStr for Role {
    type Err = UserError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            other => Err(UserError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "active", Self::Inactive => "inactive", Self::Suspended => "suspended" }
    }
}

impl FromStr for UserStatus {
    type Err = UserError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "suspended" => Ok(Self::Suspended),
            other => Err(UserError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub language: Language,
    #[serde(default = "crate::domain::aggregates::product::default_currency")]
    pub currency: String,
    #[serde(default)]
    pub notifications: Notifications,
}

impl Default for Preferences {
    fn default() -> Self {
        Self { language: Language::default(), currency: crate::domain::aggregates::product::default_currency(), notifications: Notifications::default() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notifications { pub email: bool, pub sms: bool, pub push: bool }

impl Default for Notifications {
    fn default() -> Self { Self { email: true, sms: false, push: true } }
}

impl User {
    pub fn can_sign_in(&self) -> bool { self.status == UserStatus::Active }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserError { UnknownRole(String), UnknownStatus(String) }
impl std::error::Error for UserError {}
impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRole(r) => write!(f, "Unknown role: {r}"),
            Self::UnknownStatus(s) => write!(f, "Unknown user status: {s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("root".parse::<Role>().is_err());
        assert!(Role::Admin.is_staff());
        assert!(!Role::Customer.is_staff());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(), first_name: "Giorgi".into(), last_name: "K".into(), email: "g@example.com".into(),
            phone: None, password_hash: "secret-hash".into(), role: Role::Customer, status: UserStatus::Suspended,
            is_email_verified: false, address: Address::default(), preferences: Preferences::default(),
            last_login_at: None, created_at: now, updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!user.can_sign_in());
    }
}
