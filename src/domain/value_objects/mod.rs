//! Value Objects for the wholesale catalog

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog code printed on price lists and invoices.
///
/// Codes are upper-case ASCII letters and digits, optionally split by `-`,
/// `_`, `.` or `/`, and start with a letter or digit. Inner whitespace runs
/// become a single `-`, so "box 01" and "BOX-01" name the same product.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductCode(String);

const CODE_SEPARATORS: [char; 4] = ['-', '_', '.', '/'];

impl ProductCode {
    pub const MAX_LEN: usize = 50;

    pub fn new(value: impl Into<String>) -> Result<Self, ProductCodeError> {
        let value = value.into().split_whitespace().collect::<Vec<_>>().join("-").to_ascii_uppercase();
        let Some(first) = value.chars().next() else { return Err(ProductCodeError::Empty) };
        if value.len() > Self::MAX_LEN { return Err(ProductCodeError::TooLong); }
        if !first.is_ascii_alphanumeric() { return Err(ProductCodeError::InvalidCharacter(first)); }
        if let Some(bad) = value.chars().find(|c| !c.is_ascii_alphanumeric() && !CODE_SEPARATORS.contains(c)) {
            return Err(ProductCodeError::InvalidCharacter(bad));
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for ProductCode {
    type Error = ProductCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<ProductCode> for String {
    fn from(code: ProductCode) -> Self { code.0 }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductCodeError { Empty, TooLong, InvalidCharacter(char) }
impl std::error::Error for ProductCodeError {}
impl fmt::Display for ProductCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Product code is required"),
            Self::TooLong => write!(f, "Product code is longer than {} characters", ProductCode::MAX_LEN),
            Self::InvalidCharacter(c) => write!(f, "Product code cannot contain '{c}'"),
        }
    }
}

/// Languages the storefront is translated into
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ka,
    En,
    Tr,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Ka => "ka", Self::En => "en", Self::Tr => "tr" }
    }
}

impl FromStr for Language {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ka" => Ok(Self::Ka),
            "en" => Ok(Self::En),
            "tr" => Ok(Self::Tr),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

/// Text carried in every storefront language.
///
/// Georgian and English are mandatory for catalog entries, Turkish is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub ka: String,
    #[serde(default)]
    pub en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tr: Option<String>,
}

impl LocalizedText {
    pub fn new(ka: impl Into<String>, en: impl Into<String>) -> Self {
        Self { ka: ka.into(), en: en.into(), tr: None }
    }

    pub fn get(&self, lang: Language) -> Option<&str> {
        let value = match lang {
            Language::Ka => Some(self.ka.as_str()),
            Language::En => Some(self.en.as_str()),
            Language::Tr => self.tr.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// First non-empty translation in display order: en, ka, tr.
    pub fn display(&self) -> &str {
        self.get(Language::En)
            .or_else(|| self.get(Language::Ka))
            .or_else(|| self.get(Language::Tr))
            .unwrap_or("")
    }

    pub fn is_complete(&self) -> bool {
        !self.ka.trim().is_empty() && !self.en.trim().is_empty()
    }
}

/// URL slug derived from a display name.
///
/// Lower-cases ASCII alphanumerics, collapses every other run of characters into a
/// single `-`, and trims dashes at both ends.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() { slug.push('-'); }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if matches!(ch, '\'' | '"' | '.' | '(' | ')' | '*' | '+' | '~' | '!' | ':' | '@') {
            // dropped without acting as a separator
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_code() { let code = ProductCode::new(" box-001 ").unwrap(); assert_eq!(code.as_str(), "BOX-001"); }

    #[test]
    fn test_product_code_rejects_empty() { assert_eq!(ProductCode::new("   "), Err(ProductCodeError::Empty)); }

    #[test]
    fn test_product_code_joins_words_and_keeps_separators() {
        assert_eq!(ProductCode::new("cup  250 ml").unwrap().as_str(), "CUP-250-ML");
        assert_eq!(ProductCode::new("pk_10/a.2").unwrap().as_str(), "PK_10/A.2");
        assert_eq!(ProductCode::new("box 01"), ProductCode::new("BOX-01"));
    }

    #[test]
    fn test_product_code_character_set() {
        assert_eq!(ProductCode::new("ყუთი-1"), Err(ProductCodeError::InvalidCharacter('ყ')));
        assert_eq!(ProductCode::new("-BOX"), Err(ProductCodeError::InvalidCharacter('-')));
        assert_eq!(ProductCode::new("BOX#1"), Err(ProductCodeError::InvalidCharacter('#')));
        assert_eq!(ProductCode::new("A".repeat(51)), Err(ProductCodeError::TooLong));
        assert!(ProductCode::new("A".repeat(50)).is_ok());
    }

    #[test]
    fn test_display_falls_back_to_georgian() {
        let text = LocalizedText { ka: "ყუთი".into(), en: String::new(), tr: Some("Kutu".into()) };
        assert_eq!(text.display(), "ყუთი");
        assert!(!text.is_complete());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Paper Bags & Boxes"), "paper-bags-boxes");
        assert_eq!(slugify("  Food (Grade) Containers!  "), "food-grade-containers");
        assert_eq!(slugify("Don't stop"), "dont-stop");
    }
}
