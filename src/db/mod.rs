//! PostgreSQL access
//!
//! Free functions per table, taking a `&PgPool` for standalone reads and a
//! `&mut PgConnection` for anything that runs inside a caller's transaction.
//! Rows are decoded into domain aggregates here; nothing above this layer sees
//! SQL types.

pub mod categories;
pub mod orders;
pub mod password_resets;
pub mod products;
pub mod settings;
pub mod users;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
}

pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// One page of a listing; `page` is 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.limit) }

    pub fn limit(&self) -> i64 { i64::from(self.limit) }
}

/// `%needle%` with LIKE wildcards in the needle escaped
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') { out.push('\\'); }
        out.push(ch);
    }
    out.push('%');
    out
}

/// Decode failure for a column that holds a domain enum
pub(crate) fn decode_err(e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

pub(crate) fn to_u32(v: i32) -> u32 { u32::try_from(v).unwrap_or(0) }

pub(crate) fn to_i32(v: u32) -> i32 { i32::try_from(v).unwrap_or(i32::MAX) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(Page::new(None, None, 10), Page { page: 1, limit: 10 });
        assert_eq!(Page::new(Some(0), Some(1_000), 10), Page { page: 1, limit: 100 });
        assert_eq!(Page::new(Some(3), Some(20), 10).offset(), 40);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("box"), "%box%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
