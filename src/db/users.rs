use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{decode_err, like_pattern, Page};
use crate::domain::aggregates::user::{Address, Preferences};
use crate::domain::aggregates::{Role, User, UserStatus};
use crate::Result;

const COLUMNS: &str = "id, first_name, last_name, email, phone, password_hash, role, status,
    is_email_verified, address, preferences, last_login_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    password_hash: String,
    role: String,
    status: String,
    is_email_verified: bool,
    address: Json<Address>,
    preferences: Json<Preferences>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = sqlx::Error;

    fn try_from(r: UserRow) -> std::result::Result<Self, Self::Error> {
        Ok(User {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            phone: r.phone,
            password_hash: r.password_hash,
            role: r.role.parse().map_err(decode_err)?,
            status: r.status.parse().map_err(decode_err)?,
            is_email_verified: r.is_email_verified,
            address: r.address.0,
            preferences: r.preferences.0,
            last_login_at: r.last_login_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn decode(rows: Vec<UserRow>) -> Result<Vec<User>> {
    Ok(rows.into_iter().map(User::try_from).collect::<std::result::Result<_, _>>()?)
}

pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: Role,
    pub preferences: Preferences,
}

/// Emails are stored lower-cased; the unique constraint makes a taken email a conflict.
pub async fn insert(pool: &PgPool, new: NewUser<'_>) -> Result<User> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (id, first_name, last_name, email, phone, password_hash, role, preferences)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}"
    ))
    .bind(Uuid::now_v7())
    .bind(new.first_name.trim())
    .bind(new.last_name.trim())
    .bind(new.email.trim().to_lowercase())
    .bind(new.phone)
    .bind(new.password_hash)
    .bind(new.role.as_str())
    .bind(Json(&new.preferences))
    .fetch_one(pool)
    .await?;
    Ok(User::try_from(row)?)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(User::try_from).transpose()?)
}

/// Current role and status, read on every authenticated request
pub async fn access(pool: &PgPool, id: Uuid) -> Result<Option<(Role, UserStatus)>> {
    let row: Option<(String, String)> = sqlx::query_as("SELECT role, status FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let Some((role, status)) = row else { return Ok(None) };
    let role: Role = role.parse().map_err(decode_err)?;
    let status: UserStatus = status.parse().map_err(decode_err)?;
    Ok(Some((role, status)))
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;
    Ok(row.map(User::try_from).transpose()?)
}

pub async fn record_login(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

/// Fields a user may change on their own profile; `None` keeps the stored value
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub preferences: Option<Preferences>,
}

pub async fn update_profile(pool: &PgPool, id: Uuid, update: ProfileUpdate) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone = COALESCE($4, phone),
            address = COALESCE($5, address),
            preferences = COALESCE($6, preferences),
            updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(update.first_name)
    .bind(update.last_name)
    .bind(update.phone)
    .bind(update.address.map(Json))
    .bind(update.preferences.map(Json))
    .fetch_optional(pool)
    .await?;
    Ok(row.map(User::try_from).transpose()?)
}

pub async fn set_password(conn: &mut PgConnection, id: Uuid, password_hash: &str) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_status(pool: &PgPool, id: Uuid, status: UserStatus) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(User::try_from).transpose()?)
}

pub async fn set_role(pool: &PgPool, id: Uuid, role: Role) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(role.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(User::try_from).transpose()?)
}

#[derive(Debug, Default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub oldest_first: bool,
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &UserFilter) {
    qb.push(" WHERE TRUE");
    if let Some(search) = f.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (first_name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR last_name ILIKE ").push_bind(pattern.clone());
        qb.push(" OR email ILIKE ").push_bind(pattern).push(")");
    }
    if let Some(role) = f.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(status) = f.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

pub async fn list(pool: &PgPool, filter: &UserFilter, page: Page) -> Result<(Vec<User>, i64)> {
    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM users"));
    push_filter(&mut qb, filter);
    qb.push(if filter.oldest_first { " ORDER BY created_at ASC" } else { " ORDER BY created_at DESC" });
    qb.push(" LIMIT ").push_bind(page.limit()).push(" OFFSET ").push_bind(page.offset());
    let rows = qb.build_query_as::<UserRow>().fetch_all(pool).await?;

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users");
    push_filter(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    Ok((decode(rows)?, total))
}

pub async fn count_active(pool: &PgPool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE status = 'active'").fetch_one(pool).await?)
}

pub async fn count_created_since(pool: &PgPool, since: DateTime<Utc>) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE created_at >= $1").bind(since).fetch_one(pool).await?)
}

/// (first name, last name, email, phone) of a registered customer
pub async fn contact(pool: &PgPool, id: Uuid) -> Result<Option<(String, String, String, Option<String>)>> {
    Ok(sqlx::query_as("SELECT first_name, last_name, email, phone FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?)
}
