use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{types::Json, Connection, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{decode_err, like_pattern, Page};
use crate::domain::aggregates::order::{
    next_order_number, order_number_day_prefix, Customer, OrderItem, OrderMetadata, OrderNotes, OrderPricing, Payment,
    Shipping, StatusChange,
};
use crate::domain::aggregates::{Order, OrderStatus};
use crate::domain::value_objects::LocalizedText;
use crate::{EcommerceError, Result};

const COLUMNS: &str = "id, order_number, user_id, customer, items, pricing, shipping, payment, status,
    status_history, notes, metadata, created_at, updated_at";

/// Statuses whose totals count as revenue
const REVENUE_STATUSES: &str = "('confirmed', 'processing', 'shipped', 'delivered')";

const NUMBER_ATTEMPTS: usize = 3;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Option<Uuid>,
    customer: Json<Customer>,
    items: Json<Vec<OrderItem>>,
    pricing: Json<OrderPricing>,
    shipping: Json<Shipping>,
    payment: Json<Payment>,
    status: String,
    status_history: Json<Vec<StatusChange>>,
    notes: Json<OrderNotes>,
    metadata: Json<OrderMetadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = sqlx::Error;

    fn try_from(r: OrderRow) -> std::result::Result<Self, Self::Error> {
        let mut customer = r.customer.0;
        customer.user_id = r.user_id;
        Ok(Order {
            id: r.id,
            order_number: r.order_number,
            customer,
            items: r.items.0,
            pricing: r.pricing.0,
            shipping: r.shipping.0,
            payment: r.payment.0,
            status: r.status.parse().map_err(decode_err)?,
            status_history: r.status_history.0,
            notes: r.notes.0,
            metadata: r.metadata.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn decode(rows: Vec<OrderRow>) -> Result<Vec<Order>> {
    Ok(rows.into_iter().map(Order::try_from).collect::<std::result::Result<_, _>>()?)
}

/// Longer numbers sort first so the sequence keeps climbing past 9999.
const LAST_NUMBER_FOR_DAY: &str = "SELECT order_number FROM orders WHERE left(order_number, length($1)) = $1
    ORDER BY length(order_number) DESC, order_number DESC LIMIT 1";

/// Highest order number issued under `day_prefix`
pub async fn last_number_for_day(conn: &mut PgConnection, day_prefix: &str) -> Result<Option<String>> {
    Ok(sqlx::query_scalar(LAST_NUMBER_FOR_DAY).bind(day_prefix).fetch_optional(conn).await?)
}

async fn insert_row(conn: &mut PgConnection, o: &Order) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, order_number, user_id, customer, items, pricing, total, shipping, tracking_number,
            payment, status, status_history, notes, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
    )
    .bind(o.id)
    .bind(&o.order_number)
    .bind(o.customer.user_id)
    .bind(Json(&o.customer))
    .bind(Json(&o.items))
    .bind(Json(&o.pricing))
    .bind(o.pricing.total)
    .bind(Json(&o.shipping))
    .bind(&o.shipping.tracking_number)
    .bind(Json(&o.payment))
    .bind(o.status.as_str())
    .bind(Json(&o.status_history))
    .bind(Json(&o.notes))
    .bind(Json(&o.metadata))
    .bind(o.created_at)
    .bind(o.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

fn is_number_clash(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map_or(false, |d| d.is_unique_violation() && d.constraint() == Some("orders_order_number_key"))
}

/// Numbers and inserts a new order.
///
/// The number is the next one for today under `prefix`. Each attempt runs in a
/// savepoint; when a concurrent insert took the number first, the savepoint is
/// rolled back and a fresh number is computed.
pub async fn insert(conn: &mut PgConnection, order: &mut Order, prefix: &str) -> Result<()> {
    let today: NaiveDate = Utc::now().date_naive();
    let day = order_number_day_prefix(prefix, today);

    for attempt in 1..=NUMBER_ATTEMPTS {
        let last = last_number_for_day(conn, &day).await?;
        order.order_number = next_order_number(prefix, today, last.as_deref());

        let mut savepoint = conn.begin().await?;
        match insert_row(&mut savepoint, order).await {
            Ok(()) => {
                savepoint.commit().await?;
                return Ok(());
            }
            Err(e) if is_number_clash(&e) => {
                savepoint.rollback().await?;
                tracing::debug!(order_number = %order.order_number, attempt, "order number taken, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(EcommerceError::Conflict("Could not allocate an order number, please retry".into()))
}

/// Writes back the mutable parts of an order.
pub async fn save(conn: &mut PgConnection, o: &Order) -> Result<()> {
    sqlx::query(
        "UPDATE orders SET items = $2, pricing = $3, total = $4, shipping = $5, tracking_number = $6, payment = $7,
            status = $8, status_history = $9, notes = $10, updated_at = $11
            WHERE id = $1",
    )
    .bind(o.id)
    .bind(Json(&o.items))
    .bind(Json(&o.pricing))
    .bind(o.pricing.total)
    .bind(Json(&o.shipping))
    .bind(&o.shipping.tracking_number)
    .bind(Json(&o.payment))
    .bind(o.status.as_str())
    .bind(Json(&o.status_history))
    .bind(Json(&o.notes))
    .bind(o.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Order::try_from).transpose()?)
}

pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Order::try_from).transpose()?)
}

pub async fn find_by_tracking(pool: &PgPool, tracking_number: &str) -> Result<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {COLUMNS} FROM orders WHERE tracking_number = $1 ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(tracking_number)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Order::try_from).transpose()?)
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid, page: Page) -> Result<(Vec<Order>, i64)> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok((decode(rows)?, total))
}

#[derive(Debug, Default)]
pub struct OrderFilter {
    /// Order number, guest email or shipping contact
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub oldest_first: bool,
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(search) = f.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (order_number ILIKE ").push_bind(pattern.clone());
        qb.push(" OR customer->'guest'->>'email' ILIKE ").push_bind(pattern.clone());
        qb.push(" OR shipping->'address'->>'email' ILIKE ").push_bind(pattern.clone());
        qb.push(" OR shipping->'address'->>'firstName' ILIKE ").push_bind(pattern.clone());
        qb.push(" OR shipping->'address'->>'lastName' ILIKE ").push_bind(pattern).push(")");
    }
    if let Some(status) = f.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

pub async fn list(pool: &PgPool, filter: &OrderFilter, page: Page) -> Result<(Vec<Order>, i64)> {
    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM orders"));
    push_filter(&mut qb, filter);
    qb.push(if filter.oldest_first { " ORDER BY created_at ASC" } else { " ORDER BY created_at DESC" });
    qb.push(" LIMIT ").push_bind(page.limit()).push(" OFFSET ").push_bind(page.offset());
    let rows = qb.build_query_as::<OrderRow>().fetch_all(pool).await?;

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM orders");
    push_filter(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    Ok((decode(rows)?, total))
}

/// Orders created at or after `since`; every order when `None`
pub async fn count_since(pool: &PgPool, since: Option<DateTime<Utc>>) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE $1::timestamptz IS NULL OR created_at >= $1")
        .bind(since)
        .fetch_one(pool)
        .await?)
}

pub async fn count_by_status(pool: &PgPool, status: OrderStatus) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = $1")
        .bind(status.as_str())
        .fetch_one(pool)
        .await?)
}

/// Sum of revenue-status order totals created at or after `since`
pub async fn revenue_since(pool: &PgPool, since: Option<DateTime<Utc>>) -> Result<Decimal> {
    Ok(sqlx::query_scalar(&format!(
        "SELECT COALESCE(SUM(total), 0) FROM orders
            WHERE status IN {REVENUE_STATUSES} AND ($1::timestamptz IS NULL OR created_at >= $1)"
    ))
    .bind(since)
    .fetch_one(pool)
    .await?)
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DailySales {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: Decimal,
}

pub async fn daily_sales(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<DailySales>> {
    Ok(sqlx::query_as(&format!(
        "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS orders, COALESCE(SUM(total), 0) AS revenue
            FROM orders
            WHERE status IN {REVENUE_STATUSES} AND created_at >= $1
            GROUP BY 1 ORDER BY 1"
    ))
    .bind(since)
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: LocalizedText,
    pub quantity: i64,
    pub revenue: Decimal,
}

/// Best sellers by quantity over revenue-status orders since `since`
pub async fn top_products(pool: &PgPool, since: DateTime<Utc>, limit: i64) -> Result<Vec<TopProduct>> {
    let rows: Vec<(Uuid, Json<LocalizedText>, i64, Decimal)> = sqlx::query_as(&format!(
        "SELECT (item->>'productId')::uuid AS product_id,
                (ARRAY_AGG(item->'productSnapshot'->'name' ORDER BY o.created_at DESC))[1] AS name,
                SUM((item->>'quantity')::bigint)::bigint AS quantity,
                SUM((item->>'totalPrice')::numeric) AS revenue
            FROM orders o, jsonb_array_elements(o.items) AS item
            WHERE o.status IN {REVENUE_STATUSES} AND o.created_at >= $1
            GROUP BY 1
            ORDER BY quantity DESC
            LIMIT $2"
    ))
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(product_id, name, quantity, revenue)| TopProduct { product_id, name: name.0, quantity, revenue })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revenue_statuses_match_domain() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            let listed = REVENUE_STATUSES.contains(&format!("'{}'", status.as_str()));
            assert_eq!(listed, status.is_revenue(), "{status}");
        }
    }

    #[test]
    fn test_order_filter_searches_contacts() {
        let filter = OrderFilter { search: Some("KRV24".into()), status: Some(OrderStatus::Shipped), oldest_first: false };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM orders");
        push_filter(&mut qb, &filter);
        assert!(qb.sql().contains("order_number ILIKE $1"));
        assert!(qb.sql().contains("status = $6"));
    }

    #[test]
    fn test_last_number_matches_prefix_literally() {
        assert!(!LAST_NUMBER_FOR_DAY.contains("LIKE"));
        assert!(LAST_NUMBER_FOR_DAY.contains("left(order_number, length($1)) = $1"));
        assert!(LAST_NUMBER_FOR_DAY.contains("ORDER BY length(order_number) DESC, order_number DESC"));
    }
}
