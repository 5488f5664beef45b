use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{decode_err, like_pattern, to_i32, to_u32, Page};
use crate::domain::aggregates::product::{
    Inventory, PriceSlot, Pricing, ProductImage, QuantityDiscount, Ratings, Sales, Seo, Specifications,
};
use crate::domain::aggregates::{Product, ProductStatus};
use crate::domain::value_objects::{LocalizedText, ProductCode};
use crate::Result;

const COLUMNS: &str = "id, name, slug, code, barcode, description, category_id, subcategory_id, images,
    price1, price2, price3, active_price, currency, quantity_discounts,
    stock, min_stock_level, max_stock_level, unit, track_inventory,
    specifications, seo, status, featured, tags, rating_average, rating_count, total_sold, revenue,
    created_by, updated_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: Json<LocalizedText>,
    slug: String,
    code: String,
    barcode: Option<String>,
    description: Json<LocalizedText>,
    category_id: Uuid,
    subcategory_id: Option<Uuid>,
    images: Json<Vec<ProductImage>>,
    price1: Decimal,
    price2: Option<Decimal>,
    price3: Option<Decimal>,
    active_price: String,
    currency: String,
    quantity_discounts: Json<Vec<QuantityDiscount>>,
    stock: i32,
    min_stock_level: i32,
    max_stock_level: Option<i32>,
    unit: String,
    track_inventory: bool,
    specifications: Json<Specifications>,
    seo: Json<Seo>,
    status: String,
    featured: bool,
    tags: Vec<String>,
    rating_average: Decimal,
    rating_count: i32,
    total_sold: i32,
    revenue: Decimal,
    created_by: Uuid,
    updated_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn slot_str(slot: PriceSlot) -> &'static str {
    match slot {
        PriceSlot::Price1 => "price1",
        PriceSlot::Price2 => "price2",
        PriceSlot::Price3 => "price3",
    }
}

fn parse_slot(s: &str) -> PriceSlot {
    match s {
        "price2" => PriceSlot::Price2,
        "price3" => PriceSlot::Price3,
        _ => PriceSlot::Price1,
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = sqlx::Error;

    fn try_from(r: ProductRow) -> std::result::Result<Self, Self::Error> {
        Ok(Product {
            id: r.id,
            name: r.name.0,
            slug: r.slug,
            code: ProductCode::new(r.code).map_err(decode_err)?,
            barcode: r.barcode,
            description: r.description.0,
            category_id: r.category_id,
            subcategory_id: r.subcategory_id,
            images: r.images.0,
            pricing: Pricing {
                price1: r.price1,
                price2: r.price2,
                price3: r.price3,
                active_price: parse_slot(&r.active_price),
                currency: r.currency,
            },
            quantity_discounts: r.quantity_discounts.0,
            inventory: Inventory {
                stock: to_u32(r.stock),
                min_stock_level: to_u32(r.min_stock_level),
                max_stock_level: r.max_stock_level.map(to_u32),
                unit: r.unit,
                track_inventory: r.track_inventory,
            },
            specifications: r.specifications.0,
            seo: r.seo.0,
            status: r.status.parse().map_err(decode_err)?,
            featured: r.featured,
            tags: r.tags,
            ratings: Ratings { average: r.rating_average, count: to_u32(r.rating_count) },
            sales: Sales { total_sold: to_u32(r.total_sold), revenue: r.revenue },
            created_by: r.created_by,
            updated_by: r.updated_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn decode(rows: Vec<ProductRow>) -> Result<Vec<Product>> {
    Ok(rows.into_iter().map(Product::try_from).collect::<std::result::Result<_, _>>()?)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    Featured,
}

impl ProductSort {
    /// Unknown values sort newest first.
    pub fn parse(s: &str) -> Self {
        match s {
            "oldest" => Self::Oldest,
            "price_asc" => Self::PriceAsc,
            "price_desc" => Self::PriceDesc,
            "name_asc" => Self::NameAsc,
            "name_desc" => Self::NameDesc,
            "featured" => Self::Featured,
            _ => Self::Newest,
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY created_at DESC",
            Self::Oldest => " ORDER BY created_at ASC",
            Self::PriceAsc => " ORDER BY price1 ASC, created_at DESC",
            Self::PriceDesc => " ORDER BY price1 DESC, created_at DESC",
            Self::NameAsc => " ORDER BY name->>'en' ASC",
            Self::NameDesc => " ORDER BY name->>'en' DESC",
            Self::Featured => " ORDER BY featured DESC, created_at DESC",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    /// Any-of; empty lists every status
    pub statuses: Vec<ProductStatus>,
    /// Matches the category or subcategory reference against any of these
    pub category_ids: Option<Vec<Uuid>>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    /// Any-of match
    pub tags: Vec<String>,
    pub sort: ProductSort,
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &ProductFilter) {
    qb.push(" WHERE TRUE");
    if !f.statuses.is_empty() {
        let statuses: Vec<String> = f.statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND status = ANY(").push_bind(statuses).push(")");
    }
    if let Some(ids) = &f.category_ids {
        qb.push(" AND (category_id = ANY(").push_bind(ids.clone());
        qb.push(") OR subcategory_id = ANY(").push_bind(ids.clone()).push("))");
    }
    if let Some(search) = f.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (name->>'en' ILIKE ").push_bind(pattern.clone());
        qb.push(" OR name->>'ka' ILIKE ").push_bind(pattern.clone());
        qb.push(" OR name->>'tr' ILIKE ").push_bind(pattern.clone());
        qb.push(" OR description->>'en' ILIKE ").push_bind(pattern.clone());
        qb.push(" OR description->>'ka' ILIKE ").push_bind(pattern.clone());
        qb.push(" OR description->>'tr' ILIKE ").push_bind(pattern.clone());
        qb.push(" OR code ILIKE ").push_bind(pattern.clone());
        qb.push(" OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t ILIKE ").push_bind(pattern).push("))");
    }
    if let Some(min) = f.min_price {
        qb.push(" AND price1 >= ").push_bind(min);
    }
    if let Some(max) = f.max_price {
        qb.push(" AND price1 <= ").push_bind(max);
    }
    if let Some(featured) = f.featured {
        qb.push(" AND featured = ").push_bind(featured);
    }
    if !f.tags.is_empty() {
        qb.push(" AND tags && ").push_bind(f.tags.clone());
    }
}

pub async fn list(pool: &PgPool, filter: &ProductFilter, page: Page) -> Result<(Vec<Product>, i64)> {
    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM products"));
    push_filter(&mut qb, filter);
    qb.push(filter.sort.order_by());
    qb.push(" LIMIT ").push_bind(page.limit()).push(" OFFSET ").push_bind(page.offset());
    let rows = qb.build_query_as::<ProductRow>().fetch_all(pool).await?;

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products");
    push_filter(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    Ok((decode(rows)?, total))
}

pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Product>> {
    let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {COLUMNS} FROM products WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Product::try_from).transpose()?)
}

pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Product>> {
    let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {COLUMNS} FROM products WHERE slug = $1"))
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Product::try_from).transpose()?)
}

/// Row-locks the given products, always in id order.
pub async fn lock_many(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    ))
    .bind(ids)
    .fetch_all(conn)
    .await?;
    decode(rows)
}

pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<Product>> {
    Ok(lock_many(conn, &[id]).await?.into_iter().next())
}

pub async fn insert(conn: &mut PgConnection, p: &Product) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO products ({COLUMNS}) VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
             $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33)"
    ))
    .bind(p.id)
    .bind(Json(&p.name))
    .bind(&p.slug)
    .bind(p.code.as_str())
    .bind(&p.barcode)
    .bind(Json(&p.description))
    .bind(p.category_id)
    .bind(p.subcategory_id)
    .bind(Json(&p.images))
    .bind(p.pricing.price1)
    .bind(p.pricing.price2)
    .bind(p.pricing.price3)
    .bind(slot_str(p.pricing.active_price))
    .bind(&p.pricing.currency)
    .bind(Json(&p.quantity_discounts))
    .bind(to_i32(p.inventory.stock))
    .bind(to_i32(p.inventory.min_stock_level))
    .bind(p.inventory.max_stock_level.map(to_i32))
    .bind(&p.inventory.unit)
    .bind(p.inventory.track_inventory)
    .bind(Json(&p.specifications))
    .bind(Json(&p.seo))
    .bind(p.status.as_str())
    .bind(p.featured)
    .bind(&p.tags)
    .bind(p.ratings.average)
    .bind(to_i32(p.ratings.count))
    .bind(to_i32(p.sales.total_sold))
    .bind(p.sales.revenue)
    .bind(p.created_by)
    .bind(p.updated_by)
    .bind(p.created_at)
    .bind(p.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Writes every catalog column; ratings and sales counters are not editable here.
pub async fn update(conn: &mut PgConnection, p: &Product) -> Result<()> {
    sqlx::query(
        "UPDATE products SET name = $2, slug = $3, code = $4, barcode = $5, description = $6,
            category_id = $7, subcategory_id = $8, images = $9, price1 = $10, price2 = $11, price3 = $12,
            active_price = $13, currency = $14, quantity_discounts = $15, stock = $16, min_stock_level = $17,
            max_stock_level = $18, unit = $19, track_inventory = $20, specifications = $21, seo = $22,
            status = $23, featured = $24, tags = $25, updated_by = $26, updated_at = $27
            WHERE id = $1",
    )
    .bind(p.id)
    .bind(Json(&p.name))
    .bind(&p.slug)
    .bind(p.code.as_str())
    .bind(&p.barcode)
    .bind(Json(&p.description))
    .bind(p.category_id)
    .bind(p.subcategory_id)
    .bind(Json(&p.images))
    .bind(p.pricing.price1)
    .bind(p.pricing.price2)
    .bind(p.pricing.price3)
    .bind(slot_str(p.pricing.active_price))
    .bind(&p.pricing.currency)
    .bind(Json(&p.quantity_discounts))
    .bind(to_i32(p.inventory.stock))
    .bind(to_i32(p.inventory.min_stock_level))
    .bind(p.inventory.max_stock_level.map(to_i32))
    .bind(&p.inventory.unit)
    .bind(p.inventory.track_inventory)
    .bind(Json(&p.specifications))
    .bind(Json(&p.seo))
    .bind(p.status.as_str())
    .bind(p.featured)
    .bind(&p.tags)
    .bind(p.updated_by)
    .bind(p.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Persists the outcome of `update_stock` / `record_sale`.
pub async fn save_stock(conn: &mut PgConnection, p: &Product) -> Result<()> {
    sqlx::query(
        "UPDATE products SET stock = $2, status = $3, total_sold = $4, revenue = $5, updated_at = $6
            WHERE id = $1",
    )
    .bind(p.id)
    .bind(to_i32(p.inventory.stock))
    .bind(p.status.as_str())
    .bind(to_i32(p.sales.total_sold))
    .bind(p.sales.revenue)
    .bind(p.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Returns the category references of the deleted product.
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<Option<(Uuid, Option<Uuid>)>> {
    Ok(sqlx::query_as("DELETE FROM products WHERE id = $1 RETURNING category_id, subcategory_id")
        .bind(id)
        .fetch_optional(conn)
        .await?)
}

/// Active, tracked products at or below their minimum stock level, emptiest first
pub async fn low_stock(pool: &PgPool, limit: i64) -> Result<Vec<Product>> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {COLUMNS} FROM products
            WHERE status = 'active' AND track_inventory AND stock <= min_stock_level
            ORDER BY stock ASC
            LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    decode(rows)
}

pub async fn count_by_status(pool: &PgPool, status: ProductStatus) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE status = $1")
        .bind(status.as_str())
        .fetch_one(pool)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parsing_defaults_to_newest() {
        assert_eq!(ProductSort::parse("price_desc"), ProductSort::PriceDesc);
        assert_eq!(ProductSort::parse("createdAt"), ProductSort::Newest);
    }

    #[test]
    fn test_price_slot_column_values() {
        for slot in [PriceSlot::Price1, PriceSlot::Price2, PriceSlot::Price3] {
            assert_eq!(parse_slot(slot_str(slot)), slot);
        }
    }

    #[test]
    fn test_filter_sql_binds_every_condition() {
        let filter = ProductFilter {
            statuses: ProductStatus::PUBLIC.to_vec(),
            search: Some("box".into()),
            tags: vec!["eco".into()],
            ..ProductFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM products");
        push_filter(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("status = ANY($1)"));
        assert!(sql.contains("code ILIKE $9"));
        assert!(sql.contains("tags && $11"));
    }
}
