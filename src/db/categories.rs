use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection, PgPool};
use uuid::Uuid;

use super::decode_err;
use crate::domain::aggregates::category::{CategoryIcon, CategoryImage};
use crate::domain::aggregates::product::Seo;
use crate::domain::aggregates::{Category, CategoryTree};
use crate::domain::value_objects::LocalizedText;
use crate::{EcommerceError, Result};

const COLUMNS: &str = "id, name, slug, description, parent_id, children, image, icon, seo, status,
    featured, sort_order, product_count, created_by, updated_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: Json<LocalizedText>,
    slug: String,
    description: Json<LocalizedText>,
    parent_id: Option<Uuid>,
    children: Vec<Uuid>,
    image: Option<Json<CategoryImage>>,
    icon: Option<Json<CategoryIcon>>,
    seo: Json<Seo>,
    status: String,
    featured: bool,
    sort_order: i32,
    product_count: i64,
    created_by: Uuid,
    updated_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = sqlx::Error;

    fn try_from(r: CategoryRow) -> std::result::Result<Self, Self::Error> {
        Ok(Category {
            id: r.id,
            name: r.name.0,
            slug: r.slug,
            description: r.description.0,
            parent_id: r.parent_id,
            children: r.children,
            image: r.image.map(|j| j.0),
            icon: r.icon.map(|j| j.0),
            seo: r.seo.0,
            status: r.status.parse().map_err(decode_err)?,
            featured: r.featured,
            sort_order: r.sort_order,
            product_count: r.product_count,
            created_by: r.created_by,
            updated_by: r.updated_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn decode(rows: Vec<CategoryRow>) -> Result<Vec<Category>> {
    Ok(rows.into_iter().map(Category::try_from).collect::<std::result::Result<_, _>>()?)
}

pub async fn list(pool: &PgPool, include_inactive: bool) -> Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, CategoryRow>(&format!(
        "SELECT {COLUMNS} FROM categories
            WHERE $1 OR status = 'active'
            ORDER BY sort_order, name->>'en'"
    ))
    .bind(include_inactive)
    .fetch_all(pool)
    .await?;
    decode(rows)
}

pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Category>> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!("SELECT {COLUMNS} FROM categories WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Category::try_from).transpose()?)
}

/// Row-locks a category for the rest of the transaction.
pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<Category>> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!("SELECT {COLUMNS} FROM categories WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Category::try_from).transpose()?)
}

/// Parent pointers of the whole table
pub async fn tree(conn: &mut PgConnection) -> Result<CategoryTree> {
    let rows: Vec<(Uuid, Option<Uuid>, Json<LocalizedText>, String)> =
        sqlx::query_as("SELECT id, parent_id, name, slug FROM categories").fetch_all(conn).await?;
    let mut tree = CategoryTree::default();
    for (id, parent_id, name, slug) in rows {
        tree.insert(id, parent_id, name.0, slug);
    }
    Ok(tree)
}

pub async fn insert(conn: &mut PgConnection, c: &Category) -> Result<()> {
    sqlx::query(
        "INSERT INTO categories (id, name, slug, description, parent_id, children, image, icon, seo, status,
            featured, sort_order, product_count, created_by, updated_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(c.id)
    .bind(Json(&c.name))
    .bind(&c.slug)
    .bind(Json(&c.description))
    .bind(c.parent_id)
    .bind(&c.children)
    .bind(c.image.as_ref().map(Json))
    .bind(c.icon.as_ref().map(Json))
    .bind(Json(&c.seo))
    .bind(c.status.as_str())
    .bind(c.featured)
    .bind(c.sort_order)
    .bind(c.product_count)
    .bind(c.created_by)
    .bind(c.updated_by)
    .bind(c.created_at)
    .bind(c.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Writes every editable column. `children` and `product_count` are left to
/// the dedicated maintenance functions below.
pub async fn update(conn: &mut PgConnection, c: &Category) -> Result<()> {
    sqlx::query(
        "UPDATE categories SET name = $2, slug = $3, description = $4, parent_id = $5, image = $6, icon = $7,
            seo = $8, status = $9, featured = $10, sort_order = $11, updated_by = $12, updated_at = $13
            WHERE id = $1",
    )
    .bind(c.id)
    .bind(Json(&c.name))
    .bind(&c.slug)
    .bind(Json(&c.description))
    .bind(c.parent_id)
    .bind(c.image.as_ref().map(Json))
    .bind(c.icon.as_ref().map(Json))
    .bind(Json(&c.seo))
    .bind(c.status.as_str())
    .bind(c.featured)
    .bind(c.sort_order)
    .bind(c.updated_by)
    .bind(c.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn save_children(conn: &mut PgConnection, c: &Category) -> Result<()> {
    sqlx::query("UPDATE categories SET children = $2, updated_at = $3 WHERE id = $1")
        .bind(c.id)
        .bind(&c.children)
        .bind(c.updated_at)
        .execute(conn)
        .await?;
    Ok(())
}

/// Adds `child` to the children list of `parent_id`.
pub async fn attach_to_parent(conn: &mut PgConnection, parent_id: Uuid, child: Uuid) -> Result<()> {
    let mut parent = lock(conn, parent_id).await?.ok_or(EcommerceError::NotFound("Parent category"))?;
    if parent.attach_child(child) {
        save_children(conn, &parent).await?;
    }
    Ok(())
}

/// Removes `child` from the children list of `parent_id`; a vanished parent is ignored.
pub async fn detach_from_parent(conn: &mut PgConnection, parent_id: Uuid, child: Uuid) -> Result<()> {
    if let Some(mut parent) = lock(conn, parent_id).await? {
        if parent.detach_child(child) {
            save_children(conn, &parent).await?;
        }
    }
    Ok(())
}

/// Products pointing at the category as either category or subcategory
pub async fn referencing_products(conn: &mut PgConnection, id: Uuid) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = $1 OR subcategory_id = $1")
        .bind(id)
        .fetch_one(conn)
        .await?)
}

pub async fn child_count(conn: &mut PgConnection, id: Uuid) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE parent_id = $1")
        .bind(id)
        .fetch_one(conn)
        .await?)
}

pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Recomputes `product_count` for `touched` categories and all their ancestors.
///
/// A category counts the active products assigned to it or to any category in
/// its subtree, through either the category or the subcategory reference.
pub async fn refresh_product_counts(conn: &mut PgConnection, touched: &[Uuid]) -> Result<()> {
    let tree = tree(conn).await?;
    let mut ids = BTreeSet::new();
    for id in touched.iter().copied().filter(|id| tree.contains(*id)) {
        ids.insert(id);
        ids.extend(tree.ancestors(id));
    }

    for id in ids {
        let mut subtree = tree.descendants(id);
        subtree.push(id);
        sqlx::query(
            "UPDATE categories SET product_count = (
                SELECT COUNT(*) FROM products
                WHERE status = 'active' AND (category_id = ANY($2) OR subcategory_id = ANY($2))
            ) WHERE id = $1",
        )
        .bind(id)
        .bind(&subtree)
        .execute(&mut *conn)
        .await?;
    }
    tracing::debug!(touched = touched.len(), "category product counts refreshed");
    Ok(())
}
