//! Category endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{created, message, ok, ok_with, rule, ApiResponse, ValidJson};
use crate::auth::{Admin, MaybeUser, Staff};
use crate::db;
use crate::domain::aggregates::category::{CategoryIcon, CategoryImage};
use crate::domain::aggregates::product::Seo;
use crate::domain::aggregates::{Category, CategoryStatus, Crumb};
use crate::domain::value_objects::{slugify, LocalizedText};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::EcommerceError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuery {
    pub include_inactive: Option<bool>,
}

/// GET /api/categories
///
/// Inactive categories are listed only for staff asking for them.
pub async fn list(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(q): Query<CategoryQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Category>>>> {
    let include_inactive = q.include_inactive.unwrap_or(false) && user.as_ref().is_some_and(|u| u.is_staff());
    Ok(ok(db::categories::list(&state.db, include_inactive).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetail {
    pub category: Category,
    pub breadcrumb: Vec<Crumb>,
    /// Every category below this one, depth-first
    pub subcategory_ids: Vec<Uuid>,
}

/// GET /api/categories/:id
pub async fn get(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<CategoryDetail>>> {
    let staff = user.as_ref().is_some_and(|u| u.is_staff());
    let category = db::categories::find(&state.db, id)
        .await?
        .filter(|c| staff || c.status == CategoryStatus::Active)
        .ok_or(EcommerceError::NotFound("Category"))?;

    let mut conn = state.db.acquire().await?;
    let tree = db::categories::tree(&mut conn).await?;
    Ok(ok(CategoryDetail { breadcrumb: tree.breadcrumb(id), subcategory_ids: tree.descendants(id), category }))
}

fn complete_name(name: &LocalizedText) -> Result<(), ValidationError> {
    if name.is_complete() { Ok(()) } else { Err(rule("incomplete", "Georgian and English names are required")) }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(custom = "complete_name")]
    pub name: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    pub parent_id: Option<Uuid>,
    pub image: Option<CategoryImage>,
    pub icon: Option<CategoryIcon>,
    #[serde(default)]
    pub seo: Seo,
    #[serde(default)]
    pub status: CategoryStatus,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub sort_order: i32,
}

/// POST /api/categories
pub async fn create(
    State(state): State<AppState>,
    Staff(user): Staff,
    ValidJson(req): ValidJson<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Category>>)> {
    let slug = slugify(&req.name.en);
    if slug.is_empty() {
        return Err(ApiError::bad_request("English name must contain letters or digits"));
    }

    let now = Utc::now();
    let category = Category {
        id: Uuid::now_v7(),
        name: req.name,
        slug,
        description: req.description,
        parent_id: req.parent_id,
        children: vec![],
        image: req.image,
        icon: req.icon,
        seo: req.seo,
        status: req.status,
        featured: req.featured,
        sort_order: req.sort_order,
        product_count: 0,
        created_by: user.id,
        updated_by: None,
        created_at: now,
        updated_at: now,
    };

    let mut tx = state.db.begin().await?;
    if let Some(parent_id) = category.parent_id {
        db::categories::lock(&mut tx, parent_id).await?.ok_or(EcommerceError::NotFound("Parent category"))?;
    }
    db::categories::insert(&mut tx, &category).await?;
    if let Some(parent_id) = category.parent_id {
        db::categories::attach_to_parent(&mut tx, parent_id, category.id).await?;
    }
    tx.commit().await?;

    tracing::info!(category_id = %category.id, name = category.name.display(), parent_id = ?category.parent_id, "category created");
    Ok(created("Category created successfully", category))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[validate(custom = "complete_name")]
    pub name: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    /// `null` moves the category to the top level
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub image: Option<CategoryImage>,
    pub icon: Option<CategoryIcon>,
    pub seo: Option<Seo>,
    pub status: Option<CategoryStatus>,
    pub featured: Option<bool>,
    pub sort_order: Option<i32>,
}

fn double_option<'de, D>(de: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<Uuid>::deserialize(de).map(Some)
}

impl UpdateCategoryRequest {
    fn apply(self, c: &mut Category) -> crate::Result<()> {
        if let Some(name) = self.name {
            c.slug = slugify(&name.en);
            if c.slug.is_empty() {
                return Err(EcommerceError::Invalid("English name must contain letters or digits".into()));
            }
            c.name = name;
        }
        if let Some(v) = self.description { c.description = v; }
        if let Some(v) = self.parent_id { c.parent_id = v; }
        if let Some(v) = self.image { c.image = Some(v); }
        if let Some(v) = self.icon { c.icon = Some(v); }
        if let Some(v) = self.seo { c.seo = v; }
        if let Some(v) = self.status { c.status = v; }
        if let Some(v) = self.featured { c.featured = v; }
        if let Some(v) = self.sort_order { c.sort_order = v; }
        Ok(())
    }
}

/// PUT /api/categories/:id
///
/// Re-parenting keeps both parents' children lists and the product counts of
/// both branches current.
pub async fn update(
    State(state): State<AppState>,
    Staff(user): Staff,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateCategoryRequest>,
) -> ApiResult<Json<ApiResponse<Category>>> {
    let mut tx = state.db.begin().await?;
    let mut category = db::categories::lock(&mut tx, id).await?.ok_or(EcommerceError::NotFound("Category"))?;
    let old_parent = category.parent_id;

    req.apply(&mut category)?;
    category.updated_by = Some(user.id);
    category.updated_at = Utc::now();

    if category.parent_id != old_parent {
        if let Some(new_parent) = category.parent_id {
            let tree = db::categories::tree(&mut tx).await?;
            if !tree.contains(new_parent) {
                return Err(EcommerceError::NotFound("Parent category").into());
            }
            if tree.would_cycle(id, new_parent) {
                return Err(EcommerceError::CategoryCycle.into());
            }
        }
    }

    db::categories::update(&mut tx, &category).await?;
    if category.parent_id != old_parent {
        if let Some(old) = old_parent {
            db::categories::detach_from_parent(&mut tx, old, id).await?;
        }
        if let Some(new) = category.parent_id {
            db::categories::attach_to_parent(&mut tx, new, id).await?;
        }
        let touched: Vec<Uuid> = std::iter::once(id).chain(old_parent).chain(category.parent_id).collect();
        db::categories::refresh_product_counts(&mut tx, &touched).await?;
        tracing::info!(category_id = %id, from = ?old_parent, to = ?category.parent_id, "category moved");
    }
    tx.commit().await?;

    Ok(ok_with("Category updated successfully", category))
}

fn ensure_deletable(subcategories: i64, products: i64) -> ApiResult<()> {
    if subcategories > 0 {
        return Err(ApiError::Conflict("Cannot delete category with subcategories".into()));
    }
    if products > 0 {
        return Err(ApiError::Conflict("Cannot delete category with products".into()));
    }
    Ok(())
}

/// DELETE /api/categories/:id
///
/// Only empty leaf categories can be deleted.
pub async fn delete(
    State(state): State<AppState>,
    Admin(user): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let mut tx = state.db.begin().await?;
    let category = db::categories::lock(&mut tx, id).await?.ok_or(EcommerceError::NotFound("Category"))?;

    let subcategories = db::categories::child_count(&mut tx, id).await?;
    ensure_deletable(subcategories, db::categories::referencing_products(&mut tx, id).await?)?;

    if let Some(parent_id) = category.parent_id {
        db::categories::detach_from_parent(&mut tx, parent_id, id).await?;
    }
    db::categories::delete(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!(category_id = %id, deleted_by = %user.id, "category deleted");
    Ok(message("Category deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category() -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::now_v7(),
            name: LocalizedText::new("ყუთები", "Boxes"),
            slug: "boxes".into(),
            description: LocalizedText::default(),
            parent_id: Some(Uuid::now_v7()),
            children: vec![],
            image: None,
            icon: None,
            seo: Seo::default(),
            status: CategoryStatus::Active,
            featured: false,
            sort_order: 0,
            product_count: 0,
            created_by: Uuid::nil(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_rename_regenerates_slug() {
        let mut c = category();
        let req: UpdateCategoryRequest =
            serde_json::from_value(serde_json::json!({ "name": { "ka": "ჭიქები", "en": "Paper Cups" } })).unwrap();
        req.apply(&mut c).unwrap();
        assert_eq!(c.slug, "paper-cups");
        assert!(c.parent_id.is_some());
    }

    #[test]
    fn test_null_parent_moves_to_top_level() {
        let mut c = category();
        let req: UpdateCategoryRequest = serde_json::from_value(serde_json::json!({ "parentId": null })).unwrap();
        req.apply(&mut c).unwrap();
        assert_eq!(c.parent_id, None);
    }

    #[test]
    fn test_only_empty_leaves_can_be_deleted() {
        assert!(matches!(ensure_deletable(1, 0), Err(ApiError::Conflict(m)) if m.contains("subcategories")));
        assert!(matches!(ensure_deletable(0, 3), Err(ApiError::Conflict(m)) if m.contains("products")));
        assert!(ensure_deletable(0, 0).is_ok());
    }

    #[test]
    fn test_deleted_subcategory_leaves_parent_children() {
        let mut parent = category();
        parent.parent_id = None;
        let mut child = category();
        child.parent_id = Some(parent.id);
        let sibling = Uuid::now_v7();
        parent.attach_child(child.id);
        parent.attach_child(sibling);

        assert!(ensure_deletable(0, 0).is_ok());
        assert_eq!(child.parent_id, Some(parent.id));
        assert!(parent.detach_child(child.id));
        assert_eq!(parent.children, vec![sibling]);
    }

    #[test]
    fn test_create_requires_both_names() {
        let req: CreateCategoryRequest =
            serde_json::from_value(serde_json::json!({ "name": { "ka": "ყუთები", "en": " " } })).unwrap();
        assert!(req.validate().is_err());
    }
}
