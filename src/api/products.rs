//! Catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{created, message, ok, ok_with, rule, ApiResponse, Pagination, ValidJson};
use crate::auth::{Admin, MaybeUser, Staff};
use crate::db::{
    self,
    products::{ProductFilter, ProductSort},
    Page,
};
use crate::domain::aggregates::product::{Inventory, Pricing, ProductImage, QuantityDiscount, Ratings, Sales, Seo, Specifications};
use crate::domain::aggregates::{Crumb, Product, ProductStatus};
use crate::domain::value_objects::{slugify, LocalizedText, ProductCode};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::{EcommerceError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<Uuid>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub status: Option<String>,
    pub featured: Option<bool>,
    /// Comma-separated
    pub tags: Option<String>,
}

impl ProductQuery {
    /// `status` is honoured only when `any_status` is set; otherwise the
    /// listing holds what a shopper may open: active and out-of-stock products.
    pub(crate) fn filter(&self, any_status: bool, category_ids: Option<Vec<Uuid>>) -> ApiResult<ProductFilter> {
        let statuses = match (any_status, self.status.as_deref()) {
            (true, None | Some("" | "all")) => Vec::new(),
            (true, Some(s)) => vec![s.parse::<ProductStatus>().map_err(|e| ApiError::bad_request(e.to_string()))?],
            (false, _) => ProductStatus::PUBLIC.to_vec(),
        };
        Ok(ProductFilter {
            statuses,
            category_ids,
            search: self.search.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            featured: self.featured,
            tags: self
                .tags
                .as_deref()
                .map(|t| t.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect())
                .unwrap_or_default(),
            sort: self.sort.as_deref().map(ProductSort::parse).unwrap_or_default(),
        })
    }
}

/// The category and every category below it
pub(crate) async fn category_scope(state: &AppState, category: Option<Uuid>) -> Result<Option<Vec<Uuid>>> {
    let Some(id) = category else { return Ok(None) };
    let mut conn = state.db.acquire().await?;
    let tree = db::categories::tree(&mut conn).await?;
    let mut ids = vec![id];
    ids.extend(tree.descendants(id));
    Ok(Some(ids))
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

/// GET /api/products
pub async fn list(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(q): Query<ProductQuery>,
) -> ApiResult<Json<ApiResponse<ProductList>>> {
    let staff = user.as_ref().is_some_and(|u| u.is_staff());
    let filter = q.filter(staff, category_scope(&state, q.category).await?)?;
    let page = Page::new(q.page, q.limit, 12);
    let (products, total) = db::products::list(&state.db, &filter, page).await?;
    Ok(ok(ProductList { products, pagination: Pagination::new(page, total) }))
}

async fn find_by_id_or_slug(state: &AppState, key: &str) -> Result<Option<Product>> {
    match key.parse::<Uuid>() {
        Ok(id) => db::products::find(&state.db, id).await,
        Err(_) => db::products::find_by_slug(&state.db, key).await,
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub breadcrumb: Vec<Crumb>,
}

/// GET /api/products/:id_or_slug
pub async fn get(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(key): Path<String>,
) -> ApiResult<Json<ApiResponse<ProductDetail>>> {
    let staff = user.as_ref().is_some_and(|u| u.is_staff());
    let product = find_by_id_or_slug(&state, &key)
        .await?
        .filter(|p| staff || p.status.is_public())
        .ok_or(EcommerceError::NotFound("Product"))?;

    let mut conn = state.db.acquire().await?;
    let tree = db::categories::tree(&mut conn).await?;
    let breadcrumb = tree.breadcrumb(product.subcategory_id.unwrap_or(product.category_id));
    Ok(ok(ProductDetail { product, breadcrumb }))
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub quantity: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub base_price: Decimal,
    pub savings: Decimal,
    pub in_stock: bool,
    pub currency: String,
}

/// GET /api/products/:id/price?quantity=
pub async fn price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<PriceQuery>,
) -> ApiResult<Json<ApiResponse<PriceQuote>>> {
    let quantity = q.quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(EcommerceError::InvalidQuantity.into());
    }
    let product = db::products::find(&state.db, id)
        .await?
        .filter(|p| p.status.is_public())
        .ok_or(EcommerceError::NotFound("Product"))?;

    let unit_price = product.price_for_quantity(quantity);
    let base_price = product.pricing.active();
    let qty = Decimal::from(quantity);
    Ok(ok(PriceQuote {
        product_id: product.id,
        quantity,
        unit_price,
        total_price: unit_price * qty,
        base_price,
        savings: ((base_price - unit_price) * qty).max(Decimal::ZERO),
        in_stock: product.is_in_stock(quantity),
        currency: product.pricing.currency,
    }))
}

fn complete_name(name: &LocalizedText) -> std::result::Result<(), ValidationError> {
    if name.is_complete() { Ok(()) } else { Err(rule("incomplete", "Georgian and English names are required")) }
}

fn valid_pricing(pricing: &Pricing) -> std::result::Result<(), ValidationError> {
    let negative = [Some(pricing.price1), pricing.price2, pricing.price3].into_iter().flatten().any(|p| p < Decimal::ZERO);
    if negative {
        return Err(rule("negative", "Prices cannot be negative"));
    }
    Ok(())
}

fn valid_tiers(tiers: &Vec<QuantityDiscount>) -> std::result::Result<(), ValidationError> {
    for tier in tiers {
        if tier.min_quantity == 0 || tier.price < Decimal::ZERO || tier.max_quantity.is_some_and(|max| max < tier.min_quantity) {
            return Err(rule("tier", "Each discount tier needs a quantity range and a price"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(custom = "complete_name")]
    pub name: LocalizedText,
    #[validate(length(min = 1, max = 50, message = "Product code is required"))]
    pub code: String,
    pub barcode: Option<String>,
    #[serde(default)]
    pub description: LocalizedText,
    pub category_id: Uuid,
    pub subcategory_id: Option<Uuid>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[validate(custom = "valid_pricing")]
    pub pricing: Pricing,
    #[serde(default)]
    #[validate(custom = "valid_tiers")]
    pub quantity_discounts: Vec<QuantityDiscount>,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub specifications: Specifications,
    #[serde(default)]
    pub seo: Seo,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

async fn ensure_categories(conn: &mut PgConnection, category_id: Uuid, subcategory_id: Option<Uuid>) -> Result<()> {
    db::categories::lock(conn, category_id).await?.ok_or(EcommerceError::NotFound("Category"))?;
    if let Some(sub) = subcategory_id {
        db::categories::lock(conn, sub).await?.ok_or(EcommerceError::NotFound("Subcategory"))?;
    }
    Ok(())
}

fn category_refs(p: &Product) -> Vec<Uuid> {
    std::iter::once(p.category_id).chain(p.subcategory_id).collect()
}

fn parse_code(code: &str) -> Result<ProductCode> {
    ProductCode::new(code).map_err(|e| EcommerceError::Invalid(e.to_string()))
}

/// POST /api/products
pub async fn create(
    State(state): State<AppState>,
    Staff(user): Staff,
    ValidJson(req): ValidJson<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let slug = slugify(&req.name.en);
    if slug.is_empty() {
        return Err(ApiError::bad_request("English name must contain letters or digits"));
    }

    let now = Utc::now();
    let mut product = Product {
        id: Uuid::now_v7(),
        name: req.name,
        slug,
        code: parse_code(&req.code)?,
        barcode: req.barcode.filter(|b| !b.trim().is_empty()),
        description: req.description,
        category_id: req.category_id,
        subcategory_id: req.subcategory_id,
        images: req.images,
        pricing: req.pricing,
        quantity_discounts: req.quantity_discounts,
        inventory: req.inventory,
        specifications: req.specifications,
        seo: req.seo,
        status: req.status,
        featured: req.featured,
        tags: req.tags,
        ratings: Ratings::default(),
        sales: Sales::default(),
        created_by: user.id,
        updated_by: None,
        created_at: now,
        updated_at: now,
    };
    if product.inventory.track_inventory && product.inventory.stock == 0 && product.status == ProductStatus::Active {
        product.status = ProductStatus::OutOfStock;
    }

    let mut tx = state.db.begin().await?;
    ensure_categories(&mut tx, product.category_id, product.subcategory_id).await?;
    db::products::insert(&mut tx, &product).await?;
    db::categories::refresh_product_counts(&mut tx, &category_refs(&product)).await?;
    tx.commit().await?;

    tracing::info!(product_id = %product.id, code = %product.code, name = product.name.display(), "product created");
    Ok(created("Product created successfully", product))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(custom = "complete_name")]
    pub name: Option<LocalizedText>,
    #[validate(length(min = 1, max = 50))]
    pub code: Option<String>,
    pub barcode: Option<String>,
    pub description: Option<LocalizedText>,
    pub category_id: Option<Uuid>,
    /// `null` clears the subcategory
    #[serde(default, deserialize_with = "double_option")]
    pub subcategory_id: Option<Option<Uuid>>,
    pub images: Option<Vec<ProductImage>>,
    #[validate(custom = "valid_pricing")]
    pub pricing: Option<Pricing>,
    #[validate(custom = "valid_tiers")]
    pub quantity_discounts: Option<Vec<QuantityDiscount>>,
    pub inventory: Option<Inventory>,
    pub specifications: Option<Specifications>,
    pub seo: Option<Seo>,
    pub status: Option<ProductStatus>,
    pub featured: Option<bool>,
    pub tags: Option<Vec<String>>,
}

fn double_option<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

impl UpdateProductRequest {
    fn apply(self, p: &mut Product) -> Result<()> {
        if let Some(name) = self.name {
            p.rename(name);
            if p.slug.is_empty() {
                return Err(EcommerceError::Invalid("English name must contain letters or digits".into()));
            }
        }
        if let Some(code) = self.code {
            p.code = parse_code(&code)?;
        }
        if let Some(barcode) = self.barcode {
            p.barcode = Some(barcode).filter(|b| !b.trim().is_empty());
        }
        if let Some(v) = self.description { p.description = v; }
        if let Some(v) = self.category_id { p.category_id = v; }
        if let Some(v) = self.subcategory_id { p.subcategory_id = v; }
        if let Some(v) = self.images { p.images = v; }
        if let Some(v) = self.pricing { p.pricing = v; }
        if let Some(v) = self.quantity_discounts { p.quantity_discounts = v; }
        if let Some(v) = self.inventory { p.inventory = v; }
        if let Some(v) = self.specifications { p.specifications = v; }
        if let Some(v) = self.seo { p.seo = v; }
        if let Some(v) = self.status { p.status = v; }
        if let Some(v) = self.featured { p.featured = v; }
        if let Some(v) = self.tags { p.tags = v; }
        Ok(())
    }
}

/// PUT /api/products/:id
pub async fn update(
    State(state): State<AppState>,
    Staff(user): Staff,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateProductRequest>,
) -> ApiResult<Json<ApiResponse<Product>>> {
    let mut tx = state.db.begin().await?;
    let mut product = db::products::lock(&mut tx, id).await?.ok_or(EcommerceError::NotFound("Product"))?;
    let mut touched = category_refs(&product);

    req.apply(&mut product)?;
    ensure_categories(&mut tx, product.category_id, product.subcategory_id).await?;
    product.updated_by = Some(user.id);
    product.updated_at = Utc::now();

    db::products::update(&mut tx, &product).await?;
    touched.extend(category_refs(&product));
    db::categories::refresh_product_counts(&mut tx, &touched).await?;
    tx.commit().await?;

    tracing::info!(product_id = %product.id, updated_by = %user.id, "product updated");
    Ok(ok_with("Product updated successfully", product))
}

/// DELETE /api/products/:id
pub async fn delete(
    State(state): State<AppState>,
    Admin(user): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let mut tx = state.db.begin().await?;
    let (category_id, subcategory_id) = db::products::delete(&mut tx, id).await?.ok_or(EcommerceError::NotFound("Product"))?;
    let touched: Vec<Uuid> = std::iter::once(category_id).chain(subcategory_id).collect();
    db::categories::refresh_product_counts(&mut tx, &touched).await?;
    tx.commit().await?;

    tracing::info!(product_id = %id, deleted_by = %user.id, "product deleted");
    Ok(message("Product deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_public_listing_ignores_requested_status() {
        let q = ProductQuery { status: Some("inactive".into()), tags: Some("eco, bulk,".into()), ..ProductQuery::default() };
        let public = q.filter(false, None).unwrap();
        assert_eq!(public.statuses, vec![ProductStatus::Active, ProductStatus::OutOfStock]);
        assert_eq!(public.tags, vec!["eco".to_string(), "bulk".to_string()]);

        let staff = q.filter(true, None).unwrap();
        assert_eq!(staff.statuses, vec![ProductStatus::Inactive]);
        let everything = ProductQuery { status: Some("all".into()), ..ProductQuery::default() };
        assert!(everything.filter(true, None).unwrap().statuses.is_empty());
    }

    #[test]
    fn test_listing_and_detail_share_visibility() {
        let public = ProductQuery::default().filter(false, None).unwrap();
        for status in [ProductStatus::Active, ProductStatus::Inactive, ProductStatus::OutOfStock, ProductStatus::Discontinued] {
            assert_eq!(public.statuses.contains(&status), status.is_public(), "{}", status.as_str());
        }
    }

    #[test]
    fn test_staff_listing_rejects_unknown_status() {
        let q = ProductQuery { status: Some("sold".into()), ..ProductQuery::default() };
        assert!(q.filter(true, None).is_err());
    }

    #[test]
    fn test_create_request_checks_nested_rules() {
        let req: CreateProductRequest = serde_json::from_value(serde_json::json!({
            "name": { "ka": "", "en": "Paper cups" },
            "code": "PC-100",
            "categoryId": Uuid::nil(),
            "pricing": { "price1": "-1" },
            "quantityDiscounts": [{ "minQuantity": 10, "maxQuantity": 5, "price": "2.00" }]
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("pricing"));
        assert!(fields.contains_key("quantity_discounts"));
    }

    #[test]
    fn test_update_clears_subcategory_on_null() {
        let mut product = crate::domain::aggregates::product::tests::sample_product();
        product.subcategory_id = Some(Uuid::now_v7());
        let req: UpdateProductRequest = serde_json::from_value(serde_json::json!({ "subcategoryId": null })).unwrap();
        req.apply(&mut product).unwrap();
        assert_eq!(product.subcategory_id, None);

        let req: UpdateProductRequest = serde_json::from_value(serde_json::json!({ "featured": true })).unwrap();
        req.apply(&mut product).unwrap();
        assert!(product.featured);
        assert_eq!(product.pricing.price1, dec!(2.50));
    }
}
