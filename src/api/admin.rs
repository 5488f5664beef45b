//! Admin back office: dashboard, catalog and order management, users and analytics

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::orders::{change_status, customer_of, StatusRequest};
use super::products::{category_scope, ProductList, ProductQuery};
use super::{ok, ok_with, ApiResponse, Pagination, ValidJson};
use crate::auth::Admin;
use crate::db::{self, orders::DailySales, orders::TopProduct, Page};
use crate::domain::aggregates::{Order, OrderStatus, Product, ProductStatus, Role, StockOperation, User, UserStatus};
use crate::domain::events::DomainEvent;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::EcommerceError;

fn start_of_today() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_products: i64,
    pub total_orders: i64,
    pub total_users: i64,
    pub total_revenue: Decimal,
    pub today_orders: i64,
    pub today_users: i64,
    pub pending_orders: i64,
    pub today_revenue: Decimal,
}

/// GET /api/admin/dashboard
pub async fn dashboard(State(state): State<AppState>, Admin(_): Admin) -> ApiResult<Json<ApiResponse<Dashboard>>> {
    let today = start_of_today();
    let pool = &state.db;
    let (total_products, total_orders, total_users, total_revenue, today_orders, today_users, pending_orders, today_revenue) = tokio::try_join!(
        db::products::count_by_status(pool, ProductStatus::Active),
        db::orders::count_since(pool, None),
        db::users::count_active(pool),
        db::orders::revenue_since(pool, None),
        db::orders::count_since(pool, Some(today)),
        db::users::count_created_since(pool, today),
        db::orders::count_by_status(pool, OrderStatus::Pending),
        db::orders::revenue_since(pool, Some(today)),
    )?;
    Ok(ok(Dashboard {
        total_products,
        total_orders,
        total_users,
        total_revenue,
        today_orders,
        today_users,
        pending_orders,
        today_revenue,
    }))
}

/// GET /api/admin/products
///
/// Same filters as the storefront listing, over every status.
pub async fn products(
    State(state): State<AppState>,
    Admin(_): Admin,
    Query(q): Query<ProductQuery>,
) -> ApiResult<Json<ApiResponse<ProductList>>> {
    let filter = q.filter(true, category_scope(&state, q.category).await?)?;
    let page = Page::new(q.page, q.limit, 20);
    let (products, total) = db::products::list(&state.db, &filter, page).await?;
    Ok(ok(ProductList { products, pagination: Pagination::new(page, total) }))
}

const LOW_STOCK_LIMIT: i64 = 20;

/// GET /api/admin/products/low-stock
pub async fn low_stock(State(state): State<AppState>, Admin(_): Admin) -> ApiResult<Json<ApiResponse<Vec<Product>>>> {
    Ok(ok(db::products::low_stock(&state.db, LOW_STOCK_LIMIT).await?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockChange {
    Add,
    Subtract,
    Set,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StockRequest {
    pub quantity: u32,
    pub operation: StockChange,
}

/// Applies an admin stock correction. `set` is turned into the matching
/// add or subtract so the out-of-stock status follows the new level.
fn adjust_stock(product: &mut Product, quantity: u32, change: StockChange) {
    let (amount, op) = match change {
        StockChange::Add => (quantity, StockOperation::Add),
        StockChange::Subtract => (quantity, StockOperation::Subtract),
        StockChange::Set if quantity >= product.inventory.stock => (quantity - product.inventory.stock, StockOperation::Add),
        StockChange::Set => (product.inventory.stock - quantity, StockOperation::Subtract),
    };
    if product.inventory.track_inventory {
        product.update_stock(amount, op);
    } else {
        // untracked stock is informational; no status follows from it
        product.inventory.stock = match op {
            StockOperation::Add => product.inventory.stock.saturating_add(amount),
            StockOperation::Subtract => product.inventory.stock.saturating_sub(amount),
        };
        product.updated_at = Utc::now();
    }
}

/// PUT /api/admin/products/:id/stock
pub async fn update_stock(
    State(state): State<AppState>,
    Admin(user): Admin,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<StockRequest>,
) -> ApiResult<Json<ApiResponse<Product>>> {
    let mut tx = state.db.begin().await?;
    let mut product = db::products::lock(&mut tx, id).await?.ok_or(EcommerceError::NotFound("Product"))?;
    let before = (product.inventory.stock, product.status);

    adjust_stock(&mut product, req.quantity, req.operation);
    product.updated_by = Some(user.id);
    db::products::save_stock(&mut tx, &product).await?;
    if product.status != before.1 {
        let touched: Vec<Uuid> = std::iter::once(product.category_id).chain(product.subcategory_id).collect();
        db::categories::refresh_product_counts(&mut tx, &touched).await?;
    }
    tx.commit().await?;

    tracing::info!(product_id = %id, from = before.0, to = product.inventory.stock, status = product.status.as_str(), "stock adjusted");
    if product.inventory.track_inventory && product.inventory.stock == 0 && before.0 > 0 {
        state.events.publish(DomainEvent::StockDepleted { product_id: product.id, code: product.code.clone() });
    }
    Ok(ok_with("Stock updated successfully", product))
}

#[derive(Debug, Deserialize)]
pub struct AdminOrderQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

/// GET /api/admin/orders
pub async fn orders(
    State(state): State<AppState>,
    Admin(_): Admin,
    Query(q): Query<AdminOrderQuery>,
) -> ApiResult<Json<ApiResponse<OrderList>>> {
    let status = match q.status.as_deref() {
        None | Some("" | "all") => None,
        Some(s) => Some(s.parse::<OrderStatus>()?),
    };
    let filter = db::orders::OrderFilter { search: q.search, status, oldest_first: q.sort.as_deref() == Some("oldest") };
    let page = Page::new(q.page, q.limit, 20);
    let (orders, total) = db::orders::list(&state.db, &filter, page).await?;
    Ok(ok(OrderList { orders, pagination: Pagination::new(page, total) }))
}

/// PUT /api/admin/orders/:id/status
pub async fn update_order_status(
    State(state): State<AppState>,
    Admin(user): Admin,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<StatusRequest>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    let order = change_status(&state, &user, id, req).await?;
    Ok(ok_with("Order status updated successfully", order))
}

/// POST /api/admin/orders/:id/refund
///
/// Only delivered, paid orders can be refunded. Refunded goods are not
/// returned to stock automatically.
pub async fn refund(
    State(state): State<AppState>,
    Admin(user): Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    let mut tx = state.db.begin().await?;
    let mut order = db::orders::find_for_update(&mut tx, id).await?.ok_or(EcommerceError::NotFound("Order"))?;
    let from = order.status;
    order.refund(Some(user.id))?;
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, total = %order.pricing.total, by = %user.id, "order refunded");
    let email = customer_of(&state, &order).await?.email;
    state.events.publish(DomainEvent::OrderStatusChanged {
        order_id: order.id,
        order_number: order.order_number.clone(),
        from,
        to: order.status,
        email: Some(email),
    });
    Ok(ok_with("Order refunded successfully", order))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub pagination: Pagination,
}

/// GET /api/admin/users
pub async fn users(
    State(state): State<AppState>,
    Admin(_): Admin,
    Query(q): Query<UserQuery>,
) -> ApiResult<Json<ApiResponse<UserList>>> {
    let filter = db::users::UserFilter {
        search: q.search,
        role: q.role,
        status: q.status,
        oldest_first: q.sort.as_deref() == Some("oldest"),
    };
    let page = Page::new(q.page, q.limit, 20);
    let (users, total) = db::users::list(&state.db, &filter, page).await?;
    Ok(ok(UserList { users, pagination: Pagination::new(page, total) }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserStatusRequest {
    pub status: UserStatus,
}

/// PUT /api/admin/users/:id/status
pub async fn update_user_status(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UserStatusRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    if id == admin.id && req.status != UserStatus::Active {
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }
    let user = db::users::set_status(&state.db, id, req.status).await?.ok_or(EcommerceError::NotFound("User"))?;
    tracing::info!(user_id = %id, status = req.status.as_str(), by = %admin.id, "user status changed");
    Ok(ok_with("User status updated successfully", user))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserRoleRequest {
    pub role: Role,
}

/// PUT /api/admin/users/:id/role
pub async fn update_user_role(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UserRoleRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    if id == admin.id && req.role != Role::Admin {
        return Err(ApiError::bad_request("You cannot change your own role"));
    }
    let user = db::users::set_role(&state.db, id, req.role).await?.ok_or(EcommerceError::NotFound("User"))?;
    tracing::info!(user_id = %id, role = req.role.as_str(), by = %admin.id, "user role changed");
    Ok(ok_with("User role updated successfully", user))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "1y")]
    Year,
}

impl Period {
    pub fn days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub period: Period,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_revenue: Decimal,
    pub total_orders: i64,
    pub average_order_value: Decimal,
}

impl Overview {
    fn from_daily(days: &[DailySales]) -> Self {
        let total_revenue: Decimal = days.iter().map(|d| d.revenue).sum();
        let total_orders: i64 = days.iter().map(|d| d.orders).sum();
        let average_order_value =
            if total_orders > 0 { (total_revenue / Decimal::from(total_orders)).round_dp(2) } else { Decimal::ZERO };
        Self { total_revenue, total_orders, average_order_value }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub period: Period,
    pub overview: Overview,
    pub daily_sales: Vec<DailySales>,
    pub top_products: Vec<TopProduct>,
}

/// GET /api/admin/analytics?period=7d|30d|90d|1y
pub async fn analytics(
    State(state): State<AppState>,
    Admin(_): Admin,
    Query(q): Query<AnalyticsQuery>,
) -> ApiResult<Json<ApiResponse<Analytics>>> {
    let since = start_of_today() - Duration::days(q.period.days() - 1);
    let (daily_sales, top_products) =
        tokio::try_join!(db::orders::daily_sales(&state.db, since), db::orders::top_products(&state.db, since, 10))?;
    Ok(ok(Analytics { period: q.period, overview: Overview::from_daily(&daily_sales), daily_sales, top_products }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::sample_product;
    use rust_decimal_macros::dec;

    #[test]
    fn test_set_moves_status_across_zero() {
        let mut p = sample_product();
        adjust_stock(&mut p, 0, StockChange::Set);
        assert_eq!(p.inventory.stock, 0);
        assert_eq!(p.status, ProductStatus::OutOfStock);

        adjust_stock(&mut p, 15, StockChange::Set);
        assert_eq!(p.inventory.stock, 15);
        assert_eq!(p.status, ProductStatus::Active);
    }

    #[test]
    fn test_subtract_saturates() {
        let mut p = sample_product();
        adjust_stock(&mut p, 500, StockChange::Subtract);
        assert_eq!(p.inventory.stock, 0);
        adjust_stock(&mut p, 3, StockChange::Add);
        assert_eq!(p.inventory.stock, 3);
    }

    #[test]
    fn test_untracked_stock_keeps_status() {
        let mut p = sample_product();
        p.inventory.track_inventory = false;
        adjust_stock(&mut p, 0, StockChange::Set);
        assert_eq!(p.inventory.stock, 0);
        assert_eq!(p.status, ProductStatus::Active);
    }

    #[test]
    fn test_period_parsing() {
        let q: AnalyticsQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(q.period, Period::Month);
        let q: AnalyticsQuery = serde_json::from_value(serde_json::json!({ "period": "1y" })).unwrap();
        assert_eq!(q.period.days(), 365);
        assert!(serde_json::from_value::<AnalyticsQuery>(serde_json::json!({ "period": "2w" })).is_err());
    }

    #[test]
    fn test_overview_average() {
        let day = |orders, revenue| DailySales { day: Utc::now().date_naive(), orders, revenue };
        let o = Overview::from_daily(&[day(2, dec!(100)), day(1, dec!(50))]);
        assert_eq!(o.total_orders, 3);
        assert_eq!(o.total_revenue, dec!(150));
        assert_eq!(o.average_order_value, dec!(50));
        assert_eq!(Overview::from_daily(&[]).average_order_value, Decimal::ZERO);
    }
}
