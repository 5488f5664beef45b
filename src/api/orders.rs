//! Order endpoints: placement, customer views, cancellation and status changes

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{created, ok, ok_with, rule, ApiResponse, Pagination, ValidJson};
use crate::auth::{AuthUser, MaybeUser, Staff};
use crate::db::{self, Page};
use crate::domain::aggregates::order::{
    releases_stock, Charges, Customer, CustomerInfo, GuestContact, OrderMetadata, OrderSource, ProductSnapshot, Shipping,
    ShippingAddress,
};
use crate::domain::aggregates::{Order, OrderItem, OrderStatus, PaymentMethod, Product, ProductStatus, Settings, StockOperation};
use crate::domain::events::DomainEvent;
use crate::domain::shipping::{self, QuoteItem};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::{EcommerceError, Result};

/// Contact details of whoever placed `order`
pub(crate) async fn customer_of(state: &AppState, order: &Order) -> Result<CustomerInfo> {
    let registered = match order.customer.user_id {
        Some(id) if !order.customer.is_guest => db::users::contact(&state.db, id).await?,
        _ => None,
    };
    Ok(order.customer_info(registered.as_ref().map(|(f, l, e, p)| (f.as_str(), l.as_str(), e.as_str(), p.as_deref()))))
}

/// Puts the ordered quantities back on the shelf.
pub(crate) async fn restock(conn: &mut PgConnection, order: &Order) -> Result<()> {
    let mut ids: Vec<Uuid> = order.items.iter().map(|i| i.product_id).collect();
    ids.sort();
    ids.dedup();
    let mut products: HashMap<Uuid, Product> = db::products::lock_many(conn, &ids).await?.into_iter().map(|p| (p.id, p)).collect();

    let mut touched = Vec::new();
    for item in &order.items {
        // deleted products have nothing to restock
        let Some(product) = products.get_mut(&item.product_id) else { continue };
        let before = product.status;
        product.update_stock(item.quantity, StockOperation::Add);
        if product.status != before {
            touched.push(product.category_id);
            touched.extend(product.subcategory_id);
        }
    }
    for product in products.values() {
        db::products::save_stock(conn, product).await?;
    }
    if !touched.is_empty() {
        db::categories::refresh_product_counts(conn, &touched).await?;
    }
    tracing::debug!(order_id = %order.id, products = products.len(), "order restocked");
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

/// GET /api/orders
pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<OrderListQuery>,
) -> ApiResult<Json<ApiResponse<OrderList>>> {
    let page = Page::new(q.page, q.limit, 10);
    let (orders, total) = db::orders::list_for_user(&state.db, auth.id, page).await?;
    Ok(ok(OrderList { orders, pagination: Pagination::new(page, total) }))
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub customer: CustomerInfo,
}

/// GET /api/orders/:id
///
/// Customers only see their own orders; someone else's order is a 404.
pub async fn get(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Json<ApiResponse<OrderDetail>>> {
    let order = db::orders::find(&state.db, id)
        .await?
        .filter(|o| auth.is_staff() || o.belongs_to(auth.id))
        .ok_or(EcommerceError::NotFound("Order"))?;
    let customer = customer_of(&state, &order).await?;
    Ok(ok(OrderDetail { order, customer }))
}

fn valid_address(a: &ShippingAddress) -> std::result::Result<(), ValidationError> {
    let required = [&a.first_name, &a.last_name, &a.street, &a.city, &a.phone];
    if required.iter().any(|f| f.trim().is_empty()) {
        return Err(rule("incomplete", "Name, street, city and phone are required"));
    }
    if !validator::validate_email(a.email.as_str()) {
        return Err(rule("email", "Please provide a valid email"));
    }
    Ok(())
}

fn valid_guest(g: &GuestContact) -> std::result::Result<(), ValidationError> {
    if g.first_name.trim().is_empty() || g.last_name.trim().is_empty() {
        return Err(rule("incomplete", "Guest name is required"));
    }
    if !validator::validate_email(g.email.as_str()) {
        return Err(rule("email", "Please provide a valid email"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

fn default_shipping_method() -> String { "standard".to_string() }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderLine>,
    #[validate(custom = "valid_address")]
    pub shipping_address: ShippingAddress,
    #[serde(default = "default_shipping_method")]
    pub shipping_method: String,
    pub payment_method: PaymentMethod,
    /// Contact for guest checkout; the shipping address contact is used when absent
    #[validate(custom = "valid_guest")]
    pub guest_info: Option<GuestContact>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn request_metadata(headers: &HeaderMap) -> OrderMetadata {
    let header = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
    OrderMetadata {
        source: OrderSource::Website,
        user_agent: header(header::USER_AGENT),
        ip_address: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string()),
        referrer: header(header::REFERER),
    }
}

/// Quantities per product, summed over repeated lines
fn merge_lines(lines: &[OrderLine]) -> Result<Vec<(Uuid, u32)>> {
    let mut merged: Vec<(Uuid, u32)> = Vec::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(EcommerceError::InvalidQuantity);
        }
        match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty = qty.saturating_add(line.quantity),
            None => merged.push((line.product_id, line.quantity)),
        }
    }
    Ok(merged)
}

/// Priced order lines for the locked `products`, checking availability.
fn build_items(lines: &[(Uuid, u32)], products: &HashMap<Uuid, Product>, settings: &Settings) -> Result<Vec<OrderItem>> {
    let check_stock = settings.ecommerce.inventory.track_stock && !settings.ecommerce.inventory.allow_backorders;
    lines
        .iter()
        .map(|&(product_id, quantity)| {
            let product = products.get(&product_id).ok_or(EcommerceError::NotFound("Product"))?;
            if !matches!(product.status, ProductStatus::Active | ProductStatus::OutOfStock) {
                return Err(EcommerceError::ProductUnavailable(product.code.to_string()));
            }
            if check_stock && !product.is_in_stock(quantity) {
                return Err(EcommerceError::InsufficientStock {
                    code: product.code.to_string(),
                    available: product.inventory.stock,
                });
            }
            let snapshot = ProductSnapshot {
                name: product.name.clone(),
                code: product.code.to_string(),
                image: product.primary_image().map(String::from),
            };
            Ok(OrderItem::new(product_id, snapshot, quantity, product.price_for_quantity(quantity), product.pricing.active()))
        })
        .collect()
}

/// POST /api/orders
///
/// Runs in one transaction: the ordered products are row-locked in id order,
/// priced, checked for stock, decremented and the numbered order inserted.
pub async fn place(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
    ValidJson(req): ValidJson<PlaceOrderRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Order>>)> {
    let settings = db::settings::load(&state.db).await?;
    let policy = &settings.ecommerce.orders;
    if user.is_none() && (policy.require_registration || !policy.allow_guest_checkout) {
        return Err(ApiError::Unauthorized("Please sign in to place an order"));
    }

    let lines = merge_lines(&req.items)?;
    let mut ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();
    ids.sort();

    let mut tx = state.db.begin().await?;
    let mut products: HashMap<Uuid, Product> =
        db::products::lock_many(&mut tx, &ids).await?.into_iter().map(|p| (p.id, p)).collect();
    let items = build_items(&lines, &products, &settings)?;

    let quote_items: Vec<QuoteItem> = items
        .iter()
        .map(|i| QuoteItem {
            price: i.unit_price,
            quantity: i.quantity,
            weight: products.get(&i.product_id).and_then(Product::unit_weight_kg),
        })
        .collect();
    let methods = settings.enabled_shipping_methods();
    let quote = shipping::quote(&methods, &req.shipping_method, &quote_items, settings.shipping.free_shipping_threshold)?;
    let estimated_delivery =
        methods.iter().find(|m| m.id == quote.method).and_then(|m| m.estimated_delivery(chrono::Utc::now()));

    let min_order = settings.ecommerce.cart.min_order_amount;
    if min_order > Decimal::ZERO && quote.total_value < min_order {
        return Err(EcommerceError::Invalid(format!("Minimum order amount is {min_order}")).into());
    }
    if !settings.enabled_payment_methods().contains(&req.payment_method) {
        return Err(ApiError::bad_request(format!("Payment method {} is not available", req.payment_method.as_str())));
    }

    let customer = match &user {
        Some(u) => Customer { user_id: Some(u.id), guest: None, is_guest: false },
        None => {
            let a = &req.shipping_address;
            let guest = req.guest_info.clone().unwrap_or_else(|| GuestContact {
                first_name: a.first_name.clone(),
                last_name: a.last_name.clone(),
                email: a.email.clone(),
                phone: Some(a.phone.clone()),
            });
            Customer { user_id: None, guest: Some(guest), is_guest: true }
        }
    };
    let shipping = Shipping {
        address: req.shipping_address,
        method: quote.method.clone(),
        cost: quote.cost,
        estimated_delivery,
        ..Shipping::default()
    };
    let charges = Charges {
        tax_rate: settings.ecommerce.pricing.tax_rate,
        prices_include_tax: settings.ecommerce.pricing.include_tax,
        shipping: quote.cost,
        discount: Decimal::ZERO,
    };

    let mut order = Order::place(
        String::new(),
        customer,
        items,
        shipping,
        req.payment_method,
        charges,
        &settings.site.currency.primary,
        request_metadata(&headers),
    )?;
    order.notes.customer = req.notes;
    if settings.ecommerce.orders.auto_confirm_orders {
        order.change_status(OrderStatus::Confirmed, Some("Order confirmed automatically".into()), None)?;
    }

    db::orders::insert(&mut tx, &mut order, settings.order_number_prefix()).await?;

    let mut touched = Vec::new();
    let mut depleted = Vec::new();
    for item in &order.items {
        let Some(product) = products.get_mut(&item.product_id) else { continue };
        let before = product.status;
        product.update_stock(item.quantity, StockOperation::Subtract);
        product.record_sale(item.quantity, item.total_price);
        if product.status != before {
            touched.push(product.category_id);
            touched.extend(product.subcategory_id);
        }
        if product.inventory.track_inventory && product.inventory.stock == 0 {
            depleted.push((product.id, product.code.clone()));
        }
        db::products::save_stock(&mut tx, product).await?;
    }
    if !touched.is_empty() {
        db::categories::refresh_product_counts(&mut tx, &touched).await?;
    }
    tx.commit().await?;

    let email = customer_of(&state, &order).await?.email;
    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %order.pricing.total,
        guest = order.customer.is_guest,
        "order placed"
    );
    state.events.publish(DomainEvent::OrderPlaced {
        order_id: order.id,
        order_number: order.order_number.clone(),
        email,
        total: order.pricing.total,
        currency: order.pricing.currency.clone(),
    });
    for (product_id, code) in depleted {
        state.events.publish(DomainEvent::StockDepleted { product_id, code });
    }

    Ok(created("Order created successfully", order))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// POST /api/orders/:id/cancel
pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelRequest>>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let mut order = db::orders::find_for_update(&mut tx, id)
        .await?
        .filter(|o| o.belongs_to(auth.id))
        .ok_or(EcommerceError::NotFound("Order"))?;
    let from = order.status;
    order.cancel(Some(auth.id), Some(req.reason.unwrap_or_else(|| "Cancelled by customer".into())))?;
    db::orders::save(&mut tx, &order).await?;
    restock(&mut tx, &order).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, "order cancelled by customer");
    state.events.publish(DomainEvent::OrderStatusChanged {
        order_id: order.id,
        order_number: order.order_number.clone(),
        from,
        to: order.status,
        email: Some(auth.email),
    });
    Ok(ok_with("Order cancelled successfully", order))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    #[validate(custom = "not_refunded")]
    pub status: OrderStatus,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub tracking_number: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub carrier: Option<String>,
}

fn not_refunded(status: &OrderStatus) -> std::result::Result<(), ValidationError> {
    if *status == OrderStatus::Refunded {
        return Err(rule("refund", "Refunds go through /api/admin/orders/:id/refund"));
    }
    Ok(())
}

/// Applies a staff status change; moving into `cancelled` returns the stock.
pub(crate) async fn change_status(state: &AppState, by: &AuthUser, id: Uuid, req: StatusRequest) -> ApiResult<Order> {
    let mut tx = state.db.begin().await?;
    let mut order = db::orders::find_for_update(&mut tx, id).await?.ok_or(EcommerceError::NotFound("Order"))?;

    if let Some(tracking) = req.tracking_number {
        order.shipping.tracking_number = Some(tracking);
    }
    if let Some(carrier) = req.carrier {
        order.shipping.carrier = Some(carrier);
    }
    let previous = order.change_status(req.status, req.note, Some(by.id))?;
    if previous.is_none() {
        order.updated_at = chrono::Utc::now();
    }
    db::orders::save(&mut tx, &order).await?;
    let restocked = releases_stock(previous, order.status);
    if restocked {
        restock(&mut tx, &order).await?;
    }
    tx.commit().await?;

    if let Some(from) = previous {
        tracing::info!(order_id = %order.id, %from, to = %order.status, by = %by.id, restocked, "order status changed");
        let email = customer_of(state, &order).await?.email;
        state.events.publish(DomainEvent::OrderStatusChanged {
            order_id: order.id,
            order_number: order.order_number.clone(),
            from,
            to: order.status,
            email: Some(email),
        });
    }
    Ok(order)
}

/// PUT /api/orders/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Staff(user): Staff,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<StatusRequest>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    let order = change_status(&state, &user, id, req).await?;
    Ok(ok_with("Order status updated successfully", order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::sample_product;
    use rust_decimal_macros::dec;

    fn address() -> ShippingAddress {
        ShippingAddress {
            first_name: "Giorgi".into(),
            last_name: "Beridze".into(),
            street: "Rustaveli Ave 1".into(),
            city: "Tbilisi".into(),
            country: "Georgia".into(),
            phone: "+995555000000".into(),
            email: "giorgi@example.ge".into(),
            ..ShippingAddress::default()
        }
    }

    #[test]
    fn test_repeated_lines_are_merged() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let lines = vec![
            OrderLine { product_id: a, quantity: 2 },
            OrderLine { product_id: b, quantity: 1 },
            OrderLine { product_id: a, quantity: 3 },
        ];
        assert_eq!(merge_lines(&lines).unwrap(), vec![(a, 5), (b, 1)]);
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let lines = vec![OrderLine { product_id: Uuid::now_v7(), quantity: 0 }];
        assert!(matches!(merge_lines(&lines), Err(EcommerceError::InvalidQuantity)));
    }

    #[test]
    fn test_items_use_tier_price_and_check_stock() {
        let mut product = sample_product();
        product.inventory.stock = 100;
        product.quantity_discounts = vec![crate::domain::aggregates::product::QuantityDiscount {
            min_quantity: 50,
            max_quantity: None,
            price: dec!(2.00),
            discount_percent: None,
        }];
        let id = product.id;
        let products = HashMap::from([(id, product)]);
        let settings = Settings::default();

        let items = build_items(&[(id, 60)], &products, &settings).unwrap();
        assert_eq!(items[0].unit_price, dec!(2.00));
        assert_eq!(items[0].total_price, dec!(120.00));
        assert_eq!(items[0].applied_discount, dec!(30.00));

        let err = build_items(&[(id, 101)], &products, &settings).unwrap_err();
        assert!(matches!(err, EcommerceError::InsufficientStock { available: 100, .. }));
    }

    #[test]
    fn test_backorders_skip_the_stock_check() {
        let mut product = sample_product();
        product.inventory.stock = 1;
        let id = product.id;
        let products = HashMap::from([(id, product)]);
        let mut settings = Settings::default();
        settings.ecommerce.inventory.allow_backorders = true;
        assert!(build_items(&[(id, 5)], &products, &settings).is_ok());
    }

    #[test]
    fn test_missing_product_is_not_found() {
        let err = build_items(&[(Uuid::now_v7(), 1)], &HashMap::new(), &Settings::default()).unwrap_err();
        assert!(matches!(err, EcommerceError::NotFound("Product")));
    }

    #[test]
    fn test_place_request_validation() {
        let mut bad = address();
        bad.email = "nope".into();
        assert!(valid_address(&address()).is_ok());
        assert!(valid_address(&bad).is_err());

        let req: PlaceOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [],
            "shippingAddress": address(),
            "paymentMethod": "cash_on_delivery"
        }))
        .unwrap();
        assert_eq!(req.shipping_method, "standard");
        assert!(req.validate().unwrap_err().field_errors().contains_key("items"));
    }

    #[test]
    fn test_status_request_rejects_refunded() {
        let req: StatusRequest = serde_json::from_value(serde_json::json!({ "status": "refunded" })).unwrap();
        let errors = req.validate().unwrap_err();
        let status = &errors.field_errors()["status"];
        assert_eq!(status[0].code, "refund");

        let req: StatusRequest = serde_json::from_value(serde_json::json!({ "status": "cancelled", "note": "out of stock" })).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_metadata_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, "curl/8".parse().unwrap());
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        let meta = request_metadata(&headers);
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(meta.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(meta.referrer, None);
    }
}
