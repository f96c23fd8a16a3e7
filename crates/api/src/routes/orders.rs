//! Order route handlers.
//!
//! Orders are priced on the server from the current catalog; any price the
//! client sends for an item is ignored.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::{
    LineItem, OrderId, OrderTotals, PageInfo, Pagination, ProductId, Sort, UserId,
};

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::{AdminOnly, Authenticated};
use crate::models::{
    NewOrder, Order, OrderFilter, OrderItem, OrderSort, OrderStatusUpdate, Product,
    ShippingAddress,
};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::{Envelope, NoData};
use crate::services::images::ImageHost;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// One requested line: product and quantity.
#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product: ProductId,
    pub qty: u32,
}

/// Create request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub order_items: Vec<OrderItemRequest>,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: Option<String>,
    pub tax_price: Option<Decimal>,
    pub shipping_price: Option<Decimal>,
}

/// Query string for order listings.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub user: Option<UserId>,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct OrderData {
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
    #[serde(flatten)]
    pub page: PageInfo,
}

// =============================================================================
// Handlers
// =============================================================================

pub fn router<S: Store, H: ImageHost>() -> Router<AppState<S, H>> {
    Router::new()
        .route("/", get(list::<S, H>).post(create::<S, H>))
        .route("/mine", get(mine::<S, H>))
        .route(
            "/{id}",
            get(show::<S, H>).put(update::<S, H>).delete(destroy::<S, H>),
        )
}

/// Place an order for the caller.
#[instrument(skip(identity, state, body), fields(user_id = %identity.id))]
async fn create<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    Authenticated(identity): Authenticated,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Envelope<OrderData>>)> {
    if body.order_items.is_empty() {
        return Err(AppError::Validation("No order items".to_string()));
    }

    let ids: Vec<ProductId> = body.order_items.iter().map(|item| item.product).collect();
    let products = state.store().get_products(&ids).await?;
    let (items, line_items) = price_items(&body.order_items, &products)?;

    let totals = OrderTotals::compute(
        &line_items,
        body.tax_price.unwrap_or(Decimal::ZERO),
        body.shipping_price.unwrap_or(Decimal::ZERO),
    )?;

    let order = state
        .store()
        .create_order(NewOrder {
            user_id: identity.id,
            items,
            shipping_address: body.shipping_address,
            payment_method: body.payment_method,
            totals,
        })
        .await?;

    tracing::info!(order_id = %order.id, total = %order.totals.total_price, "Order placed");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(
            "Order created successfully",
            OrderData { order },
        )),
    ))
}

/// Snapshot catalog name and price for each requested line.
fn price_items(
    requested: &[OrderItemRequest],
    products: &[Product],
) -> Result<(Vec<OrderItem>, Vec<LineItem>)> {
    let catalog: HashMap<ProductId, &Product> =
        products.iter().map(|product| (product.id, product)).collect();

    requested
        .iter()
        .map(|item| {
            let product = catalog.get(&item.product).ok_or_else(|| {
                AppError::Validation(format!("Product {} not found", item.product))
            })?;
            let quantity = i32::try_from(item.qty)
                .map_err(|_| AppError::Validation("Quantity is too large".to_string()))?;

            Ok((
                OrderItem {
                    product_id: Some(product.id),
                    name: product.name.clone(),
                    quantity,
                    price: product.price,
                },
                LineItem {
                    unit_price: product.price,
                    quantity: item.qty,
                },
            ))
        })
        .collect::<Result<Vec<_>>>()
        .map(|lines| lines.into_iter().unzip())
}

/// Every order, optionally for one user.
#[instrument(skip(_admin, state))]
async fn list<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    AdminOnly(_admin): AdminOnly,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> Result<Json<Envelope<OrderList>>> {
    let filter = OrderFilter { user: query.user };
    fetch_page(&state, filter, &query).await
}

/// The caller's own orders, newest first unless sorted otherwise.
async fn mine<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    Authenticated(identity): Authenticated,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> Result<Json<Envelope<OrderList>>> {
    let filter = OrderFilter {
        user: Some(identity.id),
    };
    fetch_page(&state, filter, &query).await
}

async fn fetch_page<S: Store, H: ImageHost>(
    state: &AppState<S, H>,
    filter: OrderFilter,
    query: &OrderQuery,
) -> Result<Json<Envelope<OrderList>>> {
    let sort = Sort::<OrderSort>::parse(query.sort.as_deref())?;
    let pagination = Pagination::new(query.page, query.limit);

    let (orders, total) = state
        .store()
        .list_orders(&filter, sort, pagination)
        .await?;

    Ok(Json(Envelope::ok(OrderList {
        orders,
        page: PageInfo::new(total, pagination),
    })))
}

/// One order, for its owner or an admin.
async fn show<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    Authenticated(identity): Authenticated,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Envelope<OrderData>>> {
    let order = state
        .store()
        .get_order(id)
        .await?
        .ok_or_else(not_found)?;

    if !order.is_visible_to(&identity) {
        tracing::warn!(order_id = %id, user_id = %identity.id, "Order access denied");
        return Err(AppError::Forbidden(
            "Not authorized to view this order".to_string(),
        ));
    }

    Ok(Json(Envelope::ok(OrderData { order })))
}

/// Mark an order paid or delivered, or undo either.
#[instrument(skip(_admin, state, update))]
async fn update<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    AdminOnly(_admin): AdminOnly,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(update): ApiJson<OrderStatusUpdate>,
) -> Result<Json<Envelope<OrderData>>> {
    let current = state
        .store()
        .get_order(id)
        .await?
        .ok_or_else(not_found)?;

    let status = update.apply(&current.status, Utc::now());

    let order = state
        .store()
        .update_order_status(id, &status)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(
        order_id = %order.id,
        is_paid = order.status.is_paid,
        is_delivered = order.status.is_delivered,
        "Order status updated"
    );

    Ok(Json(Envelope::with_message(
        "Order updated successfully",
        OrderData { order },
    )))
}

#[instrument(skip(_admin, state))]
async fn destroy<S: Store, H: ImageHost>(
    State(state): State<AppState<S, H>>,
    AdminOnly(_admin): AdminOnly,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Envelope<NoData>>> {
    if !state.store().delete_order(id).await? {
        return Err(not_found());
    }

    Ok(Json(Envelope::with_message(
        "Order deleted successfully",
        NoData {},
    )))
}

fn not_found() -> AppError {
    AppError::NotFound("Order not found".to_string())
}
