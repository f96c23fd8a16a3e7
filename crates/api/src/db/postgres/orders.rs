//! Orders and order items tables.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use emporium_core::{OrderId, OrderTotals, Pagination, ProductId, Sort, UserId};

use super::{PgStore, count_to_total, map_write_error, push_page};
use crate::db::{OrderStore, Page, RepositoryError};
use crate::models::{
    NewOrder, Order, OrderFilter, OrderItem, OrderSort, OrderStatus, PaymentResult,
    ShippingAddress,
};

macro_rules! order_columns {
    () => {
        "id, user_id, shipping_address, payment_method, \
         items_price, tax_price, shipping_price, total_price, \
         is_paid, paid_at, payment_result, is_delivered, delivered_at, \
         created_at, updated_at"
    };
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    shipping_address: Option<Json<ShippingAddress>>,
    payment_method: Option<String>,
    items_price: Decimal,
    tax_price: Decimal,
    shipping_price: Decimal,
    total_price: Decimal,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    payment_result: Option<Json<PaymentResult>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items,
            shipping_address: self.shipping_address.map(|Json(a)| a),
            payment_method: self.payment_method,
            totals: OrderTotals {
                items_price: self.items_price,
                tax_price: self.tax_price,
                shipping_price: self.shipping_price,
                total_price: self.total_price,
            },
            status: OrderStatus {
                is_paid: self.is_paid,
                paid_at: self.paid_at,
                payment_result: self.payment_result.map(|Json(r)| r),
                is_delivered: self.is_delivered,
                delivered_at: self.delivered_at,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    product_id: Option<ProductId>,
    name: String,
    quantity: i32,
    price: Decimal,
}

impl PgStore {
    /// Load the items of several orders, grouped by order.
    async fn load_items(
        &self,
        orders: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
        let ids: Vec<i32> = orders.iter().map(OrderId::as_i32).collect();

        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT order_id, product_id, name, quantity, price FROM order_items \
             WHERE order_id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(OrderItem {
                product_id: row.product_id,
                name: row.name,
                quantity: row.quantity,
                price: row.price,
            });
        }
        Ok(grouped)
    }

    async fn attach_items(&self, row: OrderRow) -> Result<Order, RepositoryError> {
        let mut items = self.load_items(&[row.id]).await?;
        let own = items.remove(&row.id).unwrap_or_default();
        Ok(row.into_order(own))
    }
}

impl OrderStore for PgStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: OrderRow = sqlx::query_as(concat!(
            "INSERT INTO orders ",
            "(user_id, shipping_address, payment_method, ",
            "items_price, tax_price, shipping_price, total_price) ",
            "VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING ",
            order_columns!()
        ))
        .bind(order.user_id)
        .bind(order.shipping_address.as_ref().map(Json))
        .bind(order.payment_method.as_deref())
        .bind(order.totals.items_price)
        .bind(order.totals.tax_price)
        .bind(order.totals.shipping_price)
        .bind(order.totals.total_price)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Order already exists", "User not found"))?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, name, quantity, price) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(row.id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Duplicate order item", "Product not found"))?;
        }

        tx.commit().await?;

        Ok(row.into_order(order.items))
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        sort: Sort<OrderSort>,
        page: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders WHERE TRUE");
        if let Some(user) = filter.user {
            count.push(" AND user_id = ").push_bind(user);
        }
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE TRUE"
        ));
        if let Some(user) = filter.user {
            select.push(" AND user_id = ").push_bind(user);
        }
        push_page(&mut select, sort.field.column(), sort.direction, page);
        let rows: Vec<OrderRow> = select.build_query_as().fetch_all(&self.pool).await?;

        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_items(&ids).await?;

        let orders = rows
            .into_iter()
            .map(|row| {
                let own = items.remove(&row.id).unwrap_or_default();
                row.into_order(own)
            })
            .collect();

        Ok((orders, count_to_total(total)))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.attach_items(row).await?)),
            None => Ok(None),
        }
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: &OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(concat!(
            "UPDATE orders SET ",
            "is_paid = $2, paid_at = $3, payment_result = $4, ",
            "is_delivered = $5, delivered_at = $6, updated_at = NOW() ",
            "WHERE id = $1 RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(status.is_paid)
        .bind(status.paid_at)
        .bind(status.payment_result.as_ref().map(Json))
        .bind(status.is_delivered)
        .bind(status.delivered_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.attach_items(row).await?)),
            None => Ok(None),
        }
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        // Items go with the order (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
