//! Order domain types.
//!
//! Payment and delivery are two independent flags. Each carries its own
//! timestamp, stamped when the flag is set and cleared when it is unset.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::{OrderId, OrderTotals, ProductId, SortDirection, SortField, UserId};

use super::Identity;

/// A priced line of an order.
///
/// `name` and `price` are snapshots taken from the catalog when the order was
/// placed. `product` is cleared if the product is later deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    #[serde(rename = "product")]
    pub product_id: Option<ProductId>,
    pub name: String,
    #[serde(rename = "qty")]
    pub quantity: i32,
    pub price: Decimal,
}

/// Where an order ships to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Payment provider receipt recorded when an order is marked paid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentResult {
    pub id: Option<String>,
    pub status: Option<String>,
    pub update_time: Option<String>,
    pub email_address: Option<String>,
}

/// Payment and delivery state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatus {
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_result: Option<PaymentResult>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Admin-requested status change. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdate {
    pub is_paid: Option<bool>,
    pub payment_result: Option<PaymentResult>,
    pub is_delivered: Option<bool>,
}

impl OrderStatusUpdate {
    /// Compute the new status.
    ///
    /// Setting a flag that is already set keeps its original timestamp.
    #[must_use]
    pub fn apply(self, current: &OrderStatus, now: DateTime<Utc>) -> OrderStatus {
        let mut next = current.clone();

        match self.is_paid {
            Some(true) => {
                next.is_paid = true;
                next.paid_at = current.paid_at.filter(|_| current.is_paid).or(Some(now));
                if self.payment_result.is_some() {
                    next.payment_result = self.payment_result;
                }
            }
            Some(false) => {
                next.is_paid = false;
                next.paid_at = None;
                next.payment_result = None;
            }
            None => {}
        }

        match self.is_delivered {
            Some(true) => {
                next.is_delivered = true;
                next.delivered_at = current
                    .delivered_at
                    .filter(|_| current.is_delivered)
                    .or(Some(now));
            }
            Some(false) => {
                next.is_delivered = false;
                next.delivered_at = None;
            }
            None => {}
        }

        next
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "user")]
    pub user_id: UserId,
    #[serde(rename = "orderItems")]
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: Option<String>,
    #[serde(flatten)]
    pub totals: OrderTotals,
    #[serde(flatten)]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Owners see their own orders; admins see every order.
    #[must_use]
    pub fn is_visible_to(&self, identity: &Identity) -> bool {
        identity.is_admin() || self.user_id == identity.id
    }
}

/// Input for creating an order. Items are already priced from the catalog.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: Option<String>,
    pub totals: OrderTotals,
}

/// Filters for order listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub user: Option<UserId>,
}

impl OrderFilter {
    /// Whether an order passes the filter.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        self.user.is_none_or(|user| order.user_id == user)
    }
}

/// Sortable order fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSort {
    CreatedAt,
    TotalPrice,
}

impl OrderSort {
    /// Column to order by.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::TotalPrice => "total_price",
        }
    }
}

impl SortField for OrderSort {
    const DEFAULT: Self = Self::CreatedAt;
    const DEFAULT_DIRECTION: SortDirection = SortDirection::Desc;

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "createdAt" => Some(Self::CreatedAt),
            "totalPrice" => Some(Self::TotalPrice),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use emporium_core::{Email, Role};

    use super::*;

    fn identity(id: i32, role: Role) -> Identity {
        Identity {
            id: UserId::new(id),
            name: "someone".to_string(),
            email: Email::parse("someone@example.com").unwrap(),
            role,
        }
    }

    fn order_for(user: i32) -> Order {
        Order {
            id: OrderId::new(1),
            user_id: UserId::new(user),
            items: Vec::new(),
            shipping_address: None,
            payment_method: None,
            totals: OrderTotals {
                items_price: Decimal::ZERO,
                tax_price: Decimal::ZERO,
                shipping_price: Decimal::ZERO,
                total_price: Decimal::ZERO,
            },
            status: OrderStatus::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_visibility() {
        let order = order_for(1);
        assert!(order.is_visible_to(&identity(1, Role::User)));
        assert!(!order.is_visible_to(&identity(2, Role::User)));
        assert!(order.is_visible_to(&identity(2, Role::Admin)));
    }

    #[test]
    fn test_mark_paid_stamps_and_stores_result() {
        let now = Utc::now();
        let receipt = PaymentResult {
            id: Some("PAY-1".to_string()),
            status: Some("COMPLETED".to_string()),
            ..PaymentResult::default()
        };

        let status = OrderStatusUpdate {
            is_paid: Some(true),
            payment_result: Some(receipt.clone()),
            is_delivered: None,
        }
        .apply(&OrderStatus::default(), now);

        assert!(status.is_paid);
        assert_eq!(status.paid_at, Some(now));
        assert_eq!(status.payment_result, Some(receipt));
        assert!(!status.is_delivered);
        assert_eq!(status.delivered_at, None);
    }

    #[test]
    fn test_flags_are_independent() {
        let now = Utc::now();
        let status = OrderStatusUpdate {
            is_delivered: Some(true),
            ..OrderStatusUpdate::default()
        }
        .apply(&OrderStatus::default(), now);

        assert!(status.is_delivered);
        assert_eq!(status.delivered_at, Some(now));
        assert!(!status.is_paid);
        assert_eq!(status.paid_at, None);
    }

    #[test]
    fn test_unset_clears_timestamp() {
        let earlier = Utc::now() - Duration::days(1);
        let current = OrderStatus {
            is_paid: true,
            paid_at: Some(earlier),
            payment_result: Some(PaymentResult::default()),
            is_delivered: true,
            delivered_at: Some(earlier),
        };

        let status = OrderStatusUpdate {
            is_paid: Some(false),
            payment_result: None,
            is_delivered: Some(false),
        }
        .apply(&current, Utc::now());

        assert_eq!(status, OrderStatus::default());
    }

    #[test]
    fn test_setting_again_keeps_timestamp() {
        let earlier = Utc::now() - Duration::days(1);
        let current = OrderStatus {
            is_paid: true,
            paid_at: Some(earlier),
            ..OrderStatus::default()
        };

        let status = OrderStatusUpdate {
            is_paid: Some(true),
            ..OrderStatusUpdate::default()
        }
        .apply(&current, Utc::now());

        assert_eq!(status.paid_at, Some(earlier));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(order_for(3)).unwrap();
        assert_eq!(json["user"], 3);
        assert_eq!(json["totalPrice"], "0");
        assert_eq!(json["isPaid"], false);
        assert!(json["orderItems"].is_array());
    }
}
