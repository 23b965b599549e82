use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Account record. The credential digests are persisted but never leave the
/// process: `skip_serializing` keeps them out of every response body.
#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: String,
    pub address: String,
    #[serde(skip_serializing)]
    pub answer_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    /// Price in cents.
    pub price: i64,
    pub quantity: i32,
    pub shipping: bool,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub payment_success: bool,
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price in cents, snapshotted at order time.
    pub price: i64,
}

/// Order lifecycle. Stored as its display string; unknown strings coming in
/// from the API are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum OrderStatus {
    #[serde(rename = "Not Processed")]
    NotProcessed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::NotProcessed => "Not Processed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Not Processed" => Some(OrderStatus::NotProcessed),
            "Processing" => Some(OrderStatus::Processing),
            "Shipped" => Some(OrderStatus::Shipped),
            "Delivered" => Some(OrderStatus::Delivered),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::NotProcessed => Some(0),
            OrderStatus::Processing => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Forward-only transition table. Re-asserting the current status is
    /// allowed so a retried update stays idempotent; terminal states admit
    /// no further movement.
    pub fn can_transition(&self, to: OrderStatus) -> bool {
        if *self == to {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match to {
            OrderStatus::Cancelled => true,
            _ => match (self.rank(), to.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

/// Slug derivation shared by categories and products: whitespace becomes a
/// hyphen, everything else is kept as typed ("Home Living" -> "Home-Living").
pub fn slugify(name: &str) -> String {
    name.trim().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_replaces_whitespace_with_hyphens() {
        assert_eq!(slugify("Home Living"), "Home-Living");
        assert_eq!(slugify("Electronics"), "Electronics");
        assert_eq!(slugify("  Office Chairs "), "Office-Chairs");
    }

    #[test]
    fn status_round_trips_through_display_string() {
        for status in [
            OrderStatus::NotProcessed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
        assert_eq!(OrderStatus::parse("On Hold"), None);
    }

    #[test]
    fn transitions_are_forward_only() {
        use OrderStatus::*;
        assert!(NotProcessed.can_transition(Processing));
        assert!(NotProcessed.can_transition(Shipped));
        assert!(Processing.can_transition(Delivered));
        assert!(!Shipped.can_transition(Processing));
        assert!(!Delivered.can_transition(Processing));
        assert!(!Delivered.can_transition(Cancelled));
    }

    #[test]
    fn cancel_is_reachable_until_terminal() {
        use OrderStatus::*;
        assert!(NotProcessed.can_transition(Cancelled));
        assert!(Shipped.can_transition(Cancelled));
        assert!(!Cancelled.can_transition(Processing));
        assert!(Cancelled.can_transition(Cancelled));
    }

    #[test]
    fn reasserting_current_status_is_allowed() {
        use OrderStatus::*;
        assert!(Processing.can_transition(Processing));
        assert!(Delivered.can_transition(Delivered));
    }
}
