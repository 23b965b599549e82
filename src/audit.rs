use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Every account- or catalog-level mutation the storefront records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserRegister,
    UserLogin,
    PasswordReset,
    ProfileUpdate,
    CategoryCreate,
    CategoryUpdate,
    CategoryDelete,
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    Checkout,
    OrderStatusUpdate,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::UserRegister => "user_register",
            AuditAction::UserLogin => "user_login",
            AuditAction::PasswordReset => "password_reset",
            AuditAction::ProfileUpdate => "profile_update",
            AuditAction::CategoryCreate => "category_create",
            AuditAction::CategoryUpdate => "category_update",
            AuditAction::CategoryDelete => "category_delete",
            AuditAction::ProductCreate => "product_create",
            AuditAction::ProductUpdate => "product_update",
            AuditAction::ProductDelete => "product_delete",
            AuditAction::Checkout => "checkout",
            AuditAction::OrderStatusUpdate => "order_status_update",
        }
    }

    /// Table the action touches, recorded alongside it.
    pub fn resource(self) -> &'static str {
        match self {
            AuditAction::UserRegister
            | AuditAction::UserLogin
            | AuditAction::PasswordReset
            | AuditAction::ProfileUpdate => "users",
            AuditAction::CategoryCreate
            | AuditAction::CategoryUpdate
            | AuditAction::CategoryDelete => "categories",
            AuditAction::ProductCreate | AuditAction::ProductUpdate | AuditAction::ProductDelete => {
                "products"
            }
            AuditAction::Checkout | AuditAction::OrderStatusUpdate => "orders",
        }
    }
}

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    metadata: Option<Value>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(action.as_str())
    .bind(action.resource())
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_map_to_their_resource_table() {
        assert_eq!(AuditAction::Checkout.resource(), "orders");
        assert_eq!(AuditAction::ProductDelete.resource(), "products");
        assert_eq!(AuditAction::PasswordReset.resource(), "users");
        assert_eq!(AuditAction::CategoryUpdate.as_str(), "category_update");
    }
}
