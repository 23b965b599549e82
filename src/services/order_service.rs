use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::{
        cart::{CartLine, CheckoutRequest, ClientTokenResponse},
        orders::{OrderList, OrderWithItems},
    },
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// A cart line after server-side repricing against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price in cents from the authoritative product record.
    pub unit_price: i64,
}

/// Total owed for a repriced cart, in cents.
pub fn cart_total(lines: &[PricedLine]) -> i64 {
    lines
        .iter()
        .map(|line| line.unit_price * line.quantity as i64)
        .sum()
}

/// Upper bound on the merged quantity for any one product. Stock levels are
/// nowhere near this, so anything larger is a malformed cart.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Collapse repeated product references into one line per product. The
/// client cart expresses quantity by repetition, so duplicates are additive.
/// Quantities are summed in `i64` and bounded so that client-supplied values
/// cannot overflow the per-line `i32`.
pub fn merge_lines(lines: &[CartLine]) -> AppResult<Vec<(Uuid, i32)>> {
    let mut merged: BTreeMap<Uuid, i64> = BTreeMap::new();
    for line in lines {
        *merged.entry(line.product_id).or_insert(0) += i64::from(line.quantity);
    }
    merged
        .into_iter()
        .map(|(id, quantity)| {
            if quantity > MAX_LINE_QUANTITY {
                Err(AppError::Validation("Cart has invalid quantity".into()))
            } else {
                Ok((id, quantity as i32))
            }
        })
        .collect()
}

pub async fn client_token(state: &AppState) -> AppResult<ApiResponse<ClientTokenResponse>> {
    let client_token = state.gateway.client_token().await?;
    Ok(ApiResponse::success(
        "Client token",
        ClientTokenResponse { client_token },
        None,
    ))
}

/// Checkout: reprice the client cart from the catalog, charge the gateway,
/// and only on success persist the order, its line items, and the stock
/// decrement in one transaction. A declined charge writes nothing.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.nonce.trim().is_empty() {
        return Err(AppError::Validation("payment nonce is required".into()));
    }
    if payload.cart.is_empty() {
        return Err(AppError::Validation("Cart is empty".into()));
    }
    for line in &payload.cart {
        if line.quantity <= 0 {
            return Err(AppError::Validation("Cart has invalid quantity".into()));
        }
    }
    ensure_delivery_address(state, user).await?;

    let merged = merge_lines(&payload.cart)?;
    let product_ids: Vec<Uuid> = merged.iter().map(|(id, _)| *id).collect();

    let txn = state.orm.begin().await?;

    let products = Products::find()
        .filter(ProdCol::Id.is_in(product_ids.clone()))
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if products.len() != product_ids.len() {
        return Err(AppError::NotFound);
    }

    let mut lines: Vec<PricedLine> = Vec::with_capacity(merged.len());
    for (product_id, quantity) in &merged {
        let product = products
            .iter()
            .find(|p| p.id == *product_id)
            .ok_or(AppError::NotFound)?;
        if product.quantity < *quantity {
            return Err(AppError::Validation(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
        lines.push(PricedLine {
            product_id: *product_id,
            quantity: *quantity,
            unit_price: product.price,
        });
    }

    let total_amount = cart_total(&lines);

    // No order row exists until the processor reports success; a failure
    // here drops the transaction with nothing written.
    let outcome = state.gateway.charge(&payload.nonce, total_amount).await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::NotProcessed.as_str().to_string()),
        payment_success: Set(outcome.success),
        payment_ref: Set(Some(outcome.transaction_id)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.unit_price),
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));

        Products::update_many()
            .col_expr(
                ProdCol::Quantity,
                Expr::col(ProdCol::Quantity).sub(line.quantity),
            )
            .filter(ProdCol::Id.eq(line.product_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::Checkout,
        Some(serde_json::json!({ "order_id": order.id, "total": total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::paged(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

async fn ensure_delivery_address(state: &AppState, user: &AuthUser) -> AppResult<()> {
    let address: Option<(String,)> = sqlx::query_as("SELECT address FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?;
    match address {
        Some((address,)) if !address.trim().is_empty() => Ok(()),
        Some(_) => Err(AppError::Validation(
            "A delivery address is required before checkout".into(),
        )),
        None => Err(AppError::NotFound),
    }
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        status: OrderStatus::parse(&model.status).unwrap_or(OrderStatus::NotProcessed),
        payment_success: model.payment_success,
        payment_ref: model.payment_ref,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(unit_price: i64) -> PricedLine {
        PricedLine {
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price,
        }
    }

    #[test]
    fn total_is_the_sum_of_line_prices() {
        let cart = vec![line(2), line(5), line(4)];
        assert_eq!(cart_total(&cart), 11);
    }

    #[test]
    fn removing_a_line_drops_its_price_from_the_total() {
        let cart = vec![line(2), line(5), line(4)];
        let remaining: Vec<PricedLine> = cart[1..].to_vec();
        assert_eq!(remaining.len(), 2);
        assert_eq!(cart_total(&remaining), 9);
    }

    #[test]
    fn quantities_multiply_unit_prices() {
        let mut cart = vec![line(250)];
        cart[0].quantity = 3;
        assert_eq!(cart_total(&cart), 750);
    }

    #[test]
    fn repeated_products_merge_additively() {
        let product_id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let lines = vec![
            CartLine {
                product_id,
                quantity: 1,
            },
            CartLine {
                product_id: other,
                quantity: 2,
            },
            CartLine {
                product_id,
                quantity: 1,
            },
        ];
        let merged = merge_lines(&lines).unwrap();
        assert_eq!(merged.len(), 2);
        let merged_qty = merged
            .iter()
            .find(|(id, _)| *id == product_id)
            .map(|(_, q)| *q);
        assert_eq!(merged_qty, Some(2));
    }

    #[test]
    fn absurd_merged_quantities_are_rejected_without_wrapping() {
        let product_id = Uuid::new_v4();
        let lines = vec![
            CartLine {
                product_id,
                quantity: 2_000_000_000,
            },
            CartLine {
                product_id,
                quantity: 2_000_000_000,
            },
        ];
        let err = merge_lines(&lines).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn quantities_at_the_bound_are_accepted() {
        let lines = vec![CartLine {
            product_id: Uuid::new_v4(),
            quantity: MAX_LINE_QUANTITY as i32,
        }];
        let merged = merge_lines(&lines).unwrap();
        assert_eq!(merged[0].1 as i64, MAX_LINE_QUANTITY);
    }
}
