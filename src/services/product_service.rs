use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    dto::products::{
        CreateProductRequest, ProductCount, ProductFilterRequest, ProductList, UpdateProductRequest,
    },
    entity::{
        categories::{Column as CatCol, Entity as Categories},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, slugify},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductSortBy, ProductQuery, SortOrder},
    state::AppState,
};

/// How many sibling products "related" returns.
const RELATED_LIMIT: u64 = 3;

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find();
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::paged(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn count_products(state: &AppState) -> AppResult<ApiResponse<ProductCount>> {
    let total = Products::find().count(&state.orm).await? as i64;
    Ok(ApiResponse::success(
        "Product count",
        ProductCount { total },
        None,
    ))
}

pub async fn get_product(state: &AppState, slug: &str) -> AppResult<ApiResponse<Product>> {
    let product = find_by_slug(state, slug).await?;
    Ok(ApiResponse::success(
        "Product",
        product_from_entity(product),
        None,
    ))
}

/// Raw image bytes plus their content type, for the storefront grid.
pub async fn get_product_photo(state: &AppState, slug: &str) -> AppResult<(Vec<u8>, String)> {
    let product = find_by_slug(state, slug).await?;
    match product.photo {
        Some(bytes) => {
            let content_type = product
                .photo_content_type
                .unwrap_or_else(|| "application/octet-stream".to_string());
            Ok((bytes, content_type))
        }
        None => Err(AppError::NotFound),
    }
}

pub async fn search_products(
    state: &AppState,
    keyword: &str,
) -> AppResult<ApiResponse<ProductList>> {
    let pattern = format!("%{}%", keyword);
    let condition = Condition::any()
        .add(Expr::col(Column::Name).ilike(pattern.clone()))
        .add(Expr::col(Column::Description).ilike(pattern));

    let items = Products::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Search results",
        ProductList { items },
        Some(Meta::empty()),
    ))
}

/// Products sharing the given product's category, excluding itself.
pub async fn related_products(
    state: &AppState,
    slug: &str,
) -> AppResult<ApiResponse<ProductList>> {
    let product = find_by_slug(state, slug).await?;

    let items = Products::find()
        .filter(
            Condition::all()
                .add(Column::CategoryId.eq(product.category_id))
                .add(Column::Id.ne(product.id)),
        )
        .order_by_desc(Column::CreatedAt)
        .limit(RELATED_LIMIT)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Related products",
        ProductList { items },
        Some(Meta::empty()),
    ))
}

pub async fn list_by_category(
    state: &AppState,
    category_slug: &str,
) -> AppResult<ApiResponse<ProductList>> {
    let category = Categories::find()
        .filter(CatCol::Slug.eq(category_slug))
        .one(&state.orm)
        .await?;
    let category = match category {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let items = Products::find()
        .filter(Column::CategoryId.eq(category.id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Products by category",
        ProductList { items },
        Some(Meta::empty()),
    ))
}

pub async fn filter_products(
    state: &AppState,
    payload: ProductFilterRequest,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = pagination.normalize();
    let mut condition = Condition::all();

    if !payload.category_ids.is_empty() {
        condition = condition.add(Column::CategoryId.is_in(payload.category_ids));
    }
    if let Some(min) = payload.price_min {
        condition = condition.add(Column::Price.gte(min));
    }
    if let Some(max) = payload.price_max {
        condition = condition.add(Column::Price.lte(max));
    }

    let finder = Products::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::paged(page, limit, total);
    Ok(ApiResponse::success(
        "Filtered products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if payload.price < 0 {
        return Err(AppError::Validation("price must not be negative".into()));
    }
    if payload.quantity < 0 {
        return Err(AppError::Validation("quantity must not be negative".into()));
    }
    ensure_category_exists(state, payload.category_id).await?;

    let slug = slugify(&name);
    let exist = Products::find()
        .filter(Column::Slug.eq(slug.clone()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Duplicate("Product already exists".into()));
    }

    let photo = decode_photo(payload.photo.as_deref())?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        slug: Set(slug),
        description: Set(payload.description),
        price: Set(payload.price),
        quantity: Set(payload.quantity),
        shipping: Set(payload.shipping),
        category_id: Set(payload.category_id),
        photo: Set(photo),
        photo_content_type: Set(payload.photo_content_type),
        created_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductCreate,
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Some(category_id) = payload.category_id {
        ensure_category_exists(state, category_id).await?;
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        active.slug = Set(slugify(&name));
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        if price < 0 {
            return Err(AppError::Validation("price must not be negative".into()));
        }
        active.price = Set(price);
    }
    if let Some(quantity) = payload.quantity {
        if quantity < 0 {
            return Err(AppError::Validation("quantity must not be negative".into()));
        }
        active.quantity = Set(quantity);
    }
    if let Some(shipping) = payload.shipping {
        active.shipping = Set(shipping);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(category_id);
    }
    if payload.photo.is_some() {
        active.photo = Set(decode_photo(payload.photo.as_deref())?);
        active.photo_content_type = Set(payload.photo_content_type);
    }

    let product = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductUpdate,
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        AuditAction::ProductDelete,
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::message_only("Product deleted"))
}

async fn find_by_slug(state: &AppState, slug: &str) -> AppResult<ProductModel> {
    let product = Products::find()
        .filter(Column::Slug.eq(slug))
        .one(&state.orm)
        .await?;
    match product {
        Some(p) => Ok(p),
        None => Err(AppError::NotFound),
    }
}

async fn ensure_category_exists(state: &AppState, category_id: Uuid) -> AppResult<()> {
    let exist = Categories::find_by_id(category_id).one(&state.orm).await?;
    if exist.is_none() {
        return Err(AppError::Validation(
            "category does not resolve to an existing category".into(),
        ));
    }
    Ok(())
}

fn decode_photo(photo: Option<&str>) -> AppResult<Option<Vec<u8>>> {
    match photo {
        Some(encoded) => {
            let bytes = BASE64
                .decode(encoded)
                .map_err(|_| AppError::Validation("photo is not valid base64".into()))?;
            Ok(Some(bytes))
        }
        None => Ok(None),
    }
}

pub fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        slug: model.slug,
        description: model.description,
        price: model.price,
        quantity: model.quantity,
        shipping: model.shipping,
        category_id: model.category_id,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_decoding_rejects_invalid_base64() {
        assert!(matches!(
            decode_photo(Some("not base64!!!")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn photo_decoding_round_trips() {
        let encoded = BASE64.encode(b"fake image bytes");
        let decoded = decode_photo(Some(&encoded)).unwrap().unwrap();
        assert_eq!(decoded, b"fake image bytes");
        assert!(decode_photo(None).unwrap().is_none());
    }
}
