use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::products::{
        CreateProductRequest, ProductCount, ProductFilterRequest, ProductList, UpdateProductRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    routes::params::{Pagination, ProductQuery},
    services::product_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/", post(create_product))
        .route("/count", get(count_products))
        .route("/filter", post(filter_products))
        .route("/search/{keyword}", get(search_products))
        .route("/slug/{slug}", get(get_product))
        .route("/slug/{slug}/photo", get(get_product_photo))
        .route("/slug/{slug}/related", get(related_products))
        .route("/category/{slug}", get(list_by_category))
        .route("/{id}", put(update_product))
        .route("/{id}", delete(delete_product))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("sort_by" = Option<String>, Query, description = "Sort column: created_at, price, name"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc"),
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/count",
    responses(
        (status = 200, description = "Total product count", body = ApiResponse<ProductCount>)
    ),
    tag = "Products"
)]
pub async fn count_products(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ProductCount>>> {
    let resp = product_service::count_products(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/search/{keyword}",
    params(("keyword" = String, Path, description = "Search keyword")),
    responses(
        (status = 200, description = "Search products by name or description", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Path(keyword): Path<String>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::search_products(&state, &keyword).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/slug/{slug}",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Get product by slug", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, &slug).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/slug/{slug}/photo",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Raw product image bytes"),
        (status = 404, description = "Product or photo not found"),
    ),
    tag = "Products"
)]
pub async fn get_product_photo(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<(HeaderMap, Vec<u8>)> {
    let (bytes, content_type) = product_service::get_product_photo(&state, &slug).await?;
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    Ok((headers, bytes))
}

#[utoipa::path(
    get,
    path = "/api/products/slug/{slug}/related",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Products in the same category", body = ApiResponse<ProductList>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn related_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::related_products(&state, &slug).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/category/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Products in a category", body = ApiResponse<ProductList>),
        (status = 404, description = "Category not found"),
    ),
    tag = "Products"
)]
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_by_category(&state, &slug).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products/filter",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    request_body = ProductFilterRequest,
    responses(
        (status = 200, description = "Filter products by category and price range", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn filter_products(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Json(payload): Json<ProductFilterRequest>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::filter_products(&state, payload, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Create product", body = ApiResponse<Product>),
        (status = 400, description = "Invalid field or unresolved category"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Product already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::create_product(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Update product", body = ApiResponse<Product>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_product(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Delete product"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}
