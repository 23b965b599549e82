use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    /// Price in cents.
    pub price: i64,
    pub quantity: i32,
    pub shipping: bool,
    pub category_id: Uuid,
    /// Base64-encoded image payload.
    pub photo: Option<String>,
    pub photo_content_type: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub quantity: Option<i32>,
    pub shipping: Option<bool>,
    pub category_id: Option<Uuid>,
    pub photo: Option<String>,
    pub photo_content_type: Option<String>,
}

/// Storefront filter: any of the checked categories, optionally bounded by a
/// price range in cents.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductFilterRequest {
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductCount {
    pub total: i64,
}
