use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One line of the client-held cart. Only the product reference and quantity
/// are trusted; prices are recomputed server-side at checkout.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Payment nonce produced by the gateway widget.
    pub nonce: String,
    pub cart: Vec<CartLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientTokenResponse {
    pub client_token: String,
}
