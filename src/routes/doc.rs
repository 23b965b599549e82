use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
            UpdateProfileRequest, UserList,
        },
        cart::{CartLine, CheckoutRequest, ClientTokenResponse},
        categories::{CategoryList, CategoryRequest},
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::{
            CreateProductRequest, ProductCount, ProductFilterRequest, ProductList,
            UpdateProductRequest,
        },
    },
    models::{Category, Order, OrderItem, OrderStatus, Product, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, categories, health, orders, params, products},
    security::token::Claims,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::forgot_password,
        auth::update_profile,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::count_products,
        products::search_products,
        products::get_product,
        products::get_product_photo,
        products::related_products,
        products::list_by_category,
        products::filter_products,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::list_orders,
        orders::get_order,
        orders::checkout,
        orders::client_token,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_users
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            Order,
            OrderItem,
            OrderStatus,
            Claims,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ForgotPasswordRequest,
            UpdateProfileRequest,
            UserList,
            CategoryRequest,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductFilterRequest,
            ProductList,
            ProductCount,
            CartLine,
            CheckoutRequest,
            ClientTokenResponse,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<User>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CategoryList>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login, and profile endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Orders", description = "Checkout and order history endpoints"),
        (name = "Payments", description = "Payment gateway endpoints"),
        (name = "Admin", description = "Back-office endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
