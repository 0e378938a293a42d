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
        analytics::{ActivityList, DailySales, SalesSeries, StatusCount, Summary, TopProduct, TopProductList},
        auth::{AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest},
        invoices::InvoiceList,
        messages::{CreateMessageRequest, MessageList, ReplyMessageRequest},
        orders::{CreateOrderRequest, OrderLineRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::{CategoryList, CreateProductRequest, ProductList, StockAdjustRequest, UpdateProductRequest},
        upload::{ImageList, UploadedImage},
        users::{UpdateRoleRequest, UserList},
    },
    error::{ErrorBody, FieldError},
    models::{
        AuditEntry, ImageFile, Invoice, InvoiceStatus, Message, MessageStatus, Order, OrderItem,
        OrderStatus, PaymentMethod, PaymentStatus, Product, Role, ShippingAddress, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        analytics, auth, health, invoices, messages, notifications, orders, params, products,
        upload, users,
    },
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
    info(title = "MedStore API", description = "Online medical store backend"),
    paths(
        health::health_check,
        health::readiness,
        auth::register,
        auth::login,
        auth::me,
        auth::update_me,
        auth::change_password,
        auth::logout,
        products::list_products,
        products::list_categories,
        products::get_product,
        products::create_product,
        products::update_product,
        products::adjust_stock,
        products::delete_product,
        orders::create_order,
        orders::list_my_orders,
        orders::list_all_orders,
        orders::get_order,
        orders::pay_order,
        orders::cancel_order,
        orders::update_order_status,
        users::list_users,
        users::get_user,
        users::update_role,
        users::delete_user,
        invoices::list_invoices,
        invoices::get_invoice,
        invoices::get_invoice_for_order,
        messages::create_message,
        messages::list_my_messages,
        messages::list_messages,
        messages::get_message,
        messages::reply_message,
        messages::delete_message,
        analytics::summary,
        analytics::sales,
        analytics::top_products,
        analytics::low_stock,
        analytics::activity,
        upload::upload_image,
        upload::list_images,
        upload::download_image,
        upload::delete_image,
        notifications::stream
    ),
    components(
        schemas(
            User,
            Role,
            Product,
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            ShippingAddress,
            Invoice,
            InvoiceStatus,
            Message,
            MessageStatus,
            AuditEntry,
            ImageFile,
            RegisterRequest,
            LoginRequest,
            UpdateProfileRequest,
            ChangePasswordRequest,
            AuthResponse,
            CreateProductRequest,
            UpdateProductRequest,
            StockAdjustRequest,
            ProductList,
            CategoryList,
            OrderLineRequest,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            UpdateRoleRequest,
            UserList,
            InvoiceList,
            CreateMessageRequest,
            ReplyMessageRequest,
            MessageList,
            StatusCount,
            Summary,
            DailySales,
            SalesSeries,
            TopProduct,
            TopProductList,
            ActivityList,
            UploadedImage,
            ImageList,
            health::HealthData,
            params::Pagination,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ErrorBody,
            FieldError,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<AuthResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Auth", description = "Registration, login and profile"),
        (name = "Products", description = "Catalog and stock"),
        (name = "Orders", description = "Checkout, payment and fulfilment"),
        (name = "Users", description = "User administration"),
        (name = "Invoices", description = "Invoices issued with orders"),
        (name = "Messages", description = "Contact form and replies"),
        (name = "Analytics", description = "Admin dashboard figures"),
        (name = "Upload", description = "Product image store"),
        (name = "Notifications", description = "Server-sent event stream"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
