//! End-to-end service flows against a real database. Skipped unless
//! `TEST_DATABASE_URL` or `DATABASE_URL` is set. Every run uses fresh
//! emails and product names, so no table is truncated.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use medstore_api::{
    app::build_app,
    config::AppConfig,
    db::{create_pool, run_migrations},
    dto::{
        auth::{LoginRequest, RegisterRequest},
        messages::{CreateMessageRequest, ReplyMessageRequest},
        orders::{CreateOrderRequest, OrderLineRequest, UpdateOrderStatusRequest},
        products::{CreateProductRequest, StockAdjustRequest, UpdateProductRequest},
        users::UpdateRoleRequest,
    },
    entity::users::ActiveModel as UserActive,
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        InvoiceStatus, MessageStatus, OrderStatus, PaymentMethod, PaymentStatus, Role,
        ShippingAddress,
    },
    routes::params::{
        InvoiceListQuery, LowStockQuery, Pagination, SalesQuery, TopProductsQuery,
        UserListQuery,
    },
    services::{
        analytics_service, auth_service, invoice_service, message_service, order_service,
        product_service, user_service,
    },
    state::AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "flow-test-secret";

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;
    Ok(Some(AppState::new(
        pool,
        AppConfig::for_tests(&database_url, SECRET),
    )))
}

async fn create_admin(state: &AppState) -> anyhow::Result<AuthUser> {
    let now = chrono::Utc::now();
    let admin = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set("Flow Admin".into()),
        email: Set(format!("admin-{}@flow.test", Uuid::new_v4().simple())),
        password_hash: Set(auth_service::hash_password("admin-password")?),
        phone: Set(None),
        address: Set(None),
        role: Set(Role::Admin.as_str().into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: admin.id,
        role: Role::Admin,
    })
}

async fn register_customer(state: &AppState) -> anyhow::Result<(AuthUser, String)> {
    let email = format!("customer-{}@flow.test", Uuid::new_v4().simple());
    let resp = auth_service::register_user(
        state,
        RegisterRequest {
            name: "Flow Customer".into(),
            email: email.clone(),
            password: "customer-password".into(),
            phone: None,
        },
    )
    .await?;
    let data = resp.data.expect("auth data");
    Ok((
        AuthUser {
            user_id: data.user.id,
            role: data.user.role,
        },
        email,
    ))
}

async fn create_product(
    state: &AppState,
    admin: &AuthUser,
    price: i64,
    stock: i32,
) -> anyhow::Result<medstore_api::models::Product> {
    let resp = product_service::create_product(
        state,
        admin,
        CreateProductRequest {
            name: format!("Flow Tablets {}", Uuid::new_v4().simple()),
            description: Some("Test product".into()),
            category: "Flow Tests".into(),
            brand: None,
            price,
            stock,
            requires_prescription: false,
            expiry_date: None,
            image_ids: Vec::new(),
        },
    )
    .await?;
    Ok(resp.data.expect("product"))
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Flow Customer".into(),
        phone: "0712345678".into(),
        street: "1 Test Street".into(),
        city: "Nairobi".into(),
        postal_code: "00100".into(),
        country: "Kenya".into(),
    }
}

fn order_request(lines: &[(Uuid, i32)], method: PaymentMethod) -> CreateOrderRequest {
    CreateOrderRequest {
        items: lines
            .iter()
            .map(|(product_id, quantity)| OrderLineRequest {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
        shipping_address: address(),
        payment_method: method,
    }
}

async fn stock_of(state: &AppState, id: Uuid) -> anyhow::Result<i32> {
    let product = product_service::get_product(state, id).await?;
    Ok(product.data.expect("product").stock)
}

fn first_page() -> Pagination {
    Pagination {
        page: Some(1),
        per_page: Some(100),
    }
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> anyhow::Result<(StatusCode, Value)> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json)?)
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body)?).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes).unwrap_or(Value::Null)))
}

fn status_and_message(err: &AppError) -> (StatusCode, String) {
    let (status, message, _) = err.classify();
    (status, message)
}

#[tokio::test]
async fn register_and_login() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let (customer, email) = register_customer(&state).await?;

    let again = auth_service::register_user(
        &state,
        RegisterRequest {
            name: "Copy".into(),
            email: email.to_uppercase(),
            password: "another-password".into(),
            phone: None,
        },
    )
    .await
    .expect_err("duplicate email");
    assert_eq!(
        status_and_message(&again),
        (StatusCode::BAD_REQUEST, "Email is already registered".into())
    );

    let login = auth_service::login_user(
        &state,
        LoginRequest {
            email: email.clone(),
            password: "customer-password".into(),
        },
    )
    .await?;
    let data = login.data.expect("login data");
    assert_eq!(data.user.id, customer.user_id);
    assert_eq!(data.user.role, Role::User);
    let decoded = medstore_api::middleware::auth::decode_token(&data.token, SECRET)?;
    assert_eq!(decoded.user_id, customer.user_id);

    let wrong = auth_service::login_user(
        &state,
        LoginRequest {
            email,
            password: "not-the-password".into(),
        },
    )
    .await
    .expect_err("wrong password");
    assert_eq!(
        status_and_message(&wrong),
        (StatusCode::UNAUTHORIZED, "Invalid email or password".into())
    );
    Ok(())
}

#[tokio::test]
async fn order_pay_fulfil_and_cancel_flow() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let (customer, _) = register_customer(&state).await?;
    let (stranger, _) = register_customer(&state).await?;
    let product = create_product(&state, &admin, 12_000, 10).await?;

    let duplicate = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: product.name.clone(),
            description: None,
            category: "Flow Tests".into(),
            brand: None,
            price: 1,
            stock: 1,
            requires_prescription: false,
            expiry_date: None,
            image_ids: Vec::new(),
        },
    )
    .await
    .expect_err("duplicate name");
    assert_eq!(
        status_and_message(&duplicate),
        (
            StatusCode::BAD_REQUEST,
            "Duplicate field value entered: name".into()
        )
    );

    let mut admin_feed = state.notifier.subscribe();

    // Two lines for the same product merge into a quantity of 3.
    let placed = order_service::create_order(
        &state,
        &customer,
        order_request(&[(product.id, 1), (product.id, 2)], PaymentMethod::Card),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].quantity, 3);
    assert_eq!(placed.items[0].price, 12_000);
    assert_eq!(placed.order.items_total, 36_000);
    assert_eq!(placed.order.tax_amount, 1_800);
    assert_eq!(placed.order.shipping_fee, 5_000);
    assert_eq!(placed.order.total_amount, 42_800);
    assert_eq!(placed.order.status, OrderStatus::Pending);
    let invoice = placed.invoice.clone().expect("invoice issued");
    assert_eq!(invoice.status, InvoiceStatus::Issued);
    assert_eq!(invoice.total_amount, 42_800);
    assert!(invoice.invoice_number.starts_with("INV-"));
    assert_eq!(stock_of(&state, product.id).await?, 7);

    let event = admin_feed.try_recv()?;
    assert_eq!(event.kind, "order_created");
    assert!(event.is_for(&admin));
    assert!(!event.is_for(&customer));

    let too_many = order_service::create_order(
        &state,
        &customer,
        order_request(&[(product.id, 8)], PaymentMethod::Card),
    )
    .await
    .expect_err("insufficient stock");
    assert_eq!(
        status_and_message(&too_many),
        (
            StatusCode::BAD_REQUEST,
            format!("Insufficient stock for {}", product.name)
        )
    );
    assert_eq!(stock_of(&state, product.id).await?, 7);

    let missing = order_service::create_order(
        &state,
        &customer,
        order_request(&[(Uuid::new_v4(), 1)], PaymentMethod::Card),
    )
    .await
    .expect_err("unknown product");
    assert_eq!(status_and_message(&missing).0, StatusCode::BAD_REQUEST);

    let hidden = order_service::get_order(&state, &stranger, placed.order.id)
        .await
        .expect_err("other users' orders are hidden");
    assert_eq!(status_and_message(&hidden).0, StatusCode::NOT_FOUND);

    let paid = order_service::pay_order(&state, &customer, placed.order.id)
        .await?
        .data
        .expect("paid order");
    assert_eq!(paid.order.payment_status, PaymentStatus::Paid);
    assert!(paid.order.paid_at.is_some());
    assert_eq!(paid.invoice.expect("invoice").status, InvoiceStatus::Paid);

    let twice = order_service::pay_order(&state, &customer, placed.order.id)
        .await
        .expect_err("already paid");
    assert_eq!(
        status_and_message(&twice),
        (StatusCode::BAD_REQUEST, "Order already paid".into())
    );

    let skip = order_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipped,
        },
    )
    .await
    .expect_err("pending cannot jump to shipped");
    assert_eq!(status_and_message(&skip).0, StatusCode::BAD_REQUEST);

    for next in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let updated = order_service::update_order_status(
            &state,
            &admin,
            placed.order.id,
            UpdateOrderStatusRequest { status: next },
        )
        .await?
        .data
        .expect("updated order");
        assert_eq!(updated.order.status, next);
    }
    let delivered = order_service::get_order(&state, &customer, placed.order.id)
        .await?
        .data
        .expect("order");
    assert!(delivered.order.delivered_at.is_some());

    let late_cancel = order_service::cancel_order(&state, &customer, placed.order.id)
        .await
        .expect_err("delivered orders stay delivered");
    assert_eq!(
        status_and_message(&late_cancel),
        (
            StatusCode::BAD_REQUEST,
            "Order can no longer be cancelled, it is delivered".into()
        )
    );

    // Cancelling an unpaid order puts stock back and voids the invoice.
    let second = order_service::create_order(
        &state,
        &customer,
        order_request(&[(product.id, 4)], PaymentMethod::Upi),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(stock_of(&state, product.id).await?, 3);

    let cancelled = order_service::cancel_order(&state, &customer, second.order.id)
        .await?
        .data
        .expect("cancelled order");
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(cancelled.invoice.expect("invoice").status, InvoiceStatus::Void);
    assert_eq!(stock_of(&state, product.id).await?, 7);

    let pay_cancelled = order_service::pay_order(&state, &customer, second.order.id)
        .await
        .expect_err("cancelled orders cannot be paid");
    assert_eq!(
        status_and_message(&pay_cancelled),
        (
            StatusCode::BAD_REQUEST,
            "Cannot pay for a cancelled order".into()
        )
    );

    // A paid order that is cancelled is refunded.
    let third = order_service::create_order(
        &state,
        &customer,
        order_request(&[(product.id, 1)], PaymentMethod::Card),
    )
    .await?
    .data
    .expect("order");
    order_service::pay_order(&state, &customer, third.order.id).await?;
    let refunded = order_service::cancel_order(&state, &admin, third.order.id)
        .await?
        .data
        .expect("cancelled order");
    assert_eq!(refunded.order.payment_status, PaymentStatus::Refunded);
    assert_eq!(stock_of(&state, product.id).await?, 7);

    let in_use = product_service::delete_product(&state, &admin, product.id)
        .await
        .expect_err("ordered products cannot be deleted");
    assert_eq!(
        status_and_message(&in_use),
        (
            StatusCode::BAD_REQUEST,
            "Referenced resource is still in use or does not exist".into()
        )
    );
    Ok(())
}

#[tokio::test]
async fn cash_on_delivery_is_settled_on_delivery() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let (customer, _) = register_customer(&state).await?;
    let product = create_product(&state, &admin, 60_000, 5).await?;

    let placed = order_service::create_order(
        &state,
        &customer,
        order_request(&[(product.id, 1)], PaymentMethod::CashOnDelivery),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(placed.order.shipping_fee, 0);

    let mut customer_feed = state.notifier.subscribe();
    for next in [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        order_service::update_order_status(
            &state,
            &admin,
            placed.order.id,
            UpdateOrderStatusRequest { status: next },
        )
        .await?;
    }

    let delivered = order_service::get_order(&state, &admin, placed.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(delivered.order.payment_status, PaymentStatus::Paid);
    assert_eq!(delivered.invoice.expect("invoice").status, InvoiceStatus::Paid);

    let first = customer_feed.try_recv()?;
    assert_eq!(first.kind, "order_status");
    assert!(first.is_for(&customer));
    Ok(())
}

#[tokio::test]
async fn stock_adjustments_and_low_stock_report() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let product = create_product(&state, &admin, 1_000, 3).await?;

    let raised =
        product_service::adjust_stock(&state, &admin, product.id, StockAdjustRequest { delta: 5 })
            .await?
            .data
            .expect("product");
    assert_eq!(raised.stock, 8);

    let negative =
        product_service::adjust_stock(&state, &admin, product.id, StockAdjustRequest { delta: -9 })
            .await
            .expect_err("stock cannot go negative");
    assert_eq!(
        status_and_message(&negative),
        (StatusCode::BAD_REQUEST, "Stock cannot be negative".into())
    );

    let renamed = product_service::update_product(
        &state,
        &admin,
        product.id,
        UpdateProductRequest {
            name: None,
            description: Some("Updated".into()),
            category: None,
            brand: Some("FlowPharma".into()),
            price: Some(1_250),
            stock: None,
            requires_prescription: Some(true),
            expiry_date: None,
            image_ids: None,
        },
    )
    .await?
    .data
    .expect("product");
    assert_eq!(renamed.price, 1_250);
    assert_eq!(renamed.stock, 8);
    assert!(renamed.requires_prescription);

    let low = analytics_service::low_stock(
        &state,
        &admin,
        first_page(),
        LowStockQuery { threshold: Some(8) },
    )
    .await?;
    let total = low.meta.and_then(|m| m.total).unwrap_or_default();
    let items = low.data.expect("low stock").items;
    assert!(total >= 1);
    assert!(items.iter().all(|p| p.stock <= 8));
    assert!(items.windows(2).all(|w| w[0].stock <= w[1].stock));
    Ok(())
}

#[tokio::test]
async fn contact_message_read_and_reply() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let (customer, _) = register_customer(&state).await?;

    let sent = message_service::create_message(
        &state,
        Some(&customer),
        CreateMessageRequest {
            name: "Flow Customer".into(),
            email: "Customer@Flow.Test".into(),
            phone: None,
            subject: "Delivery time".into(),
            body: "When will my order arrive?".into(),
        },
    )
    .await?
    .data
    .expect("message");
    assert_eq!(sent.status, MessageStatus::Unread);
    assert_eq!(sent.user_id, Some(customer.user_id));
    assert_eq!(sent.email, "customer@flow.test");

    let opened = message_service::get_message(&state, &admin, sent.id)
        .await?
        .data
        .expect("message");
    assert_eq!(opened.status, MessageStatus::Read);

    let mut feed = state.notifier.subscribe();
    let replied = message_service::reply_message(
        &state,
        &admin,
        sent.id,
        ReplyMessageRequest {
            reply: "Within two days.".into(),
        },
    )
    .await?
    .data
    .expect("message");
    assert_eq!(replied.status, MessageStatus::Replied);
    assert_eq!(replied.reply.as_deref(), Some("Within two days."));
    assert!(replied.replied_at.is_some());

    let event = feed.try_recv()?;
    assert_eq!(event.kind, "message_replied");
    assert!(event.is_for(&customer));

    let mine = message_service::list_my_messages(&state, &customer, Pagination::default())
        .await?
        .data
        .expect("messages");
    assert!(mine.items.iter().any(|m| m.id == sent.id));
    Ok(())
}

fn multipart_image(boundary: &str, field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"pill.png\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn upload_download_and_delete_image_over_http() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let product = create_product(&state, &admin, 500, 1).await?;
    let token = auth_service::issue_token(&state.config, admin.user_id, Role::Admin)?;
    let app = build_app(state.clone())?;

    let boundary = "flowtestboundary";
    let image: Vec<u8> = (0..400_000u32).map(|i| (i % 251) as u8).collect();
    let upload = |field: &str, content_type: &str| -> anyhow::Result<Request<Body>> {
        Ok(Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(multipart_image(boundary, field, content_type, &image)))?)
    };

    let rejected = app.clone().oneshot(upload("image", "application/pdf")?).await?;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&to_bytes(rejected.into_body(), usize::MAX).await?)?;
    assert_eq!(body["message"], "Only image files are allowed");

    let wrong_field = app.clone().oneshot(upload("photo", "image/png")?).await?;
    let body: Value =
        serde_json::from_slice(&to_bytes(wrong_field.into_body(), usize::MAX).await?)?;
    assert_eq!(body["message"], "Unexpected field");

    let created = app.clone().oneshot(upload("image", "image/png")?).await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&to_bytes(created.into_body(), usize::MAX).await?)?;
    let id: Uuid = body["data"]["id"].as_str().unwrap_or_default().parse()?;
    assert_eq!(body["data"]["length"], 400_000);
    assert_eq!(body["data"]["url"], format!("/api/upload/{id}"));

    product_service::update_product(
        &state,
        &admin,
        product.id,
        UpdateProductRequest {
            name: None,
            description: None,
            category: None,
            brand: None,
            price: None,
            stock: None,
            requires_prescription: None,
            expiry_date: None,
            image_ids: Some(vec![id]),
        },
    )
    .await?;

    let download = app
        .clone()
        .oneshot(Request::builder().uri(format!("/api/upload/{id}")).body(Body::empty())?)
        .await?;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(download.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(download.headers()[header::CONTENT_LENGTH], "400000");
    assert_eq!(
        download.headers()[header::CACHE_CONTROL],
        "public, max-age=31536000, immutable"
    );
    let bytes = to_bytes(download.into_body(), usize::MAX).await?;
    assert_eq!(bytes.as_ref(), image.as_slice());

    let deleted = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/upload/{id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(deleted.status(), StatusCode::OK);

    let refreshed = product_service::get_product(&state, product.id)
        .await?
        .data
        .expect("product");
    assert!(refreshed.image_ids.is_empty());

    let gone = app
        .clone()
        .oneshot(Request::builder().uri(format!("/api/upload/{id}")).body(Body::empty())?)
        .await?;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    // A failed delete leaves product references alone.
    let stray = Uuid::new_v4();
    product_service::update_product(
        &state,
        &admin,
        product.id,
        UpdateProductRequest {
            name: None,
            description: None,
            category: None,
            brand: None,
            price: None,
            stock: None,
            requires_prescription: None,
            expiry_date: None,
            image_ids: Some(vec![stray]),
        },
    )
    .await?;
    for target in [id, stray] {
        let missing = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/upload/{target}"))
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
    let untouched = product_service::get_product(&state, product.id)
        .await?
        .data
        .expect("product");
    assert_eq!(untouched.image_ids, vec![stray]);
    Ok(())
}

#[tokio::test]
async fn tokens_follow_the_stored_role_and_account() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let app = build_app(state.clone())?;
    let chief = create_admin(&state).await?;
    let deputy = create_admin(&state).await?;
    let (customer, _) = register_customer(&state).await?;
    let deputy_token = auth_service::issue_token(&state.config, deputy.user_id, Role::Admin)?;
    let customer_token = auth_service::issue_token(&state.config, customer.user_id, Role::User)?;

    for uri in [
        "/api/users",
        "/api/orders",
        "/api/messages",
        "/api/analytics/summary",
        "/api/analytics/low-stock",
        "/api/upload",
    ] {
        let (status, body) = call(&app, "GET", uri, &customer_token, None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["message"], "Not authorized to access this resource", "{uri}");
    }

    // A token that claims admin for a customer account is not enough.
    let forged = auth_service::issue_token(&state.config, customer.user_id, Role::Admin)?;
    let (status, _) = call(&app, "GET", "/api/users", &forged, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, "GET", "/api/users", &deputy_token, None).await?;
    assert_eq!(status, StatusCode::OK);

    user_service::update_role(
        &state,
        &chief,
        deputy.user_id,
        UpdateRoleRequest { role: Role::User },
    )
    .await?;
    let (status, body) = call(&app, "GET", "/api/users", &deputy_token, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized to access this resource");

    user_service::delete_user(&state, &chief, customer.user_id).await?;
    let (status, body) = call(&app, "GET", "/api/auth/me", &customer_token, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User no longer exists");
    Ok(())
}

#[tokio::test]
async fn order_body_is_validated_for_signed_in_customers() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let app = build_app(state.clone())?;
    let (customer, _) = register_customer(&state).await?;
    let token = auth_service::issue_token(&state.config, customer.user_id, Role::User)?;

    let payload = json!({
        "items": [],
        "shipping_address": {
            "full_name": "",
            "phone": "0712345678",
            "street": "1 Main Road",
            "city": "Nairobi",
            "postal_code": "00100",
            "country": "Kenya"
        },
        "payment_method": "cash_on_delivery"
    });
    let (status, body) = call(&app, "POST", "/api/orders", &token, Some(payload)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Order must contain between 1 and 50 items, Recipient name is required"
    );
    Ok(())
}

#[tokio::test]
async fn admins_manage_users_but_not_themselves() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let (buyer, buyer_email) = register_customer(&state).await?;
    let (browser, _) = register_customer(&state).await?;
    let product = create_product(&state, &admin, 2_000, 5).await?;
    order_service::create_order(
        &state,
        &buyer,
        order_request(&[(product.id, 1)], PaymentMethod::Card),
    )
    .await?;

    let demote_self = user_service::update_role(
        &state,
        &admin,
        admin.user_id,
        UpdateRoleRequest { role: Role::User },
    )
    .await
    .expect_err("self demotion");
    assert_eq!(
        status_and_message(&demote_self),
        (StatusCode::BAD_REQUEST, "You cannot demote yourself".into())
    );

    let delete_self = user_service::delete_user(&state, &admin, admin.user_id)
        .await
        .expect_err("self deletion");
    assert_eq!(
        status_and_message(&delete_self),
        (
            StatusCode::BAD_REQUEST,
            "You cannot delete your own account".into()
        )
    );

    let as_customer = user_service::list_users(
        &state,
        &buyer,
        first_page(),
        UserListQuery::default(),
    )
    .await
    .expect_err("customers cannot list users");
    assert_eq!(status_and_message(&as_customer).0, StatusCode::FORBIDDEN);

    let promoted = user_service::update_role(
        &state,
        &admin,
        browser.user_id,
        UpdateRoleRequest { role: Role::Admin },
    )
    .await?
    .data
    .expect("user");
    assert_eq!(promoted.role, Role::Admin);
    let fetched = user_service::get_user(&state, &admin, browser.user_id)
        .await?
        .data
        .expect("user");
    assert_eq!(fetched.role, Role::Admin);

    let found = user_service::list_users(
        &state,
        &admin,
        first_page(),
        UserListQuery {
            q: Some(buyer_email.clone()),
            role: Some(Role::User),
        },
    )
    .await?
    .data
    .expect("users");
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].id, buyer.user_id);

    // `_` is literal in searches, so it does not match arbitrary characters.
    let wildcard = user_service::list_users(
        &state,
        &admin,
        first_page(),
        UserListQuery {
            q: Some(buyer_email.replace('-', "_")),
            role: None,
        },
    )
    .await?
    .data
    .expect("users");
    assert!(wildcard.items.is_empty());

    let with_orders = user_service::delete_user(&state, &admin, buyer.user_id)
        .await
        .expect_err("users with orders are kept");
    assert_eq!(
        status_and_message(&with_orders),
        (
            StatusCode::BAD_REQUEST,
            "Referenced resource is still in use or does not exist".into()
        )
    );

    user_service::delete_user(&state, &admin, browser.user_id).await?;
    let gone = user_service::get_user(&state, &admin, browser.user_id)
        .await
        .expect_err("deleted");
    assert_eq!(status_and_message(&gone).0, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn invoices_are_visible_to_owner_and_admins_only() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let (owner, _) = register_customer(&state).await?;
    let (stranger, _) = register_customer(&state).await?;
    let product = create_product(&state, &admin, 3_000, 5).await?;
    let placed = order_service::create_order(
        &state,
        &owner,
        order_request(&[(product.id, 2)], PaymentMethod::Card),
    )
    .await?
    .data
    .expect("order");
    let invoice = placed.invoice.expect("invoice");

    let own = invoice_service::get_invoice(&state, &owner, invoice.id)
        .await?
        .data
        .expect("invoice");
    assert_eq!(own.order_id, placed.order.id);
    assert_eq!(own.subtotal, 6_000);
    let by_order = invoice_service::get_invoice_for_order(&state, &owner, placed.order.id)
        .await?
        .data
        .expect("invoice");
    assert_eq!(by_order.id, invoice.id);
    invoice_service::get_invoice(&state, &admin, invoice.id).await?;

    for hidden in [
        invoice_service::get_invoice(&state, &stranger, invoice.id).await,
        invoice_service::get_invoice_for_order(&state, &stranger, placed.order.id).await,
    ] {
        let err = hidden.expect_err("hidden from other customers");
        assert_eq!(
            status_and_message(&err),
            (StatusCode::NOT_FOUND, "Invoice not found".into())
        );
    }

    let strangers_list =
        invoice_service::list_invoices(&state, &stranger, first_page(), InvoiceListQuery::default())
            .await?
            .data
            .expect("invoices");
    assert!(strangers_list.items.is_empty());
    let owners_list =
        invoice_service::list_invoices(&state, &owner, first_page(), InvoiceListQuery::default())
            .await?
            .data
            .expect("invoices");
    assert_eq!(owners_list.items.len(), 1);

    let paid_filter = InvoiceListQuery {
        status: Some(InvoiceStatus::Paid),
    };
    let paid = invoice_service::list_invoices(&state, &admin, first_page(), paid_filter)
        .await?
        .data
        .expect("invoices");
    assert!(paid.items.iter().all(|i| i.status == InvoiceStatus::Paid));
    assert!(paid.items.iter().all(|i| i.id != invoice.id));

    let issued_filter = InvoiceListQuery {
        status: Some(InvoiceStatus::Issued),
    };
    let issued = invoice_service::list_invoices(&state, &admin, first_page(), issued_filter)
        .await?
        .data
        .expect("invoices");
    assert!(issued.items.iter().all(|i| i.status == InvoiceStatus::Issued));
    assert!(issued.items.iter().any(|i| i.id == invoice.id));
    Ok(())
}

#[tokio::test]
async fn analytics_reflect_placed_and_paid_orders() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let (customer, _) = register_customer(&state).await?;
    let product = create_product(&state, &admin, 4_000, 20).await?;
    let placed = order_service::create_order(
        &state,
        &customer,
        order_request(&[(product.id, 3)], PaymentMethod::Card),
    )
    .await?
    .data
    .expect("order");
    order_service::pay_order(&state, &customer, placed.order.id).await?;

    let summary = analytics_service::summary(&state, &admin)
        .await?
        .data
        .expect("summary");
    assert!(summary.revenue >= placed.order.total_amount);
    assert!(summary.users >= 2);
    assert!(summary.products >= 1);
    assert_eq!(
        summary.orders,
        summary.orders_by_status.iter().map(|s| s.count).sum::<i64>()
    );

    let sales = analytics_service::sales(&state, &admin, SalesQuery { days: Some(1) })
        .await?
        .data
        .expect("sales");
    let today = chrono::Utc::now().date_naive();
    let todays = sales
        .items
        .iter()
        .find(|d| d.day == today)
        .expect("today's sales");
    assert!(todays.revenue >= placed.order.total_amount);
    assert!(todays.orders >= 1);
    assert!(sales.items.windows(2).all(|w| w[0].day < w[1].day));

    let top = analytics_service::top_products(&state, &admin, TopProductsQuery { limit: Some(3) })
        .await?
        .data
        .expect("top products");
    assert!(top.items.len() <= 3);
    assert!(top.items.iter().all(|p| p.quantity > 0 && p.revenue >= 0));
    assert!(top.items.windows(2).all(|w| w[0].quantity >= w[1].quantity));

    let activity = analytics_service::activity(&state, &admin, first_page())
        .await?
        .data
        .expect("activity");
    let order_id = placed.order.id.to_string();
    assert!(activity.items.iter().any(|entry| {
        entry.action == "order_create"
            && entry
                .metadata
                .as_ref()
                .and_then(|m| m["order_id"].as_str())
                == Some(order_id.as_str())
    }));
    assert!(
        activity
            .items
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at)
    );

    let refused = analytics_service::summary(&state, &customer)
        .await
        .expect_err("admins only");
    assert_eq!(status_and_message(&refused).0, StatusCode::FORBIDDEN);
    Ok(())
}
