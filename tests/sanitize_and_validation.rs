use medstore_api::{
    dto::{
        auth::{ChangePasswordRequest, RegisterRequest},
        messages::CreateMessageRequest,
        orders::CreateOrderRequest,
        products::CreateProductRequest,
    },
    error::{AppError, FieldError},
    middleware::{
        sanitize::{is_operator_key, sanitize_str, sanitize_value},
        validate::parse_and_validate,
    },
};
use serde_json::json;

#[test]
fn operator_keys_are_dropped_at_every_depth() {
    let cleaned = sanitize_value(json!({
        "email": "a@b.co",
        "$where": "1 == 1",
        "profile": { "name.first": "x", "city": "Mombasa", "$gt": "" },
        "tags": [{ "$ne": null, "ok": true }]
    }));

    assert_eq!(
        cleaned,
        json!({
            "email": "a@b.co",
            "profile": { "city": "Mombasa" },
            "tags": [{ "ok": true }]
        })
    );
    assert!(is_operator_key("$in"));
    assert!(is_operator_key("a.b"));
    assert!(!is_operator_key("full_name"));
}

#[test]
fn strings_are_trimmed_escaped_and_stripped() {
    assert_eq!(sanitize_str("  hello  "), "hello");
    assert_eq!(
        sanitize_str("<script>alert(1)</script>"),
        "&lt;script&gt;alert(1)&lt;/script&gt;"
    );
    assert_eq!(sanitize_str("line1\nline2\tend\u{0007}\u{0000}"), "line1\nline2\tend");
}

#[test]
fn passwords_pass_through_untouched() {
    let cleaned = sanitize_value(json!({
        "name": "  Amina  ",
        "password": "  <p@ss word>  ",
        "current_password": " old ",
        "new_password": "new<>pass "
    }));

    assert_eq!(cleaned["name"], "Amina");
    assert_eq!(cleaned["password"], "  <p@ss word>  ");
    assert_eq!(cleaned["current_password"], " old ");
    assert_eq!(cleaned["new_password"], "new<>pass ");
}

#[test]
fn numbers_and_booleans_are_left_alone() {
    let raw = json!({ "price": 1250, "requires_prescription": true, "expiry_date": null });
    assert_eq!(sanitize_value(raw.clone()), raw);
}

#[test]
fn register_payload_is_cleaned_before_validation() {
    let payload: RegisterRequest = parse_and_validate(json!({
        "name": "  Amina Njeri ",
        "email": " amina@example.com ",
        "password": " spaced password ",
        "$role": "admin"
    }))
    .expect("valid registration");

    assert_eq!(payload.name, "Amina Njeri");
    assert_eq!(payload.email, "amina@example.com");
    assert_eq!(payload.password, " spaced password ");
    assert!(payload.phone.is_none());
}

#[test]
fn change_password_requires_a_long_new_password() {
    let err = parse_and_validate::<ChangePasswordRequest>(json!({
        "current_password": "old-password",
        "new_password": "short"
    }))
    .expect_err("short password");

    match err {
        AppError::Validation(fields) => assert_eq!(
            fields,
            vec![FieldError {
                field: "new_password".into(),
                message: "New password must be at least 8 characters".into(),
            }]
        ),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn product_rules_cover_price_and_stock() {
    let err = parse_and_validate::<CreateProductRequest>(json!({
        "name": "Cough Syrup",
        "category": "Cold & Flu",
        "price": -1,
        "stock": -5
    }))
    .expect_err("negative price and stock");
    assert_eq!(
        err.to_string(),
        "Price must be between 0 and 1000000000000, Stock cannot be negative"
    );

    let err = parse_and_validate::<CreateProductRequest>(json!({
        "name": "Gold Plated Syringe",
        "category": "Devices",
        "price": 1_000_000_000_001_i64,
        "stock": 1
    }))
    .expect_err("price above the cap");
    assert_eq!(err.to_string(), "Price must be between 0 and 1000000000000");
}

#[test]
fn product_defaults_apply_when_fields_are_omitted() {
    let payload: CreateProductRequest = parse_and_validate(json!({
        "name": "Zinc Tablets",
        "category": "Vitamins",
        "price": 1500,
        "stock": 40
    }))
    .expect("valid product");

    assert!(!payload.requires_prescription);
    assert!(payload.image_ids.is_empty());
    assert!(payload.expiry_date.is_none());
}

#[test]
fn order_line_quantities_are_bounded() {
    let err = parse_and_validate::<CreateOrderRequest>(json!({
        "items": [
            { "product_id": "7f9c24e5-2d6f-4b8e-9a3e-0c1d2e3f4a5b", "quantity": 2 },
            { "product_id": "0b1c2d3e-4f50-4a6b-8c7d-9e0f1a2b3c4d", "quantity": 0 }
        ],
        "shipping_address": {
            "full_name": "Jane Doe",
            "phone": "0712345678",
            "street": "1 Main Road",
            "city": "Nairobi",
            "postal_code": "00100",
            "country": "Kenya"
        },
        "payment_method": "card"
    }))
    .expect_err("zero quantity");

    match err {
        AppError::Validation(fields) => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "items[1].quantity");
            assert_eq!(fields[0].message, "Quantity must be between 1 and 100");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

fn order_json(items: serde_json::Value, full_name: &str, method: &str) -> serde_json::Value {
    json!({
        "items": items,
        "shipping_address": {
            "full_name": full_name,
            "phone": "0712345678",
            "street": "1 Main Road",
            "city": "Nairobi",
            "postal_code": "00100",
            "country": "Kenya"
        },
        "payment_method": method
    })
}

#[test]
fn empty_order_and_blank_recipient_are_reported_together() {
    let err = parse_and_validate::<CreateOrderRequest>(order_json(json!([]), "", "cash_on_delivery"))
        .expect_err("empty order");

    assert_eq!(
        err.to_string(),
        "Order must contain between 1 and 50 items, Recipient name is required"
    );
    match err {
        AppError::Validation(fields) => {
            let paths: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
            assert_eq!(paths, vec!["items", "shipping_address.full_name"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unknown_payment_method_is_a_body_error() {
    let items = json!([{ "product_id": "7f9c24e5-2d6f-4b8e-9a3e-0c1d2e3f4a5b", "quantity": 1 }]);
    match parse_and_validate::<CreateOrderRequest>(order_json(items, "Jane Doe", "bitcoin")) {
        Err(AppError::BadRequest(msg)) => {
            assert!(msg.starts_with("Invalid request body"), "{msg}")
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn contact_form_escapes_markup_and_checks_lengths() {
    let payload: CreateMessageRequest = parse_and_validate(json!({
        "name": "Visitor",
        "email": "visitor@example.com",
        "subject": "<b>Stock</b> question",
        "body": "Do you have insulin pens?"
    }))
    .expect("valid message");
    assert_eq!(payload.subject, "&lt;b&gt;Stock&lt;/b&gt; question");

    let err = parse_and_validate::<CreateMessageRequest>(json!({
        "name": "Visitor",
        "email": "visitor@example.com",
        "subject": "   ",
        "body": "x".repeat(5001)
    }))
    .expect_err("blank subject and long body");
    assert_eq!(
        err.to_string(),
        "Message must be 1 to 5000 characters, Subject is required"
    );
}
