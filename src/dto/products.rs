use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Category is required"))]
    pub category: String,
    #[validate(length(max = 100, message = "Brand must be at most 100 characters"))]
    pub brand: Option<String>,
    #[validate(range(
        min = 0,
        max = 1_000_000_000_000_i64,
        message = "Price must be between 0 and 1000000000000"
    ))]
    pub price: i64,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    #[serde(default)]
    pub requires_prescription: bool,
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub image_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name must be 1 to 200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Category must be 1 to 100 characters"))]
    pub category: Option<String>,
    #[validate(length(max = 100, message = "Brand must be at most 100 characters"))]
    pub brand: Option<String>,
    #[validate(range(
        min = 0,
        max = 1_000_000_000_000_i64,
        message = "Price must be between 0 and 1000000000000"
    ))]
    pub price: Option<i64>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
    pub requires_prescription: Option<bool>,
    pub expiry_date: Option<NaiveDate>,
    pub image_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StockAdjustRequest {
    pub delta: i32,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct CategoryList {
    pub items: Vec<String>,
}
