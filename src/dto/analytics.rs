use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::AuditEntry;

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Summary {
    pub revenue: i64,
    pub orders: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub users: i64,
    pub products: i64,
    pub low_stock: i64,
    pub unread_messages: i64,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct DailySales {
    pub day: NaiveDate,
    pub revenue: i64,
    pub orders: i64,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ActivityList {
    #[schema(value_type = Vec<AuditEntry>)]
    pub items: Vec<AuditEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct SalesSeries {
    #[schema(value_type = Vec<DailySales>)]
    pub items: Vec<DailySales>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct TopProductList {
    #[schema(value_type = Vec<TopProduct>)]
    pub items: Vec<TopProduct>,
}
