use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Invoice, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 100, message = "Quantity must be between 1 and 100"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateOrderRequest {
    #[validate(
        length(min = 1, max = 50, message = "Order must contain between 1 and 50 items"),
        nested
    )]
    pub items: Vec<OrderLineRequest>,
    #[validate(nested)]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub invoice: Option<Invoice>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}
