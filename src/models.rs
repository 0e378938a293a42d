use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entity::{audit_logs, invoices, messages, order_items, orders, products, users},
    error::AppError,
};

/// Enum stored as lowercase text. `parse` rejects unknown input with 400,
/// `from_db` treats unknown stored values as a server fault.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn from_db(value: &str) -> Result<Self, AppError> {
                value.parse().map_err(|_| {
                    AppError::Internal(anyhow::anyhow!(
                        "unexpected {} in database: {}",
                        $label,
                        value
                    ))
                })
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::BadRequest(format!("Invalid {}: {}", $label, other))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Role, "role" {
    User => "user",
    Admin => "admin",
});

text_enum!(
    /// Fulfilment status of an order.
    OrderStatus, "order status" {
        Pending => "pending",
        Processing => "processing",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
);

text_enum!(PaymentStatus, "payment status" {
    Unpaid => "unpaid",
    Paid => "paid",
    Refunded => "refunded",
});

text_enum!(PaymentMethod, "payment method" {
    CashOnDelivery => "cash_on_delivery",
    Card => "card",
    Upi => "upi",
});

text_enum!(InvoiceStatus, "invoice status" {
    Issued => "issued",
    Paid => "paid",
    Void => "void",
});

text_enum!(MessageStatus, "message status" {
    Unread => "unread",
    Read => "read",
    Replied => "replied",
});

impl OrderStatus {
    /// Allowed fulfilment moves. Terminal states have none.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    pub fn is_cancellable(self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<users::Model> for User {
    type Error = AppError;

    fn try_from(model: users::Model) -> Result<Self, Self::Error> {
        Ok(User {
            id: model.id,
            role: Role::from_db(&model.role)?,
            name: model.name,
            email: model.email,
            phone: model.phone,
            address: model.address,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub brand: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub requires_prescription: bool,
    pub expiry_date: Option<NaiveDate>,
    pub image_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        Product {
            id: model.id,
            name: model.name,
            description: model.description,
            category: model.category,
            brand: model.brand,
            price: model.price,
            stock: model.stock,
            requires_prescription: model.requires_prescription,
            expiry_date: model.expiry_date,
            image_ids: model.image_ids,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate, PartialEq)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 100, message = "Recipient name is required"))]
    pub full_name: String,
    #[validate(length(min = 5, max = 20, message = "Phone number must be 5 to 20 characters"))]
    pub phone: String,
    #[validate(length(min = 1, max = 200, message = "Street address is required"))]
    pub street: String,
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 2, max = 12, message = "Postal code must be 2 to 12 characters"))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 60, message = "Country is required"))]
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub items_total: i64,
    pub tax_amount: i64,
    pub shipping_fee: i64,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<orders::Model> for Order {
    type Error = AppError;

    fn try_from(model: orders::Model) -> Result<Self, Self::Error> {
        let shipping_address = serde_json::from_value(model.shipping_address).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("stored shipping address is malformed: {e}"))
        })?;
        Ok(Order {
            id: model.id,
            user_id: model.user_id,
            shipping_address,
            payment_method: PaymentMethod::from_db(&model.payment_method)?,
            items_total: model.items_total,
            tax_amount: model.tax_amount,
            shipping_fee: model.shipping_fee,
            total_amount: model.total_amount,
            status: OrderStatus::from_db(&model.status)?,
            payment_status: PaymentStatus::from_db(&model.payment_status)?,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        OrderItem {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            name: model.name,
            price: model.price,
            quantity: model.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub shipping_fee: i64,
    pub total_amount: i64,
    pub status: InvoiceStatus,
    pub issued_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<invoices::Model> for Invoice {
    type Error = AppError;

    fn try_from(model: invoices::Model) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: model.id,
            status: InvoiceStatus::from_db(&model.status)?,
            invoice_number: model.invoice_number,
            order_id: model.order_id,
            user_id: model.user_id,
            subtotal: model.subtotal,
            tax_amount: model.tax_amount,
            shipping_fee: model.shipping_fee,
            total_amount: model.total_amount,
            issued_at: model.issued_at.with_timezone(&Utc),
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub body: String,
    pub status: MessageStatus,
    pub reply: Option<String>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<messages::Model> for Message {
    type Error = AppError;

    fn try_from(model: messages::Model) -> Result<Self, Self::Error> {
        Ok(Message {
            id: model.id,
            status: MessageStatus::from_db(&model.status)?,
            user_id: model.user_id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            subject: model.subject,
            body: model.body,
            reply: model.reply,
            replied_at: model.replied_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<audit_logs::Model> for AuditEntry {
    fn from(model: audit_logs::Model) -> Self {
        AuditEntry {
            id: model.id,
            user_id: model.user_id,
            action: model.action,
            resource: model.resource,
            metadata: model.metadata,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// Metadata of a file held in the chunked image store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ImageFile {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub length: i64,
    pub chunk_size: i32,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Map a list of entity models through a fallible conversion.
pub fn convert_all<M, T>(models: Vec<M>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<M, Error = AppError>,
{
    models.into_iter().map(T::try_from).collect()
}
