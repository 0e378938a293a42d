use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    dto::invoices::InvoiceList,
    entity::{
        invoices::{ActiveModel as InvoiceActive, Column as InvoiceCol, Entity as Invoices},
        orders::Model as OrderModel,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Invoice, InvoiceStatus, convert_all},
    response::{ApiResponse, Meta},
    routes::params::{InvoiceListQuery, Pagination},
    state::AppState,
};

/// `INV-<yyyymmdd>-<first 8 hex digits of the order id>`
pub fn build_invoice_number(order_id: Uuid, date: DateTime<Utc>) -> String {
    let suffix = order_id.simple().to_string();
    format!("INV-{}-{}", date.format("%Y%m%d"), &suffix[..8].to_uppercase())
}

pub async fn issue_for_order<C: ConnectionTrait>(
    conn: &C,
    order: &OrderModel,
) -> AppResult<Invoice> {
    let now = Utc::now();
    let invoice = InvoiceActive {
        id: Set(Uuid::new_v4()),
        invoice_number: Set(build_invoice_number(order.id, now)),
        order_id: Set(order.id),
        user_id: Set(order.user_id),
        subtotal: Set(order.items_total),
        tax_amount: Set(order.tax_amount),
        shipping_fee: Set(order.shipping_fee),
        total_amount: Set(order.total_amount),
        status: Set(InvoiceStatus::Issued.as_str().to_string()),
        issued_at: Set(now.into()),
        paid_at: Set(None),
    }
    .insert(conn)
    .await?;
    Invoice::try_from(invoice)
}

/// Move the invoice of `order_id` to `status`. Missing invoices are logged, not fatal.
pub async fn set_status<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    status: InvoiceStatus,
) -> AppResult<Option<Invoice>> {
    let Some(existing) = Invoices::find()
        .filter(InvoiceCol::OrderId.eq(order_id))
        .one(conn)
        .await?
    else {
        tracing::warn!(order_id = %order_id, "order has no invoice");
        return Ok(None);
    };

    let mut active: InvoiceActive = existing.into();
    active.status = Set(status.as_str().to_string());
    if status == InvoiceStatus::Paid {
        active.paid_at = Set(Some(Utc::now().into()));
    }
    let updated = active.update(conn).await?;
    Ok(Some(Invoice::try_from(updated)?))
}

pub async fn find_for_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Option<Invoice>> {
    Invoices::find()
        .filter(InvoiceCol::OrderId.eq(order_id))
        .one(conn)
        .await?
        .map(Invoice::try_from)
        .transpose()
}

pub async fn list_invoices(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: InvoiceListQuery,
) -> AppResult<ApiResponse<InvoiceList>> {
    let (page, limit, offset) = pagination.normalize();

    let mut condition = Condition::all();
    if !user.is_admin() {
        condition = condition.add(InvoiceCol::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status {
        condition = condition.add(InvoiceCol::Status.eq(status.as_str()));
    }

    let finder = Invoices::find()
        .filter(condition)
        .order_by_desc(InvoiceCol::IssuedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Invoices",
        InvoiceList {
            items: convert_all(models)?,
        },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_invoice(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Invoice>> {
    let invoice = Invoices::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|inv| user.can_access(inv.user_id))
        .ok_or_else(|| AppError::not_found("Invoice"))?;
    Ok(ApiResponse::success("Invoice", Invoice::try_from(invoice)?, None))
}

pub async fn get_invoice_for_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Invoice>> {
    let invoice = find_for_order(&state.orm, order_id)
        .await?
        .filter(|inv| user.can_access(inv.user_id))
        .ok_or_else(|| AppError::not_found("Invoice"))?;
    Ok(ApiResponse::success("Invoice", invoice, None))
}
