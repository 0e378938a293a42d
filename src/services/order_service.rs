use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CreateOrderRequest, OrderLineRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{InvoiceStatus, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus},
    pricing::compute_totals,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::invoice_service,
    state::AppState,
};

pub const MAX_LINE_QUANTITY: i32 = 100;

/// Collapse repeated products into one line, keeping first-seen order. The
/// merged quantity is held to the same bound as a single line.
pub fn merge_lines(items: &[OrderLineRequest]) -> AppResult<Vec<(Uuid, i32)>> {
    let mut merged: Vec<(Uuid, i32)> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, quantity)) => *quantity = quantity.saturating_add(item.quantity),
            None => merged.push((item.product_id, item.quantity)),
        }
    }
    if merged
        .iter()
        .any(|(_, quantity)| !(1..=MAX_LINE_QUANTITY).contains(quantity))
    {
        return Err(AppError::BadRequest(format!(
            "Quantity must be between 1 and {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(merged)
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let lines = merge_lines(&payload.items)?;
    let product_ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();

    let txn = state.orm.begin().await?;

    // Lock in id order so concurrent orders over the same products cannot deadlock.
    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut priced: Vec<(i64, i32)> = Vec::with_capacity(lines.len());
    for (product_id, quantity) in &lines {
        let product = products
            .get(product_id)
            .ok_or_else(|| AppError::BadRequest(format!("Product {product_id} not found")))?;
        if product.stock < *quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
        priced.push((product.price, *quantity));
    }

    let totals = compute_totals(&priced, &state.config.pricing)?;
    let shipping_address = serde_json::to_value(&payload.shipping_address)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let now = Utc::now();

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        shipping_address: Set(shipping_address),
        payment_method: Set(payload.payment_method.as_str().to_string()),
        items_total: Set(totals.items_total),
        tax_amount: Set(totals.tax_amount),
        shipping_fee: Set(totals.shipping_fee),
        total_amount: Set(totals.total_amount),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        payment_status: Set(PaymentStatus::Unpaid.as_str().to_string()),
        paid_at: Set(None),
        delivered_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (product_id, quantity) in &lines {
        let Some(product) = products.get(product_id) else {
            continue;
        };
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(*product_id),
            name: Set(product.name.clone()),
            price: Set(product.price),
            quantity: Set(*quantity),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        items.push(OrderItem::from(item));

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(*quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::value(now))
            .filter(ProdCol::Id.eq(*product_id))
            .exec(&txn)
            .await?;
    }

    let invoice = invoice_service::issue_for_order(&txn, &order).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount }),
    )
    .await;
    state.notifier.to_admins(
        "order_created",
        serde_json::json!({
            "order_id": order.id,
            "user_id": order.user_id,
            "total_amount": order.total_amount,
        }),
    );
    tracing::info!(order_id = %order.id, total = order.total_amount, "order created");

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: Order::try_from(order)?,
            items,
            invoice: Some(invoice),
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    list_orders_where(state, condition, pagination, query).await
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    list_orders_where(state, Condition::all(), pagination, query).await
}

async fn list_orders_where(
    state: &AppState,
    mut condition: Condition,
    pagination: Pagination,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::try_from)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|o| user.can_access(o.user_id))
        .ok_or_else(|| AppError::not_found("Order"))?;

    let data = load_details(&state.orm, order).await?;
    Ok(ApiResponse::success("Order", data, Some(Meta::empty())))
}

pub async fn pay_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = lock_order(&txn, id)
        .await?
        .filter(|o| o.user_id == user.user_id)
        .ok_or_else(|| AppError::not_found("Order"))?;

    if OrderStatus::from_db(&order.status)? == OrderStatus::Cancelled {
        return Err(AppError::BadRequest(
            "Cannot pay for a cancelled order".into(),
        ));
    }
    if PaymentStatus::from_db(&order.payment_status)? != PaymentStatus::Unpaid {
        return Err(AppError::BadRequest("Order already paid".into()));
    }

    let order = mark_paid(&txn, order).await?;
    let data = load_details(&txn, order).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_paid",
        "orders",
        serde_json::json!({ "order_id": data.order.id }),
    )
    .await;
    state.notifier.to_admins(
        "order_paid",
        serde_json::json!({ "order_id": data.order.id, "total_amount": data.order.total_amount }),
    );

    Ok(ApiResponse::success(
        "Payment recorded",
        data,
        Some(Meta::empty()),
    ))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    change_status(state, user, id, OrderStatus::Cancelled, |order, user| {
        user.can_access(order.user_id)
    })
    .await
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    change_status(state, user, id, payload.status, |_, _| true).await
}

async fn change_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    next: OrderStatus,
    allowed: impl Fn(&OrderModel, &AuthUser) -> bool,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = lock_order(&txn, id)
        .await?
        .filter(|o| allowed(o, user))
        .ok_or_else(|| AppError::not_found("Order"))?;

    let current = OrderStatus::from_db(&order.status)?;
    if next == OrderStatus::Cancelled && !current.is_cancellable() {
        return Err(AppError::BadRequest(format!(
            "Order can no longer be cancelled, it is {current}"
        )));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order status from {current} to {next}"
        )));
    }

    let now = Utc::now();
    let payment = PaymentStatus::from_db(&order.payment_status)?;
    let cod = PaymentMethod::from_db(&order.payment_method)? == PaymentMethod::CashOnDelivery;
    let order_id = order.id;

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(now.into());

    match next {
        OrderStatus::Cancelled => {
            restock(&txn, order_id).await?;
            if payment == PaymentStatus::Paid {
                active.payment_status = Set(PaymentStatus::Refunded.as_str().to_string());
            }
            invoice_service::set_status(&txn, order_id, InvoiceStatus::Void).await?;
        }
        OrderStatus::Delivered => {
            active.delivered_at = Set(Some(now.into()));
            // Cash on delivery is settled at the door.
            if cod && payment == PaymentStatus::Unpaid {
                active.payment_status = Set(PaymentStatus::Paid.as_str().to_string());
                active.paid_at = Set(Some(now.into()));
                invoice_service::set_status(&txn, order_id, InvoiceStatus::Paid).await?;
            }
        }
        _ => {}
    }

    let order = active.update(&txn).await?;
    let data = load_details(&txn, order).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order_id, "from": current.as_str(), "to": next.as_str() }),
    )
    .await;
    state.notifier.to_user(
        data.order.user_id,
        "order_status",
        serde_json::json!({ "order_id": order_id, "status": next.as_str() }),
    );
    if next == OrderStatus::Cancelled && !user.is_admin() {
        state.notifier.to_admins(
            "order_cancelled",
            serde_json::json!({ "order_id": order_id, "user_id": user.user_id }),
        );
    }

    Ok(ApiResponse::success(
        "Order updated",
        data,
        Some(Meta::empty()),
    ))
}

async fn lock_order(txn: &DatabaseTransaction, id: Uuid) -> AppResult<Option<OrderModel>> {
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?;
    Ok(order)
}

async fn mark_paid(txn: &DatabaseTransaction, order: OrderModel) -> AppResult<OrderModel> {
    let now = Utc::now();
    let order_id = order.id;
    let mut active: OrderActive = order.into();
    active.payment_status = Set(PaymentStatus::Paid.as_str().to_string());
    active.paid_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let order = active.update(txn).await?;
    invoice_service::set_status(txn, order_id, InvoiceStatus::Paid).await?;
    Ok(order)
}

/// Put the quantities of a cancelled order back on the shelf.
async fn restock(txn: &DatabaseTransaction, order_id: Uuid) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(txn)
        .await?;
    for item in items {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(txn)
            .await?;
    }
    Ok(())
}

async fn load_details<C: ConnectionTrait>(conn: &C, order: OrderModel) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();
    let invoice = invoice_service::find_for_order(conn, order.id).await?;

    Ok(OrderWithItems {
        order: Order::try_from(order)?,
        items,
        invoice,
    })
}
