//! Dashboard figures. Aggregates run as plain SQL; Postgres `SUM` over
//! integers yields NUMERIC, so every sum is cast back to BIGINT.

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::{
    dto::analytics::{
        ActivityList, DailySales, SalesSeries, StatusCount, Summary, TopProduct, TopProductList,
    },
    dto::products::ProductList,
    entity::{
        audit_logs::{Column as AuditCol, Entity as AuditLogs},
        products::{Column as ProdCol, Entity as Products},
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::{AuditEntry, MessageStatus, OrderStatus, PaymentStatus, Product},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, Pagination, SalesQuery, TopProductsQuery},
    state::AppState,
};

pub fn clamp_days(days: Option<i64>) -> i32 {
    days.unwrap_or(30).clamp(1, 365) as i32
}

pub fn clamp_top_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(5).clamp(1, 50)
}

pub async fn summary(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Summary>> {
    ensure_admin(user)?;
    let pool = &state.pool;

    let (revenue,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_amount), 0)::BIGINT FROM orders WHERE payment_status = $1",
    )
    .bind(PaymentStatus::Paid.as_str())
    .fetch_one(pool)
    .await?;

    let by_status: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*)::BIGINT FROM orders GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;
    let orders = by_status.iter().map(|(_, count)| count).sum();

    let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*)::BIGINT FROM users")
        .fetch_one(pool)
        .await?;
    let (products,): (i64,) = sqlx::query_as("SELECT COUNT(*)::BIGINT FROM products")
        .fetch_one(pool)
        .await?;
    let (low_stock,): (i64,) =
        sqlx::query_as("SELECT COUNT(*)::BIGINT FROM products WHERE stock <= $1")
            .bind(state.config.low_stock_threshold)
            .fetch_one(pool)
            .await?;
    let (unread_messages,): (i64,) =
        sqlx::query_as("SELECT COUNT(*)::BIGINT FROM messages WHERE status = $1")
            .bind(MessageStatus::Unread.as_str())
            .fetch_one(pool)
            .await?;

    let data = Summary {
        revenue,
        orders,
        orders_by_status: by_status
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
        users,
        products,
        low_stock,
        unread_messages,
    };
    Ok(ApiResponse::success("Summary", data, None))
}

pub async fn sales(
    state: &AppState,
    user: &AuthUser,
    query: SalesQuery,
) -> AppResult<ApiResponse<SalesSeries>> {
    ensure_admin(user)?;
    let days = clamp_days(query.days);

    let items = sqlx::query_as::<_, DailySales>(
        r#"
        SELECT (created_at AT TIME ZONE 'UTC')::DATE AS day,
               COALESCE(SUM(total_amount), 0)::BIGINT AS revenue,
               COUNT(*)::BIGINT AS orders
        FROM orders
        WHERE payment_status = $1
          AND created_at >= NOW() - make_interval(days => $2)
        GROUP BY day
        ORDER BY day ASC
        "#,
    )
    .bind(PaymentStatus::Paid.as_str())
    .bind(days)
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success("Sales", SalesSeries { items }, None))
}

pub async fn top_products(
    state: &AppState,
    user: &AuthUser,
    query: TopProductsQuery,
) -> AppResult<ApiResponse<TopProductList>> {
    ensure_admin(user)?;
    let limit = clamp_top_limit(query.limit);

    let items = sqlx::query_as::<_, TopProduct>(
        r#"
        SELECT oi.product_id,
               MAX(oi.name) AS name,
               SUM(oi.quantity)::BIGINT AS quantity,
               SUM(oi.price * oi.quantity)::BIGINT AS revenue
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.status <> $1
        GROUP BY oi.product_id
        ORDER BY quantity DESC, revenue DESC
        LIMIT $2
        "#,
    )
    .bind(OrderStatus::Cancelled.as_str())
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success("Top products", TopProductList { items }, None))
}

pub async fn low_stock(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();
    let threshold = query
        .threshold
        .unwrap_or(state.config.low_stock_threshold)
        .max(0);

    let finder = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock)
        .order_by_asc(ProdCol::Name);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Low stock products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn activity(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ActivityList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = AuditLogs::find().order_by_desc(AuditCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(AuditEntry::from)
        .collect();

    Ok(ApiResponse::success(
        "Activity",
        ActivityList { items },
        Some(Meta::new(page, limit, total)),
    ))
}
