use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Order, OrderId},
    order_objects::OrderQueryFilter,
};

/// Inserts a brand-new order record. Returns `false` if an order with the same id or sequence already exists, in which
/// case nothing was written.
pub async fn insert_order(order: &Order, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO orders (
                id,
                seq,
                customer_phone,
                customer_name,
                items,
                amount,
                original_amount,
                status,
                receipt,
                status_reason,
                created_at,
                paid_at,
                updated_at,
                version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&order.id)
    .bind(order.seq)
    .bind(&order.customer_phone)
    .bind(&order.customer_name)
    .bind(&order.items)
    .bind(order.amount)
    .bind(order.original_amount)
    .bind(order.status)
    .bind(&order.receipt)
    .bind(&order.status_reason)
    .bind(order.created_at)
    .bind(order.paid_at)
    .bind(order.updated_at)
    .bind(order.version)
    .execute(conn)
    .await?;
    let inserted = result.rows_affected() == 1;
    if inserted {
        debug!("🗃️ Order [{}] inserted with sequence {}", order.id, order.seq);
    }
    Ok(inserted)
}

/// Replaces the mutable fields of an order, but only if the stored version is still `expected_version`.
/// Returns `false` if the order was not found at that version.
///
/// `id`, `seq`, `customer_phone`, `items` and `created_at` are immutable and are never written here.
pub async fn update_if_version(
    order: &Order,
    expected_version: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                customer_name = $1,
                amount = $2,
                original_amount = $3,
                status = $4,
                receipt = $5,
                status_reason = $6,
                paid_at = $7,
                updated_at = $8,
                version = $9
            WHERE id = $10 AND version = $11
        "#,
    )
    .bind(&order.customer_name)
    .bind(order.amount)
    .bind(order.original_amount)
    .bind(order.status)
    .bind(&order.receipt)
    .bind(&order.status_reason)
    .bind(order.paid_at)
    .bind(order.updated_at)
    .bind(order.version)
    .bind(&order.id)
    .bind(expected_version)
    .execute(conn)
    .await?;
    let updated = result.rows_affected() == 1;
    trace!("🗃️ Conditional update of [{}] at version {expected_version}: {updated}", order.id);
    Ok(updated)
}

/// True if the error is a violation of the global receipt uniqueness constraint.
pub fn is_receipt_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(err) => err.is_unique_violation() && err.message().contains("receipt"),
        _ => false,
    }
}

pub async fn fetch_order(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_version(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let version = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(version)
}

pub async fn fetch_order_by_receipt(receipt: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE receipt = $1").bind(receipt).fetch_optional(conn).await?;
    Ok(order)
}

/// The highest sequence number of any stored order, or 0 if there are none.
pub async fn max_sequence(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let max = sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM orders").fetch_one(conn).await?;
    Ok(max)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are in creation order (ascending `seq`).
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(phone) = query.customer_phone {
        where_clause.push("customer_phone = ");
        where_clause.push_bind_unseparated(phone);
    }
    if let Some(amount) = query.amount {
        where_clause.push("amount = ");
        where_clause.push_bind_unseparated(amount);
    }
    if let Some(statuses) = query.statuses.as_ref().filter(|s| !s.is_empty()) {
        let status_clause = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY seq ASC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {} orders", orders.len());
    Ok(orders)
}
