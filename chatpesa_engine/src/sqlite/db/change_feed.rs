use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{ChangeKind, FeedEvent, NewFeedEvent, OrderId},
    traits::StoreError,
};

#[derive(Debug, FromRow)]
struct FeedRow {
    feed_offset: i64,
    order_id: OrderId,
    version: i64,
    kind: ChangeKind,
    snapshot: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<FeedRow> for FeedEvent {
    type Error = StoreError;

    fn try_from(row: FeedRow) -> Result<Self, Self::Error> {
        let order = serde_json::from_str(&row.snapshot)?;
        Ok(FeedEvent {
            offset: row.feed_offset,
            order_id: row.order_id,
            kind: row.kind,
            version: row.version,
            order,
            timestamp: row.created_at,
        })
    }
}

/// Appends the event, unless the feed already holds an event for the same order at this version or a later one.
///
/// Either way, the recorded event for the lowest version `>=` the requested one is returned. Refusing to append an older
/// snapshot behind a newer one means a reader replaying the feed in offset order never sees an order regress.
pub async fn idempotent_append(event: NewFeedEvent, conn: &mut SqliteConnection) -> Result<FeedEvent, StoreError> {
    let snapshot = serde_json::to_string(&event.order)?;
    let inserted: Option<FeedRow> = sqlx::query_as(
        r#"
            INSERT INTO change_feed (order_id, version, kind, snapshot, created_at)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM change_feed WHERE order_id = $1 AND version >= $2)
            ON CONFLICT (order_id, version) DO NOTHING
            RETURNING *
        "#,
    )
    .bind(event.order_id())
    .bind(event.version())
    .bind(event.kind)
    .bind(snapshot)
    .bind(event.timestamp)
    .fetch_optional(&mut *conn)
    .await?;
    let row = match inserted {
        Some(row) => {
            debug!("🗃️ Feed event #{} ({}) recorded for [{}] v{}", row.feed_offset, row.kind, row.order_id, row.version);
            row
        },
        None => {
            debug!("🗃️ Feed already has [{}] at v{} or later", event.order_id(), event.version());
            sqlx::query_as(
                "SELECT * FROM change_feed WHERE order_id = $1 AND version >= $2 ORDER BY version ASC LIMIT 1",
            )
            .bind(event.order_id())
            .bind(event.version())
            .fetch_one(conn)
            .await?
        },
    };
    FeedEvent::try_from(row)
}

pub async fn read_from(from: i64, limit: usize, conn: &mut SqliteConnection) -> Result<Vec<FeedEvent>, StoreError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows: Vec<FeedRow> =
        sqlx::query_as("SELECT * FROM change_feed WHERE feed_offset >= $1 ORDER BY feed_offset ASC LIMIT $2")
            .bind(from)
            .bind(limit)
            .fetch_all(conn)
            .await?;
    rows.into_iter().map(FeedEvent::try_from).collect()
}

pub async fn head_offset(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let head = sqlx::query_scalar("SELECT COALESCE(MAX(feed_offset), 0) FROM change_feed").fetch_one(conn).await?;
    Ok(head)
}

pub async fn latest_versions(conn: &mut SqliteConnection) -> Result<HashMap<OrderId, i64>, sqlx::Error> {
    let rows: Vec<(OrderId, i64)> =
        sqlx::query_as("SELECT order_id, MAX(version) FROM change_feed GROUP BY order_id").fetch_all(conn).await?;
    Ok(rows.into_iter().collect())
}
