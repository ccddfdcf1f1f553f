use sqlx::SqliteConnection;

pub const ORDER_ID_COUNTER: &str = "order_id";

/// Advances the named counter by one and returns the new value, in a single statement.
pub async fn next_value(name: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let value = sqlx::query_scalar(
        r#"
        INSERT INTO counters (name, value) VALUES ($1, 1)
        ON CONFLICT (name) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(name)
    .fetch_one(conn)
    .await?;
    Ok(value)
}

pub async fn current_value(name: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let value: Option<i64> =
        sqlx::query_scalar("SELECT value FROM counters WHERE name = $1").bind(name).fetch_optional(conn).await?;
    Ok(value.unwrap_or(0))
}

/// Raises the counter to `floor` if it is currently lower. Returns the new value if the counter changed.
pub async fn raise_floor(name: &str, floor: i64, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let value = sqlx::query_scalar(
        r#"
        INSERT INTO counters (name, value) VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET value = excluded.value WHERE counters.value < excluded.value
        RETURNING value
        "#,
    )
    .bind(name)
    .bind(floor)
    .fetch_optional(conn)
    .await?;
    Ok(value)
}
