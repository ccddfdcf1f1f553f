use chrono::Utc;
use log::info;
use sqlx::SqliteConnection;

use crate::db_types::{NewPaymentException, PaymentException};

/// Records a held payment. A redelivered payment with the same receipt and reason returns the existing record.
pub async fn idempotent_insert(
    exception: NewPaymentException,
    conn: &mut SqliteConnection,
) -> Result<PaymentException, sqlx::Error> {
    let inserted: Option<PaymentException> = sqlx::query_as(
        r#"
            INSERT INTO payment_exceptions (receipt, kind, order_id, customer_phone, amount, detail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (receipt, kind) DO NOTHING
            RETURNING *
        "#,
    )
    .bind(&exception.receipt)
    .bind(exception.kind)
    .bind(&exception.order_id)
    .bind(&exception.customer_phone)
    .bind(exception.amount)
    .bind(&exception.detail)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(held) => {
            info!("🗃️ Payment {} held for reconciliation ({}): {}", held.receipt, held.kind, held.detail);
            Ok(held)
        },
        None => {
            sqlx::query_as("SELECT * FROM payment_exceptions WHERE receipt = $1 AND kind = $2")
                .bind(&exception.receipt)
                .bind(exception.kind)
                .fetch_one(conn)
                .await
        },
    }
}

pub async fn fetch_all(conn: &mut SqliteConnection) -> Result<Vec<PaymentException>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_exceptions ORDER BY id ASC").fetch_all(conn).await
}
