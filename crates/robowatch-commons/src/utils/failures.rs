use std::collections::HashSet;

use chrono::{
    DateTime,
    Utc,
};
use log::info;
use serde_json::json;
use sqlx::{
    Row,
    SqlitePool,
};

use crate::models::failure::FailureRecord;
use crate::utils::error::StoreError;

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<FailureRecord, StoreError> {
    let id: i64 = row.try_get("id").map_err(StoreError::from)?;
    let data: String = row.try_get("data").map_err(StoreError::from)?;
    let mut record: FailureRecord = serde_json::from_str(&data)?;
    record.id = Some(id);
    Ok(record)
}

/// Inserts a failure record unless one with the same pod name is already
/// present. Returns whether a row was written.
pub async fn insert_failure_if_absent_with_pool(
    record: FailureRecord, pool: &SqlitePool,
) -> Result<bool, StoreError> {
    let mut conn = pool.acquire().await?;
    let data = json!(record).to_string();
    let result = sqlx::query(
        "INSERT OR IGNORE INTO failed_pods (name, failed_at, data) VALUES (?1, ?2, ?3)",
    )
    .bind(&record.name)
    .bind(record.failed_at.to_rfc3339())
    .bind(data)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_failures_with_pool(
    pool: &SqlitePool,
) -> Result<Vec<FailureRecord>, StoreError> {
    let mut conn = pool.acquire().await?;
    let rows = sqlx::query("SELECT id, data FROM failed_pods ORDER BY failed_at DESC")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(decode_row).collect()
}

pub async fn get_failure_with_pool(
    name: &str, pool: &SqlitePool,
) -> Result<FailureRecord, StoreError> {
    let mut conn = pool.acquire().await?;
    let row = sqlx::query("SELECT id, data FROM failed_pods WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => decode_row(&row),
        None => Err(StoreError::NotFound(name.to_string())),
    }
}

/// Pod names already recorded, so the harvester can skip them cheaply.
pub async fn failure_names_with_pool(pool: &SqlitePool) -> Result<HashSet<String>, StoreError> {
    let mut conn = pool.acquire().await?;
    let rows = sqlx::query("SELECT name FROM failed_pods")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("name").map_err(StoreError::from))
        .collect()
}

/// Deletes records that failed before the cutoff. Returns how many rows
/// were purged.
pub async fn purge_failures_before_with_pool(
    cutoff: DateTime<Utc>, pool: &SqlitePool,
) -> Result<u64, StoreError> {
    let mut conn = pool.acquire().await?;
    let result = sqlx::query("DELETE FROM failed_pods WHERE failed_at < ?1")
        .bind(cutoff.to_rfc3339())
        .execute(&mut *conn)
        .await?;

    let purged = result.rows_affected();
    if purged > 0 {
        info!("Purged {purged} failure records older than {cutoff}");
    }
    Ok(purged)
}
