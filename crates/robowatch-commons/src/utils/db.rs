use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use log::{
    error,
    info,
};
use sqlx::SqlitePool;

/// `ROBOWATCH_DB` overrides the default `./robowatch.db`.
pub fn db_file_path() -> PathBuf {
    std::env::var("ROBOWATCH_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("robowatch.db"))
}

fn create_db_file(path: &Path) -> Result<(), std::io::Error> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }
    fs::File::create(path)?;
    Ok(())
}

/// Opens (creating if needed) the catalog database and ensures the schema.
pub async fn init_catalog_db(path: &Path) -> Result<SqlitePool, String> {
    if !path.exists() {
        create_db_file(path).map_err(|e| format!("Failed to create DB file: {e}"))?;
    }

    let url = format!("sqlite://{}", path.display());
    info!("Catalog database: {url}");
    let pool = SqlitePool::connect(&url).await.map_err(|e| {
        error!("Failed to connect to catalog DB: {e}");
        e.to_string()
    })?;

    create_db_tables(&pool).await.map_err(|e| e.to_string())?;
    Ok(pool)
}

pub async fn create_db_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Creating catalog tables and indexes.");
    let mut conn = pool.acquire().await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS robots (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL
        )",
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_robots_kind ON robots(kind)")
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS failed_pods (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            failed_at TEXT NOT NULL,
            data TEXT NOT NULL
        )",
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_failed_pods_failed_at ON failed_pods(failed_at)")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
