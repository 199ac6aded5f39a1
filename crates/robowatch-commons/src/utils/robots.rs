use chrono::Utc;
use log::info;
use serde_json::json;
use sqlx::{
    Row,
    SqlitePool,
};

use crate::models::robot::{
    Robot,
    RobotKind,
};
use crate::utils::error::StoreError;

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<Robot, StoreError> {
    let id: i64 = row.try_get("id").map_err(StoreError::from)?;
    let data: String = row.try_get("data").map_err(StoreError::from)?;
    let mut robot: Robot = serde_json::from_str(&data)?;
    robot.id = Some(id);
    Ok(robot)
}

pub async fn insert_robot_with_pool(
    robot: Robot, pool: &SqlitePool,
) -> Result<Robot, StoreError> {
    let now = Utc::now();
    let mut robot = robot.prepare();
    robot.validate().map_err(StoreError::Decode)?;
    robot.created_at = Some(now);
    robot.updated_at = Some(now);
    robot.active = true;

    let mut conn = pool.acquire().await?;
    let data = json!(robot).to_string();
    let result = sqlx::query("INSERT INTO robots (name, kind, active, data) VALUES (?1, ?2, ?3, ?4)")
        .bind(&robot.name)
        .bind(robot.kind.as_str())
        .bind(robot.active)
        .bind(data)
        .execute(&mut *conn)
        .await;

    match result {
        Ok(done) => {
            robot.id = Some(done.last_insert_rowid());
            info!("Robot '{}' ({}) inserted", robot.name, robot.kind);
            Ok(robot)
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(StoreError::AlreadyExists(robot.name))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update_robot_with_pool(
    robot: Robot, pool: &SqlitePool,
) -> Result<Robot, StoreError> {
    let mut robot = robot.prepare();
    robot.validate().map_err(StoreError::Decode)?;
    robot.updated_at = Some(Utc::now());

    let mut conn = pool.acquire().await?;
    let data = json!(robot).to_string();
    let result = sqlx::query("UPDATE robots SET kind = ?1, active = ?2, data = ?3 WHERE name = ?4")
        .bind(robot.kind.as_str())
        .bind(robot.active)
        .bind(data)
        .bind(&robot.name)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(robot.name));
    }
    Ok(robot)
}

pub async fn get_robot_with_pool(name: &str, pool: &SqlitePool) -> Result<Robot, StoreError> {
    let mut conn = pool.acquire().await?;
    let row = sqlx::query("SELECT id, data FROM robots WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => decode_row(&row),
        None => Err(StoreError::NotFound(name.to_string())),
    }
}

pub async fn list_robots_with_pool(
    pool: &SqlitePool, kind: Option<RobotKind>,
) -> Result<Vec<Robot>, StoreError> {
    let mut conn = pool.acquire().await?;
    let rows = match kind {
        Some(kind) => {
            sqlx::query("SELECT id, data FROM robots WHERE kind = ?1 ORDER BY name")
                .bind(kind.as_str())
                .fetch_all(&mut *conn)
                .await?
        }
        None => {
            sqlx::query("SELECT id, data FROM robots ORDER BY name")
                .fetch_all(&mut *conn)
                .await?
        }
    };

    rows.iter().map(decode_row).collect()
}

pub async fn list_active_robots_with_pool(
    pool: &SqlitePool, kind: Option<RobotKind>,
) -> Result<Vec<Robot>, StoreError> {
    let mut conn = pool.acquire().await?;
    let rows = match kind {
        Some(kind) => {
            sqlx::query("SELECT id, data FROM robots WHERE active = 1 AND kind = ?1 ORDER BY name")
                .bind(kind.as_str())
                .fetch_all(&mut *conn)
                .await?
        }
        None => {
            sqlx::query("SELECT id, data FROM robots WHERE active = 1 ORDER BY name")
                .fetch_all(&mut *conn)
                .await?
        }
    };

    rows.iter().map(decode_row).collect()
}

pub async fn delete_robot_with_pool(name: &str, pool: &SqlitePool) -> Result<(), StoreError> {
    let mut conn = pool.acquire().await?;
    let result = sqlx::query("DELETE FROM robots WHERE name = ?1")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(name.to_string()));
    }
    Ok(())
}

/// Flips the active flag, stamping `deactivated_at` on the way down.
pub async fn set_robot_active_with_pool(
    name: &str, active: bool, pool: &SqlitePool,
) -> Result<Robot, StoreError> {
    let mut robot = get_robot_with_pool(name, pool).await?;
    let now = Utc::now();
    if active {
        robot.activate(now);
    } else {
        robot.deactivate(now);
    }
    update_robot_with_pool(robot, pool).await
}

/// Flips the cronjob suspended flag together with the active flag, the
/// way standby/activate semantics require.
pub async fn set_cronjob_suspended_with_pool(
    name: &str, suspended: bool, pool: &SqlitePool,
) -> Result<Robot, StoreError> {
    let mut robot = get_robot_with_pool(name, pool).await?;
    let now = Utc::now();
    robot.suspended = Some(suspended);
    if suspended {
        robot.deactivate(now);
    } else {
        robot.activate(now);
    }
    update_robot_with_pool(robot, pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::db::create_db_tables;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");
        create_db_tables(&pool).await.expect("Failed to create tables");
        pool
    }

    fn sample_rpa(name: &str) -> Robot {
        let mut robot = Robot::new(name, RobotKind::Rpa);
        robot.max_instances = Some(3);
        robot.memory_limit_mb = 512;
        robot.lifetime_seconds = Some(600);
        robot.image_tag = "v1.2".to_string();
        robot
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let pool = setup_pool().await;
        let inserted = insert_robot_with_pool(sample_rpa("att_infos_bitrix"), &pool)
            .await
            .unwrap();
        assert!(inserted.id.is_some());
        assert!(inserted.active);
        assert!(inserted.created_at.is_some());

        let fetched = get_robot_with_pool("att_infos_bitrix", &pool).await.unwrap();
        assert_eq!(fetched.name, "att_infos_bitrix");
        assert_eq!(fetched.max_instances, Some(3));
        assert!(fetched.tags.contains(&"Exec".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let pool = setup_pool().await;
        insert_robot_with_pool(sample_rpa("bot"), &pool).await.unwrap();

        let err = insert_robot_with_pool(sample_rpa("bot"), &pool)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(name) if name == "bot"));
    }

    #[tokio::test]
    async fn test_name_unique_across_kinds() {
        let pool = setup_pool().await;
        insert_robot_with_pool(sample_rpa("bot"), &pool).await.unwrap();

        let mut cronjob = Robot::new("bot", RobotKind::Cronjob);
        cronjob.schedule = Some("0 6 * * *".to_string());
        let err = insert_robot_with_pool(cronjob, &pool).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_list_by_kind_and_active() {
        let pool = setup_pool().await;
        insert_robot_with_pool(sample_rpa("bot_a"), &pool).await.unwrap();
        insert_robot_with_pool(sample_rpa("bot_b"), &pool).await.unwrap();

        let mut cronjob = Robot::new("daily-export", RobotKind::Cronjob);
        cronjob.schedule = Some("0 6 * * *".to_string());
        insert_robot_with_pool(cronjob, &pool).await.unwrap();

        let rpas = list_robots_with_pool(&pool, Some(RobotKind::Rpa)).await.unwrap();
        assert_eq!(rpas.len(), 2);

        set_robot_active_with_pool("bot_a", false, &pool).await.unwrap();
        let active = list_active_robots_with_pool(&pool, Some(RobotKind::Rpa))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "bot_b");
    }

    #[tokio::test]
    async fn test_deactivate_stamps_and_reactivate_clears() {
        let pool = setup_pool().await;
        insert_robot_with_pool(sample_rpa("bot"), &pool).await.unwrap();

        let standby = set_robot_active_with_pool("bot", false, &pool).await.unwrap();
        assert!(!standby.active);
        assert!(standby.deactivated_at.is_some());

        let active = set_robot_active_with_pool("bot", true, &pool).await.unwrap();
        assert!(active.active);
        assert!(active.deactivated_at.is_none());
    }

    #[tokio::test]
    async fn test_cronjob_standby_round_trip() {
        let pool = setup_pool().await;
        let mut cronjob = Robot::new("daily-export", RobotKind::Cronjob);
        cronjob.schedule = Some("0 6 * * *".to_string());
        insert_robot_with_pool(cronjob, &pool).await.unwrap();

        let suspended = set_cronjob_suspended_with_pool("daily-export", true, &pool)
            .await
            .unwrap();
        assert_eq!(suspended.suspended, Some(true));
        assert!(!suspended.active);

        let resumed = set_cronjob_suspended_with_pool("daily-export", false, &pool)
            .await
            .unwrap();
        assert_eq!(resumed.suspended, Some(false));
        assert!(resumed.active);
    }

    #[tokio::test]
    async fn test_delete_restores_count() {
        let pool = setup_pool().await;
        let before = list_robots_with_pool(&pool, None).await.unwrap().len();

        insert_robot_with_pool(sample_rpa("bot"), &pool).await.unwrap();
        delete_robot_with_pool("bot", &pool).await.unwrap();

        let after = list_robots_with_pool(&pool, None).await.unwrap().len();
        assert_eq!(before, after);

        let err = get_robot_with_pool("bot", &pool).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_missing_robot() {
        let pool = setup_pool().await;
        let err = update_robot_with_pool(sample_rpa("ghost"), &pool)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
