use std::time::Duration;

use log::{
    debug,
    error,
    info,
    warn,
};
use sqlx::mysql::{
    MySqlConnectOptions,
    MySqlPool,
    MySqlPoolOptions,
};
use sqlx::{
    Connection,
    Row,
};
use tokio::sync::Mutex;

use robowatch_commons::config::MySqlConfig;
use robowatch_commons::models::execution::{
    ExecutionsMap,
    PendingExecution,
    PENDING_STATUS,
};

const MAX_ATTEMPTS: u32 = 3;

/// Classified MySQL failure, used both for recovery decisions and for the
/// human-readable probe message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MySqlErrorKind {
    Network,
    AuthDenied,
    UnknownDatabase,
    /// Driver-level protocol-state fault (an unread/pending result left on
    /// the wire). The affected connection must be discarded.
    ProtocolState,
    /// The server dropped us; the whole pool must be rebuilt.
    ServerGone,
    Other,
}

pub fn classify_message(message: &str) -> MySqlErrorKind {
    let message = message.to_lowercase();
    if message.contains("access denied") {
        MySqlErrorKind::AuthDenied
    } else if message.contains("unknown database") {
        MySqlErrorKind::UnknownDatabase
    } else if message.contains("server has gone away") {
        MySqlErrorKind::ServerGone
    } else if message.contains("unread result")
        || message.contains("pending result")
        || message.contains("packet out of order")
    {
        MySqlErrorKind::ProtocolState
    } else if message.contains("can't connect") || message.contains("connection refused") {
        MySqlErrorKind::Network
    } else {
        MySqlErrorKind::Other
    }
}

pub fn classify_error(error: &sqlx::Error) -> MySqlErrorKind {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
            MySqlErrorKind::Network
        }
        sqlx::Error::Protocol(message) => {
            let kind = classify_message(message);
            if kind == MySqlErrorKind::Other {
                MySqlErrorKind::ProtocolState
            } else {
                kind
            }
        }
        sqlx::Error::Database(db) => classify_message(db.message()),
        other => classify_message(&other.to_string()),
    }
}

struct State {
    config: MySqlConfig,
    pool: Option<MySqlPool>,
}

/// Bounded pool over the external business-records database. Read-only:
/// the only query it issues is the pending-executions join.
pub struct ExecutionsDb {
    state: Mutex<State>,
}

impl ExecutionsDb {
    pub fn new(config: MySqlConfig) -> Self {
        ExecutionsDb {
            state: Mutex::new(State { config, pool: None }),
        }
    }

    pub async fn reload(&self, config: MySqlConfig) {
        let mut state = self.state.lock().await;
        if let Some(pool) = state.pool.take() {
            pool.close().await;
        }
        state.config = config;
        info!("MySQL configuration reloaded, pool reinitialized on next use");
    }

    async fn ensure_pool(&self) -> Result<MySqlPool, sqlx::Error> {
        let mut state = self.state.lock().await;
        if let Some(pool) = state.pool.as_ref() {
            return Ok(pool.clone());
        }

        let config = &state.config;
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.pool_size.max(1))
            .test_before_acquire(true)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(options);

        info!(
            "MySQL pool created for {}:{} ({} connections)",
            config.host,
            config.port,
            config.pool_size.max(1)
        );
        state.pool = Some(pool.clone());
        Ok(pool)
    }

    async fn rebuild_pool(&self) {
        let mut state = self.state.lock().await;
        if let Some(pool) = state.pool.take() {
            pool.close().await;
        }
        warn!("MySQL pool torn down, will be reinitialized");
    }

    /// Pending executions for the given robot names, grouped by the name
    /// the external database reports. Never propagates: this path feeds a
    /// cache, so unrecoverable failures yield an empty map.
    pub async fn executions_for(&self, names: &[String]) -> ExecutionsMap {
        if names.is_empty() {
            return ExecutionsMap::new();
        }

        for attempt in 1..=MAX_ATTEMPTS {
            let pool = match self.ensure_pool().await {
                Ok(pool) => pool,
                Err(e) => {
                    warn!("MySQL pool unavailable: {e}");
                    return ExecutionsMap::new();
                }
            };

            match query_executions(&pool, names).await {
                Ok(map) => return map,
                Err(e) => {
                    let kind = classify_error(&e);
                    error!(
                        "Failed to fetch executions (attempt {attempt}/{MAX_ATTEMPTS}, {kind:?}): {e}"
                    );
                    match kind {
                        MySqlErrorKind::ProtocolState => continue,
                        MySqlErrorKind::ServerGone => {
                            self.rebuild_pool().await;
                            continue;
                        }
                        _ => return ExecutionsMap::new(),
                    }
                }
            }
        }

        ExecutionsMap::new()
    }

    /// Connectivity probe with a classified, human-readable message.
    pub async fn probe(&self) -> (bool, String) {
        let (host, port, database) = {
            let state = self.state.lock().await;
            (
                state.config.host.clone(),
                state.config.port,
                state.config.database.clone(),
            )
        };

        let pool = match self.ensure_pool().await {
            Ok(pool) => pool,
            Err(e) => return (false, format!("MySQL pool could not be initialized: {e}")),
        };

        match sqlx::query("SELECT 1").fetch_one(&pool).await {
            Ok(_) => (true, "MySQL connection successful".to_string()),
            Err(e) => {
                let message = match classify_error(&e) {
                    MySqlErrorKind::Network => {
                        format!("Could not reach the MySQL server ({host}:{port}).")
                    }
                    MySqlErrorKind::AuthDenied => {
                        "Access denied. Check user and password in config.ini".to_string()
                    }
                    MySqlErrorKind::UnknownDatabase => {
                        format!("Database '{database}' not found.")
                    }
                    MySqlErrorKind::ProtocolState => {
                        "Unread result on the connection; it will be reset automatically."
                            .to_string()
                    }
                    MySqlErrorKind::ServerGone => {
                        "MySQL server has gone away; the pool will be rebuilt.".to_string()
                    }
                    MySqlErrorKind::Other => format!("MySQL connection error: {e}"),
                };
                (false, message)
            }
        }
    }
}

async fn query_executions(
    pool: &MySqlPool, names: &[String],
) -> Result<ExecutionsMap, sqlx::Error> {
    let mut conn = pool.acquire().await?;

    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "SELECT e.id, e.status_01, r.nome_do_robo \
         FROM bwav4.execucao e \
         JOIN bwav4.robo r ON e.robo_id = r.id \
         WHERE r.nome_do_robo IN ({placeholders}) AND e.status_01 = {PENDING_STATUS}"
    );

    let mut query = sqlx::query(&sql);
    for name in names {
        query = query.bind(name);
    }

    match query.fetch_all(&mut *conn).await {
        Ok(rows) => {
            let mut map = ExecutionsMap::new();
            for row in rows {
                let execution = PendingExecution {
                    id: row.try_get("id")?,
                    robot_name: row.try_get("nome_do_robo")?,
                    status: row.try_get("status_01")?,
                };
                map.entry(execution.robot_name.clone())
                    .or_default()
                    .push(execution);
            }
            Ok(map)
        }
        Err(e) => {
            if classify_error(&e) == MySqlErrorKind::ProtocolState {
                // the wire is dirty, make sure this connection never
                // returns to the pool
                let raw = conn.detach();
                let _ = raw.close().await;
                debug!("Replaced MySQL connection after protocol-state error");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MySqlConfig {
        MySqlConfig {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "watcher".to_string(),
            password: "secret".to_string(),
            database: "bwav4".to_string(),
            pool_size: 3,
        }
    }

    #[test]
    fn test_classify_message() {
        assert_eq!(
            classify_message("Access denied for user 'watcher'@'%'"),
            MySqlErrorKind::AuthDenied
        );
        assert_eq!(
            classify_message("Unknown database 'bwav4'"),
            MySqlErrorKind::UnknownDatabase
        );
        assert_eq!(
            classify_message("MySQL server has gone away"),
            MySqlErrorKind::ServerGone
        );
        assert_eq!(
            classify_message("Unread result found"),
            MySqlErrorKind::ProtocolState
        );
        assert_eq!(
            classify_message("Can't connect to MySQL server on 'db' (111)"),
            MySqlErrorKind::Network
        );
        assert_eq!(classify_message("something odd"), MySqlErrorKind::Other);
    }

    #[test]
    fn test_classify_error_variants() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(classify_error(&io), MySqlErrorKind::Network);

        let protocol = sqlx::Error::Protocol("packet out of order".to_string());
        assert_eq!(classify_error(&protocol), MySqlErrorKind::ProtocolState);

        // a protocol fault with no recognizable text still counts as one
        let unknown_protocol = sqlx::Error::Protocol("???".to_string());
        assert_eq!(classify_error(&unknown_protocol), MySqlErrorKind::ProtocolState);
    }

    #[tokio::test]
    async fn test_empty_names_short_circuits() {
        // no server is listening; an issued query would fail loudly, so an
        // empty result proves the short-circuit
        let db = ExecutionsDb::new(config());
        let map = db.executions_for(&[]).await;
        assert!(map.is_empty());
    }
}
