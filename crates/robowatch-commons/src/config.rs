use std::path::{
    Path,
    PathBuf,
};

use ini::Ini;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] ini::Error),
    #[error("missing [{section}] {key} in config file")]
    Missing {
        section: &'static str,
        key: &'static str,
    },
    #[error("invalid value for [{section}] {key}: {value}")]
    Invalid {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub use_key: bool,
    pub key_path: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub pool_size: u32,
}

/// Remote directories holding robot manifests. All optional; absent paths
/// disable the SSH-side file sync.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathsConfig {
    pub rpa_config_path: Option<String>,
    pub cronjobs_path: Option<String>,
    pub deployments_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackendConfig {
    pub polling_interval_vm: u64,
    pub polling_interval_db: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub ssh: SshConfig,
    pub mysql: MySqlConfig,
    pub paths: PathsConfig,
    pub api: ApiConfig,
    pub backend: BackendConfig,
}

impl AppConfig {
    /// `ROBOWATCH_CONFIG` overrides the default `./config.ini`.
    pub fn default_path() -> PathBuf {
        std::env::var("ROBOWATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.ini"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path)?;

        let ssh = SshConfig {
            host: required(&ini, "SSH", "host")?,
            port: parsed(&ini, "SSH", "port", 22)?,
            username: required(&ini, "SSH", "username")?,
            use_key: parsed_bool(&ini, "SSH", "use_key", false)?,
            key_path: optional(&ini, "SSH", "key_path"),
            password: optional(&ini, "SSH", "password"),
        };

        let mysql = MySqlConfig {
            host: required(&ini, "MySQL", "host")?,
            port: parsed(&ini, "MySQL", "port", 3306)?,
            user: required(&ini, "MySQL", "user")?,
            password: required(&ini, "MySQL", "password")?,
            database: required(&ini, "MySQL", "database")?,
            pool_size: parsed(&ini, "MySQL", "pool_size", 3)?,
        };

        let paths = PathsConfig {
            rpa_config_path: optional(&ini, "PATHS", "rpa_config_path"),
            cronjobs_path: optional(&ini, "PATHS", "cronjobs_path"),
            deployments_path: optional(&ini, "PATHS", "deployments_path"),
        };

        let api = ApiConfig {
            host: optional(&ini, "API", "host").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed(&ini, "API", "port", 8000)?,
        };

        let backend = BackendConfig {
            polling_interval_vm: parsed(&ini, "BACKEND", "polling_interval_vm", 10)?,
            polling_interval_db: parsed(&ini, "BACKEND", "polling_interval_db", 10)?,
        };

        Ok(AppConfig {
            ssh,
            mysql,
            paths,
            api,
            backend,
        })
    }
}

fn optional(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(
    ini: &Ini, section: &'static str, key: &'static str,
) -> Result<String, ConfigError> {
    optional(ini, section, key).ok_or(ConfigError::Missing { section, key })
}

fn parsed<T: std::str::FromStr>(
    ini: &Ini, section: &'static str, key: &'static str, default: T,
) -> Result<T, ConfigError> {
    match optional(ini, section, key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            section,
            key,
            value: raw,
        }),
        None => Ok(default),
    }
}

fn parsed_bool(
    ini: &Ini, section: &'static str, key: &'static str, default: bool,
) -> Result<bool, ConfigError> {
    match optional(ini, section, key) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                section,
                key,
                value: raw,
            }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const FULL: &str = r#"
[SSH]
host = 10.0.0.5
port = 2222
username = deploy
use_key = true
key_path = /home/deploy/.ssh/id_rsa

[MySQL]
host = db.internal
user = watcher
password = secret
database = bwav4
pool_size = 5

[PATHS]
cronjobs_path = /opt/robots/cronjobs

[API]
port = 9000

[BACKEND]
polling_interval_vm = 5
"#;

    #[test]
    fn test_load_full_config() {
        let file = write_config(FULL);
        let config = AppConfig::load(file.path()).unwrap();

        assert_eq!(config.ssh.host, "10.0.0.5");
        assert_eq!(config.ssh.port, 2222);
        assert!(config.ssh.use_key);
        assert_eq!(config.ssh.key_path.as_deref(), Some("/home/deploy/.ssh/id_rsa"));
        assert_eq!(config.ssh.password, None);

        assert_eq!(config.mysql.port, 3306);
        assert_eq!(config.mysql.pool_size, 5);
        assert_eq!(config.mysql.database, "bwav4");

        assert_eq!(config.paths.cronjobs_path.as_deref(), Some("/opt/robots/cronjobs"));
        assert_eq!(config.paths.rpa_config_path, None);

        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.api.port, 9000);

        assert_eq!(config.backend.polling_interval_vm, 5);
        assert_eq!(config.backend.polling_interval_db, 10);
    }

    #[test]
    fn test_missing_required_key() {
        let file = write_config("[SSH]\nhost = 10.0.0.5\n");
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { section: "SSH", key: "username" }));
    }

    #[test]
    fn test_invalid_port() {
        let file = write_config(
            "[SSH]\nhost = h\nusername = u\nport = not-a-port\n[MySQL]\nhost = h\nuser = u\npassword = p\ndatabase = d\n",
        );
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "port", .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/config.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }
}
