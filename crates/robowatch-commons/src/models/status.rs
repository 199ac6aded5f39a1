use serde::{
    Deserialize,
    Serialize,
};

/// Health of the two transports, kept separate so a user can tell which
/// side is degraded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub ssh_connected: bool,
    pub mysql_connected: bool,
    #[serde(default)]
    pub ssh_error: Option<String>,
    #[serde(default)]
    pub mysql_error: Option<String>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus {
            ssh_connected: false,
            mysql_connected: false,
            ssh_error: Some("not yet checked".to_string()),
            mysql_error: Some("not yet checked".to_string()),
        }
    }
}

impl ConnectionStatus {
    /// Applies a partial health report. A healthy transport clears its
    /// error; an unhealthy one keeps the freshest message.
    pub fn apply(
        &mut self, ssh: Option<bool>, ssh_error: Option<String>, mysql: Option<bool>,
        mysql_error: Option<String>,
    ) {
        if let Some(up) = ssh {
            self.ssh_connected = up;
            if up {
                self.ssh_error = None;
            } else if ssh_error.is_some() {
                self.ssh_error = ssh_error;
            }
        }
        if let Some(up) = mysql {
            self.mysql_connected = up;
            if up {
                self.mysql_error = None;
            } else if mysql_error.is_some() {
                self.mysql_error = mysql_error;
            }
        }
    }
}
