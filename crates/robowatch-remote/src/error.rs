use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid transport configuration: {0}")]
    Config(String),
    #[error("ssh connection failed: {0}")]
    Connect(String),
    #[error("ssh authentication failed: {0}")]
    Auth(String),
    #[error("ssh transport failed: {0}")]
    Transport(String),
    #[error("sftp operation failed: {0}")]
    Sftp(String),
    #[error("remote operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<async_ssh2_lite::Error> for RemoteError {
    fn from(error: async_ssh2_lite::Error) -> Self {
        RemoteError::Transport(error.to_string())
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(error: std::io::Error) -> Self {
        RemoteError::Transport(error.to_string())
    }
}
