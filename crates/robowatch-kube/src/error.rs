use thiserror::Error;

use robowatch_remote::RemoteError;

#[derive(Debug, Error)]
pub enum KubeError {
    #[error(transparent)]
    Transport(#[from] RemoteError),
    /// kubectl itself ran but reported failure; never retried at this
    /// layer.
    #[error("kubectl exited with status {exit_code}: {stderr}")]
    Kubectl { exit_code: i32, stderr: String },
    #[error("failed to parse kubectl output: {0}")]
    Parse(String),
}

impl KubeError {
    pub fn from_output(output: &robowatch_remote::ExecOutput) -> Self {
        KubeError::Kubectl {
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        }
    }
}
