use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use robowatch_remote::SshSession;

use crate::error::KubeError;

pub(crate) const KUBECTL_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const KUBECTL_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Issues kubectl commands on the remote host and parses `-o json`
/// responses into normalized DTOs. Every operation is independent.
#[derive(Clone)]
pub struct KubeClient {
    ssh: Arc<SshSession>,
}

impl KubeClient {
    pub fn new(ssh: Arc<SshSession>) -> Self {
        KubeClient { ssh }
    }

    pub fn ssh(&self) -> &SshSession {
        &self.ssh
    }

    /// Runs a kubectl command expected to print JSON on stdout.
    pub(crate) async fn kubectl_json<T: DeserializeOwned>(
        &self, command: &str,
    ) -> Result<T, KubeError> {
        let output = self.ssh.exec(command, KUBECTL_TIMEOUT).await?;
        if !output.success() {
            return Err(KubeError::from_output(&output));
        }
        serde_json::from_str(&output.stdout).map_err(|e| KubeError::Parse(e.to_string()))
    }

    /// Runs a kubectl command where only the exit status matters.
    pub(crate) async fn kubectl_ok(&self, command: &str) -> Result<(), KubeError> {
        let output = self.ssh.exec(command, KUBECTL_TIMEOUT).await?;
        if !output.success() {
            return Err(KubeError::from_output(&output));
        }
        Ok(())
    }

    /// Streams a JSON manifest through `kubectl create -f -`.
    pub(crate) async fn kubectl_create_stdin(
        &self, manifest: &serde_json::Value,
    ) -> Result<(), KubeError> {
        let body = serde_json::to_string_pretty(manifest)
            .map_err(|e| KubeError::Parse(e.to_string()))?;
        let command = format!("kubectl create -f - <<'EOF'\n{body}\nEOF");
        self.kubectl_ok(&command).await
    }
}

/// Wrapper for every `kubectl get … -o json` response.
#[derive(Debug, Deserialize)]
pub(crate) struct KubeList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl RawMetadata {
    pub fn namespace_or_default(&self) -> String {
        self.namespace.clone().unwrap_or_else(|| "default".to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawEnvVar {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawResources {
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawContainerSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub env: Vec<RawEnvVar>,
    #[serde(default)]
    pub resources: RawResources,
}
