use std::path::Path;
use std::time::Duration;

use async_ssh2_lite::{
    AsyncSession,
    AsyncSftp,
    SessionConfiguration,
    TokioTcpStream,
};
use log::{
    debug,
    error,
    info,
    warn,
};
use futures_util::io::{
    AsyncReadExt,
    AsyncWriteExt,
};
use tokio::net::lookup_host;
use tokio::sync::Mutex;
use tokio::time::timeout;

use robowatch_commons::config::SshConfig;

use crate::error::RemoteError;

/// Default deadline for a remote command.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);
/// Shorter deadline for connectivity probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a remote command. A non-zero exit code is not an error;
/// callers interpret it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

struct Inner {
    config: SshConfig,
    session: Option<AsyncSession<TokioTcpStream>>,
    sftp: Option<AsyncSftp<TokioTcpStream>>,
}

/// One process-wide SSH session. A single mutex serializes every channel
/// operation; concurrent callers queue on it. Any transport fault tears
/// the session down, reconnects once and retries the operation once.
pub struct SshSession {
    inner: Mutex<Inner>,
}

impl SshSession {
    pub fn new(config: SshConfig) -> Self {
        SshSession {
            inner: Mutex::new(Inner {
                config,
                session: None,
                sftp: None,
            }),
        }
    }

    /// Swaps the configuration and drops the live session; the next
    /// operation reconnects with the new settings.
    pub async fn reload(&self, config: SshConfig) {
        let mut inner = self.inner.lock().await;
        inner.session = None;
        inner.sftp = None;
        inner.config = config;
        info!("SSH configuration reloaded, connection dropped");
    }

    pub async fn exec(&self, command: &str, deadline: Duration) -> Result<ExecOutput, RemoteError> {
        let mut inner = self.inner.lock().await;
        match exec_locked(&mut inner, command, deadline).await {
            Ok(output) => Ok(output),
            Err(e) => {
                warn!("SSH exec failed, reconnecting once: {e}");
                reset_locked(&mut inner);
                exec_locked(&mut inner, command, deadline).await
            }
        }
    }

    /// Uploads bytes to a remote path, creating parent directories.
    pub async fn put(&self, remote_path: &str, content: &[u8]) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().await;
        match put_locked(&mut inner, remote_path, content).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("SFTP put failed, reconnecting once: {e}");
                reset_locked(&mut inner);
                put_locked(&mut inner, remote_path, content).await
            }
        }
    }

    pub async fn get(&self, remote_path: &str) -> Result<Vec<u8>, RemoteError> {
        let mut inner = self.inner.lock().await;
        match get_locked(&mut inner, remote_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                warn!("SFTP get failed, reconnecting once: {e}");
                reset_locked(&mut inner);
                get_locked(&mut inner, remote_path).await
            }
        }
    }

    /// File names in a remote directory. An absent directory yields an
    /// empty list, not an error.
    pub async fn list(&self, remote_dir: &str) -> Result<Vec<String>, RemoteError> {
        let mut inner = self.inner.lock().await;
        match list_locked(&mut inner, remote_dir).await {
            Ok(names) => Ok(names),
            Err(e) => {
                warn!("SFTP list failed, reconnecting once: {e}");
                reset_locked(&mut inner);
                list_locked(&mut inner, remote_dir).await
            }
        }
    }

    pub async fn exists(&self, remote_path: &str) -> Result<bool, RemoteError> {
        let mut inner = self.inner.lock().await;
        match exists_locked(&mut inner, remote_path).await {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!("SFTP stat failed, reconnecting once: {e}");
                reset_locked(&mut inner);
                exists_locked(&mut inner, remote_path).await
            }
        }
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().await;
        match rename_locked(&mut inner, from, to).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("SFTP rename failed, reconnecting once: {e}");
                reset_locked(&mut inner);
                rename_locked(&mut inner, from, to).await
            }
        }
    }

    /// Short-deadline health probe.
    pub async fn probe(&self) -> bool {
        match self.exec("echo 'OK'", PROBE_TIMEOUT).await {
            Ok(output) => output.stdout.trim() == "OK",
            Err(e) => {
                debug!("SSH probe failed: {e}");
                false
            }
        }
    }
}

fn reset_locked(inner: &mut Inner) {
    inner.session = None;
    inner.sftp = None;
}

async fn connect(config: &SshConfig) -> Result<AsyncSession<TokioTcpStream>, RemoteError> {
    let target = format!("{}:{}", config.host, config.port);
    let addr = lookup_host(&target)
        .await
        .map_err(|e| RemoteError::Connect(format!("{target}: {e}")))?
        .next()
        .ok_or_else(|| RemoteError::Connect(format!("{target}: no address resolved")))?;

    let stream = timeout(CONNECT_TIMEOUT, TokioTcpStream::connect(addr))
        .await
        .map_err(|_| RemoteError::Connect(format!("{target}: connect timed out")))?
        .map_err(|e| RemoteError::Connect(format!("{target}: {e}")))?;

    let mut session_config = SessionConfiguration::new();
    session_config.set_keepalive(true, 30);

    let mut session = AsyncSession::new(stream, Some(session_config))
        .map_err(|e| RemoteError::Connect(e.to_string()))?;
    session
        .handshake()
        .await
        .map_err(|e| RemoteError::Connect(e.to_string()))?;

    authenticate(&session, config).await?;

    info!("SSH session established with {target}");
    Ok(session)
}

async fn authenticate(
    session: &AsyncSession<TokioTcpStream>, config: &SshConfig,
) -> Result<(), RemoteError> {
    if config.use_key {
        let key_path = config
            .key_path
            .as_deref()
            .ok_or_else(|| RemoteError::Config("use_key is set but key_path is empty".to_string()))?;
        session
            .userauth_pubkey_file(&config.username, None, Path::new(key_path), None)
            .await
            .map_err(|e| RemoteError::Auth(e.to_string()))?;
    } else if let Some(password) = config.password.as_deref() {
        session
            .userauth_password(&config.username, password)
            .await
            .map_err(|e| RemoteError::Auth(e.to_string()))?;
    } else {
        return Err(RemoteError::Config(
            "either an SSH key or a password is required".to_string(),
        ));
    }

    if !session.authenticated() {
        return Err(RemoteError::Auth("server rejected credentials".to_string()));
    }
    Ok(())
}

async fn ensure_session<'a>(
    inner: &'a mut Inner,
) -> Result<&'a AsyncSession<TokioTcpStream>, RemoteError> {
    if inner.session.is_none() {
        let session = connect(&inner.config).await?;
        inner.session = Some(session);
    }
    Ok(inner.session.as_ref().unwrap())
}

async fn ensure_sftp<'a>(
    inner: &'a mut Inner,
) -> Result<&'a AsyncSftp<TokioTcpStream>, RemoteError> {
    if inner.sftp.is_none() {
        if inner.session.is_none() {
            let session = connect(&inner.config).await?;
            inner.session = Some(session);
        }
        let sftp = inner
            .session
            .as_ref()
            .unwrap()
            .sftp()
            .await
            .map_err(|e| RemoteError::Sftp(e.to_string()))?;
        debug!("SFTP sub-channel established");
        inner.sftp = Some(sftp);
    }
    Ok(inner.sftp.as_ref().unwrap())
}

async fn exec_locked(
    inner: &mut Inner, command: &str, deadline: Duration,
) -> Result<ExecOutput, RemoteError> {
    let result = {
        let session = ensure_session(inner).await?;

        let run = async {
            let mut channel = session.channel_session().await?;
            channel.exec(command).await?;

            let mut stdout = String::new();
            channel.read_to_string(&mut stdout).await?;
            let mut stderr = String::new();
            channel.stderr().read_to_string(&mut stderr).await?;

            channel.close().await?;
            channel.wait_close().await?;
            let exit_code = channel.exit_status()?;

            Ok::<ExecOutput, async_ssh2_lite::Error>(ExecOutput {
                exit_code,
                stdout,
                stderr,
            })
        };

        timeout(deadline, run).await
    };

    match result {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(RemoteError::Transport(e.to_string())),
        Err(_) => {
            error!("SSH command exceeded {deadline:?}: {command}");
            // the channel is in an unknown state, drop the whole session
            reset_locked(inner);
            Err(RemoteError::Timeout(deadline))
        }
    }
}

async fn put_locked(
    inner: &mut Inner, remote_path: &str, content: &[u8],
) -> Result<(), RemoteError> {
    if let Some(dir) = remote_path.rsplit_once('/').map(|(dir, _)| dir) {
        if !dir.is_empty() {
            let exists = {
                let sftp = ensure_sftp(inner).await?;
                sftp.stat(Path::new(dir)).await.is_ok()
            };
            if !exists {
                exec_locked(inner, &format!("mkdir -p {dir}"), DEFAULT_EXEC_TIMEOUT).await?;
            }
        }
    }

    let sftp = ensure_sftp(inner).await?;
    let mut file = sftp
        .create(Path::new(remote_path))
        .await
        .map_err(|e| RemoteError::Sftp(e.to_string()))?;
    file.write_all(content)
        .await
        .map_err(|e| RemoteError::Sftp(e.to_string()))?;
    file.flush()
        .await
        .map_err(|e| RemoteError::Sftp(e.to_string()))?;
    Ok(())
}

async fn get_locked(inner: &mut Inner, remote_path: &str) -> Result<Vec<u8>, RemoteError> {
    let sftp = ensure_sftp(inner).await?;
    let mut file = sftp
        .open(Path::new(remote_path))
        .await
        .map_err(|e| RemoteError::Sftp(e.to_string()))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .await
        .map_err(|e| RemoteError::Sftp(e.to_string()))?;
    Ok(content)
}

async fn list_locked(inner: &mut Inner, remote_dir: &str) -> Result<Vec<String>, RemoteError> {
    let sftp = ensure_sftp(inner).await?;

    if sftp.stat(Path::new(remote_dir)).await.is_err() {
        debug!("Remote directory {remote_dir} does not exist, treating as empty");
        return Ok(Vec::new());
    }

    let entries = sftp
        .readdir(Path::new(remote_dir))
        .await
        .map_err(|e| RemoteError::Sftp(e.to_string()))?;

    Ok(entries
        .into_iter()
        .filter_map(|(path, _)| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .collect())
}

async fn exists_locked(inner: &mut Inner, remote_path: &str) -> Result<bool, RemoteError> {
    let sftp = ensure_sftp(inner).await?;
    Ok(sftp.stat(Path::new(remote_path)).await.is_ok())
}

async fn rename_locked(inner: &mut Inner, from: &str, to: &str) -> Result<(), RemoteError> {
    if let Some(dir) = to.rsplit_once('/').map(|(dir, _)| dir) {
        if !dir.is_empty() {
            let exists = {
                let sftp = ensure_sftp(inner).await?;
                sftp.stat(Path::new(dir)).await.is_ok()
            };
            if !exists {
                exec_locked(inner, &format!("mkdir -p {dir}"), DEFAULT_EXEC_TIMEOUT).await?;
            }
        }
    }

    let sftp = ensure_sftp(inner).await?;
    sftp.rename(Path::new(from), Path::new(to), None)
        .await
        .map_err(|e| RemoteError::Sftp(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(use_key: bool, key_path: Option<&str>, password: Option<&str>) -> SshConfig {
        SshConfig {
            host: "127.0.0.1".to_string(),
            port: 22,
            username: "deploy".to_string(),
            use_key,
            key_path: key_path.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn test_credential_precedence() {
        // key wins when use_key is set, password otherwise
        let keyed = config(true, Some("/home/deploy/.ssh/id_rsa"), Some("pw"));
        assert!(keyed.use_key);
        assert!(keyed.key_path.is_some());

        let passworded = config(false, None, Some("pw"));
        assert!(!passworded.use_key);
        assert_eq!(passworded.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_exec_output_success() {
        let ok = ExecOutput {
            exit_code: 0,
            stdout: "done".to_string(),
            stderr: String::new(),
        };
        assert!(ok.success());

        let failed = ExecOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: "error".to_string(),
        };
        assert!(!failed.success());
    }
}
