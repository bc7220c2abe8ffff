//! A [`Deployer`] that runs the shell handler on the local machine.
//!
//! It reads the deployed `function.json` for the timeout and then serves
//! invocations exactly as the generated handler does: `sh` with stderr merged
//! into stdout, output returned as a JSON string whatever the exit status.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::deployer::{DeployedHandle, Deployer};
use crate::error::BackendError;
use crate::template::{CONFIG_FILE_NAME, FunctionConfig};
use crate::wire::{Request, encode_response};

#[derive(Debug, Clone)]
struct LocalFunction {
    id: String,
    timeout: Duration,
}

/// Local subprocess simulator of the function backend.
#[derive(Debug)]
pub struct LocalDeployer {
    shell: String,
    workdir: Option<PathBuf>,
    functions: Mutex<HashMap<String, LocalFunction>>,
    next_id: AtomicU64,
}

impl Default for LocalDeployer {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalDeployer {
    /// Run commands with `sh` in the current working directory.
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
            workdir: None,
            functions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Run commands in `dir`.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Run commands with another POSIX shell.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Number of functions currently deployed.
    pub async fn deployed_count(&self) -> usize {
        self.functions.lock().await.len()
    }

    async fn lookup(&self, handle: &DeployedHandle) -> Result<LocalFunction, BackendError> {
        let functions = self.functions.lock().await;
        match functions.get(handle.name()) {
            Some(function) if function.id == handle.id() => Ok(function.clone()),
            _ => Err(BackendError::NotFound(handle.to_string())),
        }
    }

    async fn run(&self, command: &str, timeout: Duration) -> Result<String, BackendError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(format!("exec 2>&1\n{command}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| BackendError::Function(format!("failed to start {}: {e}", self.shell)))?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| BackendError::Timeout(timeout))??;

        tracing::debug!(status = %output.status, bytes = output.stdout.len(), "command finished");

        // Anything the shell wrote before redirecting stderr still belongs to the output.
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        Ok(String::from_utf8_lossy(&combined).into_owned())
    }
}

#[async_trait]
impl Deployer for LocalDeployer {
    async fn deploy(&self, name: &str, dir: &Path) -> Result<DeployedHandle, BackendError> {
        let text = tokio::fs::read_to_string(dir.join(CONFIG_FILE_NAME)).await?;
        let config = FunctionConfig::parse(&text)
            .map_err(|e| BackendError::Other(format!("invalid {CONFIG_FILE_NAME}: {e}")))?;

        let id = format!("local-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let function = LocalFunction {
            id: id.clone(),
            timeout: Duration::from_secs(config.timeout),
        };
        self.functions
            .lock()
            .await
            .insert(name.to_string(), function);

        tracing::debug!(function = name, %id, runtime = %config.runtime, "deployed locally");
        Ok(DeployedHandle::new(name, id))
    }

    async fn invoke(
        &self,
        handle: &DeployedHandle,
        payload: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        let function = self.lookup(handle).await?;
        let request = Request::decode(payload)
            .map_err(|e| BackendError::Function(format!("invalid request: {e}")))?;

        let output = self.run(&request.command, function.timeout).await?;
        Ok(encode_response(&output))
    }

    async fn delete(&self, handle: &DeployedHandle) -> Result<(), BackendError> {
        let mut functions = self.functions.lock().await;
        match functions.get(handle.name()) {
            Some(function) if function.id == handle.id() => {
                functions.remove(handle.name());
                Ok(())
            }
            _ => Err(BackendError::NotFound(handle.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::packager::{Packager, ScratchPackager};
    use crate::template::HandlerTemplate;
    use crate::wire::decode_response;

    async fn deploy(deployer: &LocalDeployer, timeout_secs: u64) -> DeployedHandle {
        let scratch = ScratchPackager::new()
            .package(&HandlerTemplate::shell(), timeout_secs)
            .await
            .expect("package");
        deployer.deploy("repl", scratch.path()).await.expect("deploy")
    }

    async fn invoke(deployer: &LocalDeployer, handle: &DeployedHandle, command: &str) -> String {
        let payload = Request::new(command).encode().expect("encode");
        let reply = deployer.invoke(handle, &payload).await.expect("invoke");
        decode_response(&reply).expect("decode")
    }

    #[tokio::test]
    async fn test_output_is_combined_and_untrimmed() {
        let deployer = LocalDeployer::new();
        let handle = deploy(&deployer, 10).await;

        assert_eq!(invoke(&deployer, &handle, "echo hi").await, "hi\n");
        assert_eq!(
            invoke(&deployer, &handle, "echo out; echo err >&2; echo again").await,
            "out\nerr\nagain\n"
        );
        assert_eq!(invoke(&deployer, &handle, "printf '  x  '").await, "  x  ");
    }

    #[tokio::test]
    async fn test_failing_command_still_returns_output() {
        let deployer = LocalDeployer::new();
        let handle = deploy(&deployer, 10).await;

        assert_eq!(invoke(&deployer, &handle, "echo nope; exit 3").await, "nope\n");
        assert_eq!(invoke(&deployer, &handle, "").await, "");
    }

    #[tokio::test]
    async fn test_workdir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let deployer = LocalDeployer::new().with_workdir(dir.path());
        let handle = deploy(&deployer, 10).await;

        let expected = std::fs::canonicalize(dir.path()).expect("canonicalize");
        let pwd = invoke(&deployer, &handle, "pwd -P").await;
        assert_eq!(pwd.trim_end(), expected.to_string_lossy());
    }

    #[tokio::test]
    async fn test_timeout() {
        let deployer = LocalDeployer::new();
        let handle = deploy(&deployer, 1).await;

        let payload = Request::new("sleep 5").encode().expect("encode");
        let err = deployer
            .invoke(&handle, &payload)
            .await
            .expect_err("should time out");
        assert!(matches!(err, BackendError::Timeout(t) if t == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_delete_forgets_function() {
        let deployer = LocalDeployer::new();
        let handle = deploy(&deployer, 10).await;
        assert_eq!(deployer.deployed_count().await, 1);

        deployer.delete(&handle).await.expect("delete");
        assert_eq!(deployer.deployed_count().await, 0);

        let err = deployer.delete(&handle).await.expect_err("already gone");
        assert!(matches!(err, BackendError::NotFound(_)));
        let payload = Request::new("true").encode().expect("encode");
        assert!(deployer.invoke(&handle, &payload).await.is_err());
    }

    #[tokio::test]
    async fn test_deploy_requires_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = LocalDeployer::new()
            .deploy("repl", dir.path())
            .await
            .expect_err("no function.json");
        assert!(matches!(err, BackendError::Io(_)));
    }
}
