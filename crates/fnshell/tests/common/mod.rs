//! A recording deployer and helpers shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use fnshell::wire::{Request, encode_response};
use fnshell::{BackendError, CONFIG_FILE_NAME, DeployedHandle, Deployer, FunctionConfig};
use tokio::io::AsyncWrite;

/// A call made against the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Deploy(String),
    Invoke(String),
    Delete(String),
}

/// Answers like a remote shell with a fixed working directory.
pub fn fake_shell(command: &str) -> Vec<u8> {
    let output = if command == "pwd" {
        "/var/task\n".to_string()
    } else if let Some(rest) = command.strip_prefix("echo ") {
        format!("{rest}\n")
    } else {
        String::new()
    };
    encode_response(&output)
}

#[derive(Debug)]
pub struct MockDeployer {
    calls: Mutex<Vec<Call>>,
    deploy_error: Option<String>,
    delete_error: Option<String>,
    timeout_on_invoke: Option<usize>,
    responder: fn(&str) -> Vec<u8>,
    deployed_timeout: Mutex<Option<u64>>,
}

impl Default for MockDeployer {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            deploy_error: None,
            delete_error: None,
            timeout_on_invoke: None,
            responder: fake_shell,
            deployed_timeout: Mutex::new(None),
        }
    }
}

impl MockDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_deploy(mut self, message: &str) -> Self {
        self.deploy_error = Some(message.to_string());
        self
    }

    pub fn failing_delete(mut self, message: &str) -> Self {
        self.delete_error = Some(message.to_string());
        self
    }

    /// Time out on the `n`th invocation (1-based).
    pub fn timing_out_on(mut self, n: usize) -> Self {
        self.timeout_on_invoke = Some(n);
        self
    }

    pub fn responding_with(mut self, responder: fn(&str) -> Vec<u8>) -> Self {
        self.responder = responder;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| kind(c)).count()
    }

    pub fn deploys(&self) -> usize {
        self.count(|c| matches!(c, Call::Deploy(_)))
    }

    pub fn deletes(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete(_)))
    }

    /// Timeout read back from the deployed configuration.
    pub fn deployed_timeout(&self) -> Option<u64> {
        *self.deployed_timeout.lock().unwrap()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Deployer for MockDeployer {
    async fn deploy(&self, name: &str, dir: &Path) -> Result<DeployedHandle, BackendError> {
        self.record(Call::Deploy(name.to_string()));

        let config = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME))?;
        let config = FunctionConfig::parse(&config).expect("valid function config");
        assert!(dir.join("main.py").exists(), "handler source is packaged");
        *self.deployed_timeout.lock().unwrap() = Some(config.timeout);

        match &self.deploy_error {
            Some(message) => Err(BackendError::Other(message.clone())),
            None => Ok(DeployedHandle::new(name, "mock-1")),
        }
    }

    async fn invoke(
        &self,
        handle: &DeployedHandle,
        payload: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        self.record(Call::Invoke(String::from_utf8_lossy(payload).into_owned()));
        let invocations = self.count(|c| matches!(c, Call::Invoke(_)));
        assert_eq!(handle.id(), "mock-1");

        if self.timeout_on_invoke == Some(invocations) {
            return Err(BackendError::Timeout(Duration::from_secs(60)));
        }
        let request = Request::decode(payload).expect("valid request payload");
        Ok((self.responder)(&request.command))
    }

    async fn delete(&self, handle: &DeployedHandle) -> Result<(), BackendError> {
        self.record(Call::Delete(handle.name().to_string()));
        match &self.delete_error {
            Some(message) => Err(BackendError::Other(message.clone())),
            None => Ok(()),
        }
    }
}

/// A writer whose bytes stay readable after it has been handed off.
#[derive(Debug, Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl AsyncWrite for SharedBuf {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
