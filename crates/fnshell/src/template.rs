//! Handler templates for the remote shell function.
//!
//! A [`HandlerTemplate`] is the handler source plus the static parts of its
//! configuration. The timeout is the only parameter and is filled in when the
//! [`FunctionConfig`] is built, so nothing is spliced into text by hand.

use serde::{Deserialize, Serialize};

/// File name the rendered configuration is written under.
pub const CONFIG_FILE_NAME: &str = "function.json";

const SHELL_HANDLER_SOURCE: &str = r#"import json
import logging
import subprocess

logger = logging.getLogger()
logger.setLevel(logging.INFO)


def handle(event, context):
    command = event["Command"]
    logger.info(json.dumps({"msg": "exec", "command": command}))
    proc = subprocess.run(
        command,
        shell=True,
        stdin=subprocess.DEVNULL,
        stdout=subprocess.PIPE,
        stderr=subprocess.STDOUT,
    )
    return proc.stdout.decode("utf-8", errors="replace")
"#;

/// Configuration record written next to the handler source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Human-readable description shown by the cloud console
    pub description: String,
    /// Runtime identifier understood by the backend
    pub runtime: String,
    /// Handler entry point
    pub handler: String,
    /// Execution timeout in seconds
    pub timeout: u64,
}

impl FunctionConfig {
    /// Serialize to the on-disk format.
    pub fn render(&self) -> String {
        // A struct of strings and integers always serializes.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Parse a rendered configuration.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Source and static configuration of a remote handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerTemplate {
    /// File name the source is written under
    pub file_name: String,
    /// Handler source text
    pub source: String,
    /// Description written into the configuration
    pub description: String,
    /// Runtime identifier
    pub runtime: String,
    /// Handler entry point
    pub handler: String,
}

impl HandlerTemplate {
    /// The built-in shell handler.
    ///
    /// Decodes `{"Command": ...}`, runs the command through `sh` with stderr
    /// merged into stdout and returns the captured output as a JSON string.
    /// A command that cannot be started raises, which the platform reports as
    /// an invocation error. Non-zero exit statuses are returned as output.
    pub fn shell() -> Self {
        Self {
            file_name: "main.py".to_string(),
            source: SHELL_HANDLER_SOURCE.to_string(),
            description: "fnshell generated REPL function".to_string(),
            runtime: "python3.12".to_string(),
            handler: "main.handle".to_string(),
        }
    }

    /// Build the configuration record for the given timeout.
    pub fn config(&self, timeout_secs: u64) -> FunctionConfig {
        FunctionConfig {
            description: self.description.clone(),
            runtime: self.runtime.clone(),
            handler: self.handler.clone(),
            timeout: timeout_secs,
        }
    }

    /// Render the configuration text for the given timeout.
    pub fn render_config(&self, timeout_secs: u64) -> String {
        self.config(timeout_secs).render()
    }
}

impl Default for HandlerTemplate {
    fn default() -> Self {
        Self::shell()
    }
}
