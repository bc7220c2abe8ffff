//! One interactive session: deploy, loop, always delete.

use std::fmt;
use std::future::Future;

use tokio::io::AsyncWrite;

use crate::config::SessionConfig;
use crate::deployer::Deployer;
use crate::error::SessionError;
use crate::function::EphemeralFunction;
use crate::packager::{Packager, ScratchPackager};
use crate::repl::{LineSource, ReplLoop};
use crate::template::HandlerTemplate;

/// Owns the backend, the template and the configuration for one session.
pub struct Session<D, P> {
    deployer: D,
    packager: P,
    template: HandlerTemplate,
    config: SessionConfig,
}

impl<D, P> fmt::Debug for Session<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("template", &self.template.file_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<D: Deployer> Session<D, ScratchPackager> {
    /// A session running the built-in shell handler, packaged under the
    /// configured scratch root.
    pub fn with_defaults(deployer: D, config: SessionConfig) -> Self {
        let packager = match &config.scratch_root {
            Some(root) => ScratchPackager::in_dir(root),
            None => ScratchPackager::new(),
        };
        Self::new(deployer, packager, HandlerTemplate::shell(), config)
    }
}

impl<D: Deployer, P: Packager> Session<D, P> {
    /// Create a session.
    pub fn new(deployer: D, packager: P, template: HandlerTemplate, config: SessionConfig) -> Self {
        Self {
            deployer,
            packager,
            template,
            config,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Deploy the function, drive `repl` against it, then delete it.
    ///
    /// Once the deploy succeeded, deletion is attempted exactly once no matter
    /// how the loop ended. A loop error and a delete error are both reported.
    pub async fn run<L, W>(self, repl: &mut ReplLoop<L, W>) -> Result<(), SessionError>
    where
        L: LineSource,
        W: AsyncWrite + Unpin,
    {
        self.run_until(repl, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but `shutdown` completing ends the loop the
    /// same way end of input does, including while a command is in flight.
    /// The function is still deleted afterwards.
    pub async fn run_until<L, W, F>(
        self,
        repl: &mut ReplLoop<L, W>,
        shutdown: F,
    ) -> Result<(), SessionError>
    where
        L: LineSource,
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let mut function = EphemeralFunction::create(
            self.deployer,
            &self.packager,
            self.config.function_name.as_str(),
            &self.template,
            self.config.timeout_secs(),
        )
        .await
        .map_err(SessionError::Setup)?;

        let loop_result = tokio::select! {
            result = repl.run(&function) => result,
            () = shutdown => {
                tracing::info!(function = function.name(), "interrupted, ending session");
                Ok(())
            }
        };
        if let Err(e) = &loop_result {
            tracing::error!(function = function.name(), error = %e, "session aborted");
        }

        let teardown = function.destroy().await;
        if let Err(e) = &teardown {
            tracing::error!(function = function.name(), error = %e, "teardown failed");
        }

        match SessionError::combine(loop_result, teardown) {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}
