//! Lifecycle of the session's throwaway function.
//!
//! ```text
//! Undeployed --deploy--> Deployed --destroy--> Deleted
//! ```
//!
//! A failed deploy yields no [`EphemeralFunction`] at all, so there is nothing
//! to clean up. Invocations never change state. Deleted is final.

use std::fmt;

use crate::deployer::{DeployedHandle, Deployer};
use crate::error::Error;
use crate::packager::Packager;
use crate::template::HandlerTemplate;
use crate::wire::Request;

/// Lifecycle state of an ephemeral function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionState {
    /// Not deployed yet
    Undeployed,
    /// Live on the backend
    Deployed,
    /// Deleted from the backend
    Deleted,
}

impl fmt::Display for FunctionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FunctionState::Undeployed => "undeployed",
            FunctionState::Deployed => "deployed",
            FunctionState::Deleted => "deleted",
        })
    }
}

/// A handler deployed under a fixed name for the duration of one session.
pub struct EphemeralFunction<D: Deployer> {
    deployer: D,
    handle: DeployedHandle,
    state: FunctionState,
}

impl<D: Deployer> fmt::Debug for EphemeralFunction<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralFunction")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<D: Deployer> EphemeralFunction<D> {
    /// Package `template` and deploy it under `name`.
    ///
    /// The scratch directory only lives until the deploy call returns.
    pub async fn create<P>(
        deployer: D,
        packager: &P,
        name: impl Into<String>,
        template: &HandlerTemplate,
        timeout_secs: u64,
    ) -> Result<Self, Error>
    where
        P: Packager + ?Sized,
    {
        let name = name.into();
        let scratch = packager.package(template, timeout_secs).await?;

        tracing::info!(function = %name, timeout_secs, "deploying function");
        let deployed = deployer.deploy(&name, scratch.path()).await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(path = %scratch_path.display(), error = %e, "failed to remove scratch directory");
        }

        let handle = deployed.map_err(|source| Error::Deploy {
            name: name.clone(),
            source,
        })?;
        tracing::info!(function = %name, id = handle.id(), "function deployed");

        Ok(Self {
            deployer,
            handle,
            state: FunctionState::Deployed,
        })
    }

    /// Function name.
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Backend handle of the deployed function.
    pub fn handle(&self) -> &DeployedHandle {
        &self.handle
    }

    /// Current lifecycle state.
    pub fn state(&self) -> FunctionState {
        self.state
    }

    /// Invoke the function and return the raw reply.
    ///
    /// A failed invocation leaves the function deployed; tearing it down is
    /// the caller's job.
    pub async fn invoke(&self, request: &Request) -> Result<Vec<u8>, Error> {
        if self.state != FunctionState::Deployed {
            return Err(self.invalid_state());
        }

        let payload = request.encode()?;
        tracing::debug!(function = self.name(), bytes = payload.len(), "invoking");

        let reply = self
            .deployer
            .invoke(&self.handle, &payload)
            .await
            .map_err(|source| Error::Invoke {
                name: self.name().to_string(),
                source,
            })?;
        tracing::debug!(function = self.name(), bytes = reply.len(), "reply received");
        Ok(reply)
    }

    /// Delete the function. Does nothing if it is already deleted.
    ///
    /// On failure the function stays deployed and the error must be surfaced:
    /// the remote function is still running up a bill.
    pub async fn destroy(&mut self) -> Result<(), Error> {
        if self.state == FunctionState::Deleted {
            return Ok(());
        }

        tracing::info!(function = self.name(), "deleting function");
        self.deployer
            .delete(&self.handle)
            .await
            .map_err(|source| Error::Delete {
                name: self.name().to_string(),
                source,
            })?;

        self.state = FunctionState::Deleted;
        tracing::info!(function = self.name(), "function deleted");
        Ok(())
    }

    fn invalid_state(&self) -> Error {
        Error::InvalidState {
            name: self.name().to_string(),
            state: self.state,
        }
    }
}

impl<D: Deployer> Drop for EphemeralFunction<D> {
    fn drop(&mut self) {
        if self.state == FunctionState::Deployed {
            tracing::warn!(
                function = self.name(),
                id = self.handle.id(),
                "function dropped while still deployed; it must be deleted manually"
            );
        }
    }
}
