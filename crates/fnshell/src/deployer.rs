//! The deployer capability: the only boundary to the function backend.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BackendError;

/// Identifies a deployed function on its backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeployedHandle {
    name: String,
    id: String,
}

impl DeployedHandle {
    /// Create a handle for `name`, with a backend specific identifier
    /// (an ARN, a version, a process-local key).
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend specific identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DeployedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Deploys, invokes and deletes functions by name.
///
/// Any implementation is interchangeable: a cloud API client, a local
/// simulator, a mock. Invocations are synchronous from the caller's point of
/// view: `invoke` resolves once the function replied, failed, or timed out.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Deploy the handler packaged in `dir` under `name`.
    ///
    /// The directory may be removed once this returns.
    async fn deploy(&self, name: &str, dir: &Path) -> Result<DeployedHandle, BackendError>;

    /// Invoke a deployed function with a raw payload and return the raw reply.
    ///
    /// Errors signalled by the function itself come back as
    /// [`BackendError::Function`], never inside the reply body.
    async fn invoke(
        &self,
        handle: &DeployedHandle,
        payload: &[u8],
    ) -> Result<Vec<u8>, BackendError>;

    /// Delete a deployed function.
    async fn delete(&self, handle: &DeployedHandle) -> Result<(), BackendError>;
}

// Lets callers keep a shared reference to the backend, e.g. to inspect it after a session.
#[async_trait]
impl<D> Deployer for Arc<D>
where
    D: Deployer + ?Sized,
{
    async fn deploy(&self, name: &str, dir: &Path) -> Result<DeployedHandle, BackendError> {
        (**self).deploy(name, dir).await
    }

    async fn invoke(
        &self,
        handle: &DeployedHandle,
        payload: &[u8],
    ) -> Result<Vec<u8>, BackendError> {
        (**self).invoke(handle, payload).await
    }

    async fn delete(&self, handle: &DeployedHandle) -> Result<(), BackendError> {
        (**self).delete(handle).await
    }
}
