//! Error types for the function lifecycle and the interactive session.

use std::time::Duration;

use thiserror::Error;

/// Errors reported by a [`Deployer`](crate::Deployer) backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The remote handler did not answer within the function timeout.
    #[error("function timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// The remote handler signalled an error for this invocation.
    #[error("function error: {0}")]
    Function(String),
    /// No deployed function matches the handle or name.
    #[error("function not found: {0}")]
    NotFound(String),
    /// IO error talking to the backend
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Any other backend failure.
    #[error("{0}")]
    Other(String),
}

/// Errors produced while deploying, driving and deleting an ephemeral function.
#[derive(Debug, Error)]
pub enum Error {
    /// The scratch directory or one of its files could not be written.
    #[error("failed to prepare scratch directory: {0}")]
    ScratchDir(#[source] std::io::Error),
    /// The backend refused to deploy the function.
    #[error("failed to deploy function `{name}`: {source}")]
    Deploy {
        /// Function name.
        name: String,
        /// Backend failure.
        #[source]
        source: BackendError,
    },
    /// The terminal line editor could not be started.
    #[error("failed to start line editor: {0}")]
    Input(#[source] std::io::Error),
    /// The request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    /// The invocation failed or the function signalled an error.
    #[error("failed to invoke function `{name}`: {source}")]
    Invoke {
        /// Function name.
        name: String,
        /// Backend failure.
        #[source]
        source: BackendError,
    },
    /// The reply was not a JSON string.
    #[error("failed to decode function reply: {0}")]
    Decode(#[source] serde_json::Error),
    /// Writing command output locally failed.
    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),
    /// The backend failed to delete the function.
    #[error("failed to delete function `{name}`: {source}")]
    Delete {
        /// Function name.
        name: String,
        /// Backend failure.
        #[source]
        source: BackendError,
    },
    /// The function was used in a state that does not allow the operation.
    #[error("function `{name}` is {state}")]
    InvalidState {
        /// Function name.
        name: String,
        /// State the function was in.
        state: crate::FunctionState,
    },
}

impl Error {
    /// Returns true if this error comes from an invocation that ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Invoke {
                source: BackendError::Timeout(_),
                ..
            }
        )
    }
}

/// Outcome of a failed session.
///
/// A session that deployed its function always attempts teardown, so a loop
/// failure may come paired with a teardown failure. Both stay visible.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The function was never deployed; nothing was left behind.
    #[error("{0}")]
    Setup(#[source] Error),
    /// The loop failed; the function was deleted afterwards.
    #[error("{0}")]
    Loop(#[source] Error),
    /// The loop ended normally but the function could not be deleted.
    #[error("{0}")]
    Teardown(#[source] Error),
    /// The loop failed and the function could not be deleted either.
    #[error("{loop_error} (and then {teardown_error})")]
    LoopAndTeardown {
        /// Error that stopped the loop.
        #[source]
        loop_error: Error,
        /// Error from the delete attempt.
        teardown_error: Error,
    },
}

impl SessionError {
    /// Combine the loop outcome with the teardown outcome.
    ///
    /// Returns `None` when both succeeded.
    pub fn combine(loop_result: Result<(), Error>, teardown: Result<(), Error>) -> Option<Self> {
        match (loop_result, teardown) {
            (Ok(()), Ok(())) => None,
            (Err(e), Ok(())) => Some(SessionError::Loop(e)),
            (Ok(()), Err(e)) => Some(SessionError::Teardown(e)),
            (Err(loop_error), Err(teardown_error)) => Some(SessionError::LoopAndTeardown {
                loop_error,
                teardown_error,
            }),
        }
    }

    /// The error that stopped the session, before any teardown problem.
    pub fn primary(&self) -> &Error {
        match self {
            SessionError::Setup(e) | SessionError::Loop(e) | SessionError::Teardown(e) => e,
            SessionError::LoopAndTeardown { loop_error, .. } => loop_error,
        }
    }

    /// The teardown error, if deleting the function failed.
    pub fn teardown_error(&self) -> Option<&Error> {
        match self {
            SessionError::Teardown(e) => Some(e),
            SessionError::LoopAndTeardown { teardown_error, .. } => Some(teardown_error),
            SessionError::Setup(_) | SessionError::Loop(_) => None,
        }
    }
}
