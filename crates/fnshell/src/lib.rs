//! fnshell: an interactive shell backed by a throwaway function.
//!
//! A session packages a tiny shell handler, deploys it under a fixed name,
//! ships every input line to it as `{"Command": ...}`, prints the output it
//! returns, and deletes the function when the input ends or anything fails.
//!
//! The backend is abstract ([`Deployer`]); [`LocalDeployer`] runs the same
//! handler contract with local subprocesses.

mod config;
mod deployer;
mod error;
mod function;
mod local;
mod packager;
mod repl;
mod session;
mod template;
pub mod wire;

pub use config::{DEFAULT_FUNCTION_NAME, DEFAULT_TIMEOUT, SessionConfig};
pub use deployer::{DeployedHandle, Deployer};
pub use error::{BackendError, Error, SessionError};
pub use function::{EphemeralFunction, FunctionState};
pub use local::LocalDeployer;
pub use packager::{Packager, ScratchDir, ScratchPackager};
pub use repl::{LineSource, Prompt, ReaderLines, Readline, ReplLoop, colored_prompt};
pub use session::Session;
pub use template::{CONFIG_FILE_NAME, FunctionConfig, HandlerTemplate};
