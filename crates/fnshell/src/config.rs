//! Session configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name used for the session's function when none is configured.
pub const DEFAULT_FUNCTION_NAME: &str = "repl";

/// Remote execution timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for one interactive session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name the function is deployed under
    pub function_name: String,
    /// Remote execution timeout, rounded down to whole seconds when deployed
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Directory the scratch directory is created in (system temp dir if unset)
    pub scratch_root: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            function_name: DEFAULT_FUNCTION_NAME.to_string(),
            timeout: DEFAULT_TIMEOUT,
            scratch_root: None,
        }
    }
}

impl SessionConfig {
    /// Timeout in whole seconds, as written into the function configuration.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}

/// Helper for serializing Duration as whole seconds
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
