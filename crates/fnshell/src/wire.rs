//! Wire format between the shell and the remote handler.
//!
//! Requests are `{"Command": "<line>"}`; successful replies are a bare JSON
//! string holding the combined output.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One command to run remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Shell command, exactly as typed
    #[serde(rename = "Command")]
    pub command: String,
}

impl Request {
    /// Create a request for `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Serialize to the request payload.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(Error::Encode)
    }

    /// Parse a request payload.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// Decode a reply body into the captured output.
pub fn decode_response(body: &[u8]) -> Result<String, Error> {
    serde_json::from_slice(body).map_err(Error::Decode)
}

/// Encode captured output as a reply body.
pub fn encode_response(output: &str) -> Vec<u8> {
    // Serializing a str cannot fail.
    serde_json::to_vec(output).unwrap_or_default()
}
