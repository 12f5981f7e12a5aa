//! Versioned envelope for persisted data.
//!
//! Everything written to an external store is wrapped in an [`Envelope`] so a
//! newer build can detect, and refuse, payloads it does not understand.

use crate::error::CheckpointError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The current envelope version.
pub const CURRENT_VERSION: u32 = 1;

/// A versioned envelope that wraps serialized data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The version of the envelope format.
    pub version: u32,
    /// The wrapped payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current version.
    #[must_use]
    pub fn new(payload: T) -> Self {
        Self {
            version: CURRENT_VERSION,
            payload,
        }
    }

    /// Unwraps the envelope, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> T {
        self.payload
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serializes the envelope to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the payload cannot be encoded.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CheckpointError> {
        serde_json::to_vec(self).map_err(|e| CheckpointError::Serialization {
            message: e.to_string(),
        })
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decodes an envelope, checking its version before the payload.
    ///
    /// # Errors
    ///
    /// - `UnsupportedVersion` if the envelope is newer than this build
    /// - `Serialization` if the bytes are not a valid envelope of `T`
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let raw: RawEnvelope =
            serde_json::from_slice(bytes).map_err(|e| CheckpointError::Serialization {
                message: e.to_string(),
            })?;
        raw.into_typed()
    }
}

/// An envelope whose payload has not been decoded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RawEnvelope {
    version: u32,
    payload: serde_json::Value,
}

impl RawEnvelope {
    fn into_typed<T: DeserializeOwned>(self) -> Result<Envelope<T>, CheckpointError> {
        if self.version > CURRENT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_VERSION,
            });
        }
        let payload = serde_json::from_value(self.payload).map_err(|e| {
            CheckpointError::Serialization {
                message: e.to_string(),
            }
        })?;
        Ok(Envelope {
            version: self.version,
            payload,
        })
    }
}
