// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wire messages exchanged between peers and the codecs that encode them.
//!
//! A peer asks for a value with a [`FetchRequest`] and receives a
//! [`FetchResponse`]. How the two are encoded is up to the [`WireCodec`];
//! both sides of a connection must use the same one. [`BincodeCodec`] is
//! compact and the default, [`JsonCodec`] is human readable.

use std::fmt::Debug;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Asks a peer for the value of `key` in group `group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Namespace of the group.
    pub group: String,
    /// Key to load.
    pub key: String,
}

/// A peer's answer to a [`FetchRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// The value bytes.
    pub value: Vec<u8>,
}

/// A wire message could not be encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{codec} codec failed to {action}: {reason}")]
pub struct CodecError {
    codec: &'static str,
    action: &'static str,
    reason: String,
}

impl CodecError {
    fn new(codec: &'static str, action: &'static str, reason: &impl std::fmt::Display) -> Self {
        Self {
            codec,
            action,
            reason: reason.to_string(),
        }
    }
}

/// Encodes and decodes the messages peers exchange.
pub trait WireCodec: Debug + Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Encodes a request.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the message cannot be encoded.
    fn encode_request(&self, request: &FetchRequest) -> Result<Vec<u8>, CodecError>;

    /// Decodes a request.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if `data` is not a valid request.
    fn decode_request(&self, data: &[u8]) -> Result<FetchRequest, CodecError>;

    /// Encodes a response.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the message cannot be encoded.
    fn encode_response(&self, response: &FetchResponse) -> Result<Vec<u8>, CodecError>;

    /// Decodes a response.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if `data` is not a valid response.
    fn decode_response(&self, data: &[u8]) -> Result<FetchResponse, CodecError>;
}

/// Compact binary encoding with `bincode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    const NAME: &'static str = "bincode";

    fn encode<T: Serialize>(action: &'static str, message: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(message).map_err(|error| CodecError::new(Self::NAME, action, &error))
    }

    fn decode<T: DeserializeOwned>(action: &'static str, data: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(data).map_err(|error| CodecError::new(Self::NAME, action, &error))
    }
}

impl WireCodec for BincodeCodec {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn encode_request(&self, request: &FetchRequest) -> Result<Vec<u8>, CodecError> {
        Self::encode("encode request", request)
    }

    fn decode_request(&self, data: &[u8]) -> Result<FetchRequest, CodecError> {
        Self::decode("decode request", data)
    }

    fn encode_response(&self, response: &FetchResponse) -> Result<Vec<u8>, CodecError> {
        Self::encode("encode response", response)
    }

    fn decode_response(&self, data: &[u8]) -> Result<FetchResponse, CodecError> {
        Self::decode("decode response", data)
    }
}

/// Text encoding with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    const NAME: &'static str = "json";

    fn encode<T: Serialize>(action: &'static str, message: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(message).map_err(|error| CodecError::new(Self::NAME, action, &error))
    }

    fn decode<T: DeserializeOwned>(action: &'static str, data: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(data).map_err(|error| CodecError::new(Self::NAME, action, &error))
    }
}

impl WireCodec for JsonCodec {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn encode_request(&self, request: &FetchRequest) -> Result<Vec<u8>, CodecError> {
        Self::encode("encode request", request)
    }

    fn decode_request(&self, data: &[u8]) -> Result<FetchRequest, CodecError> {
        Self::decode("decode request", data)
    }

    fn encode_response(&self, response: &FetchResponse) -> Result<Vec<u8>, CodecError> {
        Self::encode("encode response", response)
    }

    fn decode_response(&self, data: &[u8]) -> Result<FetchResponse, CodecError> {
        Self::decode("decode response", data)
    }
}
