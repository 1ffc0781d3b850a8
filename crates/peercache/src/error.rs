// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use crate::codec::CodecError;

/// Boxed error returned by getters, peers, transports and discovery sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by cache groups and the peer server.
///
/// The type is `Clone` because one failed fill is reported to every caller
/// that was waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The key was empty. Rejected before any lookup.
    #[error("key is required")]
    EmptyKey,

    /// Too many callers were already waiting on a fill of the same key.
    #[error("server is busy, too many callers are waiting on the same key")]
    Busy,

    /// The group's getter failed to produce the value.
    #[error("getter failed to load key {key:?}")]
    Getter {
        /// The key being loaded.
        key: String,
        /// The error reported by the getter.
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A group with the same namespace is already registered.
    #[error("group {0:?} is already registered")]
    DuplicateGroup(String),

    /// A peer picker was already installed on the group.
    #[error("peers were already set for group {0:?}")]
    PeersAlreadySet(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A peer asked for a group this process does not serve.
    #[error("no such group: {0:?}")]
    GroupNotFound(String),

    /// A wire message could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl Error {
    pub(crate) fn getter(key: &str, source: BoxError) -> Self {
        Self::Getter {
            key: key.to_owned(),
            source: Arc::from(source),
        }
    }

    /// Returns `true` if retrying the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy | Self::Getter { .. })
    }
}

impl From<flight::Busy> for Error {
    fn from(_: flight::Busy) -> Self {
        Self::Busy
    }
}

impl From<lruk::ConfigError> for Error {
    fn from(error: lruk::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}
