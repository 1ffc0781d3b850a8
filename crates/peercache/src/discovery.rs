// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use futures::{future::BoxFuture, stream::BoxStream};
use serde::{Deserialize, Serialize};

use crate::BoxError;

/// What happened to a peer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The peer joined or renewed its registration.
    Added,
    /// The peer left or its registration expired.
    Removed,
}

/// A membership change reported by a [`Discovery`] source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    /// Address of the peer, as used by the transport.
    pub address: String,
    /// Whether the peer was added or removed.
    pub kind: EventKind,
}

impl DiscoveryEvent {
    /// An [`EventKind::Added`] event for `address`.
    pub fn added(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            kind: EventKind::Added,
        }
    }

    /// An [`EventKind::Removed`] event for `address`.
    pub fn removed(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            kind: EventKind::Removed,
        }
    }
}

/// A source of peer membership, such as a service registry with leases.
///
/// Registering this process and renewing its lease is the source's own
/// business; the pool only consumes what it reports.
pub trait Discovery: Send + Sync {
    /// Returns the addresses of all currently known peers.
    fn peers(&self) -> BoxFuture<'_, Result<Vec<String>, BoxError>>;

    /// Streams membership changes from now on. The stream ends when the source
    /// stops watching.
    fn watch(&self) -> BoxStream<'static, DiscoveryEvent>;
}
