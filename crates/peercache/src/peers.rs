// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt::Debug, sync::Arc};

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::{
    BoxError,
    codec::{FetchRequest, WireCodec},
};

/// Chooses the peer that owns a key.
pub trait PeerPicker: Send + Sync {
    /// Returns the remote owner of `key`, or `None` when this process owns it
    /// or no peers are known.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}

/// Fetches values from one remote peer.
pub trait PeerFetcher: Send + Sync {
    /// Loads `key` of the group `namespace` from the peer.
    fn fetch<'a>(&'a self, namespace: &'a str, key: &'a str) -> BoxFuture<'a, Result<Bytes, BoxError>>;
}

/// Sends one encoded request to a peer address and returns the encoded answer.
///
/// This is where a network client plugs in. Timeouts and retries belong to
/// the implementation.
pub trait Transport: Send + Sync {
    /// Delivers `body` to `address` and returns the response body.
    fn round_trip<'a>(&'a self, address: &'a str, body: Vec<u8>) -> BoxFuture<'a, Result<Vec<u8>, BoxError>>;
}

/// A [`PeerFetcher`] that talks to one address through a [`Transport`].
#[derive(Clone)]
pub struct RemotePeer {
    address: String,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn WireCodec>,
}

impl Debug for RemotePeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotePeer")
            .field("address", &self.address)
            .field("codec", &self.codec.name())
            .finish_non_exhaustive()
    }
}

impl RemotePeer {
    /// Creates a peer for `address`.
    pub fn new(address: impl Into<String>, transport: Arc<dyn Transport>, codec: Arc<dyn WireCodec>) -> Self {
        Self {
            address: address.into(),
            transport,
            codec,
        }
    }

    /// Returns the peer's address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl PeerFetcher for RemotePeer {
    fn fetch<'a>(&'a self, namespace: &'a str, key: &'a str) -> BoxFuture<'a, Result<Bytes, BoxError>> {
        Box::pin(async move {
            let request = FetchRequest {
                group: namespace.to_owned(),
                key: key.to_owned(),
            };
            let body = self.codec.encode_request(&request)?;
            let answer = self.transport.round_trip(&self.address, body).await?;
            let response = self.codec.decode_response(&answer)?;
            Ok::<_, BoxError>(Bytes::from(response.value))
        })
    }
}
