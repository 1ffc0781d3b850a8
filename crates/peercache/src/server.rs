// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt::Debug, sync::Arc};

use tracing::debug;

use crate::{
    Error, Registry,
    codec::{BincodeCodec, FetchResponse, WireCodec},
};

/// Answers fetch requests from other peers.
///
/// A transport adapter feeds each request body it receives into
/// [`handle`](Self::handle) and sends back the bytes it returns. The codec must
/// match the one the requesting peers use.
#[derive(Clone)]
pub struct PeerServer {
    registry: Registry,
    codec: Arc<dyn WireCodec>,
}

impl Debug for PeerServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerServer")
            .field("groups", &self.registry.namespaces())
            .field("codec", &self.codec.name())
            .finish()
    }
}

impl PeerServer {
    /// Serves the groups of `registry` with `codec`.
    pub fn new(registry: Registry, codec: impl WireCodec + 'static) -> Self {
        Self {
            registry,
            codec: Arc::new(codec),
        }
    }

    /// Serves the global registry with [`BincodeCodec`].
    #[must_use]
    pub fn global() -> Self {
        Self::new(Registry::global().clone(), BincodeCodec)
    }

    /// Decodes `request`, loads the value from the named group and returns the
    /// encoded response.
    ///
    /// # Errors
    ///
    /// - [`Error::Codec`] if the request cannot be decoded.
    /// - [`Error::GroupNotFound`] if the group is not registered here.
    /// - Whatever [`Group::get`](crate::Group::get) returns.
    pub async fn handle(&self, request: &[u8]) -> Result<Vec<u8>, Error> {
        let request = self.codec.decode_request(request)?;
        let group = self
            .registry
            .get(&request.group)
            .ok_or_else(|| Error::GroupNotFound(request.group.clone()))?;

        group.record_server_request();
        debug!(group = group.name(), key = %request.key, "serving peer request");

        let value = group.get(&request.key).await?;
        let response = FetchResponse { value: value.to_vec() };
        Ok(self.codec.encode_response(&response)?)
    }
}
