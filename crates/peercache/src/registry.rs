// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use parking_lot::RwLock;
use tracing::info;

use crate::{Error, Group};

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Groups by namespace.
///
/// Most processes use the [`global`](Self::global) registry, which is what
/// [`GroupBuilder::register`](crate::GroupBuilder::register) fills and what a
/// [`PeerServer`](crate::PeerServer) usually serves. Clones share the same
/// groups. Groups are never unregistered.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    groups: Arc<RwLock<HashMap<String, Arc<Group>>>>,
}

impl Registry {
    /// Creates an empty registry, independent of the global one.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Adds `group` under its name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateGroup`] if the name is already registered. The
    /// existing group is kept.
    pub fn register(&self, group: Group) -> Result<Arc<Group>, Error> {
        let mut groups = self.groups.write();
        if groups.contains_key(group.name()) {
            return Err(Error::DuplicateGroup(group.name().to_owned()));
        }

        let group = Arc::new(group);
        groups.insert(group.name().to_owned(), Arc::clone(&group));
        info!(group = group.name(), byte_budget = group.byte_budget(), "group registered");
        Ok(group)
    }

    /// Returns the group registered under `namespace`.
    #[must_use]
    pub fn get(&self, namespace: &str) -> Option<Arc<Group>> {
        self.groups.read().get(namespace).map(Arc::clone)
    }

    /// Returns the registered namespaces in sorted order.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<_> = self.groups.read().keys().cloned().collect();
        namespaces.sort_unstable();
        namespaces
    }
}
