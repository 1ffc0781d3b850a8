// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Slab-backed doubly linked list used for both recency lists.
//!
//! Nodes are addressed by [`Slot`] indices instead of pointers, so unlinking and
//! moving an entry to the front are O(1) without any `unsafe`. Vacated slots are
//! recycled through a free list.

/// Index of a node inside a [`List`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Slot(usize);

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<Slot>,
    next: Option<Slot>,
}

/// Ordered most-recently-used first: `front` is the newest node, `back` the oldest.
#[derive(Debug)]
pub(crate) struct List<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    front: Option<Slot>,
    back: Option<Slot>,
    len: usize,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            front: None,
            back: None,
            len: 0,
        }
    }
}

impl<T> List<T> {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn back(&self) -> Option<Slot> {
        self.back
    }

    pub(crate) fn get(&self, slot: Slot) -> Option<&T> {
        self.node(slot).map(|node| &node.value)
    }

    pub(crate) fn get_mut(&mut self, slot: Slot) -> Option<&mut T> {
        self.node_mut(slot).map(|node| &mut node.value)
    }

    /// Inserts `value` as the most recently used node.
    pub(crate) fn push_front(&mut self, value: T) -> Slot {
        let node = Node {
            value,
            prev: None,
            next: None,
        };
        let slot = if let Some(index) = self.free.pop() {
            self.nodes[index] = Some(node);
            Slot(index)
        } else {
            self.nodes.push(Some(node));
            Slot(self.nodes.len() - 1)
        };

        self.link_front(slot);
        self.len += 1;
        slot
    }

    /// Unlinks the node at `slot` and returns its value.
    pub(crate) fn remove(&mut self, slot: Slot) -> Option<T> {
        self.unlink(slot)?;
        let node = self.nodes.get_mut(slot.0)?.take()?;
        self.free.push(slot.0);
        self.len -= 1;
        Some(node.value)
    }

    /// Moves the node at `slot` to the front of the list.
    pub(crate) fn move_to_front(&mut self, slot: Slot) {
        if self.front == Some(slot) || self.unlink(slot).is_none() {
            return;
        }
        self.link_front(slot);
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.front = None;
        self.back = None;
        self.len = 0;
    }

    /// Iterates from the most recently used node to the oldest one.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        std::iter::successors(self.front, |slot| self.node(*slot).and_then(|node| node.next))
            .filter_map(|slot| self.get(slot))
    }

    fn node(&self, slot: Slot) -> Option<&Node<T>> {
        self.nodes.get(slot.0)?.as_ref()
    }

    fn node_mut(&mut self, slot: Slot) -> Option<&mut Node<T>> {
        self.nodes.get_mut(slot.0)?.as_mut()
    }

    fn link_front(&mut self, slot: Slot) {
        let old_front = self.front;
        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = old_front;
        }
        match old_front.and_then(|front| self.node_mut(front)) {
            Some(front) => front.prev = Some(slot),
            None => self.back = Some(slot),
        }
        self.front = Some(slot);
    }

    /// Detaches the node from its neighbours, leaving it vacant of links.
    fn unlink(&mut self, slot: Slot) -> Option<()> {
        let (prev, next) = {
            let node = self.node(slot)?;
            (node.prev, node.next)
        };

        match prev.and_then(|prev| self.node_mut(prev)) {
            Some(prev_node) => prev_node.next = next,
            None => self.front = next,
        }
        match next.and_then(|next| self.node_mut(next)) {
            Some(next_node) => next_node.prev = prev,
            None => self.back = prev,
        }

        let node = self.node_mut(slot)?;
        node.prev = None;
        node.next = None;
        Some(())
    }
}
