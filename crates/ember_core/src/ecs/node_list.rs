//! # Node List
//!
//! Ordered, doubly-linked collection of live node handles for one family.
//!
//! ## Locking
//!
//! ```text
//! Unlocked:  add/remove mutate the visible sequence immediately
//! Locked:    add/remove are queued; the visible sequence is frozen
//! Unlock:    the queue is replayed in request order
//! ```
//!
//! Consumers iterate a locked list and may trigger removals (e.g. by
//! destroying entities) without skipping or revisiting nodes.

use std::collections::{HashMap, VecDeque};

use super::node::NodeHandle;

/// A change applied to the visible sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeChange {
    /// The node was appended.
    Added(NodeHandle),
    /// The node was excised.
    Removed(NodeHandle),
}

/// A structural mutation requested while locked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingOp {
    Add(NodeHandle),
    Remove(NodeHandle),
}

/// Neighbours of one linked node.
#[derive(Clone, Copy, Debug, Default)]
struct Link {
    prev: Option<NodeHandle>,
    next: Option<NodeHandle>,
}

/// Ordered list of nodes with a lock / deferred-mutation protocol.
///
/// Links are keyed by the full handle, so add and remove are O(1) whatever
/// indices the pool hands out.
#[derive(Debug, Default)]
pub struct NodeList {
    links: HashMap<NodeHandle, Link>,
    head: Option<NodeHandle>,
    tail: Option<NodeHandle>,
    len: usize,
    locked: bool,
    pending: VecDeque<PendingOp>,
    /// Change log, present only when tracking is enabled.
    changes: Option<Vec<NodeChange>>,
}

impl NodeList {
    /// Creates an empty, unlocked list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty list with link storage reserved for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            links: HashMap::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Enables or disables the change log. Disabling discards pending entries.
    pub fn track_changes(&mut self, enabled: bool) {
        match (enabled, self.changes.is_some()) {
            (true, false) => self.changes = Some(Vec::new()),
            (false, true) => self.changes = None,
            _ => {}
        }
    }

    /// Takes every change recorded since the last drain.
    ///
    /// Always empty when tracking is disabled.
    pub fn drain_changes(&mut self) -> Vec<NodeChange> {
        self.changes.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Number of nodes in the visible sequence.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the visible sequence is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the list is locked.
    #[inline]
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Number of mutations queued while locked.
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// First node of the visible sequence.
    #[inline]
    #[must_use]
    pub const fn head(&self) -> Option<NodeHandle> {
        self.head
    }

    /// Last node of the visible sequence.
    #[inline]
    #[must_use]
    pub const fn tail(&self) -> Option<NodeHandle> {
        self.tail
    }

    /// The node after `handle` in the visible sequence.
    #[must_use]
    pub fn next_of(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.link(handle).and_then(|link| link.next)
    }

    /// The node before `handle` in the visible sequence.
    #[must_use]
    pub fn prev_of(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.link(handle).and_then(|link| link.prev)
    }

    /// Whether `handle` is in the visible sequence.
    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.link(handle).is_some()
    }

    /// Iterates the visible sequence in order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    /// Appends a node, or queues the append while locked.
    pub fn add(&mut self, handle: NodeHandle) {
        if self.locked {
            self.pending.push_back(PendingOp::Add(handle));
        } else {
            self.link_back(handle);
        }
    }

    /// Removes a node, or queues the removal while locked.
    pub fn remove(&mut self, handle: NodeHandle) {
        if self.locked {
            self.pending.push_back(PendingOp::Remove(handle));
        } else {
            self.unlink(handle);
        }
    }

    /// Freezes the visible sequence. A second lock is a no-op.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Unfreezes the list and replays queued mutations in request order.
    pub fn unlock(&mut self) {
        if !self.locked {
            return;
        }
        self.locked = false;

        if !self.pending.is_empty() {
            tracing::debug!(
                "Flushing {} deferred node list mutations",
                self.pending.len()
            );
        }
        while let Some(op) = self.pending.pop_front() {
            match op {
                PendingOp::Add(handle) => self.link_back(handle),
                PendingOp::Remove(handle) => self.unlink(handle),
            }
        }
    }

    /// Empties the visible sequence and the pending queue.
    ///
    /// Returns every handle that was linked or queued for adding, in order.
    pub fn clear(&mut self) -> Vec<NodeHandle> {
        let mut released: Vec<NodeHandle> = self.iter().collect();
        if let Some(changes) = self.changes.as_mut() {
            changes.extend(released.iter().map(|h| NodeChange::Removed(*h)));
        }
        for op in self.pending.drain(..) {
            match op {
                PendingOp::Add(handle) => released.push(handle),
                PendingOp::Remove(handle) => released.retain(|h| *h != handle),
            }
        }

        self.links.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
        released
    }

    fn link(&self, handle: NodeHandle) -> Option<&Link> {
        self.links.get(&handle)
    }

    fn link_mut(&mut self, handle: NodeHandle) -> Option<&mut Link> {
        self.links.get_mut(&handle)
    }

    fn link_back(&mut self, handle: NodeHandle) {
        if self.links.contains_key(&handle) {
            tracing::warn!("Node {} is already linked; ignoring add", handle);
            return;
        }

        self.links.insert(
            handle,
            Link {
                prev: self.tail,
                next: None,
            },
        );
        match self.tail.and_then(|tail| self.link_mut(tail)) {
            Some(tail) => tail.next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.len += 1;

        if let Some(changes) = self.changes.as_mut() {
            changes.push(NodeChange::Added(handle));
        }
    }

    fn unlink(&mut self, handle: NodeHandle) {
        let Some(link) = self.links.remove(&handle) else {
            return;
        };

        match link.prev.and_then(|prev| self.link_mut(prev)) {
            Some(prev) => prev.next = link.next,
            None => self.head = link.next,
        }
        match link.next.and_then(|next| self.link_mut(next)) {
            Some(next) => next.prev = link.prev,
            None => self.tail = link.prev,
        }
        self.len -= 1;

        if let Some(changes) = self.changes.as_mut() {
            changes.push(NodeChange::Removed(handle));
        }
    }
}

/// Iterator over the visible sequence of a [`NodeList`].
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    list: &'a NodeList,
    cursor: Option<NodeHandle>,
    remaining: usize,
}

impl Iterator for Iter<'_> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = self.list.next_of(current);
        self.remaining = self.remaining.saturating_sub(1);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a NodeList {
    type Item = NodeHandle;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(index: u32) -> NodeHandle {
        NodeHandle::new(index, 0)
    }

    fn collect(list: &NodeList) -> Vec<NodeHandle> {
        list.iter().collect()
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut list = NodeList::new();
        list.add(h(2));
        list.add(h(0));
        list.add(h(1));

        assert_eq!(collect(&list), vec![h(2), h(0), h(1)]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.head(), Some(h(2)));
        assert_eq!(list.tail(), Some(h(1)));
        assert_eq!(list.iter().len(), 3);
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let mut list = NodeList::new();
        for i in 0..5 {
            list.add(h(i));
        }

        list.remove(h(2));
        assert_eq!(collect(&list), vec![h(0), h(1), h(3), h(4)]);
        assert_eq!(list.prev_of(h(3)), Some(h(1)));

        list.remove(h(0));
        list.remove(h(4));
        assert_eq!(collect(&list), vec![h(1), h(3)]);
        assert_eq!(list.head(), Some(h(1)));
        assert_eq!(list.tail(), Some(h(3)));

        list.remove(h(1));
        list.remove(h(3));
        assert!(list.is_empty());
        assert_eq!(list.head(), None);
        assert_eq!(list.tail(), None);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut list = NodeList::new();
        list.add(h(0));

        list.remove(h(7));
        list.remove(NodeHandle::new(0, 1)); // stale generation
        assert_eq!(collect(&list), vec![h(0)]);
    }

    #[test]
    fn test_handles_sharing_an_index_are_distinct() {
        let mut list = NodeList::new();
        let first = NodeHandle::new(0, 0);
        let second = NodeHandle::new(0, 1);
        let sparse = NodeHandle::new(u32::MAX - 1, 0);

        list.add(first);
        list.add(second);
        list.add(sparse);
        assert_eq!(collect(&list), vec![first, second, sparse]);

        list.remove(second);
        assert_eq!(collect(&list), vec![first, sparse]);
        assert_eq!(list.next_of(first), Some(sparse));
        assert!(!list.contains(second));
    }

    #[test]
    fn test_duplicate_add_ignored() {
        let mut list = NodeList::new();
        list.add(h(0));
        list.add(h(0));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_lock_freezes_visible_sequence() {
        let mut list = NodeList::new();
        list.add(h(0));
        list.add(h(1));

        list.lock();
        assert!(list.is_locked());
        list.remove(h(0));
        list.add(h(2));

        assert_eq!(collect(&list), vec![h(0), h(1)]);
        assert_eq!(list.pending_len(), 2);

        list.unlock();
        assert!(!list.is_locked());
        assert_eq!(collect(&list), vec![h(1), h(2)]);
        assert_eq!(list.pending_len(), 0);
    }

    #[test]
    fn test_unlock_replays_in_request_order() {
        let mut list = NodeList::new();

        list.lock();
        list.add(h(3));
        list.remove(h(3));
        list.add(h(4));
        list.unlock();

        assert_eq!(collect(&list), vec![h(4)]);
    }

    #[test]
    fn test_lock_unlock_without_mutation() {
        let mut list = NodeList::new();
        list.add(h(1));
        list.add(h(0));

        list.lock();
        list.lock(); // nested lock is a no-op
        list.unlock();

        assert_eq!(collect(&list), vec![h(1), h(0)]);
        assert!(!list.is_locked());

        // Unlocking an unlocked list does nothing.
        list.unlock();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_iteration_while_removing() {
        let mut list = NodeList::new();
        for i in 0..4 {
            list.add(h(i));
        }

        list.lock();
        let mut visited = Vec::new();
        let mut cursor = list.head();
        while let Some(current) = cursor {
            visited.push(current);
            list.remove(current);
            cursor = list.next_of(current);
        }
        list.unlock();

        assert_eq!(visited, vec![h(0), h(1), h(2), h(3)]);
        assert!(list.is_empty());
    }

    #[test]
    fn test_change_log() {
        let mut list = NodeList::new();
        list.add(h(0));
        assert!(list.drain_changes().is_empty());

        list.track_changes(true);
        list.add(h(1));
        list.lock();
        list.remove(h(0));
        assert_eq!(list.drain_changes(), vec![NodeChange::Added(h(1))]);

        list.unlock();
        assert_eq!(list.drain_changes(), vec![NodeChange::Removed(h(0))]);
        assert!(list.drain_changes().is_empty());
    }

    #[test]
    fn test_clear_returns_linked_and_pending() {
        let mut list = NodeList::new();
        list.add(h(0));
        list.add(h(1));
        list.lock();
        list.add(h(2));
        list.remove(h(0));

        assert_eq!(list.clear(), vec![h(1), h(2)]);
        assert!(list.is_empty());
        assert_eq!(list.pending_len(), 0);
        assert!(list.is_locked());
    }
}
