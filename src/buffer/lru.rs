//! LRU (Least Recently Used) replacement order.

use std::collections::HashMap;
use std::hash::Hash;

/// Tracks the access order of buffer frames
pub struct LruCache<K> {
    /// Maps a key to its node in the access order
    positions: HashMap<K, usize>,
    /// Doubly-linked list nodes for O(1) removal
    order: Vec<LruNode<K>>,
    /// Head of the list (most recently used)
    head: Option<usize>,
    /// Tail of the list (least recently used)
    tail: Option<usize>,
    /// Free list of node indices
    free_slots: Vec<usize>,
}

#[derive(Clone, Copy)]
struct LruNode<K> {
    key: K,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<K: Copy + Eq + Hash> LruCache<K> {
    /// Create a new LRU cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_slots: Vec::new(),
        }
    }

    /// Record access to a key (moves it to front)
    pub fn access(&mut self, key: K) {
        if let Some(&pos) = self.positions.get(&key) {
            // Already in cache, move to front
            self.move_to_front(pos);
        } else {
            // New entry, add to front
            self.insert(key);
        }
    }

    /// Remove a key from the order
    pub fn remove(&mut self, key: K) {
        if let Some(pos) = self.positions.remove(&key) {
            self.unlink(pos);
            self.free_slots.push(pos);
        }
    }

    /// Get the least recently used key (test only)
    #[cfg(test)]
    fn lru(&self) -> Option<K> {
        self.tail.map(|pos| self.order[pos].key)
    }

    /// Iterate from least to most recently used
    pub fn iter_lru(&self) -> impl Iterator<Item = K> + '_ {
        std::iter::successors(self.tail, move |&pos| self.order[pos].prev)
            .map(move |pos| self.order[pos].key)
    }

    /// Insert a new key at the front
    fn insert(&mut self, key: K) {
        let pos = if let Some(pos) = self.free_slots.pop() {
            self.order[pos] = LruNode {
                key,
                prev: None,
                next: self.head,
            };
            pos
        } else {
            let pos = self.order.len();
            self.order.push(LruNode {
                key,
                prev: None,
                next: self.head,
            });
            pos
        };

        if let Some(old_head) = self.head {
            self.order[old_head].prev = Some(pos);
        }
        self.head = Some(pos);

        if self.tail.is_none() {
            self.tail = Some(pos);
        }

        self.positions.insert(key, pos);
    }

    /// Move a node to the front of the list
    fn move_to_front(&mut self, pos: usize) {
        if self.head == Some(pos) {
            return; // Already at front
        }

        self.unlink(pos);

        // Link at front
        self.order[pos].prev = None;
        self.order[pos].next = self.head;

        if let Some(old_head) = self.head {
            self.order[old_head].prev = Some(pos);
        }
        self.head = Some(pos);

        if self.tail.is_none() {
            self.tail = Some(pos);
        }
    }

    /// Unlink a node from the list
    fn unlink(&mut self, pos: usize) {
        let node = self.order[pos];

        if let Some(prev) = node.prev {
            self.order[prev].next = node.next;
        } else {
            self.head = node.next;
        }

        if let Some(next) = node.next {
            self.order[next].prev = node.prev;
        } else {
            self.tail = node.prev;
        }
    }

    /// Get the number of items in the cache (test only)
    #[cfg(test)]
    fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the cache is empty (test only)
    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
