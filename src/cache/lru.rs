//! LRU index over live cache entries
//!
//! Entries live in a slab; a doubly linked list threads through the slab by
//! integer handle and a map binds each digest to its handle. Front = most
//! recently used.

use crate::cache::entry::EntryMeta;
use std::collections::HashMap;

type Handle = usize;

#[derive(Debug)]
struct Node {
    entry: EntryMeta,
    prev: Option<Handle>,
    next: Option<Handle>,
}

/// Ordered index of live entries, keyed by digest
#[derive(Debug, Default)]
pub struct LruIndex {
    slots: Vec<Option<Node>>,
    free: Vec<Handle>,
    by_digest: HashMap<String, Handle>,
    head: Option<Handle>,
    tail: Option<Handle>,
}

impl LruIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.by_digest.contains_key(digest)
    }

    pub fn get(&self, digest: &str) -> Option<&EntryMeta> {
        let handle = *self.by_digest.get(digest)?;
        self.node(handle).map(|n| &n.entry)
    }

    /// Insert at the front, or replace and promote an existing entry.
    ///
    /// Returns the replaced entry, if any.
    pub fn insert_front(&mut self, entry: EntryMeta) -> Option<EntryMeta> {
        if let Some(&handle) = self.by_digest.get(&entry.digest) {
            self.unlink(handle);
            self.link_front(handle);
            let node = self.slots[handle].as_mut()?;
            return Some(std::mem::replace(&mut node.entry, entry));
        }

        let handle = self.alloc(entry);
        self.link_front(handle);
        None
    }

    /// Append at the back (least recently used end).
    ///
    /// Used while rebuilding the index at startup. An existing entry with the
    /// same digest is replaced in place.
    pub fn push_back(&mut self, entry: EntryMeta) -> Option<EntryMeta> {
        if let Some(&handle) = self.by_digest.get(&entry.digest) {
            let node = self.slots[handle].as_mut()?;
            return Some(std::mem::replace(&mut node.entry, entry));
        }

        let handle = self.alloc(entry);
        self.link_back(handle);
        None
    }

    /// Move an entry to the front. Returns false if absent.
    pub fn promote(&mut self, digest: &str) -> bool {
        let Some(&handle) = self.by_digest.get(digest) else {
            return false;
        };
        if self.head != Some(handle) {
            self.unlink(handle);
            self.link_front(handle);
        }
        true
    }

    pub fn remove(&mut self, digest: &str) -> Option<EntryMeta> {
        let handle = self.by_digest.remove(digest)?;
        self.unlink(handle);
        let node = self.slots[handle].take()?;
        self.free.push(handle);
        Some(node.entry)
    }

    /// Least recently used entry
    pub fn back(&self) -> Option<&EntryMeta> {
        self.tail.and_then(|h| self.node(h)).map(|n| &n.entry)
    }

    /// Iterate from most to least recently used
    pub fn iter(&self) -> impl Iterator<Item = &EntryMeta> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.node(cursor?)?;
            cursor = node.next;
            Some(&node.entry)
        })
    }

    fn node(&self, handle: Handle) -> Option<&Node> {
        self.slots.get(handle).and_then(|slot| slot.as_ref())
    }

    fn alloc(&mut self, entry: EntryMeta) -> Handle {
        let digest = entry.digest.clone();
        let node = Node {
            entry,
            prev: None,
            next: None,
        };
        let handle = match self.free.pop() {
            Some(handle) => {
                self.slots[handle] = Some(node);
                handle
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.by_digest.insert(digest, handle);
        handle
    }

    fn unlink(&mut self, handle: Handle) {
        let (prev, next) = match self.node(handle) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.slots[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.slots[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.slots[handle].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn link_front(&mut self, handle: Handle) {
        let old_head = self.head;
        if let Some(node) = self.slots[handle].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.slots[h].as_mut() {
                node.prev = Some(handle);
            }
        }
        self.head = Some(handle);
        if self.tail.is_none() {
            self.tail = Some(handle);
        }
    }

    fn link_back(&mut self, handle: Handle) {
        let old_tail = self.tail;
        if let Some(node) = self.slots[handle].as_mut() {
            node.next = None;
            node.prev = old_tail;
        }
        if let Some(t) = old_tail {
            if let Some(node) = self.slots[t].as_mut() {
                node.next = Some(handle);
            }
        }
        self.tail = Some(handle);
        if self.head.is_none() {
            self.head = Some(handle);
        }
    }
}
