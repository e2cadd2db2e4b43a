use std::collections::HashMap;
use std::hash::Hash;

use crate::qdisc::PeerQueue;

// ==========================================
// Peer table: arena of records threaded on a ring
// ==========================================
// Records live in `slots`, freed indices are recycled through `free`.
// `prev`/`next` link the live records in admission order and wrap
// around, so rotating the cursor is a single index hop and a release
// unlinks in O(1) without disturbing the order of the others.

struct Slot<T, K> {
    key: K,
    queue: PeerQueue<T, K>,
    prev: usize,
    next: usize,
}

pub struct FairTable<T, K> {
    slots: Vec<Option<Slot<T, K>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    cursor: Option<usize>,
}

impl<T, K> Default for FairTable<T, K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K> FairTable<T, K>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            cursor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&PeerQueue<T, K>> {
        let idx = *self.index.get(key)?;
        self.slot(idx).map(|s| &s.queue)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut PeerQueue<T, K>> {
        let idx = *self.index.get(key)?;
        self.slot_mut(idx).map(|s| &mut s.queue)
    }

    /// Adds `key` at the end of the ring. An existing entry keeps its
    /// place in the ring and gets `queue` swapped in; the old queue is
    /// returned. The first entry of an empty table becomes the cursor.
    pub fn insert(&mut self, key: K, queue: PeerQueue<T, K>) -> Option<PeerQueue<T, K>> {
        if let Some(&idx) = self.index.get(&key) {
            let slot = self.slot_mut(idx)?;
            return Some(std::mem::replace(&mut slot.queue, queue));
        }

        let mut slot = Slot {
            key: key.clone(),
            queue,
            prev: 0,
            next: 0,
        };

        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };

        match self.head {
            None => {
                slot.prev = idx;
                slot.next = idx;
                self.head = Some(idx);
                self.cursor = Some(idx);
            }
            Some(head) => {
                let tail = self.slot(head).map_or(head, |s| s.prev);
                slot.prev = tail;
                slot.next = head;
                if let Some(t) = self.slot_mut(tail) {
                    t.next = idx;
                }
                if let Some(h) = self.slot_mut(head) {
                    h.prev = idx;
                }
            }
        }

        self.slots[idx] = Some(slot);
        self.index.insert(key, idx);
        None
    }

    /// Unlinks `key`. If it was the cursor, the cursor moves to the next
    /// entry in ring order (the first one if `key` was last), or clears
    /// when the table empties.
    pub fn remove(&mut self, key: &K) -> Option<PeerQueue<T, K>> {
        let idx = self.index.remove(key)?;
        let slot = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);

        if self.index.is_empty() {
            self.head = None;
            self.cursor = None;
            return Some(slot.queue);
        }

        if let Some(p) = self.slot_mut(slot.prev) {
            p.next = slot.next;
        }
        if let Some(n) = self.slot_mut(slot.next) {
            n.prev = slot.prev;
        }
        if self.head == Some(idx) {
            self.head = Some(slot.next);
        }
        if self.cursor == Some(idx) {
            self.cursor = Some(slot.next);
        }

        Some(slot.queue)
    }

    pub fn cursor(&self) -> Option<&K> {
        self.slot(self.cursor?).map(|s| &s.key)
    }

    pub fn cursor_queue_mut(&mut self) -> Option<&mut PeerQueue<T, K>> {
        let idx = self.cursor?;
        self.slot_mut(idx).map(|s| &mut s.queue)
    }

    /// Moves the cursor one step along the ring, wrapping past the end.
    pub fn advance(&mut self) {
        if let Some(idx) = self.cursor {
            self.cursor = self.slot(idx).map(|s| s.next);
        }
    }

    /// Walks the ring from the first admitted entry.
    pub fn iter(&self) -> Iter<'_, T, K> {
        Iter {
            table: self,
            next: self.head,
            remaining: self.len(),
        }
    }

    /// Takes every entry out, in ring order.
    pub fn drain(&mut self) -> Vec<(K, PeerQueue<T, K>)> {
        let order: Vec<usize> = self.iter_indices().collect();
        let mut out = Vec::with_capacity(order.len());
        for idx in order {
            if let Some(slot) = self.slots.get_mut(idx).and_then(Option::take) {
                out.push((slot.key, slot.queue));
            }
        }
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.cursor = None;
        out
    }

    fn iter_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let mut next = self.head;
        (0..self.len()).filter_map(move |_| {
            let idx = next?;
            next = self.slot(idx).map(|s| s.next);
            Some(idx)
        })
    }

    fn slot(&self, idx: usize) -> Option<&Slot<T, K>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, idx: usize) -> Option<&mut Slot<T, K>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }
}

pub struct Iter<'a, T, K> {
    table: &'a FairTable<T, K>,
    next: Option<usize>,
    remaining: usize,
}

impl<'a, T, K> Iterator for Iter<'a, T, K>
where
    K: Hash + Eq + Clone,
{
    type Item = (&'a K, &'a PeerQueue<T, K>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.table.slot(self.next?)?;
        self.remaining -= 1;
        self.next = Some(slot.next);
        Some((&slot.key, &slot.queue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(keys: &[u8]) -> FairTable<Vec<u8>, u8> {
        let mut t = FairTable::new();
        for &k in keys {
            t.insert(k, PeerQueue::new(4));
        }
        t
    }

    fn keys(t: &FairTable<Vec<u8>, u8>) -> Vec<u8> {
        t.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn first_insert_becomes_cursor() {
        let mut t = table(&[]);
        assert!(t.cursor().is_none());
        t.insert(7, PeerQueue::new(1));
        assert_eq!(t.cursor(), Some(&7));
        t.insert(8, PeerQueue::new(1));
        assert_eq!(t.cursor(), Some(&7));
    }

    #[test]
    fn advance_wraps_around() {
        let mut t = table(&[1, 2, 3]);
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(*t.cursor().unwrap());
            t.advance();
        }
        assert_eq!(seen, vec![1, 2, 3, 1, 2]);
    }

    #[test]
    fn removing_cursor_moves_to_next() {
        let mut t = table(&[1, 2, 3]);
        t.advance();
        assert!(t.remove(&2).is_some());
        assert_eq!(t.cursor(), Some(&3));
        assert_eq!(keys(&t), vec![1, 3]);
    }

    #[test]
    fn removing_last_cursor_wraps_to_first() {
        let mut t = table(&[1, 2, 3]);
        t.advance();
        t.advance();
        t.remove(&3);
        assert_eq!(t.cursor(), Some(&1));
    }

    #[test]
    fn removing_other_entry_keeps_cursor() {
        let mut t = table(&[1, 2, 3]);
        t.advance();
        t.remove(&1);
        assert_eq!(t.cursor(), Some(&2));
        assert_eq!(keys(&t), vec![2, 3]);
    }

    #[test]
    fn removing_everything_clears_cursor() {
        let mut t = table(&[1]);
        t.remove(&1);
        assert!(t.is_empty());
        assert!(t.cursor().is_none());
        assert!(t.remove(&1).is_none());
    }

    #[test]
    fn reinsert_keeps_ring_position() {
        let mut t = table(&[1, 2, 3]);
        let old = t.insert(2, PeerQueue::new(9));
        assert_eq!(old.map(|q| q.capacity()), Some(4));
        assert_eq!(keys(&t), vec![1, 2, 3]);
        assert_eq!(t.get(&2).map(|q| q.capacity()), Some(9));
    }

    #[test]
    fn freed_slots_are_reused_at_ring_end() {
        let mut t = table(&[1, 2, 3]);
        t.remove(&1);
        t.insert(4, PeerQueue::new(4));
        assert_eq!(keys(&t), vec![2, 3, 4]);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn drain_returns_ring_order() {
        let mut t = table(&[5, 6, 7]);
        t.remove(&5);
        t.insert(5, PeerQueue::new(4));
        let drained: Vec<u8> = t.drain().into_iter().map(|(k, _)| k).collect();
        assert_eq!(drained, vec![6, 7, 5]);
        assert!(t.is_empty());
        assert!(t.cursor().is_none());
    }
}
