use std::{collections::VecDeque, hash::Hash};

use hashlink::LinkedHashMap;

pub trait Replacer<ID: Eq + Hash + Copy> {
    fn record_access(&mut self, entry_id: ID);
    // Picks a victim among the entries `can_evict` accepts and forgets it
    fn evict<F: Fn(&ID) -> bool>(&mut self, can_evict: F) -> Option<ID>;
    fn remove(&mut self, entry_id: ID) -> bool;
    fn size(&self) -> usize;
}

#[derive(Debug)]
struct LRUKNode {
    // Most recent access first, never longer than k
    history: VecDeque<u64>,
}

impl LRUKNode {
    fn new() -> Self {
        LRUKNode {
            history: VecDeque::new(),
        }
    }

    fn push_timestamp(&mut self, timestamp: u64, k: usize) {
        self.history.push_front(timestamp);
        self.history.truncate(k);
    }

    // (false, oldest) for entries with fewer than k accesses, i.e. infinite
    // backward k-distance, otherwise (true, k-th most recent access)
    fn eviction_key(&self, k: usize) -> (bool, u64) {
        let oldest = self.history.back().copied().unwrap_or(0);
        (self.history.len() >= k, oldest)
    }
}

/// LRU-K: evicts the entry whose k-th most recent access is furthest in the
/// past. Entries seen fewer than k times go first, oldest access breaking ties.
pub struct LRUKReplacer<ID: Eq + Hash + Copy> {
    node_store: LinkedHashMap<ID, LRUKNode>,
    current_timestamp: u64,
    k: usize,
}

impl<ID: Eq + Hash + Copy> LRUKReplacer<ID> {
    pub fn new(k: usize) -> Self {
        LRUKReplacer {
            node_store: LinkedHashMap::new(),
            current_timestamp: 0,
            k: k.max(1),
        }
    }
}

impl<ID: Eq + Hash + Copy> Replacer<ID> for LRUKReplacer<ID> {
    fn record_access(&mut self, entry_id: ID) {
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;

        let k = self.k;
        self.node_store
            .entry(entry_id)
            .or_insert_with(LRUKNode::new)
            .push_timestamp(timestamp, k);
    }

    fn evict<F: Fn(&ID) -> bool>(&mut self, can_evict: F) -> Option<ID> {
        let k = self.k;

        let victim = self
            .node_store
            .iter()
            .filter(|(id, _)| can_evict(id))
            .min_by_key(|(_, node)| node.eviction_key(k))
            .map(|(id, _)| *id)?;

        self.node_store.remove(&victim);
        Some(victim)
    }

    fn remove(&mut self, entry_id: ID) -> bool {
        self.node_store.remove(&entry_id).is_some()
    }

    fn size(&self) -> usize {
        self.node_store.len()
    }
}

#[cfg(test)]
pub mod test {
    use std::collections::HashSet;

    use super::{LRUKReplacer, Replacer};

    #[test]
    fn replacer_test() {
        let mut replacer = LRUKReplacer::new(2);
        let mut pinned: HashSet<u32> = HashSet::new();

        // Frames [1, 2, 3, 4, 5] are evictable, frame 6 is not
        for id in 1..=6 {
            replacer.record_access(id);
        }
        pinned.insert(6);
        assert_eq!(6, replacer.size());

        // Frame 1 now has two accesses, every other frame has infinite k-distance
        replacer.record_access(1);

        // Ties between infinite distances fall back to plain LRU: [2, 3, 4, 5, 1]
        assert_eq!(Some(2), replacer.evict(|id| !pinned.contains(id)));
        assert_eq!(Some(3), replacer.evict(|id| !pinned.contains(id)));
        assert_eq!(Some(4), replacer.evict(|id| !pinned.contains(id)));
        assert_eq!(3, replacer.size());

        // Insert [3, 4] again and touch 5. Ordering is now [3, 1, 5, 4]
        replacer.record_access(3);
        replacer.record_access(4);
        replacer.record_access(5);
        replacer.record_access(4);

        assert_eq!(Some(3), replacer.evict(|id| !pinned.contains(id)));

        // With 1 pinned, 5 has the oldest second-to-last access
        pinned.insert(1);
        assert_eq!(Some(5), replacer.evict(|id| !pinned.contains(id)));

        pinned.remove(&1);
        replacer.record_access(1);
        replacer.record_access(1);

        assert_eq!(Some(4), replacer.evict(|id| !pinned.contains(id)));
        assert_eq!(Some(1), replacer.evict(|id| !pinned.contains(id)));

        // Only the pinned frame is left
        assert_eq!(None, replacer.evict(|id| !pinned.contains(id)));
        assert_eq!(1, replacer.size());

        pinned.clear();
        assert_eq!(Some(6), replacer.evict(|id| !pinned.contains(id)));
        assert_eq!(0, replacer.size());
        assert_eq!(None, replacer.evict(|_| true));
    }

    #[test]
    fn remove_forgets_history() {
        let mut replacer = LRUKReplacer::new(2);
        replacer.record_access(10u32);
        replacer.record_access(11u32);

        assert!(replacer.remove(10));
        assert!(!replacer.remove(10));
        assert_eq!(Some(11), replacer.evict(|_| true));
    }
}
