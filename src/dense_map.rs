use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const INVALID: usize = usize::MAX;
const MIN_BUCKETS: usize = 8;
const LOAD_FACTOR: f64 = 0.875;

struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// An open-chaining hash map with every node held in one packed `Vec`.
///
/// Each node threads its bucket's collision chain via `prev`/`next`
/// indices into the same packed array, rather than each bucket owning its
/// own allocation. Bucket count is always a power of two so the bucket for
/// a hash is `hash & (bucket_count - 1)` instead of a division. Used
/// internally by the registry to assign a dense integer id to each
/// component `TypeId` it sees.
pub struct DenseMap<K, V> {
    buckets: Vec<usize>,
    nodes: Vec<Node<K, V>>,
}

impl<K: Hash + Eq, V> DenseMap<K, V> {
    pub fn new() -> Self {
        Self {
            buckets: vec![INVALID; MIN_BUCKETS],
            nodes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn hash_of(key: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn fast_mod(hash: u64, bucket_count: usize) -> usize {
        (hash as usize) & (bucket_count - 1)
    }

    fn bucket_for(&self, key: &K) -> usize {
        Self::fast_mod(Self::hash_of(key), self.buckets.len())
    }

    fn find_index(&self, key: &K) -> Option<usize> {
        let mut idx = self.buckets[self.bucket_for(key)];
        while idx != INVALID {
            let node = &self.nodes[idx];
            if &node.key == key {
                return Some(idx);
            }
            idx = node.next;
        }
        None
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find_index(key).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find_index(key).map(|idx| &self.nodes[idx].value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = self.find_index(key)?;
        Some(&mut self.nodes[idx].value)
    }

    fn link_new_node(&mut self, key: K, value: V) -> usize {
        let bucket = self.bucket_for(&key);
        let head = self.buckets[bucket];
        let new_idx = self.nodes.len();
        self.nodes.push(Node {
            key,
            value,
            prev: INVALID,
            next: head,
        });
        if head != INVALID {
            self.nodes[head].prev = new_idx;
        }
        self.buckets[bucket] = new_idx;
        new_idx
    }

    /// Inserts `key -> value`, returning the previous value if `key` was
    /// already present (the map is left unchanged in that case, the same
    /// as `HashMap::insert`).
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(idx) = self.find_index(&key) {
            return Some(std::mem::replace(&mut self.nodes[idx].value, value));
        }
        self.link_new_node(key, value);
        self.rehash_if_should();
        None
    }

    /// Returns the existing value for `key`, or constructs one with `make`
    /// and returns a reference to it.
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        if let Some(idx) = self.find_index(&key) {
            return &mut self.nodes[idx].value;
        }
        let idx = self.link_new_node(key, make());
        self.rehash_if_should();
        &mut self.nodes[idx].value
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev != INVALID {
            self.nodes[prev].next = next;
        } else {
            let bucket = self.bucket_for(&self.nodes[idx].key);
            self.buckets[bucket] = next;
        }
        if next != INVALID {
            self.nodes[next].prev = prev;
        }
    }

    /// Removes `key`, returning its value if present.
    ///
    /// Unlinks the node from its bucket chain, then if it wasn't the last
    /// node in the packed array, moves the last node into the vacated slot
    /// and repairs that node's chain neighbors (and its bucket head, if it
    /// was one).
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.find_index(key)?;
        self.unlink(idx);

        let last = self.nodes.len() - 1;
        let removed = if idx != last {
            self.nodes.swap(idx, last);
            let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
            if prev != INVALID {
                self.nodes[prev].next = idx;
            } else {
                let bucket = self.bucket_for(&self.nodes[idx].key);
                self.buckets[bucket] = idx;
            }
            if next != INVALID {
                self.nodes[next].prev = idx;
            }
            self.nodes.pop().unwrap()
        } else {
            self.nodes.pop().unwrap()
        };
        Some(removed.value)
    }

    fn rehash_if_should(&mut self) {
        if self.nodes.len() as f64 / self.buckets.len() as f64 > LOAD_FACTOR {
            self.rehash(self.buckets.len() * 2);
        }
    }

    fn rehash(&mut self, new_bucket_count: usize) {
        self.buckets = vec![INVALID; new_bucket_count];
        for idx in 0..self.nodes.len() {
            let bucket = Self::fast_mod(Self::hash_of(&self.nodes[idx].key), new_bucket_count);
            let head = self.buckets[bucket];
            self.nodes[idx].prev = INVALID;
            self.nodes[idx].next = head;
            if head != INVALID {
                self.nodes[head].prev = idx;
            }
            self.buckets[bucket] = idx;
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.buckets = vec![INVALID; MIN_BUCKETS];
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.nodes.iter().map(|n| (&n.key, &n.value))
    }
}

impl<K: Hash + Eq, V> Default for DenseMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut m: DenseMap<&'static str, u32> = DenseMap::new();
        assert_eq!(m.insert("a", 1), None);
        assert_eq!(m.insert("b", 2), None);
        assert_eq!(m.get(&"a"), Some(&1));
        assert_eq!(m.insert("a", 10), Some(1));
        assert_eq!(m.remove(&"b"), Some(2));
        assert_eq!(m.get(&"b"), None);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn rehash_preserves_every_entry() {
        let mut m: DenseMap<u32, u32> = DenseMap::new();
        for i in 0..64u32 {
            m.insert(i, i * 10);
        }
        assert_eq!(m.len(), 64);
        for i in 0..64u32 {
            assert_eq!(m.get(&i), Some(&(i * 10)));
        }
    }

    #[test]
    fn remove_swaps_last_node_into_vacated_slot() {
        let mut m: DenseMap<u32, u32> = DenseMap::new();
        for i in 0..5u32 {
            m.insert(i, i);
        }
        m.remove(&1);
        for i in [0u32, 2, 3, 4] {
            assert_eq!(m.get(&i), Some(&i));
        }
        assert_eq!(m.len(), 4);
    }
}
