use std::collections::HashMap;
use std::hash::Hash;

/// A symmetric association where every key has at most one partner and
/// the partner maps back to it.
///
/// The map performs no locking of its own. Owners keep it behind a
/// [`Guarded`](crate::sync::Guarded) lock so both directions of an
/// association change together.
#[derive(Debug, Clone)]
pub struct BiMap<K> {
    entries: HashMap<K, K>,
}

impl<K> Default for BiMap<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> BiMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `a` with `b`. Any previous partner of either key loses its
    /// reverse entry.
    pub fn set(&mut self, a: K, b: K) {
        self.remove(&a);
        self.remove(&b);
        self.entries.insert(a.clone(), b.clone());
        self.entries.insert(b, a);
    }

    /// Get the partner of `key`.
    pub fn get(&self, key: &K) -> Option<&K> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove `key` together with its partner's reverse entry.
    ///
    /// Returns false (and does nothing) if `key` was absent.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(partner) = self.entries.remove(key) else {
            return false;
        };
        self.entries.remove(&partner);
        true
    }

    /// Drop every association.
    pub fn destroy(&mut self) {
        self.entries.clear();
    }

    /// Number of associations (each pair counts once).
    pub fn len(&self) -> usize {
        self.entries.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_is_symmetric() {
        let mut map = BiMap::new();
        map.set("a", "b");
        assert_eq!(map.get(&"a"), Some(&"b"));
        assert_eq!(map.get(&"b"), Some(&"a"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_set_overwrites_previous_partners() {
        let mut map = BiMap::new();
        map.set("a", "b");
        map.set("c", "d");
        map.set("a", "c");

        assert_eq!(map.get(&"a"), Some(&"c"));
        assert_eq!(map.get(&"c"), Some(&"a"));
        assert_eq!(map.get(&"b"), None);
        assert_eq!(map.get(&"d"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_remove_clears_both_directions() {
        let mut map = BiMap::new();
        map.set(1, 2);
        assert!(map.remove(&2));
        assert!(!map.contains(&1));
        assert!(!map.contains(&2));
        assert!(map.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut map = BiMap::new();
        map.set(1, 2);
        assert!(!map.remove(&3));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_destroy() {
        let mut map = BiMap::new();
        map.set(1, 2);
        map.set(3, 4);
        map.destroy();
        assert!(map.is_empty());
        assert_eq!(map.get(&1), None);
    }
}
