//! Eviction Ring Module
//!
//! Implements round-robin insertion tracking for size-bounded eviction.

// == Eviction Ring ==
/// Fixed-capacity ring of the most recent insertions.
///
/// Each slot holds a key and the generation of the entry that was inserted
/// under it. The slot under the cursor names the next eviction victim.
#[derive(Debug)]
pub struct EvictionRing {
    /// Round-robin slots, empty until first written
    slots: Vec<Option<(String, u64)>>,
    /// Index of the next slot to overwrite
    cursor: usize,
}

impl EvictionRing {
    // == Constructor ==
    /// Creates an empty ring holding at most `capacity` keys.
    ///
    /// Callers validate `capacity > 0`; a zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            cursor: 0,
        }
    }

    // == Push ==
    /// Records an insertion and returns the occupant it displaced.
    ///
    /// The returned `(key, generation)` is the eviction victim.
    pub fn push(&mut self, key: &str, generation: u64) -> Option<(String, u64)> {
        let victim = self.slots[self.cursor].replace((key.to_string(), generation));
        self.cursor = (self.cursor + 1) % self.slots.len();
        victim
    }

    // == Peek Victim ==
    /// Returns the key the next push will displace, without changing the ring.
    pub fn peek_victim(&self) -> Option<&str> {
        self.slots[self.cursor].as_ref().map(|(key, _)| key.as_str())
    }

    // == Length ==
    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    // == Contains ==
    /// Checks if a key occupies any slot.
    pub fn contains(&self, key: &str) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|(k, _)| k == key)
    }

    /// Empties every slot and rewinds the cursor.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.cursor = 0;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_new() {
        let ring = EvictionRing::new(3);
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.capacity(), 3);
        assert_eq!(ring.peek_victim(), None);
    }

    #[test]
    fn test_ring_fills_without_victims() {
        let mut ring = EvictionRing::new(3);

        assert_eq!(ring.push("key1", 1), None);
        assert_eq!(ring.push("key2", 2), None);
        assert_eq!(ring.push("key3", 3), None);

        assert_eq!(ring.len(), 3);
        // key1 is next to go
        assert_eq!(ring.peek_victim(), Some("key1"));
    }

    #[test]
    fn test_ring_round_robin_order() {
        let mut ring = EvictionRing::new(2);

        assert_eq!(ring.push("1", 1), None);
        assert_eq!(ring.push("2", 2), None);
        assert_eq!(ring.push("3", 3), Some(("1".to_string(), 1)));
        assert_eq!(ring.push("4", 4), Some(("2".to_string(), 2)));
        assert_eq!(ring.push("5", 5), Some(("3".to_string(), 3)));

        assert!(ring.contains("4"));
        assert!(ring.contains("5"));
        assert!(!ring.contains("3"));
    }

    #[test]
    fn test_ring_reinsert_takes_new_slot() {
        let mut ring = EvictionRing::new(3);

        ring.push("a", 1);
        ring.push("b", 2);
        // Same key again, as after a TTL removal and a fresh insert
        ring.push("a", 3);

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.push("c", 4), Some(("a".to_string(), 1)));
        assert_eq!(ring.push("d", 5), Some(("b".to_string(), 2)));
        assert_eq!(ring.push("e", 6), Some(("a".to_string(), 3)));
    }

    #[test]
    fn test_ring_capacity_one() {
        let mut ring = EvictionRing::new(1);

        assert_eq!(ring.push("a", 1), None);
        assert_eq!(ring.push("b", 2), Some(("a".to_string(), 1)));
        assert_eq!(ring.peek_victim(), Some("b"));
    }

    #[test]
    fn test_ring_zero_capacity_is_bumped() {
        let ring = EvictionRing::new(0);
        assert_eq!(ring.capacity(), 1);
    }

    #[test]
    fn test_ring_clear() {
        let mut ring = EvictionRing::new(2);
        ring.push("a", 1);
        ring.push("b", 2);
        ring.push("c", 3);

        ring.clear();

        assert!(ring.is_empty());
        assert_eq!(ring.push("d", 4), None);
        assert_eq!(ring.push("e", 5), None);
        assert_eq!(ring.push("f", 6), Some(("d".to_string(), 4)));
    }
}
