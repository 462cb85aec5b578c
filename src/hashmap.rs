//! An open-addressing, FNV-1a hash map keyed by string content, not a
//! wrapper over the standard library map: fixed capacity/load-factor/
//! growth constants, linear-probing-with-tombstones deletion. Used for
//! the VM's global variable table.

const DEFAULT_CAPACITY: usize = 256;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;
const FNV_OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
const GROWTH_FACTOR: f64 = 2.0;
const MAX_LOAD: f64 = 0.4;

#[derive(Clone)]
enum Slot<V> {
    Empty,
    Occupied(String, V),
    Deleted,
}

pub struct StingMap<V> {
    slots: Vec<Slot<V>>,
    size: usize,
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

impl<V> StingMap<V> {
    pub fn new() -> Self {
        Self {
            slots: (0..DEFAULT_CAPACITY).map(|_| Slot::Empty).collect(),
            size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Walks the probe sequence for `key`, returning either the slot that
    /// holds it (`Ok`) or the first slot usable for an insert (`Err`,
    /// preferring the earliest tombstone on the probe).
    fn find_slot(&self, key: &str) -> Result<usize, usize> {
        let cap = self.capacity();
        let start = (fnv1a(key.as_bytes()) % cap as u64) as usize;
        let mut first_tombstone: Option<usize> = None;
        for step in 0..cap {
            let idx = (start + step) % cap;
            match &self.slots[idx] {
                Slot::Empty => return Err(first_tombstone.unwrap_or(idx)),
                Slot::Deleted => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(idx);
                    }
                }
                Slot::Occupied(k, _) if k == key => return Ok(idx),
                Slot::Occupied(..) => {}
            }
        }
        // full cycle with no empty slot: only reachable if grow() never ran.
        Err(first_tombstone.expect("hashmap at full capacity with no tombstone"))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find_slot(key).is_ok()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        match self.find_slot(key) {
            Ok(idx) => match &self.slots[idx] {
                Slot::Occupied(_, v) => Some(v),
                _ => unreachable!(),
            },
            Err(_) => None,
        }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        match self.find_slot(key) {
            Ok(idx) => match &mut self.slots[idx] {
                Slot::Occupied(_, v) => Some(v),
                _ => unreachable!(),
            },
            Err(_) => None,
        }
    }

    /// Returns `true` if this inserted a new key, `false` if it overwrote
    /// an existing one.
    pub fn insert(&mut self, key: String, value: V) -> bool {
        if (self.size + 1) as f64 / self.capacity() as f64 >= MAX_LOAD {
            self.grow();
        }
        match self.find_slot(&key) {
            Ok(idx) => {
                self.slots[idx] = Slot::Occupied(key, value);
                false
            }
            Err(idx) => {
                self.slots[idx] = Slot::Occupied(key, value);
                self.size += 1;
                true
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        match self.find_slot(key) {
            Ok(idx) => {
                let slot = std::mem::replace(&mut self.slots[idx], Slot::Deleted);
                self.size -= 1;
                match slot {
                    Slot::Occupied(_, v) => Some(v),
                    _ => unreachable!(),
                }
            }
            Err(_) => None,
        }
    }

    fn grow(&mut self) {
        let new_capacity = (self.capacity() as f64 * GROWTH_FACTOR).ceil() as usize;
        let old_slots = std::mem::replace(
            &mut self.slots,
            (0..new_capacity).map(|_| Slot::Empty).collect(),
        );
        self.size = 0;
        for slot in old_slots {
            if let Slot::Occupied(k, v) = slot {
                self.insert(k, v);
            }
        }
    }
}

impl<V> Default for StingMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut map = StingMap::new();
        assert!(map.insert("a".to_string(), 1));
        assert!(!map.insert("a".to_string(), 2));
        assert_eq!(map.get("a"), Some(&2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_then_reinsert() {
        let mut map = StingMap::new();
        map.insert("x".to_string(), 10);
        assert_eq!(map.remove("x"), Some(10));
        assert_eq!(map.get("x"), None);
        assert!(map.insert("x".to_string(), 20));
        assert_eq!(map.get("x"), Some(&20));
    }

    #[test]
    fn grows_past_load_factor() {
        let mut map = StingMap::new();
        for i in 0..500 {
            map.insert(format!("key{i}"), i);
        }
        assert_eq!(map.len(), 500);
        for i in 0..500 {
            assert_eq!(map.get(&format!("key{i}")), Some(&i));
        }
    }

    #[test]
    fn tombstones_do_not_break_lookups() {
        let mut map = StingMap::new();
        for i in 0..20 {
            map.insert(format!("k{i}"), i);
        }
        for i in 0..10 {
            map.remove(&format!("k{i}"));
        }
        for i in 10..20 {
            assert_eq!(map.get(&format!("k{i}")), Some(&i));
        }
    }
}
