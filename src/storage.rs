use std::collections::{HashSet, VecDeque};

/// In-memory set of listing keys that have already been observed.
///
/// Unbounded by default, so a key is never forgotten for the lifetime of the
/// process. With a capacity the earliest inserted keys are evicted first.
#[derive(Debug, Default)]
pub struct SeenListings {
    keys: HashSet<String>,
    order: VecDeque<String>,
    capacity: Option<usize>,
}

impl SeenListings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            capacity: capacity.filter(|c| *c > 0),
            ..Self::default()
        }
    }

    /// True iff `key` was never passed to [`mark_seen`](Self::mark_seen).
    pub fn is_new(&self, key: &str) -> bool {
        !self.keys.contains(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Record `key`. Returns false if it was already present.
    pub fn mark_seen(&mut self, key: &str) -> bool {
        if self.keys.contains(key) {
            return false;
        }

        if let Some(capacity) = self.capacity {
            while self.order.len() >= capacity {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.keys.remove(&oldest);
                    }
                    None => break,
                }
            }
        }

        self.keys.insert(key.to_string());
        self.order.push_back(key.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
