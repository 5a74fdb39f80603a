//! Bounded in-memory event queue (component C1).
//!
//! Grounded on the single-mutex ring-buffer discipline described for shared
//! resources in the concurrency model: transport threads append, the main
//! loop drains, and neither blocks the other beyond the critical section.

use mcmot_types::Event;
use parking_lot::Mutex;
use std::collections::VecDeque;

const DEFAULT_CAPACITY: usize = 2000;

/// Thread-safe FIFO of raw inbound events with a fixed capacity. Full
/// appends evict the oldest entry (P2: length never exceeds capacity).
pub struct EventStore {
    capacity: usize,
    buffer: Mutex<VecDeque<Event>>,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
        }
    }

    /// Appends `event`, evicting the oldest entry first if the store is at
    /// capacity.
    pub fn append(&self, event: Event) {
        let mut buffer = self.buffer.lock();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    /// Returns and clears every buffered event, oldest first.
    pub fn drain_all(&self) -> Vec<Event> {
        let mut buffer = self.buffer.lock();
        buffer.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(camera_id: &str) -> Event {
        Event {
            camera_id: camera_id.to_string(),
            timestamp: Utc::now(),
            detections: Vec::new(),
            models: None,
        }
    }

    #[test]
    fn append_then_drain_returns_arrival_order() {
        let store = EventStore::new(10);
        store.append(event("cam_a"));
        store.append(event("cam_b"));
        let drained = store.drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].camera_id, "cam_a");
        assert_eq!(drained[1].camera_id, "cam_b");
    }

    #[test]
    fn drain_all_clears_the_store() {
        let store = EventStore::new(10);
        store.append(event("cam_a"));
        store.drain_all();
        assert!(store.is_empty());
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let store = EventStore::new(3);
        for i in 0..10 {
            store.append(event(&format!("cam_{i}")));
        }
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn over_capacity_evicts_oldest_first() {
        let store = EventStore::new(2);
        store.append(event("cam_a"));
        store.append(event("cam_b"));
        store.append(event("cam_c"));
        let drained = store.drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].camera_id, "cam_b");
        assert_eq!(drained[1].camera_id, "cam_c");
    }
}
