use std::collections::VecDeque;

use super::types::SpecialEvent;

/// FIFO of local events waiting for the next send.
///
/// Every event is reliable, so the queue grows instead of evicting.
/// `capacity` is only the preallocation.
#[derive(Debug)]
pub struct EventQueue {
    pending: VecDeque<SpecialEvent>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: SpecialEvent) {
        if self.pending.len() == self.capacity {
            log::debug!("event queue grew past {} pending events", self.capacity);
        }
        self.pending.push_back(event);
    }

    pub fn pop(&mut self) -> Option<SpecialEvent> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
