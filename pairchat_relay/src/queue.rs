// FIFO of endpoints waiting for a partner.
//
// An id appears at most once. `enqueue` on an id that is already waiting is a
// no-op, which absorbs clients that send `queue-join` twice. Pairing always
// consumes the two longest-waiting ids.

use std::collections::VecDeque;

use pairchat_protocol::EndpointId;

#[derive(Debug, Default)]
pub struct WaitQueue {
    waiting: VecDeque<EndpointId>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` at the tail unless it is already waiting. Returns whether
    /// an append happened.
    pub fn enqueue(&mut self, id: EndpointId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.waiting.push_back(id);
        true
    }

    /// Put `id` back at the head, ahead of everyone else. No-op if it is
    /// already waiting.
    pub fn push_front(&mut self, id: EndpointId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.waiting.push_front(id);
        true
    }

    pub fn dequeue_front(&mut self) -> Option<EndpointId> {
        self.waiting.pop_front()
    }

    /// Take the two longest-waiting ids in one step. Leaves the queue
    /// untouched when fewer than two are waiting.
    pub fn pop_pair(&mut self) -> Option<(EndpointId, EndpointId)> {
        if self.waiting.len() < 2 {
            return None;
        }
        let first = self.waiting.pop_front()?;
        let second = self.waiting.pop_front()?;
        Some((first, second))
    }

    /// Remove `id` wherever it sits. Returns whether it was waiting.
    pub fn remove(&mut self, id: EndpointId) -> bool {
        match self.waiting.iter().position(|&queued| queued == id) {
            Some(index) => {
                self.waiting.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: EndpointId) -> bool {
        self.waiting.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Waiting ids, longest-waiting first.
    pub fn iter(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.waiting.iter().copied()
    }
}
