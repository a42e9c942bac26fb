//! Bounded per-channel message ring

use corvid_core::{Message, PartialMessage, Snowflake};
use std::collections::VecDeque;

/// Recent messages of one channel, oldest first
///
/// Holds at most `capacity` messages; pushing into a full ring evicts the
/// oldest.
#[derive(Debug, Clone)]
pub struct MessageRing {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl MessageRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append a message, returning the evicted one if the ring was full
    pub fn push(&mut self, message: Message) -> Option<Message> {
        if self.capacity == 0 {
            return Some(message);
        }
        let evicted = if self.messages.len() >= self.capacity {
            self.messages.pop_front()
        } else {
            None
        };
        self.messages.push_back(message);
        evicted
    }

    pub fn get(&self, id: Snowflake) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Apply an edit in place, returning the message as it was before
    pub fn update(&mut self, update: &PartialMessage) -> Option<Message> {
        let message = self.messages.iter_mut().find(|m| m.id == update.id)?;
        let before = message.clone();
        message.apply_update(update);
        Some(before)
    }

    pub fn remove(&mut self, id: Snowflake) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        self.messages.remove(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}
