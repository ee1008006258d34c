//! Append-only chat and event log
//!
//! Entries are kept in the order this peer saw them: local actions when they
//! happen, remote messages when they arrive. No logical clock is kept, so two
//! peers can list the same entries in different orders.

use shared::ChatMessage;
use std::slice::Iter;

#[derive(Debug, Default, Clone)]
pub struct ChatLog {
    entries: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only mutator. Returns the entry's position in the log.
    pub fn append(&mut self, message: ChatMessage) -> usize {
        self.entries.push(message);
        self.entries.len() - 1
    }

    /// Entries appended at or after `index`, for incremental display.
    pub fn since(&self, index: usize) -> &[ChatMessage] {
        self.entries.get(index..).unwrap_or(&[])
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.entries.last()
    }

    pub fn iter(&self) -> Iter<'_, ChatMessage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChatLog {
    type Item = &'a ChatMessage;
    type IntoIter = Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
