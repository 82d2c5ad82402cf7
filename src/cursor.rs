//! Per-topic cursor over preloaded message blocks.

use std::sync::Arc;

use crate::message::{Blocks, MessageEvent};

/// Tracks how far a series has consumed the preloaded blocks of its topic.
///
/// The cursor remembers the per-topic arrays of the first and the most recently
/// consumed block. Data sources that only append blocks keep those arrays
/// pointer-identical, so a changed identity or a shorter block sequence means
/// the history was replaced and previously accumulated data is stale.
#[derive(Debug, Clone)]
pub struct BlockTopicCursor {
    topic: String,
    next_block_index: usize,
    first_block: Option<Arc<[MessageEvent]>>,
    last_block: Option<Arc<[MessageEvent]>>,
}

impl BlockTopicCursor {
    /// Create a cursor positioned before the first block.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            next_block_index: 0,
            first_block: None,
            last_block: None,
        }
    }

    /// Topic the cursor reads.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Index of the next block to consume.
    pub fn position(&self) -> usize {
        self.next_block_index
    }

    /// Whether consuming from `blocks` must discard what was consumed before.
    pub fn next_will_reset(&self, blocks: &Blocks) -> bool {
        if self.next_block_index == 0 {
            return false;
        }
        if blocks.len() < self.next_block_index {
            return true;
        }
        let first = self.topic_block(blocks, 0);
        let last = self.topic_block(blocks, self.next_block_index - 1);
        !(same_block(self.first_block.as_ref(), first)
            && same_block(self.last_block.as_ref(), last))
    }

    /// Advance one block.
    ///
    /// Returns the messages of the next block, or `None` when the next block is
    /// not loaded yet (or the sequence is exhausted). A replaced sequence
    /// restarts the cursor from the first block.
    pub fn next(&mut self, blocks: &Blocks) -> Option<Arc<[MessageEvent]>> {
        if self.next_will_reset(blocks) {
            tracing::trace!(topic = %self.topic, "block sequence replaced, restarting cursor");
            self.reset();
        }
        let events = self.topic_block(blocks, self.next_block_index)?.clone();
        if self.next_block_index == 0 {
            self.first_block = Some(Arc::clone(&events));
        }
        self.last_block = Some(Arc::clone(&events));
        self.next_block_index += 1;
        Some(events)
    }

    /// Move back to the first block.
    pub fn reset(&mut self) {
        self.next_block_index = 0;
        self.first_block = None;
        self.last_block = None;
    }

    fn topic_block<'a>(&self, blocks: &'a Blocks, index: usize) -> Option<&'a Arc<[MessageEvent]>> {
        blocks.get(index)?.as_ref()?.topic(&self.topic)
    }
}

fn same_block(
    previous: Option<&Arc<[MessageEvent]>>,
    current: Option<&Arc<[MessageEvent]>>,
) -> bool {
    match (previous, current) {
        (Some(previous), Some(current)) => Arc::ptr_eq(previous, current),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBlock;
    use crate::time::Time;
    use serde_json::json;

    fn block(topic: &str, values: &[i64]) -> Option<Arc<MessageBlock>> {
        let events: Vec<_> = values
            .iter()
            .map(|value| MessageEvent::new(topic, Time::new(*value, 0), json!({ "v": value })))
            .collect();
        Some(Arc::new(MessageBlock::new().with_topic(topic, events)))
    }

    #[test]
    fn walks_loaded_blocks_and_stops_at_gaps() {
        let blocks = vec![block("/a", &[0, 1]), block("/a", &[2]), None, block("/a", &[4])];
        let mut cursor = BlockTopicCursor::new("/a");
        assert_eq!(cursor.next(&blocks).map(|events| events.len()), Some(2));
        assert_eq!(cursor.next(&blocks).map(|events| events.len()), Some(1));
        assert!(cursor.next(&blocks).is_none());
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn missing_topic_in_block_is_not_ready() {
        let blocks = vec![block("/b", &[0])];
        let mut cursor = BlockTopicCursor::new("/a");
        assert!(cursor.next(&blocks).is_none());
        assert!(!cursor.next_will_reset(&blocks));
    }

    #[test]
    fn appended_blocks_do_not_reset() {
        let mut blocks = vec![block("/a", &[0]), block("/a", &[1])];
        let mut cursor = BlockTopicCursor::new("/a");
        assert!(!cursor.next_will_reset(&blocks));
        cursor.next(&blocks);
        cursor.next(&blocks);
        blocks.push(block("/a", &[2]));
        assert!(!cursor.next_will_reset(&blocks));
        assert_eq!(
            cursor.next(&blocks).map(|events| events[0].receive_time),
            Some(Time::new(2, 0))
        );
    }

    #[test]
    fn replaced_or_shrunk_blocks_reset() {
        let blocks = vec![block("/a", &[0]), block("/a", &[1])];
        let mut cursor = BlockTopicCursor::new("/a");
        cursor.next(&blocks);
        cursor.next(&blocks);

        let replaced = vec![block("/a", &[0]), block("/a", &[1])];
        assert!(cursor.next_will_reset(&replaced));

        let shrunk = vec![blocks[0].clone()];
        assert!(cursor.next_will_reset(&shrunk));

        let mut cursor_copy = cursor.clone();
        let events = cursor_copy.next(&replaced).unwrap();
        assert_eq!(events[0].receive_time, Time::new(0, 0));
        assert_eq!(cursor_copy.position(), 1);
    }
}
