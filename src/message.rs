//! Message events and player snapshots consumed by the pipeline.
//!
//! These are the upstream inputs: live frames arrive inside [`PlayerState`],
//! preloaded history arrives as a slice of [`MessageBlock`]s.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::time::Time;

/// A single deserialized message on a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Topic the message was received on.
    pub topic: String,
    /// Time the player received the message.
    pub receive_time: Time,
    /// Decoded message payload.
    pub message: Value,
    /// Approximate encoded size.
    pub size_in_bytes: usize,
}

impl MessageEvent {
    /// Create a message event.
    pub fn new(topic: impl Into<String>, receive_time: Time, message: Value) -> Self {
        Self {
            topic: topic.into(),
            receive_time,
            message,
            size_in_bytes: 0,
        }
    }

    /// The `header.stamp` of the message, when it carries one.
    pub fn header_stamp(&self) -> Option<Time> {
        Time::from_value(self.message.get("header")?.get("stamp")?)
    }
}

/// A chunk of preloaded messages, grouped by topic.
///
/// The per-topic arrays are shared: a data source that merely appends new blocks
/// keeps handing out the same `Arc`s for blocks it already delivered.
#[derive(Debug, Clone, Default)]
pub struct MessageBlock {
    /// Messages per topic, in receive order.
    pub messages_by_topic: HashMap<String, Arc<[MessageEvent]>>,
    /// Total encoded size of the block.
    pub size_in_bytes: u64,
}

impl MessageBlock {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add messages for a topic.
    pub fn with_topic(
        mut self,
        topic: impl Into<String>,
        messages: impl Into<Arc<[MessageEvent]>>,
    ) -> Self {
        let messages = messages.into();
        self.size_in_bytes += messages
            .iter()
            .map(|event| event.size_in_bytes as u64)
            .sum::<u64>();
        self.messages_by_topic.insert(topic.into(), messages);
        self
    }

    /// Messages for one topic.
    pub fn topic(&self, topic: &str) -> Option<&Arc<[MessageEvent]>> {
        self.messages_by_topic.get(topic)
    }
}

/// Preloaded block sequence; `None` marks a block that has not loaded yet.
pub type Blocks = [Option<Arc<MessageBlock>>];

/// The data-carrying part of a player snapshot.
#[derive(Debug, Clone, Default)]
pub struct ActiveData {
    /// Messages delivered since the previous snapshot.
    pub messages: Vec<MessageEvent>,
    /// Start of the data source.
    pub start_time: Time,
    /// End of the data source.
    pub end_time: Time,
    /// Current playback position.
    pub current_time: Time,
    /// Changes whenever playback jumps discontinuously.
    pub last_seek_time: u64,
}

/// A snapshot of the player pushed on every frame.
#[derive(Debug, Clone, Default)]
pub struct PlayerState {
    /// Absent while the data source is still initializing.
    pub active_data: Option<ActiveData>,
}

impl PlayerState {
    /// Snapshot with active data.
    pub fn active(active_data: ActiveData) -> Self {
        Self {
            active_data: Some(active_data),
        }
    }
}
