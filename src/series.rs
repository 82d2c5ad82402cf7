//! Series configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::PlotConfig;
use crate::math::MathFunction;
use crate::path::MessagePath;

/// Stable identifier of a configured series.
///
/// Keys are derived from the settings entry, so re-applying the same settings
/// yields the same keys and per-series state (block cursors, buffers) survives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey(Arc<str>);

impl SeriesKey {
    /// Create a key from any string.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Access the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which timestamp positions a sample on the X axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimestampMethod {
    /// Time the player received the message.
    #[default]
    ReceiveTime,
    /// The message's own `header.stamp`.
    HeaderStamp,
}

impl TimestampMethod {
    fn name(self) -> &'static str {
        match self {
            Self::ReceiveTime => "receiveTime",
            Self::HeaderStamp => "headerStamp",
        }
    }
}

/// Normalized description of one plotted series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    /// Identifier shared with the dataset accumulator.
    pub key: SeriesKey,
    /// Position of the series in the settings list.
    pub index: usize,
    /// Legend label.
    pub label: String,
    /// Parsed Y path.
    pub parsed_path: MessagePath,
    /// Timestamp used for X in the timestamp modes.
    pub timestamp_method: TimestampMethod,
    /// Optional Y transform.
    pub math: Option<MathFunction>,
}

impl SeriesConfig {
    /// Create a series config with a derived key.
    pub fn new(index: usize, parsed_path: MessagePath, timestamp_method: TimestampMethod) -> Self {
        Self {
            key: series_key(index, timestamp_method, parsed_path.as_str()),
            index,
            label: parsed_path.as_str().to_string(),
            parsed_path,
            timestamp_method,
            math: None,
        }
    }

    /// Set the math modifier.
    pub fn with_math(mut self, math: MathFunction) -> Self {
        self.math = Some(math);
        self
    }

    /// Topic the series reads from.
    pub fn topic(&self) -> &str {
        &self.parsed_path.topic_name
    }
}

/// Derive the key for a settings entry.
pub fn series_key(index: usize, method: TimestampMethod, path: &str) -> SeriesKey {
    SeriesKey::new(format!("{index}:{}:{path}", method.name()))
}

/// Build series configs from settings.
///
/// Disabled entries are left out. Entries whose path does not parse or whose
/// math modifier is unknown are skipped with a warning; they never fail the
/// whole plot.
pub fn build_series_configs(config: &PlotConfig) -> Vec<SeriesConfig> {
    let mut series = Vec::with_capacity(config.paths.len());
    for (index, path) in config.paths.iter().enumerate() {
        if !path.enabled {
            continue;
        }
        let parsed_path = match MessagePath::parse(&path.value) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(
                    index,
                    path = %path.value,
                    error = %err,
                    "skipping series with invalid path"
                );
                continue;
            }
        };
        let math = match path.math_modifier.as_deref().filter(|name| !name.is_empty()) {
            None => None,
            Some(name) => match name.parse::<MathFunction>() {
                Ok(function) => Some(function),
                Err(err) => {
                    tracing::warn!(
                        index,
                        path = %path.value,
                        error = %err,
                        "skipping series with unknown math modifier"
                    );
                    continue;
                }
            },
        };
        let mut entry = SeriesConfig::new(index, parsed_path, path.timestamp_method);
        entry.math = math;
        if let Some(label) = path.label.as_ref().filter(|label| !label.is_empty()) {
            entry.label = label.clone();
        }
        series.push(entry);
    }
    series
}
