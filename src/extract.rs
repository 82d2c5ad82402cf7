//! Sample extraction: message events to chart-ready samples.

use serde_json::Value;

use crate::geom::Point;
use crate::math::MathFunction;
use crate::message::MessageEvent;
use crate::path::MessagePath;
use crate::series::TimestampMethod;
use crate::time::Time;

/// One chart-ready sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    /// X position (seconds since start in the timestamp modes).
    pub x: f64,
    /// Y position, with any math modifier applied.
    pub y: f64,
    /// Receive time of the source message.
    pub receive_time: Time,
    /// Header stamp of the source message, when present.
    pub header_stamp: Option<Time>,
    /// The raw resolved value, or the modified number when a math modifier is set.
    pub value: Value,
}

impl Datum {
    /// The X/Y position.
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Coerce a resolved value into a plottable number.
///
/// Numbers plot as-is, booleans as 0/1, numeric strings by parsing, and
/// `{sec, nsec}` objects as seconds. Everything else is not plottable.
pub fn chart_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Object(_) => Time::from_value(value).map(Time::to_seconds),
        Value::Null | Value::Array(_) => None,
    }
}

/// A resolved, plottable value of one message.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedSample {
    pub(crate) y: f64,
    pub(crate) value: Value,
}

/// Resolve `path` against one event and keep the plottable values.
pub(crate) fn resolve_samples(
    event: &MessageEvent,
    path: &MessagePath,
    math: Option<MathFunction>,
) -> Vec<ResolvedSample> {
    path.resolve(&event.message)
        .into_iter()
        .filter_map(|item| {
            let raw = chart_value(item.value)?;
            Some(match math {
                Some(function) => {
                    let y = function.apply(raw);
                    ResolvedSample {
                        y,
                        value: Value::from(y),
                    }
                }
                None => ResolvedSample {
                    y: raw,
                    value: item.value.clone(),
                },
            })
        })
        .collect()
}

/// Extract timestamped samples for one series from a batch of events.
///
/// Only events on the path's topic contribute. With
/// [`TimestampMethod::HeaderStamp`], events without a header stamp are dropped.
pub fn extract_items(
    events: &[MessageEvent],
    path: &MessagePath,
    timestamp_method: TimestampMethod,
    start_time: Time,
    math: Option<MathFunction>,
) -> Vec<Datum> {
    let mut items = Vec::new();
    for event in events {
        if event.topic != path.topic_name {
            continue;
        }
        let header_stamp = event.header_stamp();
        let timestamp = match timestamp_method {
            TimestampMethod::ReceiveTime => event.receive_time,
            TimestampMethod::HeaderStamp => match header_stamp {
                Some(stamp) => stamp,
                None => continue,
            },
        };
        let x = timestamp.seconds_since(start_time);
        for sample in resolve_samples(event, path, math) {
            items.push(Datum {
                x,
                y: sample.y,
                receive_time: event.receive_time,
                header_stamp,
                value: sample.value,
            });
        }
    }
    items
}

/// Extract samples from one event with X set to the value's position.
pub fn extract_indexed(
    event: &MessageEvent,
    path: &MessagePath,
    math: Option<MathFunction>,
) -> Vec<Datum> {
    let header_stamp = event.header_stamp();
    resolve_samples(event, path, math)
        .into_iter()
        .enumerate()
        .map(|(index, sample)| Datum {
            x: index as f64,
            y: sample.y,
            receive_time: event.receive_time,
            header_stamp,
            value: sample.value,
        })
        .collect()
}

/// Last event on `topic` within a batch.
pub(crate) fn last_event_on<'a>(
    events: &'a [MessageEvent],
    topic: &str,
) -> Option<&'a MessageEvent> {
    events.iter().rev().find(|event| event.topic == topic)
}
