//! Message path expressions.
//!
//! A message path names a topic and walks into its messages:
//!
//! ```text
//! /odom.pose.position.x
//! /imu.linear_acceleration.z
//! /joint_states.position[2]
//! /markers.markers[:]{id==3}.pose.position.y
//! "/topic with spaces".data
//! ```
//!
//! Slices are inclusive on both ends and accept negative (from-the-end) indices.

use std::str::FromStr;

use serde_json::Value;

use crate::error::PathParseError;

/// One step of a message path after the topic name.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// `.name`
    Field(String),
    /// `[n]`
    Index(i64),
    /// `[start:end]`, either side optional.
    Slice {
        start: Option<i64>,
        end: Option<i64>,
    },
    /// `{a.b==value}`
    Filter {
        path: Vec<String>,
        value: FilterValue,
    },
}

/// Right-hand side of a filter segment.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl FilterValue {
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Number(expected), Value::Number(actual)) => {
                actual.as_f64().is_some_and(|actual| actual == *expected)
            }
            (Self::Bool(expected), Value::Bool(actual)) => expected == actual,
            (Self::Text(expected), Value::String(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// A parsed message path.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePath {
    /// Topic the path reads from.
    pub topic_name: String,
    /// Steps applied to each message on the topic.
    pub segments: Vec<PathSegment>,
    source: String,
}

/// A value reached by resolving a path against one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue<'a> {
    /// The value at the end of the path.
    pub value: &'a Value,
    /// Concrete path to the value, with slices expanded to indices.
    pub path: String,
}

impl MessagePath {
    /// Parse a message path expression.
    pub fn parse(text: &str) -> Result<Self, PathParseError> {
        Parser::new(text).parse()
    }

    /// The text the path was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the path can yield more than one value per message.
    pub fn is_multi_valued(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, PathSegment::Slice { .. }))
    }

    /// Resolve the path against a message payload.
    ///
    /// Steps that do not match the message shape drop that branch, so an
    /// unresolvable path yields an empty result rather than an error.
    pub fn resolve<'a>(&self, message: &'a Value) -> Vec<ResolvedValue<'a>> {
        let mut nodes = vec![ResolvedValue {
            value: message,
            path: self.topic_name.clone(),
        }];
        for segment in &self.segments {
            let mut next = Vec::with_capacity(nodes.len());
            for node in nodes {
                match segment {
                    PathSegment::Field(name) => {
                        if let Some(child) = node.value.get(name.as_str()) {
                            next.push(ResolvedValue {
                                value: child,
                                path: format!("{}.{}", node.path, name),
                            });
                        }
                    }
                    PathSegment::Index(index) => {
                        let Some(items) = node.value.as_array() else {
                            continue;
                        };
                        if let Some(index) = normalize_index(*index, items.len()) {
                            next.push(ResolvedValue {
                                value: &items[index],
                                path: format!("{}[{}]", node.path, index),
                            });
                        }
                    }
                    PathSegment::Slice { start, end } => {
                        let Some(items) = node.value.as_array() else {
                            continue;
                        };
                        let len = items.len() as i64;
                        let start = start.map_or(0, |start| from_end(start, len).max(0));
                        if start >= len {
                            continue;
                        }
                        let end = end.map_or(len - 1, |end| from_end(end, len).min(len - 1));
                        if start > end {
                            continue;
                        }
                        for index in start..=end {
                            let index = index as usize;
                            next.push(ResolvedValue {
                                value: &items[index],
                                path: format!("{}[{}]", node.path, index),
                            });
                        }
                    }
                    PathSegment::Filter { path, value } => {
                        let target = path
                            .iter()
                            .try_fold(node.value, |current, name| current.get(name.as_str()));
                        if target.is_some_and(|target| value.matches(target)) {
                            next.push(node);
                        }
                    }
                }
            }
            nodes = next;
            if nodes.is_empty() {
                break;
            }
        }
        nodes
    }
}

impl FromStr for MessagePath {
    type Err = PathParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl std::fmt::Display for MessagePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn from_end(index: i64, len: i64) -> i64 {
    if index < 0 { len.saturating_add(index) } else { index }
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let text = text.trim();
        Self {
            text,
            chars: text.char_indices().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<MessagePath, PathParseError> {
        if self.text.is_empty() {
            return Err(PathParseError::Empty);
        }
        let topic_name = self.topic()?;
        let mut segments = Vec::new();
        while let Some(ch) = self.peek() {
            match ch {
                '.' => {
                    self.pos += 1;
                    segments.push(PathSegment::Field(self.identifier()?));
                }
                '[' => {
                    self.pos += 1;
                    segments.push(self.bracket()?);
                }
                '{' => {
                    self.pos += 1;
                    segments.push(self.filter()?);
                }
                other => return Err(self.unexpected(other)),
            }
        }
        Ok(MessagePath {
            topic_name,
            segments,
            source: self.text.to_string(),
        })
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, ch)| *ch)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.text.len(), |(offset, _)| *offset)
    }

    fn unexpected(&self, found: char) -> PathParseError {
        PathParseError::Unexpected {
            path: self.text.to_string(),
            offset: self.offset(),
            found,
        }
    }

    fn unterminated(&self, what: &'static str) -> PathParseError {
        PathParseError::Unterminated {
            path: self.text.to_string(),
            what,
        }
    }

    fn invalid(&self, what: &'static str, text: &str) -> PathParseError {
        PathParseError::Invalid {
            path: self.text.to_string(),
            what,
            text: text.to_string(),
        }
    }

    fn take_until(&mut self, stop: impl Fn(char) -> bool) -> &'a str {
        let text = self.text;
        let start = self.offset();
        while let Some(ch) = self.peek() {
            if stop(ch) {
                break;
            }
            self.pos += 1;
        }
        &text[start..self.offset()]
    }

    fn topic(&mut self) -> Result<String, PathParseError> {
        match self.peek() {
            Some('"') => {
                self.pos += 1;
                let topic = self.take_until(|ch| ch == '"');
                if self.peek() != Some('"') {
                    return Err(self.unterminated("quoted topic"));
                }
                self.pos += 1;
                if topic.is_empty() {
                    return Err(PathParseError::MissingTopic(self.text.to_string()));
                }
                Ok(topic.to_string())
            }
            Some('/') => {
                let topic = self.take_until(|ch| matches!(ch, '.' | '[' | '{'));
                if topic.chars().any(char::is_whitespace) {
                    return Err(self.invalid("topic name", topic));
                }
                Ok(topic.to_string())
            }
            _ => Err(PathParseError::MissingTopic(self.text.to_string())),
        }
    }

    fn identifier(&mut self) -> Result<String, PathParseError> {
        let name = self.take_until(|ch| !(ch.is_ascii_alphanumeric() || ch == '_'));
        if name.is_empty() {
            return match self.peek() {
                Some(ch) => Err(self.unexpected(ch)),
                None => Err(self.unterminated("field name")),
            };
        }
        Ok(name.to_string())
    }

    fn bracket(&mut self) -> Result<PathSegment, PathParseError> {
        let body = self.take_until(|ch| ch == ']');
        if self.peek() != Some(']') {
            return Err(self.unterminated("index"));
        }
        self.pos += 1;
        let body = body.trim();
        match body.split_once(':') {
            Some((start, end)) => Ok(PathSegment::Slice {
                start: self.optional_int(start)?,
                end: self.optional_int(end)?,
            }),
            None => {
                let index = body
                    .parse::<i64>()
                    .map_err(|_| self.invalid("index", body))?;
                Ok(PathSegment::Index(index))
            }
        }
    }

    fn optional_int(&self, text: &str) -> Result<Option<i64>, PathParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<i64>()
            .map(Some)
            .map_err(|_| self.invalid("slice bound", text))
    }

    fn filter(&mut self) -> Result<PathSegment, PathParseError> {
        let body = self.take_until(|ch| ch == '}');
        if self.peek() != Some('}') {
            return Err(self.unterminated("filter"));
        }
        self.pos += 1;
        let Some((lhs, rhs)) = body.split_once("==") else {
            return Err(self.invalid("filter", body));
        };
        let path: Vec<String> = lhs.trim().split('.').map(str::to_string).collect();
        if path.iter().any(|name| {
            name.is_empty() || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }) {
            return Err(self.invalid("filter field", lhs.trim()));
        }
        let rhs = rhs.trim();
        let value = if let Some(text) = strip_quotes(rhs) {
            FilterValue::Text(text.to_string())
        } else if rhs == "true" || rhs == "false" {
            FilterValue::Bool(rhs == "true")
        } else {
            rhs.parse::<f64>()
                .map(FilterValue::Number)
                .map_err(|_| self.invalid("filter value", rhs))?
        };
        Ok(PathSegment::Filter { path, value })
    }
}

fn strip_quotes(text: &str) -> Option<&str> {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| text.strip_prefix(quote)?.strip_suffix(quote))
}
