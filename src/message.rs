//! Replay message model.
//!
//! A message is routing metadata plus a field tree. The tree is a
//! `serde_json::Value` built with `preserve_order`, so mappings keep their
//! insertion order when the message is written back out.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Field tree of a message.
pub type Fields = Map<String, Value>;

/// Which side of the session produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Received by the system under test's counterpart.
    #[default]
    First,
    /// Sent to the system under test.
    Second,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::First => Direction::Second,
            Direction::Second => Direction::First,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::First => "FIRST",
            Direction::Second => "SECOND",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing and identity metadata carried next to the field tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub protocol: String,
    pub message_type: String,
    pub session_alias: String,
    pub direction: Direction,
    pub sequence: i64,
    pub subsequence: Vec<u32>,
    pub timestamp: DateTime<Utc>,
    /// Free-form string properties attached by the producer.
    pub properties: BTreeMap<String, String>,
}

/// One replayed protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub metadata: Metadata,
    /// Opaque id of the event the message was attached to, if any.
    pub parent_event_id: Option<String>,
    pub fields: Fields,
}

impl Message {
    /// Stable identifier used in logs and resource names:
    /// `alias.direction.sequence[.subsequence...]`.
    pub fn log_id(&self) -> String {
        let meta = &self.metadata;
        let mut id = format!("{}.{}.{}", meta.session_alias, meta.direction, meta.sequence);
        for sub in &meta.subsequence {
            id.push('.');
            id.push_str(&sub.to_string());
        }
        id
    }

    pub fn protocol(&self) -> &str {
        &self.metadata.protocol
    }

    pub fn message_type(&self) -> &str {
        &self.metadata.message_type
    }

    pub fn session_alias(&self) -> &str {
        &self.metadata.session_alias
    }

    pub fn direction(&self) -> Direction {
        self.metadata.direction
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.metadata.timestamp
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::message;
    use super::*;
    use serde_json::json;

    #[test]
    fn log_id_includes_subsequence() {
        let mut msg = message("fix", "NewOrderSingle", json!({}));
        msg.metadata.sequence = 42;
        msg.metadata.subsequence = vec![1, 3];
        assert_eq!(msg.log_id(), "session.SECOND.42.1.3");
    }

    #[test]
    fn direction_opposite_flips() {
        assert_eq!(Direction::First.opposite(), Direction::Second);
        assert_eq!(Direction::Second.opposite(), Direction::First);
    }
}
