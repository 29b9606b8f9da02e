//! Actions shipped with the crate.
use crate::action::FactoryConstructor;
use crate::message::{Direction, Message};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;

pub mod check;
pub mod send;

pub const BUILTIN: &[FactoryConstructor] = &[send::factory, check::factory];

pub(crate) fn default_direction() -> Direction {
    Direction::Second
}

/// Compile message type patterns. A pattern must match the whole type name.
pub(crate) fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})$"))
                .with_context(|| format!("invalid message type pattern '{pattern}'"))
        })
        .collect()
}

/// An empty pattern list matches every value.
pub(crate) fn matches_any(patterns: &[Regex], value: &str) -> bool {
    patterns.is_empty() || patterns.iter().any(|pattern| pattern.is_match(value))
}

/// Which messages create a new action.
#[derive(Debug, Clone)]
pub(crate) struct Trigger {
    direction: Direction,
    session_aliases: BTreeSet<String>,
    message_types: Vec<Regex>,
}

impl Trigger {
    pub(crate) fn new(
        direction: Direction,
        session_aliases: &[String],
        message_types: &[String],
    ) -> Result<Self> {
        Ok(Self {
            direction,
            session_aliases: session_aliases.iter().cloned().collect(),
            message_types: compile_patterns(message_types)?,
        })
    }

    pub(crate) fn matches(&self, message: &Message) -> bool {
        message.direction() == self.direction
            && (self.session_aliases.is_empty()
                || self.session_aliases.contains(message.session_alias()))
            && matches_any(&self.message_types, message.message_type())
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self {
            direction: default_direction(),
            session_aliases: BTreeSet::new(),
            message_types: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::test_support::message;
    use serde_json::json;

    #[test]
    fn trigger_filters_direction_alias_and_type() {
        let trigger = Trigger::new(
            Direction::Second,
            &["session".to_string()],
            &["New.*".to_string()],
        )
        .expect("trigger");
        let mut msg = message("fix", "NewOrderSingle", json!({}));
        assert!(trigger.matches(&msg));

        msg.metadata.message_type = "OrderNew".to_string();
        assert!(!trigger.matches(&msg), "pattern must match the whole type");

        msg.metadata.message_type = "NewOrderSingle".to_string();
        msg.metadata.session_alias = "other".to_string();
        assert!(!trigger.matches(&msg));

        msg.metadata.session_alias = "session".to_string();
        msg.metadata.direction = Direction::First;
        assert!(!trigger.matches(&msg));
    }

    #[test]
    fn default_trigger_accepts_every_outgoing_message() {
        let msg = message("fix", "Anything", json!({}));
        assert!(Trigger::default().matches(&msg));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = compile_patterns(&["(".to_string()]).expect_err("bad regex");
        assert_eq!(err.to_string(), "invalid message type pattern '('");
    }
}
