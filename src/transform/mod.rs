//! Message transformation driven by the configured rule set.
//!
//! Rules are keyed by protocol and message type. Each matching message is
//! copied into a tree, edited by its command list in declaration order, and
//! rebuilt with its original metadata. Session aliases are remapped for every
//! message, with or without rules.
use crate::message::Message;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod command;
pub mod path;

pub use command::Command;

/// Commands by message type.
pub type MessageTransformations = BTreeMap<String, Vec<Command>>;

/// Commands by protocol, then message type.
pub type RuleSet = BTreeMap<String, MessageTransformations>;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("cannot {operation} at {location}: expected {expected}, found {found}")]
    TypeMismatch {
        operation: &'static str,
        location: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("cannot remove the message root")]
    RootRemoval,
    #[error("message root must stay a mapping after transformation")]
    RootNotMapping,
}

/// Applies the rule set and the session alias map to messages.
#[derive(Debug, Default)]
pub struct MessageTransformer {
    rules: RuleSet,
    session_aliases: BTreeMap<String, String>,
}

impl MessageTransformer {
    pub fn new(rules: RuleSet, session_aliases: BTreeMap<String, String>) -> Self {
        Self {
            rules,
            session_aliases,
        }
    }

    /// Produce the transformed copy of `message`.
    ///
    /// A message without rules and without an alias entry comes back equal
    /// to the input. On error nothing of the partial edit escapes.
    pub fn transform(&self, message: &Message) -> Result<Message, TransformError> {
        let alias = self.session_aliases.get(message.session_alias());
        let commands = self
            .rules
            .get(message.protocol())
            .and_then(|types| types.get(message.message_type()));

        if commands.is_none() && alias.is_none() {
            return Ok(message.clone());
        }
        tracing::info!(message = %message.log_id(), "transforming message");

        let mut transformed = message.clone();
        if let Some(commands) = commands {
            let mut tree = Value::Object(std::mem::take(&mut transformed.fields));
            for command in commands {
                let edited = command.apply(&mut tree)?;
                tracing::debug!(
                    message = %message.log_id(),
                    operation = command.operation().name(),
                    path = %command.operation().path(),
                    edited,
                    "command applied"
                );
            }
            let Value::Object(fields) = tree else {
                return Err(TransformError::RootNotMapping);
            };
            transformed.fields = fields;
        }
        if let Some(alias) = alias {
            tracing::debug!(from = %message.session_alias(), to = %alias, "session alias remapped");
            transformed.metadata.session_alias = alias.clone();
        }
        Ok(transformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::test_support::message;
    use serde_json::json;

    fn rules(protocol: &str, message_type: &str, commands: Value) -> RuleSet {
        let commands: Vec<Command> = serde_json::from_value(commands).expect("parse commands");
        let mut types = MessageTransformations::new();
        types.insert(message_type.to_string(), commands);
        let mut rules = RuleSet::new();
        rules.insert(protocol.to_string(), types);
        rules
    }

    fn aliases(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }

    #[test]
    fn unmatched_message_passes_through_unchanged() {
        let transformer = MessageTransformer::new(
            rules("protoX", "typeY", json!([{ "remove": "$.secret" }])),
            aliases(&[("other", "renamed")]),
        );
        let input = message("protoX", "typeZ", json!({ "secret": 42 }));
        assert_eq!(transformer.transform(&input).expect("transform"), input);
    }

    #[test]
    fn removes_secret_field() {
        let transformer = MessageTransformer::new(
            rules("protoX", "typeY", json!([{ "remove": "$.secret" }])),
            BTreeMap::new(),
        );
        let input = message("protoX", "typeY", json!({ "secret": 42, "keep": 1 }));
        let output = transformer.transform(&input).expect("transform");
        assert_eq!(Value::Object(output.fields), json!({ "keep": 1 }));
        assert_eq!(output.metadata, input.metadata);
        assert_eq!(output.parent_event_id, input.parent_event_id);
    }

    #[test]
    fn copies_value_from_other_field() {
        let transformer = MessageTransformer::new(
            rules(
                "protoX",
                "typeY",
                json!([{ "put": "$", "field": "copy", "value-from": "$.parent" }]),
            ),
            BTreeMap::new(),
        );
        let input = message("protoX", "typeY", json!({ "parent": 7 }));
        let output = transformer.transform(&input).expect("transform");
        assert_eq!(
            serde_json::to_string(&output.fields).unwrap(),
            r#"{"parent":7,"copy":7}"#
        );
    }

    #[test]
    fn later_commands_see_earlier_edits() {
        let transformer = MessageTransformer::new(
            rules(
                "p",
                "t",
                json!([
                    { "put": "$", "field": "list", "value": [] },
                    { "add": "$.list", "value": 1 },
                    { "add": "$.list", "value-from": "$.list[0]" }
                ]),
            ),
            BTreeMap::new(),
        );
        let output = transformer
            .transform(&message("p", "t", json!({})))
            .expect("transform");
        assert_eq!(Value::Object(output.fields), json!({ "list": [1, 1] }));
    }

    #[test]
    fn alias_is_remapped_without_rules() {
        let transformer =
            MessageTransformer::new(RuleSet::new(), aliases(&[("session", "replayed")]));
        let input = message("p", "t", json!({ "a": 1 }));
        let output = transformer.transform(&input).expect("transform");
        assert_eq!(output.session_alias(), "replayed");
        assert_eq!(output.fields, input.fields);
    }

    #[test]
    fn alias_is_remapped_with_rules() {
        let transformer = MessageTransformer::new(
            rules("p", "t", json!([{ "set": "$.a", "value": 2 }])),
            aliases(&[("session", "replayed")]),
        );
        let output = transformer
            .transform(&message("p", "t", json!({ "a": 1 })))
            .expect("transform");
        assert_eq!(output.session_alias(), "replayed");
        assert_eq!(Value::Object(output.fields), json!({ "a": 2 }));
    }

    #[test]
    fn type_mismatch_fails_without_touching_input() {
        let transformer = MessageTransformer::new(
            rules("p", "t", json!([{ "remove": "$.b" }, { "add": "$.a", "value": 1 }])),
            BTreeMap::new(),
        );
        let input = message("p", "t", json!({ "a": "scalar", "b": 1 }));
        let err = transformer.transform(&input).expect_err("add to scalar");
        assert!(matches!(err, TransformError::TypeMismatch { .. }), "{err}");
        assert_eq!(Value::Object(input.fields), json!({ "a": "scalar", "b": 1 }));
    }

    #[test]
    fn replacing_root_with_scalar_is_rejected() {
        let transformer =
            MessageTransformer::new(rules("p", "t", json!([{ "set": "$", "value": 1 }])), BTreeMap::new());
        let err = transformer
            .transform(&message("p", "t", json!({})))
            .expect_err("root must stay a mapping");
        assert!(matches!(err, TransformError::RootNotMapping));
    }
}
