//! `send-message`: replays matching outgoing messages as they were sent.
use super::{default_direction, Trigger};
use crate::action::{parse_settings, Action, ActionFactory, ScriptBlock};
use crate::message::{Direction, Message};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NAME: &str = "send-message";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SendMessageSettings {
    #[serde(default = "default_direction")]
    pub direction: Direction,
    /// Empty means every session.
    #[serde(default)]
    pub session_aliases: Vec<String>,
    /// Full-match regular expressions. Empty means every type.
    #[serde(default)]
    pub message_types: Vec<String>,
}

impl Default for SendMessageSettings {
    fn default() -> Self {
        Self {
            direction: default_direction(),
            session_aliases: Vec::new(),
            message_types: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SendMessageFactory {
    trigger: Trigger,
}

pub fn factory() -> Box<dyn ActionFactory> {
    Box::new(SendMessageFactory::default())
}

impl ActionFactory for SendMessageFactory {
    fn name(&self) -> &'static str {
        NAME
    }

    fn default_settings(&self) -> Value {
        serde_json::to_value(SendMessageSettings::default()).unwrap_or(Value::Null)
    }

    fn init(&mut self, settings: Value) -> Result<()> {
        let settings: SendMessageSettings = parse_settings(settings)?;
        self.trigger = Trigger::new(
            settings.direction,
            &settings.session_aliases,
            &settings.message_types,
        )?;
        Ok(())
    }

    fn from_message(&self, message: &Message) -> Option<Box<dyn Action>> {
        if !self.trigger.matches(message) {
            return None;
        }
        Some(Box::new(SendMessage {
            message: message.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct SendMessage {
    message: Message,
}

impl Action for SendMessage {
    fn update(&mut self, _message: &Message) -> Result<bool> {
        Ok(false)
    }

    fn complete(self: Box<Self>) -> Result<Vec<ScriptBlock>> {
        let uid = self.message.log_id();
        let block = ScriptBlock::new(self.message.timestamp())
            .resource(&uid, &self.message)
            .text(format!("    send_message(\"{uid}\", report_id)\n"));
        Ok(vec![block])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Fragment;
    use crate::message::test_support::message;
    use serde_json::json;

    #[test]
    fn default_settings_round_trip_through_init() {
        let mut factory = SendMessageFactory::default();
        let defaults = factory.default_settings();
        assert_eq!(
            defaults,
            json!({ "direction": "SECOND", "session-aliases": [], "message-types": [] })
        );
        factory.init(defaults).expect("init with defaults");
    }

    #[test]
    fn matching_message_completes_into_send_block() {
        let mut factory = SendMessageFactory::default();
        factory
            .init(json!({ "message-types": ["NewOrderSingle"] }))
            .expect("init");
        let msg = message("fix", "NewOrderSingle", json!({ "Price": "10" }));

        let mut action = factory.from_message(&msg).expect("action created");
        assert!(!action.update(&msg).expect("update"));
        let blocks = action.complete().expect("complete");

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].timestamp, msg.timestamp());
        assert_eq!(
            blocks[0].fragments,
            vec![
                Fragment::Resource {
                    uid: "session.SECOND.1".to_string(),
                    message: msg.clone(),
                },
                Fragment::Text("    send_message(\"session.SECOND.1\", report_id)\n".to_string()),
            ]
        );
    }

    #[test]
    fn other_types_are_ignored() {
        let mut factory = SendMessageFactory::default();
        factory
            .init(json!({ "message-types": ["NewOrderSingle"] }))
            .expect("init");
        let msg = message("fix", "Heartbeat", json!({}));
        assert!(factory.from_message(&msg).is_none());
    }

    #[test]
    fn unknown_setting_is_rejected() {
        let mut factory = SendMessageFactory::default();
        assert!(factory.init(json!({ "types": [] })).is_err());
    }
}
