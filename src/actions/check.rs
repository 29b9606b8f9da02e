//! `check-response`: replays a request and verifies the response that
//! followed it on the same session.
use super::{compile_patterns, default_direction, matches_any, Trigger};
use crate::action::{parse_settings, Action, ActionFactory, ScriptBlock};
use crate::message::{Direction, Message};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NAME: &str = "check-response";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CheckResponseSettings {
    #[serde(default = "default_direction")]
    pub direction: Direction,
    #[serde(default)]
    pub session_aliases: Vec<String>,
    #[serde(default)]
    pub message_types: Vec<String>,
    /// Types accepted as the response. The action is inactive while empty.
    #[serde(default)]
    pub response_types: Vec<String>,
    /// Seconds to wait before checking the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl Default for CheckResponseSettings {
    fn default() -> Self {
        Self {
            direction: default_direction(),
            session_aliases: Vec::new(),
            message_types: Vec::new(),
            response_types: Vec::new(),
            timeout: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct CheckResponseFactory {
    trigger: Trigger,
    response_types: Vec<Regex>,
    timeout: Option<f64>,
}

pub fn factory() -> Box<dyn ActionFactory> {
    Box::new(CheckResponseFactory::default())
}

impl ActionFactory for CheckResponseFactory {
    fn name(&self) -> &'static str {
        NAME
    }

    fn default_settings(&self) -> Value {
        serde_json::to_value(CheckResponseSettings::default()).unwrap_or(Value::Null)
    }

    fn init(&mut self, settings: Value) -> Result<()> {
        let settings: CheckResponseSettings = parse_settings(settings)?;
        if let Some(timeout) = settings.timeout {
            anyhow::ensure!(
                timeout.is_finite() && timeout >= 0.0,
                "timeout must be a non-negative number of seconds, got {timeout}"
            );
        }
        self.trigger = Trigger::new(
            settings.direction,
            &settings.session_aliases,
            &settings.message_types,
        )?;
        self.response_types = compile_patterns(&settings.response_types)?;
        self.timeout = settings.timeout;
        Ok(())
    }

    fn from_message(&self, message: &Message) -> Option<Box<dyn Action>> {
        if self.response_types.is_empty() || !self.trigger.matches(message) {
            return None;
        }
        Some(Box::new(CheckResponse {
            request: message.clone(),
            response: None,
            response_types: self.response_types.clone(),
            timeout: self.timeout,
        }))
    }
}

#[derive(Debug)]
pub struct CheckResponse {
    request: Message,
    response: Option<Message>,
    response_types: Vec<Regex>,
    timeout: Option<f64>,
}

impl CheckResponse {
    fn is_response(&self, message: &Message) -> bool {
        message.session_alias() == self.request.session_alias()
            && message.direction() == self.request.direction().opposite()
            && matches_any(&self.response_types, message.message_type())
    }
}

impl Action for CheckResponse {
    fn update(&mut self, message: &Message) -> Result<bool> {
        if self.response.is_some() || !self.is_response(message) {
            return Ok(false);
        }
        tracing::debug!(
            request = %self.request.log_id(),
            response = %message.log_id(),
            "response matched"
        );
        self.response = Some(message.clone());
        Ok(true)
    }

    fn complete(self: Box<Self>) -> Result<Vec<ScriptBlock>> {
        let request_uid = self.request.log_id();
        let mut block = ScriptBlock::new(self.request.timestamp())
            .resource(&request_uid, &self.request)
            .text(format!("    send_message(\"{request_uid}\", report_id)\n"));

        match &self.response {
            Some(response) => {
                let response_uid = response.log_id();
                if let Some(timeout) = self.timeout {
                    block = block
                        .import("time")
                        .text(format!("    time.sleep({timeout})\n"));
                }
                block = block
                    .resource(&response_uid, response)
                    .text(format!("    check_response(\"{response_uid}\", report_id)\n"));
            }
            None => {
                tracing::warn!(request = %request_uid, "no response received");
                block = block.text(format!(
                    "    # check_response: no response received for \"{request_uid}\"\n"
                ));
            }
        }
        Ok(vec![block])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Fragment;
    use crate::message::test_support::message;
    use serde_json::json;

    fn factory_with(settings: Value) -> CheckResponseFactory {
        let mut factory = CheckResponseFactory::default();
        factory.init(settings).expect("init");
        factory
    }

    fn response(message_type: &str, sequence: i64) -> Message {
        let mut msg = message("fix", message_type, json!({}));
        msg.metadata.direction = Direction::First;
        msg.metadata.sequence = sequence;
        msg
    }

    fn texts(block: &ScriptBlock) -> Vec<&str> {
        block
            .fragments
            .iter()
            .filter_map(|fragment| match fragment {
                Fragment::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn inactive_without_response_types() {
        let factory = factory_with(CheckResponseFactory::default().default_settings());
        let msg = message("fix", "NewOrderSingle", json!({}));
        assert!(factory.from_message(&msg).is_none());
    }

    #[test]
    fn first_matching_response_is_checked() {
        let factory = factory_with(json!({
            "message-types": ["NewOrderSingle"],
            "response-types": ["ExecutionReport"],
            "timeout": 1.5
        }));
        let request = message("fix", "NewOrderSingle", json!({}));
        let mut action = factory.from_message(&request).expect("action");

        assert!(!action.update(&request).expect("own request"));
        assert!(!action.update(&response("Heartbeat", 2)).expect("other type"));
        assert!(action.update(&response("ExecutionReport", 3)).expect("response"));
        assert!(!action.update(&response("ExecutionReport", 4)).expect("second response"));

        let blocks = action.complete().expect("complete");
        assert_eq!(
            texts(&blocks[0]),
            vec![
                "    send_message(\"session.SECOND.1\", report_id)\n",
                "    time.sleep(1.5)\n",
                "    check_response(\"session.FIRST.3\", report_id)\n",
            ]
        );
        assert!(blocks[0]
            .fragments
            .contains(&Fragment::Import("time".to_string())));
    }

    #[test]
    fn other_session_is_not_a_response() {
        let factory = factory_with(json!({ "response-types": [".*"] }));
        let request = message("fix", "NewOrderSingle", json!({}));
        let mut action = factory.from_message(&request).expect("action");
        let mut other = response("ExecutionReport", 2);
        other.metadata.session_alias = "elsewhere".to_string();
        assert!(!action.update(&other).expect("update"));
    }

    #[test]
    fn missing_response_completes_into_placeholder() {
        let factory = factory_with(json!({ "response-types": ["ExecutionReport"] }));
        let request = message("fix", "NewOrderSingle", json!({}));
        let action = factory.from_message(&request).expect("action");
        let blocks = action.complete().expect("complete");
        assert_eq!(
            texts(&blocks[0]),
            vec![
                "    send_message(\"session.SECOND.1\", report_id)\n",
                "    # check_response: no response received for \"session.SECOND.1\"\n",
            ]
        );
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let mut factory = CheckResponseFactory::default();
        assert!(factory
            .init(json!({ "response-types": ["A"], "timeout": -1.0 }))
            .is_err());
    }
}
