//! Generator configuration.
//!
//! One JSON document holds the transformation rules, the session alias map
//! and the settings document of each action. Commands are parsed and checked
//! while the document is deserialized; [`validate_config`] covers the rules
//! that span entries.
use crate::action::ActionRegistry;
use crate::transform::{MessageTransformer, RuleSet};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Configuration {
    /// Commands by protocol, then message type.
    #[serde(default)]
    pub transform: RuleSet,
    /// Original session alias to the alias used in the script.
    #[serde(default, alias = "sessionAliases")]
    pub session_aliases: BTreeMap<String, String>,
    /// Settings documents keyed by action name.
    #[serde(default)]
    pub actions: BTreeMap<String, Value>,
}

impl Configuration {
    pub fn transformer(&self) -> MessageTransformer {
        MessageTransformer::new(self.transform.clone(), self.session_aliases.clone())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Empty transformation for {protocol} message: {message_type}")]
    EmptyTransformation {
        protocol: String,
        message_type: String,
    },
    #[error("empty protocol name in transform rules")]
    EmptyProtocol,
    #[error("empty message type in {0} transform rules")]
    EmptyMessageType(String),
    #[error("empty session alias in session-aliases (mapping '{from}' -> '{to}')")]
    EmptySessionAlias { from: String, to: String },
}

/// Load the configuration at `path`, or the empty configuration when no
/// path is given or the file holds only whitespace.
pub fn load_config(path: Option<&Path>) -> Result<Configuration> {
    let Some(path) = path else {
        tracing::info!("no configuration file, using defaults");
        return Ok(Configuration::default());
    };
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        tracing::info!(path = %path.display(), "configuration file is empty, using defaults");
        return Ok(Configuration::default());
    }
    let config: Configuration = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config {}", path.display()))?;
    validate_config(&config).with_context(|| format!("invalid config {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        protocols = config.transform.len(),
        session_aliases = config.session_aliases.len(),
        actions = config.actions.len(),
        "loaded configuration"
    );
    Ok(config)
}

pub fn validate_config(config: &Configuration) -> Result<(), ConfigError> {
    for (protocol, types) in &config.transform {
        if protocol.trim().is_empty() {
            return Err(ConfigError::EmptyProtocol);
        }
        for (message_type, commands) in types {
            if message_type.trim().is_empty() {
                return Err(ConfigError::EmptyMessageType(protocol.clone()));
            }
            if commands.is_empty() {
                return Err(ConfigError::EmptyTransformation {
                    protocol: protocol.clone(),
                    message_type: message_type.clone(),
                });
            }
        }
    }
    for (from, to) in &config.session_aliases {
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(ConfigError::EmptySessionAlias {
                from: from.clone(),
                to: to.clone(),
            });
        }
    }
    Ok(())
}

/// Render a pretty JSON config stub listing every registered action with
/// its default settings.
pub fn config_stub(registry: &ActionRegistry) -> Result<String> {
    let config = Configuration {
        actions: registry.default_settings(),
        ..Configuration::default()
    };
    serde_json::to_string_pretty(&config).context("serialize config stub")
}
