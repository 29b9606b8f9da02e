//! Action plugin contract and the factory registry.
//!
//! An action accumulates state across messages and, once the stream ends,
//! completes into timestamped script blocks. Factories are looked up by name
//! in an injected [`ActionRegistry`] and initialized from their settings
//! document before the first message arrives.
use crate::message::Message;
use crate::script::ScriptContext;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// One piece of script output.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    Import(String),
    Requirement(String),
    Resource { uid: String, message: Message },
}

/// Output of a completed action, ordered by `timestamp` in the final script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptBlock {
    pub timestamp: DateTime<Utc>,
    pub fragments: Vec<Fragment>,
}

impl ScriptBlock {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            fragments: Vec::new(),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Text(text.into()));
        self
    }

    pub fn import(mut self, module: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Import(module.into()));
        self
    }

    #[allow(dead_code)]
    pub fn requirement(mut self, specifier: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Requirement(specifier.into()));
        self
    }

    pub fn resource(mut self, uid: impl Into<String>, message: &Message) -> Self {
        self.fragments.push(Fragment::Resource {
            uid: uid.into(),
            message: message.clone(),
        });
        self
    }

    /// Replay the fragments against `ctx` in order.
    pub fn write_to(&self, ctx: &mut dyn ScriptContext) -> Result<()> {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => ctx.write(text)?,
                Fragment::Import(module) => ctx.register_import(module)?,
                Fragment::Requirement(specifier) => ctx.register_requirement(specifier)?,
                Fragment::Resource { uid, message } => ctx.register_resource(uid, message)?,
            }
        }
        Ok(())
    }
}

/// A stateful action living for the rest of the stream once created.
pub trait Action: Debug {
    /// Offer a message. Returns `true` when the action's state changed.
    fn update(&mut self, message: &Message) -> Result<bool>;

    /// Produce the action's blocks at end of stream.
    fn complete(self: Box<Self>) -> Result<Vec<ScriptBlock>>;
}

/// Creates actions of one kind.
pub trait ActionFactory {
    /// Unique name, also the key of the settings document in the config.
    fn name(&self) -> &'static str;

    /// Settings used when the config has no entry for this action.
    fn default_settings(&self) -> Value;

    fn init(&mut self, settings: Value) -> Result<()>;

    /// Create a new action triggered by `message`, if it is one.
    fn from_message(&self, message: &Message) -> Option<Box<dyn Action>>;
}

pub type FactoryConstructor = fn() -> Box<dyn ActionFactory>;

/// Deserialize an action settings document.
pub fn parse_settings<T: DeserializeOwned>(settings: Value) -> Result<T> {
    serde_json::from_value(settings).context("parse action settings")
}

/// Name to constructor map of the available action kinds.
#[derive(Debug, Default, Clone)]
pub struct ActionRegistry {
    constructors: BTreeMap<&'static str, FactoryConstructor>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the actions shipped with the crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for constructor in crate::actions::BUILTIN {
            registry.register(*constructor);
        }
        registry
    }

    /// Add a kind. A kind with the same name is replaced.
    pub fn register(&mut self, constructor: FactoryConstructor) {
        let name = constructor().name();
        tracing::debug!(action = name, "registering action");
        self.constructors.insert(name, constructor);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Default settings of every registered kind, keyed by name.
    pub fn default_settings(&self) -> BTreeMap<String, Value> {
        self.constructors
            .iter()
            .map(|(name, constructor)| (name.to_string(), constructor().default_settings()))
            .collect()
    }

    /// Build and initialize one factory per registered kind.
    ///
    /// Kinds without an entry in `settings` get their default settings.
    /// Entries naming unknown kinds are reported and ignored.
    pub fn instantiate(
        &self,
        settings: &BTreeMap<String, Value>,
    ) -> Result<Vec<Box<dyn ActionFactory>>> {
        for name in settings.keys() {
            if !self.constructors.contains_key(name.as_str()) {
                tracing::warn!(action = %name, "settings for unknown action are ignored");
            }
        }

        let mut factories = Vec::with_capacity(self.constructors.len());
        for (name, constructor) in &self.constructors {
            let mut factory = constructor();
            let document = settings
                .get(*name)
                .cloned()
                .unwrap_or_else(|| factory.default_settings());
            factory
                .init(document)
                .with_context(|| format!("failed to load '{name}' action settings"))?;
            tracing::info!(action = name, "loaded action");
            factories.push(factory);
        }
        Ok(factories)
    }
}
