//! Action lifecycle pipeline.
//!
//! Every message is transformed, offered to the factories and then to every
//! live action, the new ones included. At end of stream the actions complete
//! into blocks which are written to the script in timestamp order.
use crate::action::{Action, ActionFactory, ScriptBlock};
use crate::message::Message;
use crate::script::ScriptContext;
use crate::transform::MessageTransformer;
use anyhow::Result;

pub struct ScriptGenerator {
    transformer: MessageTransformer,
    factories: Vec<Box<dyn ActionFactory>>,
    actions: Vec<Box<dyn Action>>,
}

impl ScriptGenerator {
    pub fn new(transformer: MessageTransformer, factories: Vec<Box<dyn ActionFactory>>) -> Self {
        Self {
            transformer,
            factories,
            actions: Vec::new(),
        }
    }

    pub fn live_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn on_message(&mut self, message: &Message) {
        tracing::debug!(message = %message.log_id(), "processing message");
        let message = match self.transformer.transform(message) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(message = %message.log_id(), error = %err, "transformation failed, skipping message");
                return;
            }
        };

        let before = self.actions.len();
        for factory in &self.factories {
            if let Some(action) = factory.from_message(&message) {
                tracing::info!(action = factory.name(), message = %message.log_id(), "created action");
                self.actions.push(action);
            }
        }
        let added = self.actions.len() > before;

        let mut updated = false;
        self.actions.retain_mut(|action| match action.update(&message) {
            Ok(changed) => {
                updated |= changed;
                true
            }
            Err(err) => {
                tracing::error!(action = ?action, error = %err, "action failed, dropping it");
                false
            }
        });

        if !added && !updated {
            tracing::warn!(message = %message.log_id(), "skipping message");
        }
    }

    /// Complete every action and write the blocks to `ctx` ordered by
    /// timestamp. Returns the number of blocks written.
    pub fn close(self, ctx: &mut dyn ScriptContext) -> Result<usize> {
        let mut blocks: Vec<ScriptBlock> = Vec::new();
        for action in self.actions {
            blocks.extend(action.complete()?);
        }
        blocks.sort_by_key(|block| block.timestamp);
        for block in &blocks {
            block.write_to(ctx)?;
        }
        tracing::info!(blocks = blocks.len(), "script blocks written");
        Ok(blocks.len())
    }
}
