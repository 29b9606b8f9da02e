//! Edit commands applied to a message tree.
//!
//! A command is declared in configuration as exactly one of `add`, `put`,
//! `set` or `remove` (each holding the target path) plus optional `field`,
//! `value`, `value-from` and `condition` keys. Declarations are validated
//! when the configuration is loaded.
use super::path::{CompiledPath, Location, Step};
use super::TransformError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("No operation is set")]
    NoOperation,
    #[error("More than one operation is set")]
    MultipleOperations,
    #[error("'field' is required for 'put' operations")]
    MissingField,
    #[error("'field' is forbidden for non-'put' operations")]
    ForbiddenField,
    #[error("'value' / 'value-from' are forbidden for 'remove' operations")]
    ValueForRemove,
    #[error("'value' / 'value-from' are mutually exclusive")]
    ValueConflict,
}

/// Command as written in configuration, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<CompiledPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<CompiledPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<CompiledPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<CompiledPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<CompiledPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// Guard evaluated per match before a command edits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Condition {
    /// Location to compare; defaults to the matched location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<CompiledPath>,
    pub expected_value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Add(CompiledPath),
    Put { path: CompiledPath, field: String },
    Set(CompiledPath),
    Remove(CompiledPath),
}

impl Operation {
    pub fn path(&self) -> &CompiledPath {
        match self {
            Operation::Add(path) | Operation::Set(path) | Operation::Remove(path) => path,
            Operation::Put { path, .. } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Add(_) => "add",
            Operation::Put { .. } => "put",
            Operation::Set(_) => "set",
            Operation::Remove(_) => "remove",
        }
    }

    /// Base for relative paths: the directory of the location being edited.
    /// `add` and `put` edit a child of the match, `set` and `remove` edit
    /// the match itself.
    fn directory(&self, matched: &Location) -> Location {
        match self {
            Operation::Add(_) | Operation::Put { .. } => matched.clone(),
            Operation::Set(_) | Operation::Remove(_) => matched.parent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    Literal(Value),
    From(CompiledPath),
    Unset,
}

/// A validated edit command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCommand", into = "RawCommand")]
pub struct Command {
    operation: Operation,
    value: ValueSource,
    condition: Option<Condition>,
}

impl TryFrom<RawCommand> for Command {
    type Error = CommandError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let slots = [&raw.add, &raw.put, &raw.set, &raw.remove]
            .iter()
            .filter(|slot| slot.is_some())
            .count();
        match slots {
            0 => return Err(CommandError::NoOperation),
            1 => {}
            _ => return Err(CommandError::MultipleOperations),
        }

        let operation = match (raw.add, raw.put, raw.set, raw.remove) {
            (_, Some(path), _, _) => {
                let field = raw.field.ok_or(CommandError::MissingField)?;
                Operation::Put { path, field }
            }
            _ if raw.field.is_some() => return Err(CommandError::ForbiddenField),
            (Some(path), _, _, _) => Operation::Add(path),
            (_, _, Some(path), _) => Operation::Set(path),
            (_, _, _, Some(path)) => {
                if raw.value.is_some() || raw.value_from.is_some() {
                    return Err(CommandError::ValueForRemove);
                }
                Operation::Remove(path)
            }
            (None, None, None, None) => return Err(CommandError::NoOperation),
        };

        let value = match (raw.value, raw.value_from) {
            (Some(_), Some(_)) => return Err(CommandError::ValueConflict),
            (Some(value), None) => ValueSource::Literal(value),
            (None, Some(path)) => ValueSource::From(path),
            (None, None) => ValueSource::Unset,
        };

        Ok(Self {
            operation,
            value,
            condition: raw.condition,
        })
    }
}

impl From<Command> for RawCommand {
    fn from(command: Command) -> Self {
        let mut raw = RawCommand {
            condition: command.condition,
            ..RawCommand::default()
        };
        match command.operation {
            Operation::Add(path) => raw.add = Some(path),
            Operation::Put { path, field } => {
                raw.put = Some(path);
                raw.field = Some(field);
            }
            Operation::Set(path) => raw.set = Some(path),
            Operation::Remove(path) => raw.remove = Some(path),
        }
        match command.value {
            ValueSource::Literal(value) => raw.value = Some(value),
            ValueSource::From(path) => raw.value_from = Some(path),
            ValueSource::Unset => {}
        }
        raw
    }
}

impl Command {
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Apply the command to `tree`, returning how many matches were edited.
    ///
    /// The target is evaluated against the current tree. Removals run in
    /// reverse document order so sibling indices stay valid.
    pub fn apply(&self, tree: &mut Value) -> Result<usize, TransformError> {
        let target = self.operation.path();
        let mut matches = target.locate(tree);
        if matches.is_empty() {
            tracing::debug!(path = %target, operation = self.operation.name(), "no matches, command skipped");
            return Ok(0);
        }
        if matches!(self.operation, Operation::Remove(_)) {
            matches.reverse();
        }

        let mut applied = 0;
        for matched in matches {
            let directory = self.operation.directory(&matched);
            if !self.condition_holds(tree, &matched, &directory) {
                continue;
            }
            let value = match &self.value {
                ValueSource::Literal(value) => value.clone(),
                ValueSource::From(source) => {
                    let source = source.resolve_relative(&directory);
                    match read(&source, tree) {
                        Some(value) => value,
                        None => {
                            tracing::debug!(path = %matched, source = %source, "source value missing, match skipped");
                            continue;
                        }
                    }
                }
                ValueSource::Unset => Value::Null,
            };
            if self.edit(tree, &matched, value)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn condition_holds(&self, tree: &Value, matched: &Location, directory: &Location) -> bool {
        let Some(condition) = &self.condition else {
            return true;
        };
        let actual = match &condition.value_from {
            Some(path) => read(&path.resolve_relative(directory), tree),
            None => matched.get(tree).cloned(),
        };
        let holds = actual.as_ref() == Some(&condition.expected_value);
        if !holds {
            tracing::debug!(
                path = %matched,
                expected = %condition.expected_value,
                actual = ?actual,
                "condition did not match, match skipped"
            );
        }
        holds
    }

    fn edit(&self, tree: &mut Value, matched: &Location, value: Value) -> Result<bool, TransformError> {
        let operation = self.operation.name();
        match &self.operation {
            Operation::Add(_) => match matched.get_mut(tree) {
                Some(Value::Array(items)) => {
                    tracing::debug!(path = %matched, value = %value, "added value");
                    items.push(value);
                }
                Some(other) => return Err(mismatch(operation, matched, "sequence", other)),
                None => return Ok(false),
            },
            Operation::Put { field, .. } => match matched.get_mut(tree) {
                Some(Value::Object(map)) => {
                    tracing::debug!(path = %matched, field = %field, value = %value, "put value");
                    map.insert(field.clone(), value);
                }
                Some(other) => return Err(mismatch(operation, matched, "mapping", other)),
                None => return Ok(false),
            },
            Operation::Set(_) => match matched.get_mut(tree) {
                Some(slot) => {
                    tracing::debug!(path = %matched, from = %slot, to = %value, "replaced value");
                    *slot = value;
                }
                None => return Ok(false),
            },
            Operation::Remove(_) => {
                if matched.is_root() {
                    return Err(TransformError::RootRemoval);
                }
                let removed = match (matched.last(), matched.parent().get_mut(tree)) {
                    (Some(Step::Key(key)), Some(Value::Object(map))) => map.shift_remove(key),
                    (Some(Step::Index(idx)), Some(Value::Array(items))) if *idx < items.len() => {
                        Some(items.remove(*idx))
                    }
                    _ => None,
                };
                match removed {
                    Some(value) => tracing::debug!(path = %matched, value = %value, "removed value"),
                    None => return Ok(false),
                }
            }
        }
        Ok(true)
    }
}

/// Read the value(s) a path addresses: one match yields the value, several
/// yield a sequence of them, none yields nothing.
fn read(path: &CompiledPath, tree: &Value) -> Option<Value> {
    let mut matches = path.evaluate(tree);
    match matches.len() {
        0 => None,
        1 => matches.pop().map(|(_, value)| value.clone()),
        _ => Some(Value::Array(
            matches.into_iter().map(|(_, value)| value.clone()).collect(),
        )),
    }
}

fn mismatch(operation: &'static str, location: &Location, expected: &'static str, found: &Value) -> TransformError {
    TransformError::TypeMismatch {
        operation,
        location: location.to_string(),
        expected,
        found: kind(found),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
