//! Path expressions over a message tree.
//!
//! Expressions start at the root (`$`) or at a relative marker (`@`) and are
//! followed by `.name`, `['name']`, `[index]`, `.*` or `[*]` segments.
//! Relative expressions are spliced onto a concrete base location before use.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

const ROOT: char = '$';
const RELATIVE: char = '@';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path '{expression}': {reason}")]
pub struct PathError {
    pub expression: String,
    pub reason: String,
}

/// One step of a concrete location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    Key(String),
    Index(usize),
}

/// A concrete location inside a tree, produced by evaluating a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Location(Vec<Step>);

impl Location {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, step: Step) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }

    /// The enclosing location; the root is its own parent.
    pub fn parent(&self) -> Self {
        let mut steps = self.0.clone();
        steps.pop();
        Self(steps)
    }

    pub fn last(&self) -> Option<&Step> {
        self.0.last()
    }

    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(root, |node, step| match (step, node) {
            (Step::Key(key), Value::Object(map)) => map.get(key),
            (Step::Index(idx), Value::Array(items)) => items.get(*idx),
            _ => None,
        })
    }

    pub fn get_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        self.0.iter().try_fold(root, |node, step| match (step, node) {
            (Step::Key(key), Value::Object(map)) => map.get_mut(key),
            (Step::Index(idx), Value::Array(items)) => items.get_mut(*idx),
            _ => None,
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ROOT}")?;
        for step in &self.0 {
            match step {
                Step::Key(key) if is_plain_name(key) => write!(f, ".{key}")?,
                Step::Key(key) => write!(f, "['{key}']")?,
                Step::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompiledPath {
    expression: String,
    relative: bool,
    segments: Vec<Segment>,
}

impl CompiledPath {
    pub fn compile(expression: &str) -> Result<Self, PathError> {
        let fail = |reason: &str| PathError {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = expression.trim();
        let mut chars = trimmed.chars().peekable();
        let relative = match chars.next() {
            Some(ROOT) => false,
            Some(RELATIVE) => true,
            Some(_) => return Err(fail("must start with '$' or '@'")),
            None => return Err(fail("empty expression")),
        };

        let mut segments = Vec::new();
        while let Some(ch) = chars.next() {
            match ch {
                '.' => match chars.peek() {
                    Some('.') => return Err(fail("recursive descent is not supported")),
                    Some('*') => {
                        chars.next();
                        segments.push(Segment::Wildcard);
                    }
                    Some(_) => {
                        let mut name = String::new();
                        while let Some(&next) = chars.peek() {
                            if next == '.' || next == '[' {
                                break;
                            }
                            if next == ']' || next.is_whitespace() {
                                return Err(fail("unexpected character in field name"));
                            }
                            name.push(next);
                            chars.next();
                        }
                        if name.is_empty() {
                            return Err(fail("empty field name"));
                        }
                        segments.push(Segment::Key(name));
                    }
                    None => return Err(fail("trailing '.'")),
                },
                '[' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    let mut quote: Option<char> = None;
                    for next in chars.by_ref() {
                        match (quote, next) {
                            (None, ']') => {
                                closed = true;
                                break;
                            }
                            (None, '\'' | '"') if inner.is_empty() => quote = Some(next),
                            (Some(open), _) if next == open => quote = None,
                            _ => {}
                        }
                        inner.push(next);
                    }
                    if !closed {
                        return Err(fail("unclosed '['"));
                    }
                    segments.push(parse_bracket(inner.trim()).map_err(|reason| fail(&reason))?);
                }
                _ => return Err(fail(&format!("unexpected character '{ch}'"))),
            }
        }

        Ok(Self {
            expression: trimmed.to_string(),
            relative,
            segments,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Concrete locations the expression currently addresses, in document
    /// order. Relative expressions that were not resolved are evaluated from
    /// the root.
    pub fn locate(&self, root: &Value) -> Vec<Location> {
        let mut current = vec![Location::root()];
        for segment in &self.segments {
            let mut next = Vec::new();
            for location in &current {
                let Some(node) = location.get(root) else {
                    continue;
                };
                match (segment, node) {
                    (Segment::Key(key), Value::Object(map)) if map.contains_key(key) => {
                        next.push(location.child(Step::Key(key.clone())));
                    }
                    (Segment::Index(idx), Value::Array(items)) if *idx < items.len() => {
                        next.push(location.child(Step::Index(*idx)));
                    }
                    (Segment::Wildcard, Value::Object(map)) => {
                        next.extend(map.keys().map(|key| location.child(Step::Key(key.clone()))));
                    }
                    (Segment::Wildcard, Value::Array(items)) => {
                        next.extend((0..items.len()).map(|idx| location.child(Step::Index(idx))));
                    }
                    _ => {}
                }
            }
            current = next;
        }
        current
    }

    /// Matches with their current values.
    pub fn evaluate<'a>(&self, root: &'a Value) -> Vec<(Location, &'a Value)> {
        self.locate(root)
            .into_iter()
            .filter_map(|location| {
                let value = location.get(root)?;
                Some((location, value))
            })
            .collect()
    }

    /// Splice a relative expression onto `base`; absolute expressions are
    /// returned unchanged.
    pub fn resolve_relative(&self, base: &Location) -> Self {
        if !self.is_relative() {
            return self.clone();
        }
        let mut segments: Vec<Segment> = base
            .steps()
            .iter()
            .map(|step| match step {
                Step::Key(key) => Segment::Key(key.clone()),
                Step::Index(idx) => Segment::Index(*idx),
            })
            .collect();
        segments.extend(self.segments.iter().cloned());
        Self {
            expression: format!("{base}{}", &self.expression[RELATIVE.len_utf8()..]),
            relative: false,
            segments,
        }
    }
}

fn parse_bracket(inner: &str) -> Result<Segment, String> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    for quote in ['\'', '"'] {
        if let Some(name) = inner
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return Ok(Segment::Key(name.to_string()));
        }
    }
    if inner.is_empty() {
        return Err("empty brackets".to_string());
    }
    inner
        .parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| format!("unsupported bracket selector '{inner}'"))
}

fn is_plain_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-')
}

impl TryFrom<String> for CompiledPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::compile(&value)
    }
}

impl From<CompiledPath> for String {
    fn from(path: CompiledPath) -> Self {
        path.expression
    }
}

impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expression())
    }
}
