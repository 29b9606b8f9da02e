//! Named output sections with print-before / print-after dependencies.
//!
//! Sections live in an arena and are addressed by [`SectionId`]. Each section
//! owns an ordered list of write operations that run exactly once, the first
//! time the section is printed. Printing a section first prints its `before`
//! dependencies (latest registration first), then its own body, then its
//! `after` dependencies (in registration order).
use std::collections::VecDeque;
use std::io::{self, Write};
use thiserror::Error;

/// A deferred write against the output sink.
pub type WriteOp = Box<dyn FnOnce(&mut dyn Write) -> io::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(usize);

#[derive(Debug, Error)]
pub enum SectionError {
    #[error("section '{0}' is already declared")]
    Duplicate(String),
    #[error("operation can't be executed because the '{0}' section is printed")]
    AlreadyPrinted(String),
    #[error("section '{0}' can't depend on itself")]
    SelfDependency(String),
    #[error("section '{dependency}' is already registered as {existing} section of '{section}'")]
    ConflictingDependency {
        section: String,
        dependency: String,
        existing: &'static str,
    },
    #[error("cyclic dependency between sections: {0}")]
    CyclicDependency(String),
    #[error("failed to print section '{section}'")]
    Io {
        section: String,
        #[source]
        source: io::Error,
    },
}

struct Section {
    name: String,
    ops: VecDeque<WriteOp>,
    before: Vec<SectionId>,
    after: Vec<SectionId>,
    printed: bool,
}

#[derive(Clone, Copy)]
enum Edge {
    Before,
    After,
}

impl Edge {
    fn label(self) -> &'static str {
        match self {
            Edge::Before => "before",
            Edge::After => "after",
        }
    }
}

/// Arena of sections forming one output document.
#[derive(Default)]
pub struct Sections {
    sections: Vec<Section>,
}

impl Sections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new, empty section. Names are unique.
    pub fn declare(&mut self, name: &str) -> Result<SectionId, SectionError> {
        if self.sections.iter().any(|section| section.name == name) {
            return Err(SectionError::Duplicate(name.to_string()));
        }
        self.sections.push(Section {
            name: name.to_string(),
            ops: VecDeque::new(),
            before: Vec::new(),
            after: Vec::new(),
            printed: false,
        });
        Ok(SectionId(self.sections.len() - 1))
    }

    pub fn name(&self, id: SectionId) -> &str {
        &self.sections[id.0].name
    }

    pub fn is_printed(&self, id: SectionId) -> bool {
        self.sections[id.0].printed
    }

    /// Put a write operation in front of the section's current content.
    pub fn prepend(&mut self, id: SectionId, op: WriteOp) -> Result<(), SectionError> {
        self.unprinted(id)?.ops.push_front(op);
        Ok(())
    }

    /// Put a write operation after the section's current content.
    pub fn append(&mut self, id: SectionId, op: WriteOp) -> Result<(), SectionError> {
        self.unprinted(id)?.ops.push_back(op);
        Ok(())
    }

    pub fn prepend_text(&mut self, id: SectionId, text: impl Into<String>) -> Result<(), SectionError> {
        self.prepend(id, text_op(text.into()))
    }

    pub fn append_text(&mut self, id: SectionId, text: impl Into<String>) -> Result<(), SectionError> {
        self.append(id, text_op(text.into()))
    }

    /// Require `dependency` to print before the body of `id`.
    /// Returns `dependency` so registrations can be chained.
    pub fn print_before(&mut self, id: SectionId, dependency: SectionId) -> Result<SectionId, SectionError> {
        self.register(id, dependency, Edge::Before)
    }

    /// Require `dependency` to print after the body of `id`.
    /// Returns `dependency` so registrations can be chained.
    pub fn print_after(&mut self, id: SectionId, dependency: SectionId) -> Result<SectionId, SectionError> {
        self.register(id, dependency, Edge::After)
    }

    /// Print `id` and everything it depends on into `sink`.
    ///
    /// Bodies that already ran are skipped, so printing is idempotent.
    pub fn print(&mut self, id: SectionId, sink: &mut dyn Write) -> Result<(), SectionError> {
        let mut stack = Vec::new();
        self.print_inner(id, sink, &mut stack)
    }

    fn print_inner(
        &mut self,
        id: SectionId,
        sink: &mut dyn Write,
        stack: &mut Vec<SectionId>,
    ) -> Result<(), SectionError> {
        if stack.contains(&id) {
            let mut cycle: Vec<&str> = stack.iter().map(|dep| self.name(*dep)).collect();
            cycle.push(self.name(id));
            return Err(SectionError::CyclicDependency(cycle.join(" -> ")));
        }
        stack.push(id);

        let before: Vec<SectionId> = self.sections[id.0].before.iter().rev().copied().collect();
        for dependency in before {
            self.print_inner(dependency, sink, stack)?;
        }

        let section = &mut self.sections[id.0];
        if !section.printed {
            tracing::debug!(section = %section.name, "started printing section");
            for op in std::mem::take(&mut section.ops) {
                op(&mut *sink).map_err(|source| SectionError::Io {
                    section: section.name.clone(),
                    source,
                })?;
            }
            section.printed = true;
            tracing::debug!(section = %section.name, "finished printing section");
        }

        let after = self.sections[id.0].after.clone();
        for dependency in after {
            self.print_inner(dependency, sink, stack)?;
        }

        stack.pop();
        Ok(())
    }

    fn register(&mut self, id: SectionId, dependency: SectionId, edge: Edge) -> Result<SectionId, SectionError> {
        self.unprinted(id)?;
        if id == dependency {
            return Err(SectionError::SelfDependency(self.name(id).to_string()));
        }
        let section = &self.sections[id.0];
        let (same, opposite, opposite_edge) = match edge {
            Edge::Before => (&section.before, &section.after, Edge::After),
            Edge::After => (&section.after, &section.before, Edge::Before),
        };
        if same.contains(&dependency) {
            return Ok(dependency);
        }
        if opposite.contains(&dependency) {
            return Err(SectionError::ConflictingDependency {
                section: self.name(id).to_string(),
                dependency: self.name(dependency).to_string(),
                existing: opposite_edge.label(),
            });
        }
        let reverse = &self.sections[dependency.0];
        if reverse.before.contains(&id) || reverse.after.contains(&id) {
            return Err(SectionError::CyclicDependency(format!(
                "{} -> {} -> {}",
                self.name(id),
                self.name(dependency),
                self.name(id)
            )));
        }

        let section = &mut self.sections[id.0];
        match edge {
            Edge::Before => section.before.push(dependency),
            Edge::After => section.after.push(dependency),
        }
        Ok(dependency)
    }

    fn unprinted(&mut self, id: SectionId) -> Result<&mut Section, SectionError> {
        if self.is_printed(id) {
            return Err(SectionError::AlreadyPrinted(self.name(id).to_string()));
        }
        Ok(&mut self.sections[id.0])
    }
}

fn text_op(text: String) -> WriteOp {
    Box::new(move |sink: &mut dyn Write| sink.write_all(text.as_bytes()))
}
