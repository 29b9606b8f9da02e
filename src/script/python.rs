//! Python replay script target.
//!
//! Layout: `imports -> variables -> methods -> main -> body -> end`.
//! Registered imports are prepended to `imports`. Requirements are a
//! separate document written to `requirements.txt`. Message resources land in
//! `messages/<uid>.json` as soon as they are registered.
use super::section::{SectionId, Sections};
use super::{Script, ScriptContext};
use crate::message::Message;
use crate::staging::{ensure_dir, write_atomic, write_json_atomic};
use crate::templates;
use crate::wire;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const MESSAGES_DIR: &str = "messages";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

pub struct PythonScript {
    output_dir: PathBuf,
    messages_dir: PathBuf,
    sections: Sections,
    imports: SectionId,
    body: SectionId,
    requirements: SectionId,
    registered_imports: BTreeSet<String>,
    registered_requirements: BTreeSet<String>,
    closed: bool,
}

impl PythonScript {
    /// Prepare a script rooted at `output_dir`, creating the directory tree.
    pub fn new(output_dir: &Path) -> Result<Self> {
        let output_dir = ensure_dir(output_dir)?;
        let messages_dir = ensure_dir(&output_dir.join(MESSAGES_DIR))?;

        let mut sections = Sections::new();
        let imports = sections.declare("imports")?;
        let variables = sections.declare("variables")?;
        let methods = sections.declare("methods")?;
        let main = sections.declare("main")?;
        let body = sections.declare("body")?;
        let end = sections.declare("end")?;
        let requirements = sections.declare("requirements")?;

        let next = sections.print_after(imports, variables)?;
        let next = sections.print_after(next, methods)?;
        let next = sections.print_after(next, main)?;
        let next = sections.print_after(next, body)?;
        sections.print_after(next, end)?;

        sections.append_text(imports, templates::PYTHON_IMPORTS)?;
        sections.append_text(variables, templates::PYTHON_VARIABLES)?;
        sections.append_text(methods, templates::PYTHON_METHODS)?;
        sections.append_text(main, templates::PYTHON_MAIN)?;
        sections.append_text(end, templates::PYTHON_END)?;
        sections.append_text(requirements, templates::PYTHON_REQUIREMENTS)?;

        Ok(Self {
            output_dir,
            messages_dir,
            sections,
            imports,
            body,
            requirements,
            registered_imports: BTreeSet::new(),
            registered_requirements: BTreeSet::new(),
            closed: false,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Print the script document. Its sections are consumed.
    pub fn render_script(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.sections.print(self.imports, &mut out)?;
        Ok(out)
    }

    /// Print the requirements document. Its section is consumed.
    pub fn render_requirements(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.sections.print(self.requirements, &mut out)?;
        Ok(out)
    }
}

impl ScriptContext for PythonScript {
    fn write(&mut self, text: &str) -> Result<()> {
        self.sections.append_text(self.body, text)?;
        Ok(())
    }

    fn register_import(&mut self, module: &str) -> Result<()> {
        if self.registered_imports.insert(module.to_string()) {
            self.sections
                .prepend_text(self.imports, format!("import {module}\n"))?;
        }
        Ok(())
    }

    fn register_requirement(&mut self, specifier: &str) -> Result<()> {
        if self.registered_requirements.insert(specifier.to_string()) {
            self.sections
                .append_text(self.requirements, format!("{specifier}\n"))?;
        }
        Ok(())
    }

    fn register_resource(&mut self, uid: &str, message: &Message) -> Result<()> {
        if uid.is_empty() || uid.contains(['/', '\\']) || uid.starts_with('.') {
            return Err(anyhow!("invalid resource id '{uid}'"));
        }
        let path = write_json_atomic(
            &self.messages_dir,
            &format!("{uid}.json"),
            &wire::encode_message(message),
        )?;
        tracing::debug!(uid, path = %path.display(), "stored message resource");
        Ok(())
    }
}

impl Script for PythonScript {
    fn close(&mut self) -> Result<Vec<PathBuf>> {
        if self.closed {
            return Err(anyhow!("script is already closed"));
        }
        self.closed = true;

        let script = self.render_script()?;
        let requirements = self.render_requirements()?;
        let script_name = format!("script-{}.py", Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ"));
        let script_path = write_atomic(&self.output_dir, &script_name, &script)?;
        let requirements_path = write_atomic(&self.output_dir, REQUIREMENTS_FILE, &requirements)?;
        tracing::info!(
            script = %script_path.display(),
            requirements = %requirements_path.display(),
            "wrote replay script"
        );
        Ok(vec![script_path, requirements_path])
    }
}

#[cfg(test)]
#[path = "python_tests.rs"]
mod tests;
