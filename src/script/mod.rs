//! Generated script targets.
//!
//! A script is assembled from [`section::Sections`]; actions never touch
//! sections directly but go through the [`ScriptContext`] capability set.
use crate::message::Message;
use anyhow::Result;
use std::path::PathBuf;

pub mod python;
pub mod section;

pub use python::PythonScript;

/// Operations available to script blocks while they are written.
pub trait ScriptContext {
    /// Append code to the script body.
    fn write(&mut self, text: &str) -> Result<()>;

    /// Make `module` importable from the script. Repeated registrations are
    /// ignored.
    fn register_import(&mut self, module: &str) -> Result<()>;

    /// Add a package requirement. Repeated registrations are ignored.
    fn register_requirement(&mut self, specifier: &str) -> Result<()>;

    /// Store `message` next to the script under `uid`, replacing any
    /// resource previously stored under the same id.
    fn register_resource(&mut self, uid: &str, message: &Message) -> Result<()>;
}

/// A script target that renders its files when closed.
pub trait Script: ScriptContext {
    /// Render every output file and return their paths.
    fn close(&mut self) -> Result<Vec<PathBuf>>;
}
