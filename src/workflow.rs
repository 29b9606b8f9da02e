//! Command runners behind the CLI.
use crate::action::ActionRegistry;
use crate::cli::{ConfigStubArgs, GenerateArgs, ValidateConfigArgs};
use crate::config::{config_stub, load_config};
use crate::generator::ScriptGenerator;
use crate::script::PythonScript;
use crate::transport::{run_replay, EventReader, ReplaySource};
use anyhow::{anyhow, Result};

/// Run one replay into a script under `--output-dir`.
pub fn run_generate(args: GenerateArgs) -> Result<()> {
    let registry = ActionRegistry::builtin();
    let config = load_config(args.config_file.as_deref())?;
    let factories = registry.instantiate(&config.actions)?;
    let generator = ScriptGenerator::new(config.transformer(), factories);
    let mut script = PythonScript::new(&args.output_dir)?;

    let source = match (args.replay.replay_url, args.replay.replay_file) {
        (Some(url), None) => ReplaySource::Url(url),
        (None, Some(path)) => ReplaySource::from_file_arg(&path),
        _ => return Err(anyhow!("exactly one of --replay-url or --replay-file is required")),
    };
    let reader = source.open()?;
    tracing::info!(output_dir = %script.output_dir().display(), "started");

    let summary = run_replay(EventReader::new(reader), generator, &mut script)?;
    for output in &summary.outputs {
        println!("{}", output.display());
    }
    tracing::info!(
        messages = summary.messages,
        blocks = summary.blocks,
        "finished"
    );
    Ok(())
}

pub fn run_validate_config(args: ValidateConfigArgs) -> Result<()> {
    let config = load_config(Some(&args.config_file))?;
    let registry = ActionRegistry::builtin();
    registry.instantiate(&config.actions)?;
    let actions: Vec<&str> = registry.names().collect();
    println!(
        "{}: ok (actions: {})",
        args.config_file.display(),
        actions.join(", ")
    );
    Ok(())
}

pub fn run_config_stub(_args: ConfigStubArgs) -> Result<()> {
    println!("{}", config_stub(&ActionRegistry::builtin())?);
    Ok(())
}
