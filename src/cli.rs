//! CLI argument parsing for the replay script generator.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "rsgen",
    version,
    about = "Generates replay scripts from a recorded message stream",
    after_help = "Examples:\n  rsgen generate --replay-url http://report/replay?id=42 --output-dir out --config-file config.json\n  rsgen generate --replay-file replay.sse --output-dir out\n  curl -N http://report/replay?id=42 | rsgen generate --replay-file - --output-dir out\n  rsgen validate-config --config-file config.json\n  rsgen config-stub > config.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Generate(GenerateArgs),
    ValidateConfig(ValidateConfigArgs),
    ConfigStub(ConfigStubArgs),
}

/// Replay stream location; exactly one is required.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ReplayArgs {
    /// Event-stream URL of the replay
    #[arg(long, value_name = "URL")]
    pub replay_url: Option<String>,

    /// Recorded event stream, or `-` for stdin
    #[arg(long, value_name = "FILE")]
    pub replay_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Generate a replay script from a replay stream")]
pub struct GenerateArgs {
    #[command(flatten)]
    pub replay: ReplayArgs,

    /// Directory for the generated script, requirements and messages
    #[arg(long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Tool configuration (JSON)
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Load and validate a configuration file")]
pub struct ValidateConfigArgs {
    /// Tool configuration (JSON)
    #[arg(long, value_name = "FILE")]
    pub config_file: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Print a configuration stub with default action settings")]
pub struct ConfigStubArgs {}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Generate(args) => args.verbose,
            Command::ValidateConfig(args) => args.verbose,
            Command::ConfigStub(_) => false,
        }
    }
}
