use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod action;
mod actions;
mod cli;
mod config;
mod generator;
mod message;
mod script;
mod staging;
mod templates;
mod transform;
mod transport;
mod wire;
mod workflow;

use cli::{Command, RootArgs};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.command.verbose());

    match args.command {
        Command::Generate(args) => workflow::run_generate(args),
        Command::ValidateConfig(args) => workflow::run_validate_config(args),
        Command::ConfigStub(args) => workflow::run_config_stub(args),
    }
}
