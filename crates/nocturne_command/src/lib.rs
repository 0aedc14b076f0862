#![doc = include_str!("../README.md")]

mod builtins;
mod events;
mod executor;
mod parser;
mod registry;
mod suggest;

use thiserror::Error;

pub use builtins::register_builtin_commands;
pub use events::{AbilityRef, CommandEvent, CommandResult};
pub use executor::CommandExecutor;
pub use parser::{is_valid_name, parse, render, ParsedCommand};
pub use registry::{
    CommandContext, CommandHandler, CommandRegistry, CommandSpec, ParameterSpec,
};
pub use suggest::suggest;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("could not parse command: {0}")]
    Parse(String),
    #[error("invalid command name {0:?}")]
    InvalidName(String),
}
