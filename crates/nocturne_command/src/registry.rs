//! The command registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use nocturne_protocol::types::{CharacterId, ZoneId};

use crate::events::CommandResult;
use crate::parser::ParsedCommand;

/// Who is running the command. Built by the zone orchestrator from the
/// sender's entity.
#[derive(Clone, Debug)]
pub struct CommandContext {
    pub character_id: CharacterId,
    pub character_name: String,
    pub zone_id: ZoneId,
}

/// One declared parameter.
#[derive(Clone, Debug)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub required: bool,
    /// Named (`key:value`) rather than positional.
    pub named: bool,
    pub description: &'static str,
}

impl ParameterSpec {
    pub fn positional(name: &'static str, required: bool, description: &'static str) -> Self {
        Self {
            name,
            required,
            named: false,
            description,
        }
    }

    pub fn named(name: &'static str, required: bool, description: &'static str) -> Self {
        Self {
            name,
            required,
            named: true,
            description,
        }
    }
}

/// The pure execution half of a command.
pub trait CommandHandler: Send + Sync + 'static {
    fn execute(&self, ctx: &CommandContext, command: &ParsedCommand) -> CommandResult;
}

impl<F> CommandHandler for F
where
    F: Fn(&CommandContext, &ParsedCommand) -> CommandResult + Send + Sync + 'static,
{
    fn execute(&self, ctx: &CommandContext, command: &ParsedCommand) -> CommandResult {
        self(ctx, command)
    }
}

#[derive(Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub category: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterSpec>,
    pub cooldown_ms: Option<i64>,
    pub requires_target: bool,
    pub handler: Arc<dyn CommandHandler>,
}

/// Name → command, with aliases resolving to the same spec.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Arc<CommandSpec>>,
    aliases: BTreeMap<&'static str, &'static str>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: CommandSpec) {
        for alias in spec.aliases {
            self.aliases.insert(alias, spec.name);
        }

        self.commands.insert(spec.name, Arc::new(spec));
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<CommandSpec>> {
        let canonical = self.aliases.get(name).copied().unwrap_or(name);

        self.commands.get(canonical).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    pub fn specs(&self) -> impl Iterator<Item = &Arc<CommandSpec>> {
        self.commands.values()
    }
}
