//! Command execution: parse, resolve, gate, invoke.

use std::sync::Arc;

use nocturne_bus::MessageBus;
use nocturne_protocol::{keys, now_millis};
use tracing::debug;

use crate::events::CommandResult;
use crate::parser::{self, ParsedCommand};
use crate::registry::{CommandContext, CommandRegistry, CommandSpec};
use crate::suggest::suggest;
use crate::CommandError;

/// Runs command lines through the registry. Cooldowns are per-character
/// per-command keys in the bus KV, so they hold across zone handoffs.
pub struct CommandExecutor {
    registry: CommandRegistry,
    bus: Arc<dyn MessageBus>,
}

impl CommandExecutor {
    pub fn new(registry: CommandRegistry, bus: Arc<dyn MessageBus>) -> Self {
        Self { registry, bus }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub async fn execute(&self, ctx: &CommandContext, line: &str) -> CommandResult {
        let command = match parser::parse(line) {
            Ok(command) => command,
            Err(CommandError::InvalidName(name)) => {
                return CommandResult::fail(format!("\"{name}\" is not a valid command name"));
            }
            Err(e) => return CommandResult::fail(e.to_string()),
        };

        let Some(spec) = self.registry.resolve(&command.name) else {
            return self.unknown_command(&command.name);
        };

        if !self.permitted(ctx, &spec) {
            return CommandResult::fail(format!("you may not use /{}", spec.name));
        }

        if let Some(cooldown_ms) = spec.cooldown_ms {
            match self.cooldown_remaining(ctx, &spec).await {
                Some(remaining_ms) => {
                    return CommandResult::fail(format!(
                        "/{} is on cooldown for another {:.1} s",
                        spec.name,
                        remaining_ms as f64 / 1000.0
                    ));
                }
                None => debug!(command = spec.name, cooldown_ms, "cooldown clear"),
            }
        }

        if let Err(missing) = validate_parameters(&spec, &command) {
            return CommandResult::fail(format!(
                "/{} requires a {missing} argument",
                spec.name
            ));
        }

        let result = spec.handler.execute(ctx, &command);

        if result.success {
            if let Some(cooldown_ms) = spec.cooldown_ms {
                self.write_cooldown(ctx, &spec, cooldown_ms).await;
            }
        }

        result
    }

    fn permitted(&self, _ctx: &CommandContext, _spec: &CommandSpec) -> bool {
        // Permission taxonomy is not fixed yet; everyone may run
        // everything.
        true
    }

    fn unknown_command(&self, name: &str) -> CommandResult {
        let suggestions = suggest(name, self.registry.names());

        if suggestions.is_empty() {
            CommandResult::fail(format!("unknown command /{name}"))
        } else {
            let list = suggestions
                .iter()
                .map(|s| format!("/{s}"))
                .collect::<Vec<_>>()
                .join(", ");

            CommandResult::fail(format!("unknown command /{name}; did you mean {list}?"))
        }
    }

    /// Remaining cooldown in ms, or `None` when clear. The key's value is
    /// the expiry timestamp; the key itself expires with the cooldown.
    async fn cooldown_remaining(&self, ctx: &CommandContext, spec: &CommandSpec) -> Option<i64> {
        let key = keys::command_cooldown_key(&ctx.character_id, spec.name);

        let raw = self.bus.get(&key).await.ok().flatten()?;
        let expires_at: i64 = raw.parse().ok()?;
        let remaining = expires_at - now_millis();

        (remaining > 0).then_some(remaining)
    }

    /// Best-effort: the command already executed, a lost write just
    /// shortens the cooldown.
    async fn write_cooldown(&self, ctx: &CommandContext, spec: &CommandSpec, cooldown_ms: i64) {
        let key = keys::command_cooldown_key(&ctx.character_id, spec.name);
        let expires_at = now_millis() + cooldown_ms;
        let ttl_seconds = (cooldown_ms as u64).div_ceil(1000).max(1);

        if let Err(e) = self
            .bus
            .set_ex(&key, ttl_seconds, &expires_at.to_string())
            .await
        {
            debug!(command = spec.name, error = %e, "cooldown write failed");
        }
    }
}

fn validate_parameters(
    spec: &CommandSpec,
    command: &ParsedCommand,
) -> Result<(), &'static str> {
    let mut positional_required = 0;

    for parameter in &spec.parameters {
        if !parameter.required {
            continue;
        }

        if parameter.named {
            if !command.named.contains_key(parameter.name) {
                return Err(parameter.name);
            }
        } else {
            positional_required += 1;
        }
    }

    if command.args.len() < positional_required {
        return spec
            .parameters
            .iter()
            .filter(|parameter| parameter.required && !parameter.named)
            .nth(command.args.len())
            .map_or(Ok(()), |parameter| Err(parameter.name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use nocturne_bus::InMemoryBus;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::events::CommandEvent;

    fn ctx() -> CommandContext {
        CommandContext {
            character_id: "char-1".to_owned(),
            character_name: "Ash".to_owned(),
            zone_id: "z1".to_owned(),
        }
    }

    fn executor() -> CommandExecutor {
        let mut registry = CommandRegistry::new();
        crate::builtins::register_builtin_commands(&mut registry);

        CommandExecutor::new(registry, Arc::new(InMemoryBus::new()))
    }

    #[tokio::test]
    async fn say_produces_a_speech_event() {
        let result = executor().execute(&ctx(), "/say hello there").await;

        assert!(result.success);
        assert_eq!(result.events.len(), 1);
        assert!(matches!(
            &result.events[0],
            CommandEvent::Speech { message, .. } if message == "hello there"
        ));
    }

    #[tokio::test]
    async fn unknown_command_suggests_alternatives() {
        let result = executor().execute(&ctx(), "/sya hello").await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("/say"));
    }

    #[tokio::test]
    async fn missing_required_parameter_is_rejected() {
        let result = executor().execute(&ctx(), "/whisper").await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("target"));
    }

    #[tokio::test]
    async fn cooldown_blocks_second_invocation() {
        let executor = executor();

        let first = executor.execute(&ctx(), "/shout oi").await;
        assert!(first.success);

        let second = executor.execute(&ctx(), "/shout oi again").await;
        assert!(!second.success);
        assert!(second.error.unwrap().contains("cooldown"));

        // A different character is unaffected.
        let other = CommandContext {
            character_id: "char-2".to_owned(),
            ..ctx()
        };
        assert!(executor.execute(&other, "/shout oi").await.success);
    }

    #[tokio::test]
    async fn failed_commands_do_not_start_cooldowns() {
        let executor = executor();

        // Missing message argument: rejected before the handler runs.
        let result = executor.execute(&ctx(), "/shout").await;
        assert!(!result.success);

        assert!(executor.execute(&ctx(), "/shout oi").await.success);
    }
}
