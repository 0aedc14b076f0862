//! The built-in command set.

use std::sync::Arc;

use nocturne_protocol::envelope::{ChatChannel, SpeedMode};

use crate::events::{AbilityRef, CommandEvent, CommandResult};
use crate::registry::{CommandContext, CommandRegistry, CommandSpec, ParameterSpec};
use crate::ParsedCommand;

/// Registers every built-in command, `help` last so it can describe the
/// rest.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(speech_command(
        "say",
        &[],
        ChatChannel::Say,
        "Speak to everyone nearby",
    ));
    registry.register(CommandSpec {
        cooldown_ms: Some(5_000),
        ..speech_command("shout", &["yell"], ChatChannel::Shout, "Shout across the area")
    });
    registry.register(speech_command(
        "cfh",
        &[],
        ChatChannel::Cfh,
        "Call for help",
    ));

    registry.register(CommandSpec {
        name: "emote",
        aliases: &["me"],
        category: "social",
        description: "Describe what your character does",
        parameters: vec![ParameterSpec::positional("action", true, "what you do")],
        cooldown_ms: None,
        requires_target: false,
        handler: Arc::new(|_: &CommandContext, command: &ParsedCommand| {
            CommandResult::with_events(vec![CommandEvent::Emote {
                message: command.rest(),
            }])
        }),
    });

    registry.register(CommandSpec {
        name: "whisper",
        aliases: &["tell", "w"],
        category: "social",
        description: "Send a private message",
        parameters: vec![
            ParameterSpec::positional("target", true, "who to whisper to"),
            ParameterSpec::positional("message", true, "what to say"),
        ],
        cooldown_ms: None,
        requires_target: true,
        handler: Arc::new(|_: &CommandContext, command: &ParsedCommand| {
            let recipient = command.args[0].clone();
            let message = command.args[1..].join(" ");

            CommandResult::with_events(vec![CommandEvent::PrivateMessage { recipient, message }])
        }),
    });

    registry.register(CommandSpec {
        name: "attack",
        aliases: &["atk"],
        category: "combat",
        description: "Attack a target, with your basic attack by default",
        parameters: vec![
            ParameterSpec::positional("target", true, "who to attack"),
            ParameterSpec::named("ability", false, "ability name to use instead"),
        ],
        cooldown_ms: None,
        requires_target: true,
        handler: Arc::new(|_: &CommandContext, command: &ParsedCommand| {
            let ability = match command.named.get("ability") {
                Some(name) => AbilityRef::Name(name.clone()),
                None => AbilityRef::Id("basic_attack".to_owned()),
            };

            CommandResult::with_events(vec![CommandEvent::CombatAction {
                ability,
                target: Some(command.args[0].clone()),
            }])
        }),
    });

    registry.register(CommandSpec {
        name: "go",
        aliases: &["move"],
        category: "movement",
        description: "Take a step toward a target or along a heading",
        parameters: vec![
            ParameterSpec::named("target", false, "entity to approach"),
            ParameterSpec::named("range", false, "feet to keep from the target"),
            ParameterSpec::named("heading", false, "compass heading in degrees"),
            ParameterSpec::named("speed", false, "walk, jog, or run"),
        ],
        cooldown_ms: None,
        requires_target: false,
        handler: Arc::new(|_: &CommandContext, command: &ParsedCommand| {
            let target = command.named.get("target").cloned();

            let heading = match command.named.get("heading") {
                Some(raw) => match raw.parse::<f64>() {
                    Ok(heading) => Some(heading.rem_euclid(360.0)),
                    Err(_) => return CommandResult::fail("heading must be a number"),
                },
                None => None,
            };

            if target.is_none() && heading.is_none() {
                return CommandResult::fail("give either a target or a heading");
            }

            let speed = match command.named.get("speed").map(String::as_str) {
                None => SpeedMode::Walk,
                Some("walk") => SpeedMode::Walk,
                Some("jog") => SpeedMode::Jog,
                Some("run") => SpeedMode::Run,
                Some(other) => {
                    return CommandResult::fail(format!("unknown speed {other:?}"));
                }
            };

            let target_range_feet = match command.named.get("range") {
                Some(raw) => match raw.parse::<f64>() {
                    Ok(range) => range,
                    Err(_) => return CommandResult::fail("range must be a number"),
                },
                None => 5.0,
            };

            CommandResult::with_events(vec![CommandEvent::Movement {
                target,
                target_range_feet,
                heading,
                speed,
            }])
        }),
    });

    registry.register(CommandSpec {
        name: "stop",
        aliases: &["halt"],
        category: "movement",
        description: "Stop moving",
        parameters: vec![],
        cooldown_ms: None,
        requires_target: false,
        handler: Arc::new(|_: &CommandContext, _: &ParsedCommand| {
            CommandResult::with_events(vec![CommandEvent::MovementStop])
        }),
    });

    let help_text: String = registry
        .specs()
        .map(|spec| format!("/{} — {}\n", spec.name, spec.description))
        .collect();

    registry.register(CommandSpec {
        name: "help",
        aliases: &["commands"],
        category: "system",
        description: "List available commands",
        parameters: vec![],
        cooldown_ms: None,
        requires_target: false,
        handler: Arc::new(move |_: &CommandContext, _: &ParsedCommand| {
            CommandResult::with_message(help_text.clone())
        }),
    });
}

fn speech_command(
    name: &'static str,
    aliases: &'static [&'static str],
    channel: ChatChannel,
    description: &'static str,
) -> CommandSpec {
    CommandSpec {
        name,
        aliases,
        category: "social",
        description,
        parameters: vec![ParameterSpec::positional("message", true, "what to say")],
        cooldown_ms: None,
        requires_target: false,
        handler: Arc::new(move |_: &CommandContext, command: &ParsedCommand| {
            CommandResult::with_events(vec![CommandEvent::Speech {
                channel,
                message: command.rest(),
            }])
        }),
    }
}
