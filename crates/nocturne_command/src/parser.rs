//! The command line parser.
//!
//! Grammar: `/name arg "quoted arg" key:value key:"quoted value"`.
//! Single or double quotes preserve whitespace; a colon outside quotes
//! splits a token into a named argument. `parse` and `render` round-trip.

use std::collections::BTreeMap;

use crate::CommandError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
    pub named: BTreeMap<String, String>,
}

impl ParsedCommand {
    /// Positional args joined back into free text, for message-taking
    /// commands.
    pub fn rest(&self) -> String {
        self.args.join(" ")
    }
}

struct Token {
    text: String,
    /// Byte offset of the first colon that appeared outside quotes.
    unquoted_colon: Option<usize>,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut unquoted_colon = None;
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(Token {
                            text: std::mem::take(&mut current),
                            unquoted_colon,
                        });
                        unquoted_colon = None;
                        in_token = false;
                    }
                }
                ':' => {
                    if unquoted_colon.is_none() {
                        unquoted_colon = Some(current.len());
                    }
                    current.push(c);
                    in_token = true;
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(CommandError::Parse("unterminated quote".to_owned()));
    }

    if in_token {
        tokens.push(Token {
            text: current,
            unquoted_colon,
        });
    }

    Ok(tokens)
}

/// Whether a string is a legal command name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Parses a raw command line. The leading slash is optional.
pub fn parse(line: &str) -> Result<ParsedCommand, CommandError> {
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);

    let mut tokens = tokenize(line)?.into_iter();

    let name = match tokens.next() {
        Some(token) if token.unquoted_colon.is_none() => token.text,
        _ => return Err(CommandError::Parse("missing command name".to_owned())),
    };

    if !is_valid_name(&name) {
        return Err(CommandError::InvalidName(name));
    }

    let mut command = ParsedCommand {
        name,
        ..Default::default()
    };

    for token in tokens {
        match token.unquoted_colon {
            Some(at) => {
                let key = token.text[..at].to_owned();
                let value = token.text[at + 1..].to_owned();
                command.named.insert(key, value);
            }
            None => command.args.push(token.text),
        }
    }

    Ok(command)
}

/// Renders a parsed command back into a line `parse` accepts.
pub fn render(command: &ParsedCommand) -> String {
    let mut line = format!("/{}", command.name);

    for arg in &command.args {
        line.push(' ');
        line.push_str(&quote_if_needed(arg));
    }

    for (key, value) in &command.named {
        line.push(' ');
        line.push_str(key);
        line.push(':');
        line.push_str(&quote_if_needed(value));
    }

    line
}

fn quote_if_needed(text: &str) -> String {
    let plain = !text.is_empty()
        && !text
            .chars()
            .any(|c| c.is_whitespace() || c == ':' || c == '"' || c == '\'');

    if plain {
        return text.to_owned();
    }

    if text.contains('"') {
        format!("'{text}'")
    } else {
        format!("\"{text}\"")
    }
}
