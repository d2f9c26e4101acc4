use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

use crate::{color::Color, command::Cli};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub(crate) enum Output {
    JSON,
    Text,
    None,
}

pub enum CommandOutput {
    Plain(String),
    Object(Value),
}
pub type CommandResult = color_eyre::eyre::Result<CommandOutput>;

impl CommandOutput {
    pub fn object<T: Serialize>(value: &T) -> CommandResult {
        Ok(CommandOutput::Object(serde_json::to_value(value)?))
    }
}

impl From<&str> for CommandOutput {
    fn from(text: &str) -> Self {
        CommandOutput::Plain(text.to_owned())
    }
}
impl From<String> for CommandOutput {
    fn from(text: String) -> Self {
        CommandOutput::Plain(text)
    }
}
impl From<()> for CommandOutput {
    fn from(_: ()) -> Self {
        CommandOutput::Plain(String::new())
    }
}

pub struct RenderConfig {
    pub output: Output,
    pub color: Color,
    pub quiet: bool,
}

impl RenderConfig {
    pub fn new(cli: &Cli) -> Self {
        Self {
            output: cli.output,
            color: cli.color,
            quiet: cli.quiet,
        }
    }

    pub fn render_result(&self, result: CommandResult) -> color_eyre::eyre::Result<()> {
        if self.quiet || self.output == Output::None {
            return result.map(|_| ());
        }

        match result {
            // Errors will be passed through to the caller, and rendered by the main function
            Err(e) => Err(e),

            Ok(CommandOutput::Plain(text)) if text.is_empty() => Ok(()),
            Ok(CommandOutput::Plain(text)) => {
                println!("{text}");
                Ok(())
            }

            Ok(CommandOutput::Object(value)) => {
                match self.output {
                    Output::JSON => println!("{}", serde_json::to_string_pretty(&value)?),
                    Output::Text => print!("{}", render_text(&value, 0, self.color.is_enabled())),
                    Output::None => {}
                }
                Ok(())
            }
        }
    }
}

/// Indented `key: value` lines, keys bold when color is on.
fn render_text(value: &Value, depth: usize, color: bool) -> String {
    let indent = "  ".repeat(depth);
    let key = |k: &str| {
        if color {
            format!("\x1b[1m{k}\x1b[0m")
        } else {
            k.to_owned()
        }
    };

    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                Value::Object(_) | Value::Array(_) => {
                    format!("{indent}{}:\n{}", key(k), render_text(v, depth + 1, color))
                }
                _ => format!("{indent}{}: {}\n", key(k), scalar(v)),
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(_) | Value::Array(_) => {
                    format!("{indent}-\n{}", render_text(item, depth + 1, color))
                }
                _ => format!("{indent}- {}\n", scalar(item)),
            })
            .collect(),
        other => format!("{indent}{}\n", scalar(other)),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_owned(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_nested_values_as_text() {
        let value = json!({
            "balance": 10.5,
            "user": { "name": "Ana" },
            "tags": ["a", null]
        });

        assert_eq!(
            render_text(&value, 0, false),
            "balance: 10.5\ntags:\n  - a\n  - -\nuser:\n  name: Ana\n"
        );
    }
}
