use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, FieldCommandSpec, FIELD_COMMANDS, INDEX_COMMANDS, MULTI_PATH_COMMANDS,
    NO_ARG_COMMANDS, SINGLE_PATH_COMMANDS, STYLE_COMMAND,
};

/// A parsed REPL line: an action name plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: Value) -> Self {
        self.command_args.insert(key.to_string(), value);
        self
    }

    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn paths_arg(&self) -> Vec<String> {
        self.command_args
            .get("paths")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn find_field_command(command: &str) -> Option<&'static FieldCommandSpec> {
    FIELD_COMMANDS.iter().find(|spec| spec.command == command)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return Intent::new("unknown", text).with_arg("arg", Value::String(raw_trimmed.to_string()));
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-')
        .count();
    if command_len == 0 {
        return Intent::new("unknown", text).with_arg("arg", Value::String(raw_trimmed.to_string()));
    }

    let command = slash_tail[..command_len]
        .to_ascii_lowercase()
        .replace('-', "_");
    let arg = slash_tail[command_len..].trim();

    if command == STYLE_COMMAND.command {
        return Intent::new(STYLE_COMMAND.action, text)
            .with_arg("style", Value::String(arg.to_string()));
    }

    if let Some(spec) = find_field_command(&command) {
        return Intent::new(spec.action, text)
            .with_arg("field", Value::String(spec.field.to_string()))
            .with_arg("value", Value::String(arg.to_string()));
    }

    if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
        return Intent::new(action, text)
            .with_arg("path", Value::String(parse_single_path_arg(arg)));
    }

    if let Some(action) = find_action(&command, MULTI_PATH_COMMANDS) {
        return Intent::new(action, text).with_arg(
            "paths",
            Value::Array(
                parse_path_args(arg)
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
        );
    }

    if let Some(action) = find_action(&command, INDEX_COMMANDS) {
        // Users count from 1; a missing or bad index stays null.
        let index = arg
            .parse::<u64>()
            .ok()
            .filter(|value| *value > 0)
            .map(|value| Value::Number((value - 1).into()))
            .unwrap_or(Value::Null);
        return Intent::new(action, text).with_arg("index", index);
    }

    if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
        return Intent::new(action, text);
    }

    Intent::new("unknown", text)
        .with_arg("command", Value::String(command))
        .with_arg("arg", Value::String(arg.to_string()))
}
