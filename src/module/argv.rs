//! Parsed command-line arguments handed to a leaf module
//!
//! An [`Argv`] mirrors what a yargs-style parser produces: a map of flags
//! plus a `_` entry holding the positional tokens, starting with the
//! command token itself.

use std::ffi::{OsStr, OsString};

use clap_lex::{ArgCursor, RawArgs};
use serde_json::{Map, Value};

/// Key of the positional-arguments entry
pub const POSITIONAL_KEY: &str = "_";

/// Parsed arguments for a single command invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Argv(Map<String, Value>);

impl Argv {
    /// Creates arguments from positional tokens (command token first)
    pub fn new<I, S>(positional: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let positional = positional
            .into_iter()
            .map(|token| Value::String(token.into()))
            .collect();

        let mut map = Map::new();
        map.insert(POSITIONAL_KEY.to_string(), Value::Array(positional));
        Self(map)
    }

    /// Adds a parsed flag
    pub fn with_flag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Splits raw tokens following `command` into positionals and flags.
    ///
    /// Tokens are lexed with `clap_lex`. Supported forms:
    /// - `--key=value` and `--key value` (value coerced to bool or number when possible)
    /// - `--flag` (true) and `--no-flag` (false)
    /// - `-abc` (each letter true) and `-n 5` (the last letter takes the next value)
    /// - negative numbers are values, never flags
    /// - everything after `--` is positional
    pub fn parse<I, S>(command: &str, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw = RawArgs::new(tokens.into_iter().map(|t| OsString::from(t.as_ref())));
        let mut cursor = raw.cursor();
        let mut argv = Self::new([command]);
        let mut positional = Vec::new();

        while let Some(arg) = raw.next(&mut cursor) {
            if arg.is_escape() {
                positional.extend(raw.remaining(&mut cursor).map(lossy));
                break;
            }

            if arg.is_stdio() || arg.is_negative_number() {
                positional.push(lossy(arg.to_value_os()));
            } else if let Some((key, value)) = arg.to_long() {
                let key = key.map_or_else(lossy, str::to_string);
                let value = match value {
                    Some(value) => coerce(&lossy(value)),
                    None => match key.strip_prefix("no-") {
                        Some(negated) => {
                            argv.0.insert(negated.to_string(), Value::Bool(false));
                            continue;
                        }
                        None => next_value(&raw, &mut cursor).unwrap_or(Value::Bool(true)),
                    },
                };
                argv.0.insert(key, value);
            } else if let Some(mut shorts) = arg.to_short() {
                while let Some(short) = shorts.next_flag() {
                    let key = short.map_or_else(lossy, String::from);
                    let value = if shorts.is_empty() {
                        next_value(&raw, &mut cursor)
                    } else {
                        None
                    };
                    argv.0.insert(key, value.unwrap_or(Value::Bool(true)));
                }
            } else {
                positional.push(lossy(arg.to_value_os()));
            }
        }

        if let Some(Value::Array(values)) = argv.0.get_mut(POSITIONAL_KEY) {
            values.extend(positional.into_iter().map(Value::String));
        }
        argv
    }

    /// All positional tokens, including the leading command token
    pub fn positional(&self) -> &[Value] {
        match self.0.get(POSITIONAL_KEY) {
            Some(Value::Array(values)) => values,
            _ => &[],
        }
    }

    /// Every parsed flag except the positional entry
    pub fn kwargs(&self) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(key, _)| key.as_str() != POSITIONAL_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Task arguments: positionals after the command token, then one
    /// trailing object of keyword arguments
    pub fn task_args(&self) -> Vec<Value> {
        let mut args: Vec<Value> = self.positional().iter().skip(1).cloned().collect();
        args.push(Value::Object(self.kwargs()));
        args
    }

    /// Gets a parsed flag
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for Argv {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn lossy(raw: &OsStr) -> String {
    raw.to_string_lossy().into_owned()
}

/// Consumes the next token as a flag value unless it is itself a flag
fn next_value(raw: &RawArgs, cursor: &mut ArgCursor) -> Option<Value> {
    let next = raw.peek(cursor)?;
    if !next.is_negative_number() && lossy(next.to_value_os()).starts_with('-') {
        return None;
    }
    let value = coerce(&lossy(next.to_value_os()));
    raw.next(cursor);
    Some(value)
}

fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    match raw.parse::<f64>() {
        Ok(float) if float.is_finite() => Value::from(float),
        _ => Value::String(raw.to_string()),
    }
}
