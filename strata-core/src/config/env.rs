//! Environment variable expansion for configuration files.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{StrataError, StrataResult};

/// Source for environment variables.
pub trait EnvSource: Send + Sync {
    /// Get an environment variable value.
    fn get(&self, name: &str) -> Option<String>;
}

/// Environment source backed by the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Environment source backed by a map, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Expands environment variable references in configuration text.
///
/// Supported syntax:
/// - `${VAR}` - required variable
/// - `${VAR:-default}` - variable with default value
/// - `${VAR:?message}` - required with custom error message
/// - `$VAR` - simple reference
///
/// A `$` not followed by a name or `{` is kept literally.
#[derive(Debug, Clone)]
pub struct EnvExpander<S: EnvSource = StdEnvSource> {
    source: S,
}

impl EnvExpander<StdEnvSource> {
    /// Create an expander over the process environment.
    pub fn new() -> Self {
        Self {
            source: StdEnvSource,
        }
    }
}

impl Default for EnvExpander<StdEnvSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EnvSource> EnvExpander<S> {
    /// Create an expander with a custom environment source.
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    /// Expand all variable references in `input`.
    pub fn expand(&self, input: &str) -> StrataResult<String> {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }

            match chars.peek() {
                Some('{') => {
                    chars.next();
                    result.push_str(&self.expand_braced(&mut chars)?);
                }
                Some(next) if next.is_alphabetic() || *next == '_' => {
                    result.push_str(&self.expand_simple(&mut chars)?);
                }
                _ => result.push(c),
            }
        }

        Ok(result)
    }

    fn expand_braced(&self, chars: &mut Peekable<Chars<'_>>) -> StrataResult<String> {
        let mut name = String::new();
        let mut modifier = None;
        let mut modifier_value = String::new();

        while let Some(c) = chars.next() {
            match c {
                '}' => break,
                ':' if modifier.is_none() => modifier = chars.next(),
                _ if modifier.is_some() => modifier_value.push(c),
                _ => name.push(c),
            }
        }

        if name.is_empty() {
            return Err(StrataError::config("empty environment variable name"));
        }

        match self.source.get(&name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => match modifier {
                Some('-') => Ok(modifier_value),
                Some('?') if modifier_value.is_empty() => Err(StrataError::config(format!(
                    "required variable '{}' is not set",
                    name
                ))),
                Some('?') => Err(StrataError::config(modifier_value)),
                _ => Err(StrataError::EnvNotFound(name)),
            },
        }
    }

    fn expand_simple(&self, chars: &mut Peekable<Chars<'_>>) -> StrataResult<String> {
        let mut name = String::new();

        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }

        self.source
            .get(&name)
            .ok_or(StrataError::EnvNotFound(name))
    }
}
