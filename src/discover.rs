//! Command Discovery
//!
//! Two ways of deciding which methods of a surface are remote commands:
//!
//! - [`discover`] inspects the surface structurally. A reference command name
//!   is accepted when the surface defines it in lowercase, the uppercase alias
//!   points at the same function, and the function is not declared nullary.
//!   Names that are absent are skipped silently.
//! - [`Capabilities`] is an explicit table of commands the caller expects.
//!   [`Capabilities::validate`] checks it against the surface and fails on the
//!   first command that is missing or has the wrong arity.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::error::{AdaptError, AdaptResult, Surface};
use crate::method::{Arity, MethodTable};

/// Returns the primary command token of a reference entry such as `"client kill"`.
pub fn primary_token(entry: &str) -> Option<String> {
    entry
        .split_whitespace()
        .next()
        .map(|token| token.to_ascii_lowercase())
}

/// Returns the reference commands that `table` exposes as command methods.
///
/// Order follows `reference`. Subcommand variants share one primary token and
/// are reported once.
pub fn discover<F, S>(table: &MethodTable<F>, reference: &[S]) -> Vec<String>
where
    F: ?Sized,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for entry in reference {
        let Some(command) = primary_token(entry.as_ref()) else {
            continue;
        };
        if !seen.insert(command.clone()) {
            continue;
        }
        if is_command_method(table, &command) {
            found.push(command);
        } else {
            trace!(command = %command, "not a command method");
        }
    }

    debug!(count = found.len(), "discovered command methods");
    found
}

fn is_command_method<F: ?Sized>(table: &MethodTable<F>, command: &str) -> bool {
    let Some(method) = table.get(command) else {
        return false;
    };
    let aliased = table
        .get(&command.to_ascii_uppercase())
        .map(|alias| alias.same_function(method))
        .unwrap_or(false);

    aliased && !method.arity().is_nullary()
}

/// A command the caller expects a surface to provide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub name: String,
    pub arity: Arity,
}

/// An explicit, statically declared list of commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    commands: Vec<Capability>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares one more command.
    pub fn command(mut self, name: &str, arity: Arity) -> Self {
        self.commands.push(Capability {
            name: name.to_ascii_lowercase(),
            arity,
        });
        self
    }

    /// Declares every primary token of a reference list as variadic, once each.
    pub fn from_reference<S: AsRef<str>>(reference: &[S]) -> Self {
        let mut seen = HashSet::new();
        let commands = reference
            .iter()
            .filter_map(|entry| primary_token(entry.as_ref()))
            .filter(|name| seen.insert(name.clone()))
            .map(|name| Capability {
                name,
                arity: Arity::Variadic,
            })
            .collect();
        Self { commands }
    }

    pub fn commands(&self) -> &[Capability] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Checks every declared command against `table` and returns their names.
    pub fn validate<F: ?Sized>(
        &self,
        surface: Surface,
        table: &MethodTable<F>,
    ) -> AdaptResult<Vec<String>> {
        let mut names = Vec::with_capacity(self.commands.len());

        for capability in &self.commands {
            if !is_command_method(table, &capability.name) {
                return Err(AdaptError::MissingCommand {
                    surface,
                    name: capability.name.clone(),
                });
            }
            // Present, so the lookup cannot miss.
            if let Some(method) = table.get(&capability.name) {
                if !capability.arity.accepts(method.arity()) {
                    return Err(AdaptError::ArityMismatch {
                        surface,
                        name: capability.name.clone(),
                        expected: capability.arity,
                        found: method.arity(),
                    });
                }
            }
            if !names.contains(&capability.name) {
                names.push(capability.name.clone());
            }
        }

        Ok(names)
    }
}
