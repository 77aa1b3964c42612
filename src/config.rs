//! Adaptation options.
//!
//! | Option | Default | Effect |
//! |---|---|---|
//! | `prefix` | `""` | prepended to every mapped name |
//! | `suffix` | `"Q"` | appended to every mapped name |
//! | `mapper` | `prefix + name + suffix` | replaces prefix/suffix entirely |
//! | `json` | `false` | routes arguments and replies through the codec |
//! | `capabilities` | none | declare commands instead of discovering them |

use std::fmt;
use std::sync::Arc;

use crate::discover::Capabilities;

/// Suffix used when none (or an empty one) is configured.
pub const DEFAULT_SUFFIX: &str = "Q";

/// Maps an original method name to the name of its adapted variant.
#[derive(Clone)]
pub struct Mapper(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl Mapper {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Mapper(Arc::new(f))
    }

    /// `prefix + name + suffix`.
    pub fn affix(prefix: &str, suffix: &str) -> Self {
        let prefix = prefix.to_string();
        let suffix = suffix.to_string();
        Mapper::new(move |name| format!("{}{}{}", prefix, name, suffix))
    }

    pub fn map(&self, name: &str) -> String {
        (self.0)(name)
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Mapper").field(&self.map("cmd")).finish()
    }
}

/// Options for one adaptation pass.
#[derive(Debug, Clone)]
pub struct Options {
    pub prefix: String,
    /// An empty suffix falls back to [`DEFAULT_SUFFIX`].
    pub suffix: String,
    pub mapper: Option<Mapper>,
    pub json: bool,
    pub capabilities: Option<Capabilities>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: DEFAULT_SUFFIX.to_string(),
            mapper: None,
            json: false,
            capabilities: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_mapper<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.mapper = Some(Mapper::new(f));
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Returns the naming function in effect.
    pub fn mapper(&self) -> Mapper {
        match &self.mapper {
            Some(mapper) => mapper.clone(),
            None => {
                let suffix = if self.suffix.is_empty() {
                    DEFAULT_SUFFIX
                } else {
                    &self.suffix
                };
                Mapper::affix(&self.prefix, suffix)
            }
        }
    }
}
