//! Context variables for colorspace resolution.
//!
//! A context is a short ordered list of key/value pairs. Colorspace names
//! may reference keys as `$KEY` or `${KEY}`; they are substituted before
//! the name is looked up. A context with at least one non-empty key is
//! *active* and disables the identity shortcut.
//!
//! ```
//! use seqio_color::Context;
//!
//! let mut ctx = Context::new();
//! ctx.set("SHOT", "sh010").unwrap();
//! assert_eq!(ctx.resolve("plate_$SHOT"), "plate_sh010");
//! assert!(ctx.is_active());
//! ```

use crate::error::{ColorError, ColorResult};
use serde::{Deserialize, Serialize};

/// Ordered key/value pairs, at most [`Context::MAX_ENTRIES`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    entries: Vec<(String, String)>,
}

impl Context {
    /// Maximum number of pairs.
    pub const MAX_ENTRIES: usize = 4;

    /// Creates an empty context.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a key, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> ColorResult<()> {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
            return Ok(());
        }
        if self.entries.len() >= Self::MAX_ENTRIES {
            return Err(ColorError::ContextFull {
                max: Self::MAX_ENTRIES,
            });
        }
        self.entries.push((key, value));
        Ok(())
    }

    /// Value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Removes `key`, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when any pair has a non-empty key.
    pub fn is_active(&self) -> bool {
        self.entries.iter().any(|(k, _)| !k.is_empty())
    }

    /// Substitutes `$KEY` and `${KEY}` references. Unknown keys are left as-is.
    pub fn resolve(&self, input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            if chars.peek() == Some(&'{') {
                chars.next();
                let key: String = chars.by_ref().take_while(|&c| c != '}').collect();
                match self.get(&key) {
                    Some(value) => result.push_str(value),
                    None => {
                        result.push_str("${");
                        result.push_str(&key);
                        result.push('}');
                    }
                }
            } else {
                let mut key = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        key.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match self.get(&key) {
                    Some(value) if !key.is_empty() => result.push_str(value),
                    _ => {
                        result.push('$');
                        result.push_str(&key);
                    }
                }
            }
        }

        result
    }
}
