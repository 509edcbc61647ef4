//! Named placeholder constraints.
//!
//! A placeholder such as `{id:int}` names an alias instead of spelling out a
//! regular expression. [`PlaceholderAliases`] holds the alias table; it ships
//! with a built-in set and can be extended or overridden per router.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Built-in aliases.
///
/// Fragments avoid look-around and possessive quantifiers, which the
/// `regex` crate does not support.
const BUILTIN: &[(&str, &str)] = &[
    ("*", ".+?"),
    ("id", "[0-9]+"),
    ("int", "[0-9]+"),
    ("lower", "[a-z]+"),
    ("upper", "[A-Z]+"),
    ("alpha", "[A-Za-z]+"),
    ("alnum", "[A-Za-z0-9]+"),
    ("hex", "[0-9A-Fa-f]+"),
    ("md5", "[a-f0-9]{32}"),
    ("sha1", "[a-f0-9]{40}"),
    ("year", "[0-9]{4}"),
    ("month", "0[1-9]|1[012]"),
    ("day", "0[1-9]|[12][0-9]|3[01]"),
    ("date", "[0-9]{4}-(?:0[1-9]|1[012])-(?:0[1-9]|[12][0-9]|3[01])"),
    ("slug", "[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*"),
    (
        "uuid",
        "[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}",
    ),
];

/// Table mapping alias names to regular expression fragments.
///
/// # Example
///
/// ```rust
/// use waypoint_router::PlaceholderAliases;
///
/// let mut aliases = PlaceholderAliases::default();
/// aliases.insert("sku", "[A-Z]{3}-[0-9]{4}");
///
/// assert_eq!(aliases.get("int"), Some("[0-9]+"));
/// assert_eq!(aliases.get("sku"), Some("[A-Z]{3}-[0-9]{4}"));
/// assert_eq!(aliases.resolve("sku"), "(?:[A-Z]{3}-[0-9]{4})");
/// assert_eq!(aliases.resolve("[a-z]{2}"), "[a-z]{2}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderAliases {
    entries: BTreeMap<String, String>,
}

impl Default for PlaceholderAliases {
    fn default() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(name, regex)| ((*name).to_string(), (*regex).to_string()))
                .collect(),
        }
    }
}

impl PlaceholderAliases {
    /// Creates a table holding the built-in aliases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with no aliases at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Adds or overrides an alias.
    pub fn insert(&mut self, name: impl Into<String>, regex: impl Into<String>) {
        self.entries.insert(name.into(), regex.into());
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, regex: impl Into<String>) -> Self {
        self.insert(name, regex);
        self
    }

    /// Removes an alias, returning its fragment.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    /// Returns the raw fragment registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Resolves a requirement: alias names become their grouped fragment,
    /// anything else is returned unchanged.
    #[must_use]
    pub fn resolve(&self, requirement: &str) -> String {
        match self.entries.get(requirement) {
            Some(fragment) => format!("(?:{fragment})"),
            None => requirement.to_string(),
        }
    }

    /// Returns the number of aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table holds no aliases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, fragment)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r.as_str()))
    }
}

impl<K, V> Extend<(K, V)> for PlaceholderAliases
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, regex) in iter {
            self.insert(name, regex);
        }
    }
}
