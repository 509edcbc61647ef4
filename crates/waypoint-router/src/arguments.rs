//! Matched route arguments.
//!
//! This module provides storage for the values a match extracts from the
//! request path and host, merged with route defaults. It uses a small-vector
//! optimization to avoid heap allocations for the common cases (1-4
//! arguments).

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use smallvec::SmallVec;

/// Maximum number of arguments stored inline (stack allocated).
const INLINE_ARGUMENTS: usize = 4;

/// Arguments of a route match, keyed by placeholder name.
///
/// Values are kept as the strings found in the request; numeric-looking
/// values are never coerced. Names are unique: inserting an existing name
/// replaces its value in place.
///
/// # Example
///
/// ```rust
/// use waypoint_router::Arguments;
///
/// let mut args = Arguments::new();
/// args.insert("page", "1");
/// args.insert("userId", "123");
/// args.insert("page", "2");
///
/// assert_eq!(args.get("userId"), Some("123"));
/// assert_eq!(args.get("page"), Some("2"));
/// assert_eq!(args.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Arguments {
    inner: SmallVec<[(String, String); INLINE_ARGUMENTS]>,
}

impl Arguments {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an argument set with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: SmallVec::with_capacity(capacity),
        }
    }

    /// Sets an argument, replacing any previous value for the name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.inner.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.inner.push((name, value)),
        }
    }

    /// Returns the value for an argument by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if an argument with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(n, _)| n == name)
    }

    /// Removes an argument, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.inner.iter().position(|(n, _)| n == name)?;
        Some(self.inner.remove(index).1)
    }

    /// Returns true if there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns an iterator over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Copies the arguments into a `HashMap`.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.inner.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = (&'a str, &'a str);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, String)>,
        fn(&'a (String, String)) -> (&'a str, &'a str),
    >;

    fn into_iter(self) -> Self::IntoIter {
        let as_pair: fn(&'a (String, String)) -> (&'a str, &'a str) =
            |(n, v)| (n.as_str(), v.as_str());
        self.inner.iter().map(as_pair)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (name, value) in iter {
            args.insert(name, value);
        }
        args
    }
}

impl Serialize for Arguments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.inner.len()))?;
        for (name, value) in &self.inner {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_new() {
        let args = Arguments::new();
        assert!(args.is_empty());
        assert_eq!(args.len(), 0);
    }

    #[test]
    fn test_arguments_insert_and_get() {
        let mut args = Arguments::new();
        args.insert("id", "123");
        args.insert("name", "alice");

        assert_eq!(args.get("id"), Some("123"));
        assert_eq!(args.get("name"), Some("alice"));
        assert_eq!(args.get("unknown"), None);
    }

    #[test]
    fn test_arguments_insert_replaces() {
        let mut args = Arguments::new();
        args.insert("page", "1");
        args.insert("page", "7");

        assert_eq!(args.len(), 1);
        assert_eq!(args.get("page"), Some("7"));
    }

    #[test]
    fn test_arguments_numeric_strings_stay_strings() {
        let mut args = Arguments::new();
        args.insert("id", "007");
        assert_eq!(args.get("id"), Some("007"));
    }

    #[test]
    fn test_arguments_iter_keeps_order() {
        let mut args = Arguments::new();
        args.insert("b", "2");
        args.insert("a", "1");

        let pairs: Vec<_> = args.iter().collect();
        assert_eq!(pairs, vec![("b", "2"), ("a", "1")]);
    }

    #[test]
    fn test_arguments_remove() {
        let mut args: Arguments = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(args.remove("a").as_deref(), Some("1"));
        assert!(!args.contains("a"));
        assert_eq!(args.remove("a"), None);
    }

    #[test]
    fn test_arguments_many() {
        let mut args = Arguments::with_capacity(2);
        for i in 0..10 {
            args.insert(format!("key{i}"), format!("value{i}"));
        }

        assert_eq!(args.len(), 10);
        assert_eq!(args.get("key5"), Some("value5"));
        assert_eq!(args.to_map().len(), 10);
    }

    #[test]
    fn test_arguments_serialize() {
        let args: Arguments = [("id", "42"), ("tab", "posts")].into_iter().collect();
        let json = serde_json::to_string(&args).unwrap();
        assert_eq!(json, r#"{"id":"42","tab":"posts"}"#);
    }
}
