//! Label sets attached to metric series.
//!
//! A [`LabelSet`] keeps its pairs in insertion order for display, but two sets
//! holding the same pairs are equal and share one canonical key no matter
//! which order the pairs were added in.

use std::collections::BTreeMap;

/// An ordered mapping of label name to label value.
///
/// # Example
///
/// ```
/// use shared::models::LabelSet;
///
/// let a = LabelSet::new().with_label("a", "1").with_label("b", "2");
/// let b = LabelSet::new().with_label("b", "2").with_label("a", "1");
///
/// assert_eq!(a, b);
/// assert_eq!(a.canonical_key(), b.canonical_key());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    pairs: Vec<(String, String)>,
}

impl LabelSet {
    /// Creates an empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a label, replacing the value if the name is already present.
    #[must_use]
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a label in place, replacing the value if the name is already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(n, _)| *n == name) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((name, value)),
        }
    }

    /// Returns the value for the given label name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if the set has no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Iterates over label names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(n, _)| n.as_str())
    }

    /// Returns the canonical series key: sorted-key JSON of the pairs.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        serde_json::to_string(&self.sorted()).unwrap_or_default()
    }

    fn sorted(&self) -> BTreeMap<&str, &str> {
        self.iter().collect()
    }
}

impl PartialEq for LabelSet {
    fn eq(&self, other: &Self) -> bool {
        self.sorted() == other.sorted()
    }
}

impl Eq for LabelSet {}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

impl<const N: usize> From<[(&str, &str); N]> for LabelSet {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_set_preserves_insertion_order() {
        let labels = LabelSet::new()
            .with_label("method", "GET")
            .with_label("path", "/api");

        let names: Vec<&str> = labels.names().collect();
        assert_eq!(names, vec!["method", "path"]);
    }

    #[test]
    fn test_label_set_insert_replaces_value() {
        let mut labels = LabelSet::from([("status", "200")]);
        labels.insert("status", "500");

        assert_eq!(labels.len(), 1);
        assert_eq!(labels.get("status"), Some("500"));
    }

    #[test]
    fn test_canonical_key_is_order_independent() {
        let a = LabelSet::from([("a", "1"), ("b", "2")]);
        let b = LabelSet::from([("b", "2"), ("a", "1")]);

        assert_eq!(a.canonical_key(), b.canonical_key());
        assert_eq!(a.canonical_key(), r#"{"a":"1","b":"2"}"#);
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonical_key_distinguishes_values() {
        let a = LabelSet::from([("a", "1")]);
        let b = LabelSet::from([("a", "2")]);

        assert_ne!(a.canonical_key(), b.canonical_key());
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_label_set() {
        let labels = LabelSet::new();
        assert!(labels.is_empty());
        assert_eq!(labels.canonical_key(), "{}");
    }
}
