//! Tags: opaque `(key, value)` selectors attached to a config read.
//!
//! Tags namespace cache entries; source filtering by tag is a future
//! concern, so sources already carry them.

/// A sorted, deduplicated set of `(key, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tags {
    entries: Vec<(String, String)>,
}

impl Tags {
    /// The empty tag set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a tag set from pairs; duplicates collapse and order is
    /// canonical so equal sets hash equally.
    #[must_use]
    pub fn of<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries: Vec<(String, String)> =
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        entries.sort();
        entries.dedup();
        Self { entries }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
