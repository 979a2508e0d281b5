//! Leaf metadata and its rollup to container nodes.

use fxhash::FxHashMap;

/// Metadata kind marking a leaf as secret. Does not roll up to containers
/// and masks the value in rendered output.
pub const META_IS_SECRET: &str = "isSecret";

/// Metadata kind recording which source contributed a leaf.
pub const META_SOURCE: &str = "source";

/// Kinds that stay on the node they were set on.
const NON_ROLLING: &[&str] = &[META_IS_SECRET];

#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Bool(bool),
    Text(String),
}

/// A map of metadata kind to the values recorded for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: FxHashMap<String, Vec<MetaValue>>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, kind: impl Into<String>, value: MetaValue) {
        self.entries.entry(kind.into()).or_default().push(value);
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&[MetaValue]> {
        self.entries.get(kind).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    /// True when the secret kind is present and set.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        self.get(META_IS_SECRET)
            .is_some_and(|values| values.iter().any(|v| matches!(v, MetaValue::Bool(true))))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MetaValue])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Merges another metadata set into this one; the other side wins on
    /// shared kinds.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for (kind, values) in other.entries {
            self.entries.insert(kind, values);
        }
        self
    }

    /// The subset of this metadata that propagates to a containing node.
    #[must_use]
    pub fn rollup(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|(kind, _)| !NON_ROLLING.contains(&kind.as_str()))
            .map(|(kind, values)| (kind.clone(), values.clone()))
            .collect();
        Self { entries }
    }

    /// Folds another node's rolled-up metadata into an accumulating rollup.
    #[must_use]
    pub fn rollup_with(mut self, other: &Self) -> Self {
        for (kind, values) in other.rollup().entries {
            self.entries.entry(kind).or_default().extend(values);
        }
        self
    }
}
