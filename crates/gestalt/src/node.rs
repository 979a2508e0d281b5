//! The config node tree: a tagged union of leaf, array, and map nodes with
//! navigation and last-wins merge semantics.
//!
//! Map lookups are case-insensitive: entries are stored under a canonical
//! lowercased key while the display key is preserved for iteration and
//! error messages. Array indices may be sparse; absent slots are explicit
//! `None` values. Leaf values are opaque strings, decoding always happens
//! downstream.

use crate::error::{ErrorLevel, ValidationError};
use crate::metadata::Metadata;
use crate::results::Validated;
use crate::token::{self, Token};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use strum_macros::Display;

/// Which variant a node is; used in mismatch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    Leaf,
    Array,
    Map,
}

/// The value held by a leaf node.
///
/// `Temporary` values are produced by the temporary-secret post-processor:
/// they release the inner string a bounded number of times, then drop it.
#[derive(Debug, Clone)]
pub enum LeafValue {
    Plain(String),
    Temporary(Arc<TemporaryValue>),
}

impl PartialEq for LeafValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Plain(a), Self::Plain(b)) => a == b,
            (Self::Temporary(a), Self::Temporary(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// An access-counted secret value. Each [`TemporaryValue::take`] consumes
/// one access; once they run out the plaintext is dropped and every further
/// read yields nothing.
#[derive(Debug)]
pub struct TemporaryValue {
    state: Mutex<TemporaryState>,
}

#[derive(Debug)]
struct TemporaryState {
    value: Option<String>,
    remaining: usize,
}

impl TemporaryValue {
    #[must_use]
    pub fn new(value: String, accesses: usize) -> Self {
        Self { state: Mutex::new(TemporaryState { value: Some(value), remaining: accesses }) }
    }

    /// Returns the value while accesses remain, dropping the plaintext once
    /// the final access is spent.
    #[must_use]
    pub fn take(&self) -> Option<String> {
        let mut state = self.state.lock();
        if state.remaining == 0 {
            return None;
        }
        state.remaining -= 1;
        if state.remaining == 0 {
            state.value.take()
        } else {
            state.value.clone()
        }
    }
}

/// A leaf: an optional opaque string value plus metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeafNode {
    pub value: Option<LeafValue>,
    pub metadata: Metadata,
}

impl LeafNode {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: Some(LeafValue::Plain(value.into())), metadata: Metadata::new() }
    }

    /// Resolves the current value. Reading a temporary value consumes one
    /// of its accesses.
    #[must_use]
    pub fn value(&self) -> Option<String> {
        match &self.value {
            Some(LeafValue::Plain(value)) => Some(value.clone()),
            Some(LeafValue::Temporary(value)) => value.take(),
            None => None,
        }
    }

    /// A non-consuming view for rendering; secrets and temporary values are
    /// masked.
    #[must_use]
    fn display_value(&self) -> &str {
        match &self.value {
            Some(LeafValue::Plain(value)) if !self.metadata.is_secret() => value,
            Some(_) => "*****",
            None => "",
        }
    }
}

/// A map node with case-insensitive, display-preserving keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapNode {
    entries: FxHashMap<String, MapEntry>,
}

#[derive(Debug, Clone, PartialEq)]
struct MapEntry {
    key: String,
    node: ConfigNode,
}

impl MapNode {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts under the canonical lowercased key, keeping the given
    /// display key. Returns the replaced node, if any.
    pub fn insert(&mut self, key: impl Into<String>, node: ConfigNode) -> Option<ConfigNode> {
        let key = key.into();
        let canonical = key.to_lowercase();
        self.entries.insert(canonical, MapEntry { key, node }).map(|entry| entry.node)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.entries.get(&key.to_lowercase()).map(|entry| &entry.node)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<(String, ConfigNode)> {
        self.entries.remove(&key.to_lowercase()).map(|entry| (entry.key, entry.node))
    }

    /// Iterates entries with their display keys.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.entries.values().map(|entry| (entry.key.as_str(), &entry.node))
    }
}

impl FromIterator<(String, ConfigNode)> for MapNode {
    fn from_iter<I: IntoIterator<Item = (String, ConfigNode)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, node) in iter {
            map.insert(key, node);
        }
        map
    }
}

/// A node in the merged configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Leaf(LeafNode),
    Array(Vec<Option<ConfigNode>>),
    Map(MapNode),
}

impl ConfigNode {
    #[must_use]
    pub fn leaf(value: impl Into<String>) -> Self {
        Self::Leaf(LeafNode::new(value))
    }

    #[must_use]
    pub fn empty_leaf() -> Self {
        Self::Leaf(LeafNode::default())
    }

    #[must_use]
    pub fn array(elements: Vec<Option<ConfigNode>>) -> Self {
        Self::Array(elements)
    }

    #[must_use]
    pub fn map(entries: impl IntoIterator<Item = (String, ConfigNode)>) -> Self {
        Self::Map(entries.into_iter().collect())
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Leaf(_) => NodeKind::Leaf,
            Self::Array(_) => NodeKind::Array,
            Self::Map(_) => NodeKind::Map,
        }
    }

    /// Leaf count, array size (max index + 1), or map entry count.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Array(elements) => elements.len(),
            Self::Map(map) => map.len(),
        }
    }

    /// Resolved leaf value; `None` for containers and valueless leaves.
    /// Reading a temporary secret consumes one of its accesses.
    #[must_use]
    pub fn value(&self) -> Option<String> {
        match self {
            Self::Leaf(leaf) => leaf.value(),
            _ => None,
        }
    }

    /// Case-insensitive map entry lookup.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&ConfigNode> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&ConfigNode> {
        match self {
            Self::Array(elements) => elements.get(index).and_then(Option::as_ref),
            _ => None,
        }
    }

    /// Metadata for this node. Containers roll up their children's
    /// metadata, skipping non-rolling kinds such as the secret marker.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        match self {
            Self::Leaf(leaf) => leaf.metadata.clone(),
            Self::Array(elements) => elements
                .iter()
                .flatten()
                .fold(Metadata::new(), |acc, child| acc.rollup_with(&child.metadata())),
            Self::Map(map) => map
                .iter()
                .fold(Metadata::new(), |acc, (_, child)| acc.rollup_with(&child.metadata())),
        }
    }
}

impl fmt::Display for ConfigNode {
    /// Renders the tree with secret leaves masked. Never consumes
    /// temporary-value accesses.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(leaf) => write!(f, "{}", leaf.display_value()),
            Self::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match element {
                        Some(node) => write!(f, "{node}")?,
                        None => write!(f, "_")?,
                    }
                }
                write!(f, "]")
            },
            Self::Map(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|(a, _), (b, _)| a.cmp(b));
                write!(f, "{{")?;
                for (i, (key, node)) in entries.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}={node}")?;
                }
                write!(f, "}}")
            },
        }
    }
}

/// Walks `tokens` from `root`, returning the node at the path. Absent keys
/// and indices yield `NoResultsFoundForNode` at `MissingValue`; a variant
/// that does not match the token kind yields the corresponding mismatch
/// error.
pub fn navigate<'a>(root: &'a ConfigNode, tokens: &[Token]) -> Validated<&'a ConfigNode> {
    let mut current = root;
    for (consumed, step) in tokens.iter().enumerate() {
        let walked = || token::render(&tokens[..=consumed]);
        match step {
            Token::Object(name) => match current {
                ConfigNode::Map(map) => match map.get(name) {
                    Some(next) => current = next,
                    None => {
                        return Validated::invalid(ValidationError::NoResultsFoundForNode {
                            path: walked(),
                            kind: "node".into(),
                            level: ErrorLevel::MissingValue,
                        });
                    },
                },
                other => {
                    return Validated::invalid(ValidationError::DecodingExpectedMap {
                        path: walked(),
                        received: other.kind(),
                    });
                },
            },
            Token::Index(index) => match current {
                ConfigNode::Array(elements) => match elements.get(*index).and_then(Option::as_ref)
                {
                    Some(next) => current = next,
                    None => {
                        return Validated::invalid(ValidationError::NoResultsFoundForNode {
                            path: walked(),
                            kind: "node".into(),
                            level: ErrorLevel::MissingValue,
                        });
                    },
                },
                other => {
                    return Validated::invalid(ValidationError::DecodingExpectedArray {
                        path: walked(),
                        received: other.kind(),
                    });
                },
            },
        }
    }
    Validated::valid(current)
}

/// Recursively merges two nodes, the second winning scalar conflicts.
///
/// Maps union; arrays merge by index with `b`'s absent slots preserving
/// `a`'s; merging different variants records a `MergeConflict` and keeps
/// `b` so the operation stays associative.
pub fn merge(path: &str, a: ConfigNode, b: ConfigNode) -> Validated<ConfigNode> {
    match (a, b) {
        (ConfigNode::Leaf(first), ConfigNode::Leaf(second)) => {
            let value = second.value.or(first.value);
            let metadata = first.metadata.merge(second.metadata);
            Validated::valid(ConfigNode::Leaf(LeafNode { value, metadata }))
        },
        (ConfigNode::Array(first), ConfigNode::Array(second)) => {
            let mut errors = Vec::new();
            let len = first.len().max(second.len());
            let mut first = first.into_iter();
            let mut second = second.into_iter();
            let mut merged = Vec::with_capacity(len);
            for index in 0..len {
                let slot = match (first.next().flatten(), second.next().flatten()) {
                    (Some(left), Some(right)) => {
                        let child = merge(&format!("{path}[{index}]"), left, right);
                        let (value, mut child_errors) = child.into_parts();
                        errors.append(&mut child_errors);
                        value
                    },
                    (left, right) => right.or(left),
                };
                merged.push(slot);
            }
            Validated::of(Some(ConfigNode::Array(merged)), errors)
        },
        (ConfigNode::Map(first), ConfigNode::Map(second)) => {
            let mut errors = Vec::new();
            let mut merged = first;
            for (key, incoming) in second.entries {
                match merged.remove(&incoming.key) {
                    Some((_, existing)) => {
                        let child_path = if path.is_empty() {
                            incoming.key.clone()
                        } else {
                            format!("{path}.{}", incoming.key)
                        };
                        let child = merge(&child_path, existing, incoming.node);
                        let (value, mut child_errors) = child.into_parts();
                        errors.append(&mut child_errors);
                        if let Some(node) = value {
                            merged.entries.insert(key, MapEntry { key: incoming.key, node });
                        }
                    },
                    None => {
                        merged.entries.insert(key, incoming);
                    },
                }
            }
            Validated::of(Some(ConfigNode::Map(merged)), errors)
        },
        (a, b) => {
            let error = ValidationError::MergeConflict {
                path: path.to_owned(),
                left: a.kind(),
                right: b.kind(),
            };
            Validated::of(Some(b), vec![error])
        },
    }
}

/// Builds a tree from `(tokens, value)` pairs by folding single-entry
/// fragments through [`merge`], so later pairs win conflicts.
pub fn build_tree(
    pairs: impl IntoIterator<Item = (Vec<Token>, String)>,
) -> Validated<ConfigNode> {
    let mut errors = Vec::new();
    let mut root = ConfigNode::Map(MapNode::new());
    for (tokens, value) in pairs {
        let fragment = fragment_for(&tokens, value);
        let merged = merge("", root, fragment);
        let (value, mut merge_errors) = merged.into_parts();
        errors.append(&mut merge_errors);
        root = value.expect("merge always produces a node");
    }
    Validated::of(Some(root), errors)
}

fn fragment_for(tokens: &[Token], value: String) -> ConfigNode {
    let mut node = ConfigNode::leaf(value);
    for step in tokens.iter().rev() {
        node = match step {
            Token::Object(name) => {
                let mut map = MapNode::new();
                map.insert(name.clone(), node);
                ConfigNode::Map(map)
            },
            Token::Index(index) => {
                let mut elements = vec![None; *index];
                elements.push(Some(node));
                ConfigNode::Array(elements)
            },
        };
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::PathLexer;

    fn tokens(path: &str) -> Vec<Token> {
        PathLexer::default().tokenize("test", path).into_value().unwrap()
    }

    fn tree(pairs: &[(&str, &str)]) -> ConfigNode {
        build_tree(
            pairs.iter().map(|(path, value)| (tokens(path), (*value).to_owned())),
        )
        .into_value()
        .unwrap()
    }

    #[test]
    fn navigate_finds_nested_leaf() {
        let root = tree(&[("db.port", "5432"), ("db.host", "localhost")]);
        let node = navigate(&root, &tokens("db.port"));
        assert_eq!(node.into_value().unwrap().value(), Some("5432".to_owned()));
    }

    #[test]
    fn navigate_is_case_insensitive() {
        let root = tree(&[("db.Port", "5432")]);
        let node = navigate(&root, &tokens("DB.port"));
        assert_eq!(node.into_value().unwrap().value(), Some("5432".to_owned()));
    }

    #[test]
    fn navigate_missing_key_is_missing_value() {
        let root = tree(&[("db.port", "5432")]);
        let result = navigate(&root, &tokens("db.host"));
        assert!(!result.has_results());
        assert!(matches!(
            &result.error_list()[0],
            ValidationError::NoResultsFoundForNode { path, .. } if path == "db.host"
        ));
    }

    #[test]
    fn navigate_mismatched_kind_errors() {
        let root = tree(&[("db.port", "5432")]);
        let result = navigate(&root, &tokens("db.port[0]"));
        assert!(matches!(
            &result.error_list()[0],
            ValidationError::DecodingExpectedArray { .. }
        ));

        let result = navigate(&root, &tokens("db.port.inner"));
        assert!(matches!(&result.error_list()[0], ValidationError::DecodingExpectedMap { .. }));
    }

    #[test]
    fn sparse_array_keeps_explicit_holes() {
        let root = tree(&[("xs[2]", "c")]);
        assert_eq!(navigate(&root, &tokens("xs")).into_value().unwrap().size(), 3);
        assert!(navigate(&root, &tokens("xs[0]")).error_list()[0].is_missing());
        assert_eq!(
            navigate(&root, &tokens("xs[2]")).into_value().unwrap().value(),
            Some("c".to_owned())
        );
    }

    #[test]
    fn merge_second_wins_on_scalars() {
        let a = tree(&[("db.port", "1")]);
        let b = tree(&[("db.port", "2"), ("db.host", "h")]);
        let merged = merge("", a, b).into_value().unwrap();
        assert_eq!(
            navigate(&merged, &tokens("db.port")).into_value().unwrap().value(),
            Some("2".to_owned())
        );
        assert_eq!(
            navigate(&merged, &tokens("db.host")).into_value().unwrap().value(),
            Some("h".to_owned())
        );
    }

    #[test]
    fn merge_arrays_by_index() {
        let a = tree(&[("xs[0]", "a"), ("xs[1]", "b")]);
        let b = tree(&[("xs[1]", "B"), ("xs[3]", "D")]);
        let merged = merge("", a, b).into_value().unwrap();
        let xs = navigate(&merged, &tokens("xs")).into_value().unwrap();
        assert_eq!(xs.size(), 4);
        assert_eq!(xs.get_index(0).unwrap().value(), Some("a".to_owned()));
        assert_eq!(xs.get_index(1).unwrap().value(), Some("B".to_owned()));
        assert!(xs.get_index(2).is_none());
        assert_eq!(xs.get_index(3).unwrap().value(), Some("D".to_owned()));
    }

    #[test]
    fn merge_different_kinds_reports_conflict_and_keeps_second() {
        let a = tree(&[("db", "scalar")]);
        let b = tree(&[("db.port", "1")]);
        let result = merge("", a, b);
        assert!(result.has_results());
        assert!(matches!(
            &result.error_list()[0],
            ValidationError::MergeConflict { path, .. } if path == "db"
        ));
        let merged = result.into_value().unwrap();
        assert!(navigate(&merged, &tokens("db.port")).has_results());
    }

    #[test]
    fn merge_is_associative_with_last_wins() {
        let a = tree(&[("x", "1"), ("y.z", "a")]);
        let b = tree(&[("x", "2")]);
        let c = tree(&[("x", "3"), ("y.w", "b")]);

        let left = merge("", merge("", a.clone(), b.clone()).into_value().unwrap(), c.clone())
            .into_value()
            .unwrap();
        let right = merge("", a, merge("", b, c).into_value().unwrap()).into_value().unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn temporary_value_spends_accesses() {
        let temporary = TemporaryValue::new("secret".to_owned(), 2);
        assert_eq!(temporary.take(), Some("secret".to_owned()));
        assert_eq!(temporary.take(), Some("secret".to_owned()));
        assert_eq!(temporary.take(), None);
        assert_eq!(temporary.take(), None);
    }

    #[test]
    fn display_masks_secret_leaves() {
        use crate::metadata::{META_IS_SECRET, MetaValue};

        let mut leaf = LeafNode::new("hunter2");
        leaf.metadata.insert(META_IS_SECRET, MetaValue::Bool(true));
        let root = ConfigNode::map(vec![
            ("password".to_owned(), ConfigNode::Leaf(leaf)),
            ("port".to_owned(), ConfigNode::leaf("5432")),
        ]);
        let rendered = root.to_string();
        assert!(rendered.contains("password=*****"));
        assert!(rendered.contains("port=5432"));
    }

    #[test]
    fn metadata_rollup_skips_secret_kind() {
        use crate::metadata::{META_IS_SECRET, META_SOURCE, MetaValue};

        let mut leaf = LeafNode::new("hunter2");
        leaf.metadata.insert(META_IS_SECRET, MetaValue::Bool(true));
        leaf.metadata.insert(META_SOURCE, MetaValue::Text("env".to_owned()));
        let root = ConfigNode::map(vec![("password".to_owned(), ConfigNode::Leaf(leaf))]);

        let rolled = root.metadata();
        assert!(!rolled.is_secret());
        assert!(rolled.contains(META_SOURCE));
    }
}
