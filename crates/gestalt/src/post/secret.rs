//! Temporary secrets: leaves matching configured rules are wrapped with an
//! access-counted value that drops the plaintext once its reads are spent.

use crate::metadata::{META_IS_SECRET, MetaValue};
use crate::node::{ConfigNode, LeafNode, LeafValue, TemporaryValue};
use crate::post::{PostProcessContext, PostProcessor};
use crate::priority::Priority;
use crate::results::Validated;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// A rule selecting which leaves become temporary secrets.
#[derive(Debug, Clone)]
pub struct SecretRule {
    pattern: Regex,
    accesses: usize,
}

impl SecretRule {
    /// Compiles a rule from a path-matching regex and an access budget.
    pub fn new(pattern: &str, accesses: usize) -> Result<Self, regex::Error> {
        Ok(Self { pattern: Regex::new(pattern)?, accesses: accesses.max(1) })
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    #[must_use]
    pub fn accesses(&self) -> usize {
        self.accesses
    }
}

/// Rewrites matching leaves into access-counted secret leaves. Runs at low
/// priority, after substitution has resolved the plaintext.
#[derive(Debug, Clone, Default)]
pub struct TemporarySecretProcessor {
    rules: Vec<SecretRule>,
}

impl TemporarySecretProcessor {
    #[must_use]
    pub fn new(rules: Vec<SecretRule>) -> Self {
        Self { rules }
    }
}

impl PostProcessor for TemporarySecretProcessor {
    fn name(&self) -> &'static str {
        "TemporarySecretProcessor"
    }

    fn priority(&self) -> Priority {
        Priority::Low
    }

    fn process(
        &self,
        path: &str,
        node: &ConfigNode,
        _ctx: &PostProcessContext<'_>,
    ) -> Validated<ConfigNode> {
        let ConfigNode::Leaf(leaf) = node else {
            return Validated::valid(node.clone());
        };
        let Some(LeafValue::Plain(value)) = &leaf.value else {
            return Validated::valid(node.clone());
        };
        let Some(rule) = self.rules.iter().find(|rule| rule.matches(path)) else {
            return Validated::valid(node.clone());
        };

        debug!(path, accesses = rule.accesses(), "wrapping leaf as temporary secret");
        let mut metadata = leaf.metadata.clone();
        metadata.insert(META_IS_SECRET, MetaValue::Bool(true));
        let temporary = TemporaryValue::new(value.clone(), rule.accesses());
        Validated::valid(ConfigNode::Leaf(LeafNode {
            value: Some(LeafValue::Temporary(Arc::new(temporary))),
            metadata,
        }))
    }
}
