//! Post-processors rewrite nodes at generation-build time, depth-first and
//! in descending priority order.

mod secret;
mod substitution;

pub use secret::{SecretRule, TemporarySecretProcessor};
pub use substitution::{
    DEFAULT_TRANSFORM, EnvTransform, FileTransform, MapTransform, NodeTransform,
    SubstitutionProcessor, Transform,
};

use crate::config::GestaltConfig;
use crate::lexer::PathLexer;
use crate::node::ConfigNode;
use crate::priority::Priority;
use crate::results::Validated;
use std::sync::Arc;

/// Context available to a post-processor invocation.
///
/// `root` is the merged, not-yet-processed tree, so lookups (e.g. the
/// `node` substitution transform) see raw values.
#[derive(Debug, Clone, Copy)]
pub struct PostProcessContext<'a> {
    pub root: &'a ConfigNode,
    pub lexer: &'a PathLexer,
    pub config: &'a GestaltConfig,
}

pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> Priority {
        Priority::Medium
    }

    /// Rewrites a single node. Returning a value-less result leaves the
    /// node unchanged while keeping the errors.
    fn process(
        &self,
        path: &str,
        node: &ConfigNode,
        ctx: &PostProcessContext<'_>,
    ) -> Validated<ConfigNode>;
}

/// An ordered chain of post-processors.
#[derive(Clone)]
pub struct PostProcessorChain {
    processors: Vec<Arc<dyn PostProcessor>>,
}

impl std::fmt::Debug for PostProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.processors.iter().map(|p| p.name())).finish()
    }
}

impl PostProcessorChain {
    /// Builds a chain sorted by descending priority; registration order
    /// breaks ties.
    #[must_use]
    pub fn new(mut processors: Vec<Arc<dyn PostProcessor>>) -> Self {
        processors.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Self { processors }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Applies the chain depth-first over the tree rooted at `root`.
    pub fn process(
        &self,
        root: &ConfigNode,
        lexer: &PathLexer,
        config: &GestaltConfig,
    ) -> Validated<ConfigNode> {
        if self.processors.is_empty() {
            return Validated::valid(root.clone());
        }
        let ctx = PostProcessContext { root, lexer, config };
        self.walk("", root, &ctx)
    }

    fn walk(
        &self,
        path: &str,
        node: &ConfigNode,
        ctx: &PostProcessContext<'_>,
    ) -> Validated<ConfigNode> {
        let mut errors = Vec::new();

        // Children first, so a processed subtree is rebuilt before the
        // processors see its parent.
        let rebuilt = match node {
            ConfigNode::Leaf(_) => node.clone(),
            ConfigNode::Array(elements) => {
                let mut processed = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    match element {
                        Some(child) => {
                            let child_path = format!("{path}[{index}]");
                            let result = self.walk(&child_path, child, ctx);
                            let (value, mut child_errors) = result.into_parts();
                            errors.append(&mut child_errors);
                            processed.push(value.or_else(|| Some(child.clone())));
                        },
                        None => processed.push(None),
                    }
                }
                ConfigNode::Array(processed)
            },
            ConfigNode::Map(map) => {
                let mut processed = Vec::with_capacity(map.len());
                for (key, child) in map.iter() {
                    let child_path = if path.is_empty() {
                        key.to_owned()
                    } else {
                        format!("{path}.{key}")
                    };
                    let result = self.walk(&child_path, child, ctx);
                    let (value, mut child_errors) = result.into_parts();
                    errors.append(&mut child_errors);
                    processed.push((key.to_owned(), value.unwrap_or_else(|| child.clone())));
                }
                ConfigNode::map(processed)
            },
        };

        let mut current = rebuilt;
        for processor in &self.processors {
            let result = processor.process(path, &current, ctx);
            let (value, mut processor_errors) = result.into_parts();
            errors.append(&mut processor_errors);
            if let Some(rewritten) = value {
                current = rewritten;
            }
        }
        Validated::of(Some(current), errors)
    }
}
