//! The node manager: owner of per-source fragments and the published
//! generation of the merged, post-processed tree.
//!
//! Readers take a snapshot of the current generation under a shared lock
//! and work on it; rebuilds happen entirely off-line and publish by
//! swapping the single owning reference under the exclusive lock, so every
//! in-flight read completes against one consistent generation.

use crate::config::GestaltConfig;
use crate::lexer::PathLexer;
use crate::node::{self, ConfigNode, MapNode};
use crate::post::PostProcessorChain;
use crate::results::Validated;
use crate::source::SourceId;
use crate::token::Token;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, trace};

/// An immutable snapshot of the merged tree, versioned by an incrementing
/// id.
#[derive(Debug)]
pub struct Generation {
    id: u64,
    root: ConfigNode,
}

impl Generation {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn root(&self) -> &ConfigNode {
        &self.root
    }
}

#[derive(Debug)]
struct SourceFragment {
    source_id: SourceId,
    node: ConfigNode,
}

/// Owns the source fragments and the current generation.
#[derive(Debug)]
pub struct NodeManager {
    fragments: Mutex<Vec<SourceFragment>>,
    current: RwLock<Arc<Generation>>,
}

impl Default for NodeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeManager {
    #[must_use]
    pub fn new() -> Self {
        let empty = Generation { id: 0, root: ConfigNode::Map(MapNode::new()) };
        Self { fragments: Mutex::new(Vec::new()), current: RwLock::new(Arc::new(empty)) }
    }

    /// The current generation. The shared lock is held only long enough to
    /// clone the reference; callers operate on the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Generation> {
        self.current.read().clone()
    }

    /// Records (or replaces) the fragment contributed by a source. Merge
    /// order is the order fragments were first added, so a reload keeps the
    /// original source precedence.
    pub fn upsert_fragment(&self, source_id: SourceId, fragment: ConfigNode) {
        let mut fragments = self.fragments.lock();
        match fragments.iter_mut().find(|f| f.source_id == source_id) {
            Some(existing) => {
                trace!(source = %source_id, "replacing source fragment");
                existing.node = fragment;
            },
            None => {
                trace!(source = %source_id, "adding source fragment");
                fragments.push(SourceFragment { source_id, node: fragment });
            },
        }
    }

    #[must_use]
    pub fn contains_fragment(&self, source_id: &SourceId) -> bool {
        self.fragments.lock().iter().any(|f| &f.source_id == source_id)
    }

    /// Merges every fragment in source order and runs the post-processor
    /// chain, producing the root of a candidate generation. The published
    /// generation is untouched until [`NodeManager::publish`].
    pub fn build_root(
        &self,
        chain: &PostProcessorChain,
        lexer: &PathLexer,
        config: &GestaltConfig,
    ) -> Validated<ConfigNode> {
        let merged = {
            let fragments = self.fragments.lock();
            let mut errors = Vec::new();
            let mut root = ConfigNode::Map(MapNode::new());
            for fragment in fragments.iter() {
                let step = node::merge("", root, fragment.node.clone());
                let (value, mut step_errors) = step.into_parts();
                errors.append(&mut step_errors);
                root = value.expect("merge always produces a node");
            }
            Validated::of(Some(root), errors)
        };
        merged.and_then(|root| chain.process(&root, lexer, config))
    }

    /// Publishes a new generation built from `root`, bumping the
    /// generation counter under the exclusive lock.
    pub fn publish(&self, root: ConfigNode) -> Arc<Generation> {
        let mut current = self.current.write();
        let generation = Arc::new(Generation { id: current.id() + 1, root });
        *current = generation.clone();
        debug!(generation = generation.id(), "published configuration generation");
        generation
    }

    /// Navigates a token path against a generation snapshot.
    pub fn navigate<'a>(
        &self,
        generation: &'a Generation,
        tokens: &[Token],
    ) -> Validated<&'a ConfigNode> {
        node::navigate(generation.root(), tokens)
    }
}
