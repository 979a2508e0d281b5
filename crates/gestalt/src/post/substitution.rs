//! The substitution engine: rewrites leaf values containing
//! `${(transform:)key(:=default)}` expressions.
//!
//! Expressions resolve leftmost-innermost, so nesting works:
//! `${a:${b}}` resolves `${b}` first. Every splice increments a depth
//! counter bounded by the configured maximum, and a set of
//! `(transform, key)` pairs on the current expansion path detects cycles.

use crate::error::{ErrorLevel, ValidationError};
use crate::node::{ConfigNode, LeafNode, LeafValue};
use crate::post::{PostProcessContext, PostProcessor};
use crate::priority::Priority;
use crate::results::Validated;
use fxhash::{FxHashMap, FxHashSet};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the default transform, resolving keys against the config tree.
pub const DEFAULT_TRANSFORM: &str = "node";

/// A named strategy for resolving a substitution key against a backing
/// store.
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    fn get(&self, key: &str, ctx: &PostProcessContext<'_>) -> Option<String>;
}

/// Resolves keys against process environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvTransform;

impl Transform for EnvTransform {
    fn name(&self) -> &'static str {
        "env"
    }

    fn get(&self, key: &str, _ctx: &PostProcessContext<'_>) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Resolves keys as paths into the merged (raw) config tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeTransform;

impl Transform for NodeTransform {
    fn name(&self) -> &'static str {
        DEFAULT_TRANSFORM
    }

    fn get(&self, key: &str, ctx: &PostProcessContext<'_>) -> Option<String> {
        let tokens = ctx.lexer.tokenize("substitution", key).into_value()?;
        crate::node::navigate(ctx.root, &tokens)
            .into_value()
            .and_then(ConfigNode::value)
    }
}

/// Resolves keys against a user-supplied in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MapTransform {
    entries: FxHashMap<String, String>,
}

impl MapTransform {
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self { entries: entries.into_iter().collect() }
    }
}

impl Transform for MapTransform {
    fn name(&self) -> &'static str {
        "map"
    }

    fn get(&self, key: &str, _ctx: &PostProcessContext<'_>) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

/// Resolves keys as file paths, substituting the trimmed file contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransform;

impl Transform for FileTransform {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str, _ctx: &PostProcessContext<'_>) -> Option<String> {
        match std::fs::read_to_string(key) {
            Ok(contents) => Some(contents.trim_end_matches(['\r', '\n']).to_owned()),
            Err(error) => {
                warn!(file = key, %error, "file transform could not read file");
                None
            },
        }
    }
}

/// The substitution post-processor. Runs at high priority so later
/// processors (e.g. temporary secrets) see resolved values.
pub struct SubstitutionProcessor {
    opening: String,
    closing: String,
    pattern: Regex,
    max_depth: usize,
    transforms: FxHashMap<&'static str, Arc<dyn Transform>>,
}

impl std::fmt::Debug for SubstitutionProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubstitutionProcessor")
            .field("opening", &self.opening)
            .field("closing", &self.closing)
            .field("max_depth", &self.max_depth)
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SubstitutionProcessor {
    /// Builds the processor from the configured tokens, regex, and depth
    /// bound. Fails when the regex does not compile.
    pub fn new(
        opening: impl Into<String>,
        closing: impl Into<String>,
        pattern: &str,
        max_depth: usize,
        transforms: Vec<Arc<dyn Transform>>,
    ) -> Result<Self, regex::Error> {
        let pattern = Regex::new(pattern)?;
        let transforms = transforms.into_iter().map(|t| (t.name(), t)).collect();
        Ok(Self {
            opening: opening.into(),
            closing: closing.into(),
            pattern,
            max_depth,
            transforms,
        })
    }

    /// Finds the closing token matching the opening token at `open`,
    /// accounting for nested expressions. Returns the byte offsets of the
    /// inner text's end and of the end of the whole expression.
    fn matching_close(&self, text: &str, open: usize) -> Option<(usize, usize)> {
        let mut index = open + self.opening.len();
        let mut level = 0usize;
        while index < text.len() {
            if text[index..].starts_with(&self.opening) {
                level += 1;
                index += self.opening.len();
            } else if text[index..].starts_with(&self.closing) {
                if level == 0 {
                    return Some((index, index + self.closing.len()));
                }
                level -= 1;
                index += self.closing.len();
            } else {
                index += text[index..].chars().next().map_or(1, char::len_utf8);
            }
        }
        None
    }

    fn resolve(&self, path: &str, text: &str, ctx: &PostProcessContext<'_>) -> Validated<String> {
        let mut errors = Vec::new();
        let mut seen: FxHashSet<(String, String)> = FxHashSet::default();
        let value = self.expand(path, text, ctx, &mut seen, 0, &mut errors);
        Validated::of(value, errors)
    }

    /// Expands every expression in `text`, left to right.
    ///
    /// `seen` holds the `(transform, key)` pairs on the current expansion
    /// path only: an entry is pushed when descending into a resolved value
    /// and popped once that value has fully expanded, so a key appearing in
    /// two sibling expressions is not a cycle. `depth` counts nesting, not
    /// width. Returns `None` when this expansion path failed; the recorded
    /// errors say why.
    fn expand(
        &self,
        path: &str,
        text: &str,
        ctx: &PostProcessContext<'_>,
        seen: &mut FxHashSet<(String, String)>,
        depth: usize,
        errors: &mut Vec<ValidationError>,
    ) -> Option<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find(&self.opening) {
            let Some((inner_end, expr_end)) = self.matching_close(rest, open) else {
                // Unmatched opening token: keep the tail verbatim.
                break;
            };
            out.push_str(&rest[..open]);
            let expression = &rest[open..expr_end];
            let inner_raw = &rest[open + self.opening.len()..inner_end];

            // A nested expression inside the inner text is one level deeper
            // on the same path; resolve it before parsing.
            let inner = if inner_raw.contains(&self.opening) {
                self.descend(path, inner_raw, ctx, seen, depth, errors)?
            } else {
                inner_raw.to_owned()
            };

            let parsed = self.pattern.captures(&inner).map(|captures| {
                (
                    captures
                        .name("transform")
                        .map_or(DEFAULT_TRANSFORM, |m| m.as_str())
                        .to_owned(),
                    captures.name("key").map_or("", |m| m.as_str()).to_owned(),
                    captures.name("default").map(|m| m.as_str().to_owned()),
                )
            });
            let Some((transform_name, key, default)) = parsed else {
                errors.push(ValidationError::SubstitutionInvalidExpression {
                    path: path.to_owned(),
                    expression: inner,
                });
                return None;
            };

            let pair = (transform_name.clone(), key.clone());
            if seen.contains(&pair) {
                errors.push(ValidationError::SubstitutionCycle {
                    path: path.to_owned(),
                    key,
                    transform: transform_name,
                });
                return None;
            }

            let Some(transform) = self.transforms.get(transform_name.as_str()) else {
                errors.push(ValidationError::SubstitutionNoMatchingTransform {
                    path: path.to_owned(),
                    transform: transform_name,
                });
                return None;
            };

            match transform.get(&key, ctx) {
                Some(value) if value.contains(&self.opening) => {
                    seen.insert(pair.clone());
                    let expanded = self.descend(path, &value, ctx, seen, depth, errors);
                    seen.remove(&pair);
                    out.push_str(&expanded?);
                },
                Some(value) => out.push_str(&value),
                None => match default {
                    Some(fallback) => {
                        debug!(path, %key, transform = %transform_name, "substitution defaulted");
                        errors.push(ValidationError::SubstitutionMissingKey {
                            path: path.to_owned(),
                            key,
                            transform: transform_name,
                            level: ErrorLevel::MissingOptionalValue,
                        });
                        out.push_str(&fallback);
                    },
                    None => {
                        errors.push(ValidationError::SubstitutionMissingKey {
                            path: path.to_owned(),
                            key,
                            transform: transform_name,
                            level: ErrorLevel::MissingValue,
                        });
                        if depth > 0 {
                            return None;
                        }
                        // Keep the unresolved expression and move on to the
                        // rest of the leaf.
                        out.push_str(expression);
                    },
                },
            }

            rest = &rest[expr_end..];
        }

        out.push_str(rest);
        Some(out)
    }

    /// One step deeper on the expansion path, bounded by the configured
    /// maximum nesting depth.
    fn descend(
        &self,
        path: &str,
        text: &str,
        ctx: &PostProcessContext<'_>,
        seen: &mut FxHashSet<(String, String)>,
        depth: usize,
        errors: &mut Vec<ValidationError>,
    ) -> Option<String> {
        if depth + 1 > self.max_depth {
            errors.push(ValidationError::SubstitutionRecursionLimit {
                path: path.to_owned(),
                max_depth: self.max_depth,
            });
            return None;
        }
        self.expand(path, text, ctx, seen, depth + 1, errors)
    }
}

impl PostProcessor for SubstitutionProcessor {
    fn name(&self) -> &'static str {
        "SubstitutionProcessor"
    }

    fn priority(&self) -> Priority {
        Priority::High
    }

    fn process(
        &self,
        path: &str,
        node: &ConfigNode,
        ctx: &PostProcessContext<'_>,
    ) -> Validated<ConfigNode> {
        let ConfigNode::Leaf(leaf) = node else {
            return Validated::valid(node.clone());
        };
        let Some(LeafValue::Plain(value)) = &leaf.value else {
            return Validated::valid(node.clone());
        };
        if !value.contains(&self.opening) {
            return Validated::valid(node.clone());
        }

        self.resolve(path, value, ctx).map(|resolved| {
            ConfigNode::Leaf(LeafNode {
                value: Some(LeafValue::Plain(resolved)),
                metadata: leaf.metadata.clone(),
            })
        })
    }
}
