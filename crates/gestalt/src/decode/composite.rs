//! Composite decoders: arrays, string-keyed maps, and optional values.
//!
//! Every element decodes through [`DecodeContext::decode`], never by
//! calling another decoder directly, so registered overrides apply at any
//! depth.

use crate::decode::{Decode, DecodeContext, leaf_value};
use crate::error::{ErrorLevel, ValidationError};
use crate::node::ConfigNode;
use crate::results::Validated;
use std::any::type_name;
use std::collections::{BTreeMap, HashMap};

impl<T: Decode> Decode for Vec<T> {
    /// Accepts an `Array` node, or a `Leaf` whose value is a
    /// comma-separated list: split, trim, decode each piece as `T`.
    fn decode(path: &str, node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        match node {
            ConfigNode::Array(elements) => {
                let mut errors = Vec::new();
                let mut values = Vec::new();
                let mut complete = true;
                for (index, slot) in elements.iter().enumerate() {
                    match slot {
                        Some(child) => {
                            let element_path = format!("{path}[{index}]");
                            let (value, element_errors) =
                                ctx.decode::<T>(&element_path, child).into_parts();
                            errors.extend(element_errors);
                            match value {
                                Some(value) => values.push(value),
                                None => complete = false,
                            }
                        },
                        None => {
                            let level = if ctx.config().treat_missing_array_index_as_error {
                                ErrorLevel::Error
                            } else {
                                ErrorLevel::MissingOptionalValue
                            };
                            errors.push(ValidationError::ArrayMissingIndex {
                                path: path.to_owned(),
                                index,
                                level,
                            });
                        },
                    }
                }
                Validated::of(complete.then_some(values), errors)
            },
            ConfigNode::Leaf(_) => {
                leaf_value(path, node, type_name::<Vec<T>>()).and_then(|raw| {
                    let trimmed = raw.trim();
                    if trimmed.is_empty() {
                        return Validated::valid(Vec::new());
                    }
                    let mut errors = Vec::new();
                    let mut values = Vec::new();
                    let mut complete = true;
                    for (index, piece) in trimmed.split(',').enumerate() {
                        let element = ConfigNode::leaf(piece.trim());
                        let element_path = format!("{path}[{index}]");
                        let (value, element_errors) =
                            ctx.decode::<T>(&element_path, &element).into_parts();
                        errors.extend(element_errors);
                        match value {
                            Some(value) => values.push(value),
                            None => complete = false,
                        }
                    }
                    Validated::of(complete.then_some(values), errors)
                })
            },
            other => Validated::invalid(ValidationError::DecodingExpectedArray {
                path: path.to_owned(),
                received: other.kind(),
            }),
        }
    }
}

fn decode_map<V: Decode>(
    path: &str,
    node: &ConfigNode,
    ctx: &DecodeContext<'_>,
) -> Validated<Vec<(String, V)>> {
    match node {
        ConfigNode::Map(map) => {
            let mut errors = Vec::new();
            let mut entries = Vec::new();
            let mut complete = true;
            for (key, child) in map.iter() {
                let entry_path = DecodeContext::join_path(path, key);
                let (value, entry_errors) = ctx.decode::<V>(&entry_path, child).into_parts();
                errors.extend(entry_errors);
                match value {
                    Some(value) => entries.push((key.to_owned(), value)),
                    None => complete = false,
                }
            }
            Validated::of(complete.then_some(entries), errors)
        },
        other => Validated::invalid(ValidationError::DecodingExpectedMap {
            path: path.to_owned(),
            received: other.kind(),
        }),
    }
}

impl<V: Decode> Decode for HashMap<String, V> {
    fn decode(path: &str, node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        decode_map(path, node, ctx).map(|entries| entries.into_iter().collect())
    }
}

impl<V: Decode> Decode for BTreeMap<String, V> {
    fn decode(path: &str, node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        decode_map(path, node, ctx).map(|entries| entries.into_iter().collect())
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(path: &str, node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        ctx.decode::<T>(path, node).map(Some)
    }

    /// An absent optional is `None`, recorded at the configured
    /// accepted-missing level rather than as a failure.
    fn absent(path: &str, ctx: &DecodeContext<'_>) -> Validated<Self> {
        Validated::of(
            Some(None),
            vec![ValidationError::OptionalMissingValue {
                path: path.to_owned(),
                kind: type_name::<T>().into(),
                level: ctx.optional_missing_level(),
            }],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GestaltConfig;
    use crate::decode::testing::{with_config_ctx, with_ctx};

    #[test]
    fn comma_leaf_decodes_as_array() {
        let node = ConfigNode::leaf("1, 2 ,3");
        let result = with_ctx(|ctx| ctx.decode::<Vec<i64>>("xs", &node));
        assert!(!result.has_errors());
        assert_eq!(result.into_value(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn empty_leaf_decodes_as_empty_array() {
        let node = ConfigNode::leaf("  ");
        let result = with_ctx(|ctx| ctx.decode::<Vec<i64>>("xs", &node));
        assert_eq!(result.into_value(), Some(Vec::new()));
    }

    #[test]
    fn array_node_decodes_elementwise() {
        let node = ConfigNode::array(vec![
            Some(ConfigNode::leaf("10")),
            Some(ConfigNode::leaf("20")),
        ]);
        let result = with_ctx(|ctx| ctx.decode::<Vec<u32>>("xs", &node));
        assert_eq!(result.into_value(), Some(vec![10, 20]));
    }

    #[test]
    fn sparse_slot_is_skipped_with_an_optional_error() {
        let node = ConfigNode::array(vec![
            Some(ConfigNode::leaf("10")),
            None,
            Some(ConfigNode::leaf("30")),
        ]);
        let result = with_ctx(|ctx| ctx.decode::<Vec<u32>>("xs", &node));
        assert_eq!(result.value(), Some(&vec![10, 30]));
        assert!(matches!(
            &result.error_list()[0],
            ValidationError::ArrayMissingIndex { index: 1, level: ErrorLevel::MissingOptionalValue, .. }
        ));
    }

    #[test]
    fn sparse_slot_is_an_error_under_policy() {
        let node = ConfigNode::array(vec![None, Some(ConfigNode::leaf("30"))]);
        let config = GestaltConfig {
            treat_missing_array_index_as_error: true,
            ..GestaltConfig::default()
        };
        let result = with_config_ctx(config, |ctx| ctx.decode::<Vec<u32>>("xs", &node));
        assert_eq!(result.error_list()[0].level(), ErrorLevel::Error);
    }

    #[test]
    fn bad_element_fails_the_array_but_keeps_other_errors() {
        let node = ConfigNode::leaf("1,x,3");
        let result = with_ctx(|ctx| ctx.decode::<Vec<i64>>("xs", &node));
        assert!(!result.has_results());
        assert_eq!(result.error_list().len(), 1);
    }

    #[test]
    fn string_keyed_maps_decode() {
        let node = ConfigNode::map(vec![
            ("alpha".to_owned(), ConfigNode::leaf("1")),
            ("beta".to_owned(), ConfigNode::leaf("2")),
        ]);
        let result = with_ctx(|ctx| ctx.decode::<BTreeMap<String, i32>>("counts", &node));
        let decoded = result.into_value().unwrap();
        assert_eq!(decoded.get("alpha"), Some(&1));
        assert_eq!(decoded.get("beta"), Some(&2));
    }

    #[test]
    fn map_from_non_map_errors() {
        let node = ConfigNode::leaf("1");
        let result = with_ctx(|ctx| ctx.decode::<HashMap<String, i32>>("counts", &node));
        assert!(matches!(
            &result.error_list()[0],
            ValidationError::DecodingExpectedMap { .. }
        ));
    }

    #[test]
    fn optional_present_delegates() {
        let node = ConfigNode::leaf("42");
        let result = with_ctx(|ctx| ctx.decode::<Option<i64>>("answer", &node));
        assert_eq!(result.into_value(), Some(Some(42)));
    }

    #[test]
    fn optional_absent_is_none_at_configured_level() {
        let result = with_ctx(|ctx| ctx.decode_absent::<Option<i64>>("answer"));
        assert_eq!(result.value(), Some(&None));
        assert_eq!(result.error_list()[0].level(), ErrorLevel::Debug);
    }

    #[test]
    fn optional_with_corrupt_data_still_fails() {
        let node = ConfigNode::leaf("not-a-number");
        let result = with_ctx(|ctx| ctx.decode::<Option<i64>>("answer", &node));
        assert!(!result.has_results());
        assert!(result.has_errors());
    }
}
