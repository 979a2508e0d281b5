//! Leaf decoders: parse a single opaque string value into a typed value.

use crate::decode::{Decode, DecodeContext};
use crate::error::{ErrorLevel, ValidationError};
use crate::node::ConfigNode;
use crate::results::Validated;
use std::any::type_name;
use std::num::IntErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

/// Extracts the string value of a leaf node. Containers and valueless
/// leaves yield the corresponding error; reading a temporary secret
/// consumes one of its accesses.
pub fn leaf_value(path: &str, node: &ConfigNode, kind: &'static str) -> Validated<String> {
    match node {
        ConfigNode::Leaf(leaf) => match leaf.value() {
            Some(value) => Validated::valid(value),
            None => Validated::invalid(ValidationError::DecodingLeafMissingValue {
                path: path.to_owned(),
                kind: kind.into(),
            }),
        },
        other => Validated::invalid(ValidationError::DecodingExpectedLeaf {
            path: path.to_owned(),
            received: other.kind(),
        }),
    }
}

fn parse_int<T>(path: &str, raw: &str) -> Validated<T>
where
    T: FromStr<Err = std::num::ParseIntError> + 'static,
{
    match raw.parse::<T>() {
        Ok(value) => Validated::valid(value),
        Err(error) => match error.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                Validated::invalid(ValidationError::DecodingNumberFormat {
                    path: path.to_owned(),
                    value: raw.to_owned(),
                    kind: type_name::<T>().into(),
                })
            },
            _ => Validated::invalid(ValidationError::DecodingNumberParsing {
                path: path.to_owned(),
                value: raw.to_owned(),
                kind: type_name::<T>().into(),
            }),
        },
    }
}

macro_rules! impl_int_decode {
    ($($t:ty),* $(,)?) => {$(
        impl Decode for $t {
            fn decode(
                path: &str,
                node: &ConfigNode,
                _ctx: &DecodeContext<'_>,
            ) -> Validated<Self> {
                leaf_value(path, node, type_name::<$t>())
                    .and_then(|raw| parse_int::<$t>(path, raw.trim()))
            }
        }
    )*};
}

impl_int_decode!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

fn literal_non_finite(raw: &str) -> bool {
    let lowered = raw.to_ascii_lowercase();
    lowered.contains("inf") || lowered.contains("nan")
}

macro_rules! impl_float_decode {
    ($($t:ty),* $(,)?) => {$(
        impl Decode for $t {
            fn decode(
                path: &str,
                node: &ConfigNode,
                _ctx: &DecodeContext<'_>,
            ) -> Validated<Self> {
                leaf_value(path, node, type_name::<$t>()).and_then(|raw| {
                    let trimmed = raw.trim();
                    match trimmed.parse::<$t>() {
                        Ok(value) if value.is_finite() || literal_non_finite(trimmed) => {
                            Validated::valid(value)
                        },
                        // Parsed but overflowed the representable range.
                        Ok(_) => Validated::invalid(ValidationError::DecodingNumberFormat {
                            path: path.to_owned(),
                            value: trimmed.to_owned(),
                            kind: type_name::<$t>().into(),
                        }),
                        Err(_) => Validated::invalid(ValidationError::DecodingNumberParsing {
                            path: path.to_owned(),
                            value: trimmed.to_owned(),
                            kind: type_name::<$t>().into(),
                        }),
                    }
                })
            }
        }
    )*};
}

impl_float_decode!(f32, f64);

impl Decode for String {
    fn decode(path: &str, node: &ConfigNode, _ctx: &DecodeContext<'_>) -> Validated<Self> {
        leaf_value(path, node, "String")
    }
}

impl Decode for bool {
    fn decode(path: &str, node: &ConfigNode, _ctx: &DecodeContext<'_>) -> Validated<Self> {
        leaf_value(path, node, "bool").and_then(|raw| {
            match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Validated::valid(true),
                "false" | "no" | "0" => Validated::valid(false),
                other => Validated::invalid(ValidationError::DecodingValueParsing {
                    path: path.to_owned(),
                    value: other.to_owned(),
                    kind: "bool".into(),
                    reason: "expected one of true/false/yes/no/1/0".into(),
                }),
            }
        })
    }
}

impl Decode for char {
    fn decode(path: &str, node: &ConfigNode, _ctx: &DecodeContext<'_>) -> Validated<Self> {
        leaf_value(path, node, "char").and_then(|raw| {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(value), None) => Validated::valid(value),
                (Some(value), Some(_)) => Validated::of(
                    Some(value),
                    vec![ValidationError::DecodingCharWrongSize {
                        path: path.to_owned(),
                        value: raw.clone(),
                        level: ErrorLevel::Warn,
                    }],
                ),
                (None, _) => Validated::invalid(ValidationError::DecodingCharWrongSize {
                    path: path.to_owned(),
                    value: raw.clone(),
                    level: ErrorLevel::Error,
                }),
            }
        })
    }
}

impl Decode for uuid::Uuid {
    fn decode(path: &str, node: &ConfigNode, _ctx: &DecodeContext<'_>) -> Validated<Self> {
        leaf_value(path, node, "Uuid").and_then(|raw| {
            let trimmed = raw.trim();
            match uuid::Uuid::parse_str(trimmed) {
                Ok(value) => Validated::valid(value),
                Err(error) => Validated::invalid(ValidationError::DecodingValueParsing {
                    path: path.to_owned(),
                    value: trimmed.to_owned(),
                    kind: "Uuid".into(),
                    reason: error.to_string().into(),
                }),
            }
        })
    }
}

impl Decode for PathBuf {
    fn decode(path: &str, node: &ConfigNode, _ctx: &DecodeContext<'_>) -> Validated<Self> {
        leaf_value(path, node, "PathBuf").map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::testing::with_ctx;

    fn decode<T: Decode>(value: &str) -> Validated<T> {
        let node = ConfigNode::leaf(value);
        with_ctx(|ctx| ctx.decode::<T>("test", &node))
    }

    #[test]
    fn integers_parse_and_trim() {
        assert_eq!(decode::<i64>(" 42 ").into_value(), Some(42));
        assert_eq!(decode::<u16>("65535").into_value(), Some(65535));
        assert_eq!(decode::<i8>("-128").into_value(), Some(-128));
    }

    #[test]
    fn integer_overflow_is_a_format_error() {
        let result = decode::<u8>("256");
        assert!(!result.has_results());
        assert!(matches!(
            &result.error_list()[0],
            ValidationError::DecodingNumberFormat { .. }
        ));
    }

    #[test]
    fn integer_garbage_is_a_parsing_error() {
        let result = decode::<i32>("abc");
        assert!(matches!(
            &result.error_list()[0],
            ValidationError::DecodingNumberParsing { .. }
        ));
    }

    #[test]
    fn floats_parse_and_range_check() {
        assert_eq!(decode::<f64>("3.25").into_value(), Some(3.25));
        assert_eq!(decode::<f32>("-0.5").into_value(), Some(-0.5));

        let result = decode::<f32>("3.5e40");
        assert!(matches!(
            &result.error_list()[0],
            ValidationError::DecodingNumberFormat { .. }
        ));
    }

    #[test]
    fn bool_accepts_all_spellings() {
        for raw in ["true", "TRUE", "Yes", "1"] {
            assert_eq!(decode::<bool>(raw).into_value(), Some(true), "{raw}");
        }
        for raw in ["false", "No", "0", "FALSE"] {
            assert_eq!(decode::<bool>(raw).into_value(), Some(false), "{raw}");
        }
        assert!(!decode::<bool>("enabled").has_results());
    }

    #[test]
    fn char_too_long_keeps_first_and_warns() {
        let result = decode::<char>("aaa");
        assert_eq!(result.value(), Some(&'a'));
        assert_eq!(result.error_list().len(), 1);
        assert_eq!(result.error_list()[0].level(), ErrorLevel::Warn);
        assert!(result.error_list()[0].to_string().contains("received the wrong size"));
    }

    #[test]
    fn char_empty_is_an_error_with_no_result() {
        let result = decode::<char>("");
        assert!(!result.has_results());
        assert_eq!(result.error_list()[0].level(), ErrorLevel::Error);
        assert!(result.error_list()[0].to_string().contains("received the wrong size"));
    }

    #[test]
    fn uuid_parses() {
        let result = decode::<uuid::Uuid>("67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert!(result.has_results());
        assert!(!decode::<uuid::Uuid>("not-a-uuid").has_results());
    }

    #[test]
    fn decoding_container_as_leaf_errors() {
        let node = ConfigNode::map(vec![("a".to_owned(), ConfigNode::leaf("1"))]);
        let result = with_ctx(|ctx| ctx.decode::<String>("test", &node));
        assert!(matches!(
            &result.error_list()[0],
            ValidationError::DecodingExpectedLeaf { .. }
        ));
    }

    #[test]
    fn valueless_leaf_errors() {
        let node = ConfigNode::empty_leaf();
        let result = with_ctx(|ctx| ctx.decode::<String>("test", &node));
        assert!(matches!(
            &result.error_list()[0],
            ValidationError::DecodingLeafMissingValue { .. }
        ));
    }
}
