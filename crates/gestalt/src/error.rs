//! Error types for validation and the fatal user surface.
//!
//! Decoding and navigation never abort on the first problem; they accumulate
//! [`ValidationError`]s inside a [`crate::Validated`] container. Only the
//! top-level API translates accumulated failures into a [`GestaltError`].

use crate::node::NodeKind;
use std::borrow::Cow;
use strum_macros::Display;

/// Severity of a single validation error.
///
/// `Debug` and `MissingOptionalValue` never fail a call. `MissingValue` and
/// `Error` always do. `Warn` fails only when warnings are treated as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum ErrorLevel {
    Debug,
    MissingOptionalValue,
    MissingValue,
    Warn,
    Error,
}

/// A single non-fatal problem discovered while tokenizing, merging,
/// post-processing, or decoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The path lexer could not parse a segment.
    #[error("unable to tokenize element \"{element}\" for path \"{path}\"")]
    FailedToTokenize { element: String, path: String },

    /// Navigation or field lookup found nothing at the path.
    #[error("unable to find node matching path \"{path}\", for type {kind}")]
    NoResultsFoundForNode { path: String, kind: Cow<'static, str>, level: ErrorLevel },

    /// An absent value was absorbed by an optional or defaulted target.
    #[error("missing optional value on path \"{path}\", for type {kind}")]
    OptionalMissingValue { path: String, kind: Cow<'static, str>, level: ErrorLevel },

    #[error("expected a leaf on path \"{path}\", received a {received} node")]
    DecodingExpectedLeaf { path: String, received: NodeKind },

    #[error("expected an array on path \"{path}\", received a {received} node")]
    DecodingExpectedArray { path: String, received: NodeKind },

    #[error("expected a map on path \"{path}\", received a {received} node")]
    DecodingExpectedMap { path: String, received: NodeKind },

    /// The leaf exists but carries no value (or its value was already spent).
    #[error("leaf on path \"{path}\" has no value attempting to decode {kind}")]
    DecodingLeafMissingValue { path: String, kind: Cow<'static, str> },

    #[error("unable to parse number \"{value}\" on path \"{path}\" as {kind}")]
    DecodingNumberParsing { path: String, value: String, kind: Cow<'static, str> },

    /// The text is numeric but does not fit the target type.
    #[error("number \"{value}\" on path \"{path}\" does not fit into {kind}")]
    DecodingNumberFormat { path: String, value: String, kind: Cow<'static, str> },

    /// Char decoding received the wrong size value. Too-long keeps the first
    /// code point at `Warn`; empty yields no result at `Error`.
    #[error("decoding char on path \"{path}\" received the wrong size value \"{value}\"")]
    DecodingCharWrongSize { path: String, value: String, level: ErrorLevel },

    #[error("unable to parse \"{value}\" on path \"{path}\" as {kind}: {reason}")]
    DecodingValueParsing {
        path: String,
        value: String,
        kind: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("array on path \"{path}\" is missing index {index}")]
    ArrayMissingIndex { path: String, index: usize, level: ErrorLevel },

    /// A field of a decoded object resolved to a null value while the
    /// null-in-class policy is active.
    #[error("field \"{field}\" on path \"{path}\" decoded to a null value")]
    NullValueInClass { path: String, field: String },

    /// A registered decoder entry could not be used for the requested type.
    #[error("no decoder found for type {kind}")]
    NoDecoderFor { kind: Cow<'static, str> },

    /// Two nodes of different kinds met during a merge; the second one wins.
    #[error("unable to merge a {left} node with a {right} node on path \"{path}\"")]
    MergeConflict { path: String, left: NodeKind, right: NodeKind },

    #[error("substitution key \"{key}\" via transform \"{transform}\" on path \"{path}\" was not found")]
    SubstitutionMissingKey { path: String, key: String, transform: String, level: ErrorLevel },

    #[error("substitution on path \"{path}\" exceeded the maximum nested depth of {max_depth}")]
    SubstitutionRecursionLimit { path: String, max_depth: usize },

    #[error("substitution cycle detected on path \"{path}\" resolving key \"{key}\" via transform \"{transform}\"")]
    SubstitutionCycle { path: String, key: String, transform: String },

    #[error("substitution expression \"{expression}\" on path \"{path}\" does not match the expected syntax")]
    SubstitutionInvalidExpression { path: String, expression: String },

    #[error("no transform named \"{transform}\" registered, for substitution on path \"{path}\"")]
    SubstitutionNoMatchingTransform { path: String, transform: String },
}

impl ValidationError {
    /// Severity of this error. Variants whose severity is policy-driven
    /// carry it inline; the rest map to a fixed level.
    #[must_use]
    pub fn level(&self) -> ErrorLevel {
        match self {
            Self::NoResultsFoundForNode { level, .. }
            | Self::OptionalMissingValue { level, .. }
            | Self::DecodingCharWrongSize { level, .. }
            | Self::ArrayMissingIndex { level, .. }
            | Self::SubstitutionMissingKey { level, .. } => *level,
            Self::DecodingLeafMissingValue { .. } => ErrorLevel::MissingValue,
            Self::FailedToTokenize { .. }
            | Self::DecodingExpectedLeaf { .. }
            | Self::DecodingExpectedArray { .. }
            | Self::DecodingExpectedMap { .. }
            | Self::DecodingNumberParsing { .. }
            | Self::DecodingNumberFormat { .. }
            | Self::DecodingValueParsing { .. }
            | Self::NullValueInClass { .. }
            | Self::NoDecoderFor { .. }
            | Self::MergeConflict { .. }
            | Self::SubstitutionRecursionLimit { .. }
            | Self::SubstitutionCycle { .. }
            | Self::SubstitutionInvalidExpression { .. }
            | Self::SubstitutionNoMatchingTransform { .. } => ErrorLevel::Error,
        }
    }

    /// True when the error only reports an absent value, as opposed to data
    /// that exists but is corrupt. Absences can be absorbed by optional
    /// targets and defaults; a missing-kind error promoted to `Error` by
    /// policy cannot.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        let missing_kind = matches!(
            self,
            Self::NoResultsFoundForNode { .. }
                | Self::OptionalMissingValue { .. }
                | Self::ArrayMissingIndex { .. }
                | Self::DecodingLeafMissingValue { .. }
        );
        missing_kind && self.level() != ErrorLevel::Error
    }
}

/// The fatal error surface of the library.
///
/// Everything below the public API accumulates [`ValidationError`]s instead;
/// these variants are produced only where a call cannot return a value.
#[derive(Debug, thiserror::Error)]
pub enum GestaltError {
    /// The configuration instance could not be constructed.
    #[error("unable to build configuration: {message}")]
    Build { message: Cow<'static, str> },

    /// A source failed to produce its contribution.
    #[error("unable to load source \"{name}\": {message}")]
    SourceLoad { name: String, message: Cow<'static, str> },

    /// An underlying IO failure while reading a source.
    #[error("io failure for \"{path}\": {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Generation build failed with error-level post-processing results.
    #[error("post-processing failed: {}", format_errors(.errors))]
    PostProcessing { errors: Vec<ValidationError> },

    /// A typed read failed; carries the full accumulated error set.
    #[error("failed getting config path \"{path}\", for type {kind}: {}", format_errors(.errors))]
    Decode { path: String, kind: Cow<'static, str>, errors: Vec<ValidationError> },
}

impl GestaltError {
    /// The validation errors behind this failure, when it carries any.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            Self::PostProcessing { errors } | Self::Decode { errors, .. } => errors,
            _ => &[],
        }
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_severity() {
        let err = ValidationError::FailedToTokenize {
            element: "a[".to_owned(),
            path: "a[".to_owned(),
        };
        assert_eq!(err.level(), ErrorLevel::Error);

        let err = ValidationError::NoResultsFoundForNode {
            path: "db.port".to_owned(),
            kind: "i64".into(),
            level: ErrorLevel::MissingValue,
        };
        assert_eq!(err.level(), ErrorLevel::MissingValue);
        assert!(err.is_missing());
    }

    #[test]
    fn decode_error_lists_all_causes() {
        let err = GestaltError::Decode {
            path: "db.port".to_owned(),
            kind: "u16".into(),
            errors: vec![
                ValidationError::DecodingNumberParsing {
                    path: "db.port".to_owned(),
                    value: "abc".to_owned(),
                    kind: "u16".into(),
                },
                ValidationError::DecodingLeafMissingValue {
                    path: "db.host".to_owned(),
                    kind: "String".into(),
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("db.port"));
        assert!(rendered.contains("abc"));
        assert!(rendered.contains("db.host"));
    }
}
