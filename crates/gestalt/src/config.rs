//! Tuning knobs and error policies for a configuration instance.

use crate::error::ErrorLevel;

/// Default maximum number of nested substitutions per leaf.
pub const DEFAULT_SUBSTITUTION_MAX_DEPTH: usize = 5;

/// Default opening token of a substitution expression.
pub const DEFAULT_SUBSTITUTION_OPENING: &str = "${";

/// Default closing token of a substitution expression.
pub const DEFAULT_SUBSTITUTION_CLOSING: &str = "}";

/// Default inner grammar of a substitution expression:
/// `(transform:)?key(:=default)?`. The key excludes `:` and `=` so the
/// optional transform and default groups stay unambiguous.
pub const DEFAULT_SUBSTITUTION_REGEX: &str =
    r"^(?:(?P<transform>\w+):)?(?P<key>[^:=]+)(?::=(?P<default>.*))?$";

/// Policy flags and formatting options, set through the builder and shared
/// read-only by every component.
#[derive(Debug, Clone)]
pub struct GestaltConfig {
    /// Any warning-level error promotes a typed read into a failure.
    pub treat_warnings_as_errors: bool,
    /// A sparse array slot that is missing decodes as an error instead of
    /// being skipped.
    pub treat_missing_array_index_as_error: bool,
    /// A missing object field is a hard error even for optional targets.
    pub treat_missing_values_as_errors: bool,
    /// An object field that decodes to a null value is a hard error.
    pub treat_null_values_in_class_as_errors: bool,
    /// Level recorded when an absent value is absorbed by an optional
    /// target or a default.
    pub log_level_for_missing_values_when_default_or_optional: ErrorLevel,

    /// Format for zoned date-times; RFC 3339 when unset.
    pub date_decoder_format: Option<String>,
    /// Format for local date-times; `%Y-%m-%dT%H:%M:%S` when unset.
    pub local_date_time_format: Option<String>,
    /// Format for local dates; `%Y-%m-%d` when unset.
    pub local_date_format: Option<String>,

    pub substitution_opening_token: String,
    pub substitution_closing_token: String,
    pub substitution_regex: String,
    pub max_substitution_nested_depth: usize,

    /// Memoize decoded values by `(path, type, tags)`.
    pub use_cache: bool,
}

impl Default for GestaltConfig {
    fn default() -> Self {
        Self {
            treat_warnings_as_errors: false,
            treat_missing_array_index_as_error: false,
            treat_missing_values_as_errors: false,
            treat_null_values_in_class_as_errors: false,
            log_level_for_missing_values_when_default_or_optional: ErrorLevel::Debug,
            date_decoder_format: None,
            local_date_time_format: None,
            local_date_format: None,
            substitution_opening_token: DEFAULT_SUBSTITUTION_OPENING.to_owned(),
            substitution_closing_token: DEFAULT_SUBSTITUTION_CLOSING.to_owned(),
            substitution_regex: DEFAULT_SUBSTITUTION_REGEX.to_owned(),
            max_substitution_nested_depth: DEFAULT_SUBSTITUTION_MAX_DEPTH,
            use_cache: true,
        }
    }
}
