//! Date and time decoders, driven by the configured format strings.

use crate::decode::{Decode, DecodeContext, leaf_value};
use crate::error::ValidationError;
use crate::node::ConfigNode;
use crate::results::Validated;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Fallback format for local dates.
pub const DEFAULT_LOCAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Fallback format for local date-times.
pub const DEFAULT_LOCAL_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn parse_error(
    path: &str,
    value: &str,
    kind: &'static str,
    error: &chrono::ParseError,
) -> ValidationError {
    ValidationError::DecodingValueParsing {
        path: path.to_owned(),
        value: value.to_owned(),
        kind: kind.into(),
        reason: error.to_string().into(),
    }
}

impl Decode for NaiveDate {
    fn decode(path: &str, node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        leaf_value(path, node, "NaiveDate").and_then(|raw| {
            let trimmed = raw.trim();
            let format = ctx
                .config()
                .local_date_format
                .as_deref()
                .unwrap_or(DEFAULT_LOCAL_DATE_FORMAT);
            match NaiveDate::parse_from_str(trimmed, format) {
                Ok(value) => Validated::valid(value),
                Err(error) => {
                    Validated::invalid(parse_error(path, trimmed, "NaiveDate", &error))
                },
            }
        })
    }
}

impl Decode for NaiveDateTime {
    fn decode(path: &str, node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        leaf_value(path, node, "NaiveDateTime").and_then(|raw| {
            let trimmed = raw.trim();
            let format = ctx
                .config()
                .local_date_time_format
                .as_deref()
                .unwrap_or(DEFAULT_LOCAL_DATE_TIME_FORMAT);
            match NaiveDateTime::parse_from_str(trimmed, format) {
                Ok(value) => Validated::valid(value),
                Err(error) => {
                    Validated::invalid(parse_error(path, trimmed, "NaiveDateTime", &error))
                },
            }
        })
    }
}

impl Decode for DateTime<FixedOffset> {
    fn decode(path: &str, node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self> {
        leaf_value(path, node, "DateTime").and_then(|raw| {
            let trimmed = raw.trim();
            let parsed = match &ctx.config().date_decoder_format {
                Some(format) => DateTime::parse_from_str(trimmed, format),
                None => DateTime::parse_from_rfc3339(trimmed),
            };
            match parsed {
                Ok(value) => Validated::valid(value),
                Err(error) => Validated::invalid(parse_error(path, trimmed, "DateTime", &error)),
            }
        })
    }
}
