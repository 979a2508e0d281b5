//! Duration decoding: plain integers are milliseconds, anything else must
//! match the ISO-8601 duration pattern (`PnDTnHnMnS`).

use crate::decode::{Decode, DecodeContext, leaf_value};
use crate::error::ValidationError;
use crate::node::ConfigNode;
use crate::results::Validated;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[Pp](?:(?P<days>\d+)[Dd])?(?:[Tt](?:(?P<hours>\d+)[Hh])?(?:(?P<minutes>\d+)[Mm])?(?:(?P<seconds>\d+(?:\.\d+)?)[Ss])?)?$",
    )
    .expect("duration pattern is a valid regex")
});

impl Decode for Duration {
    fn decode(path: &str, node: &ConfigNode, _ctx: &DecodeContext<'_>) -> Validated<Self> {
        leaf_value(path, node, "Duration").and_then(|raw| {
            let trimmed = raw.trim();
            if let Ok(millis) = trimmed.parse::<u64>() {
                return Validated::valid(Duration::from_millis(millis));
            }
            match parse_iso(trimmed) {
                Some(duration) => Validated::valid(duration),
                None => Validated::invalid(ValidationError::DecodingValueParsing {
                    path: path.to_owned(),
                    value: trimmed.to_owned(),
                    kind: "Duration".into(),
                    reason: "expected integer milliseconds or an ISO-8601 duration".into(),
                }),
            }
        })
    }
}

fn parse_iso(raw: &str) -> Option<Duration> {
    let captures = ISO_DURATION.captures(raw)?;

    let days = captures.name("days").map(|m| m.as_str().parse::<u64>());
    let hours = captures.name("hours").map(|m| m.as_str().parse::<u64>());
    let minutes = captures.name("minutes").map(|m| m.as_str().parse::<u64>());
    let seconds = captures.name("seconds").map(|m| m.as_str().parse::<f64>());

    // A bare "P" or "PT" matches the pattern but carries no components.
    if days.is_none() && hours.is_none() && minutes.is_none() && seconds.is_none() {
        return None;
    }

    let mut total = Duration::ZERO;
    if let Some(days) = days {
        total += Duration::from_secs(days.ok()?.checked_mul(86_400)?);
    }
    if let Some(hours) = hours {
        total += Duration::from_secs(hours.ok()?.checked_mul(3_600)?);
    }
    if let Some(minutes) = minutes {
        total += Duration::from_secs(minutes.ok()?.checked_mul(60)?);
    }
    if let Some(seconds) = seconds {
        total += Duration::try_from_secs_f64(seconds.ok()?).ok()?;
    }
    Some(total)
}
