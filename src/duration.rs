//! Human-readable durations for the config file ("500ms", "30s", "5m", "1h").

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer, Serializer};

const UNITS: [(&str, u64); 4] = [("h", 3_600_000), ("m", 60_000), ("s", 1_000), ("ms", 1)];

/// Parse a duration string made of a whole number and a unit.
///
/// Units are `ms`, `s`, `m` and `h`; a bare number means seconds.
///
/// ```
/// use azsaml::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
/// assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_ascii_lowercase();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    if num.is_empty() {
        anyhow::bail!("Duration must start with a number: {s:?}");
    }

    let num: u64 = num.parse().context("Invalid number in duration")?;
    let unit = if unit.is_empty() { "s" } else { unit.trim() };
    let (_, millis) = UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .with_context(|| format!("Unknown duration unit {unit:?} (use ms, s, m or h)"))?;

    let total = num.checked_mul(*millis).context("Duration is too large")?;
    Ok(Duration::from_millis(total))
}

/// Format with the largest unit that divides the duration evenly.
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    UNITS
        .iter()
        .find(|(_, size)| millis >= u128::from(*size) && millis % u128::from(*size) == 0)
        .map(|(name, size)| format!("{}{name}", millis / u128::from(*size)))
        .unwrap_or_else(|| "0s".to_string())
}

/// Serde deserializer for optional duration strings.
///
/// Use with `#[serde(default, deserialize_with = "deserialize_duration_opt")]`.
pub fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    opt.map(|s| parse_duration(&s).map_err(de::Error::custom))
        .transpose()
}

/// Serde serializer matching [`deserialize_duration_opt`].
pub fn serialize_duration_opt<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(d) => serializer.serialize_str(&format_duration(*d)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration(" 45 ").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("10 S").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("1d").is_err());
        assert!(parse_duration("1.5s").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration(&format!("{}h", u64::MAX)).is_err());
    }

    #[test]
    fn test_format_picks_largest_unit() {
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Settings {
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "deserialize_duration_opt",
            serialize_with = "serialize_duration_opt"
        )]
        timeout: Option<Duration>,
    }

    #[test]
    fn test_serde_optional() {
        let settings: Settings = toml::from_str(r#"timeout = "2m""#).unwrap();
        assert_eq!(settings.timeout, Some(Duration::from_secs(120)));
        assert_eq!(toml::to_string(&settings).unwrap().trim(), r#"timeout = "2m""#);

        let empty: Settings = toml::from_str("").unwrap();
        assert_eq!(empty.timeout, None);

        assert!(toml::from_str::<Settings>(r#"timeout = "soon""#).is_err());
    }
}
