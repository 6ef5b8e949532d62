//! Lenient field accessors over raw JSON records.
//!
//! Upstream APIs are inconsistent about numbers-as-strings and nulls, so every
//! accessor takes a list of candidate keys and returns `None` rather than
//! failing when nothing usable is found.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use classement_shared::UNKNOWN_TEAM;

/// First non-null value among `keys`.
pub(crate) fn first<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| v.get(*k))
        .find(|x| !x.is_null())
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-negative integer counter.
pub(crate) fn get_u32(v: &Value, keys: &[&str]) -> Option<u32> {
    first(v, keys)
        .and_then(as_i64)
        .and_then(|n| u32::try_from(n).ok())
}

/// Signed integer (points can go negative after penalties).
pub(crate) fn get_i32(v: &Value, keys: &[&str]) -> Option<i32> {
    first(v, keys)
        .and_then(as_i64)
        .and_then(|n| i32::try_from(n).ok())
}

/// Boolean, also accepting `0/1` and `"true"/"false"`.
pub(crate) fn get_bool(v: &Value, keys: &[&str]) -> Option<bool> {
    match first(v, keys)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "oui" => Some(true),
            "false" | "0" | "non" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Non-empty string after trimming.
pub(crate) fn get_str<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a str> {
    first(v, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Collapse internal whitespace runs and trim.
pub fn clean_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a team's display name from a team value.
///
/// `None` means the team value itself is absent. A present team without a
/// usable name yields the placeholder.
pub(crate) fn team_name(team: Option<&Value>) -> Option<String> {
    let team = team.filter(|t| !t.is_null())?;
    let name = match team {
        Value::String(s) => Some(s.as_str()),
        Value::Object(_) => get_str(team, &["short_name", "shortName", "name", "nom", "long_name"]),
        _ => None,
    };
    Some(
        name.map(clean_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_TEAM.to_string()),
    )
}

/// Parse the date formats seen upstream (RFC 3339, naive datetime, bare date).
pub(crate) fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_accept_strings_and_skip_nulls() {
        let v = json!({ "a": null, "b": "12", "c": 3.0, "d": -4 });
        assert_eq!(get_u32(&v, &["a", "b"]), Some(12));
        assert_eq!(get_u32(&v, &["c"]), Some(3));
        assert_eq!(get_u32(&v, &["d"]), None);
        assert_eq!(get_i32(&v, &["d"]), Some(-4));
        assert_eq!(get_u32(&v, &["missing"]), None);
    }

    #[test]
    fn bools_accept_numbers() {
        let v = json!({ "x": 1, "y": "false", "z": true });
        assert_eq!(get_bool(&v, &["x"]), Some(true));
        assert_eq!(get_bool(&v, &["y"]), Some(false));
        assert_eq!(get_bool(&v, &["z"]), Some(true));
    }

    #[test]
    fn team_name_fallbacks() {
        assert_eq!(team_name(None), None);
        assert_eq!(team_name(Some(&Value::Null)), None);
        assert_eq!(
            team_name(Some(&json!({ "short_name": "  AS   Volley " }))).as_deref(),
            Some("AS Volley")
        );
        assert_eq!(
            team_name(Some(&json!({ "short_name": null, "name": "Club Long Name" }))).as_deref(),
            Some("Club Long Name")
        );
        assert_eq!(
            team_name(Some(&json!({ "id": 12 }))).as_deref(),
            Some(UNKNOWN_TEAM)
        );
    }

    #[test]
    fn date_formats() {
        assert!(parse_date("2024-09-21T15:00:00+02:00").is_some());
        assert!(parse_date("2024-09-21 15:00:00").is_some());
        assert_eq!(
            parse_date("2024-09-21").map(|d| d.to_rfc3339()),
            Some("2024-09-21T00:00:00+00:00".to_string())
        );
        assert!(parse_date("samedi").is_none());
    }
}
