use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub const MIN_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_INTERVAL_SECS: i64 = 60;

/// Companion action performed once per batch of new alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertMode {
    None,
    Sound(u8),
    Voice,
    Unrecognized(String),
}

impl AlertMode {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "none" => AlertMode::None,
            "voice" => AlertMode::Voice,
            other => other
                .strip_prefix("sound-")
                .or_else(|| other.strip_prefix("sweet-alert-"))
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| (1..=5).contains(n))
                .map(AlertMode::Sound)
                .unwrap_or_else(|| AlertMode::Unrecognized(other.to_string())),
        }
    }
}

impl Default for AlertMode {
    fn default() -> Self {
        AlertMode::Voice
    }
}

impl From<String> for AlertMode {
    fn from(raw: String) -> Self {
        AlertMode::parse(&raw)
    }
}

impl From<AlertMode> for String {
    fn from(mode: AlertMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for AlertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertMode::None => f.write_str("none"),
            AlertMode::Sound(n) => write!(f, "sound-{n}"),
            AlertMode::Voice => f.write_str("voice"),
            AlertMode::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// User-facing options stored under the `options` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub alert: AlertMode,
    pub interval: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alert: AlertMode::default(),
            interval: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl Settings {
    /// Reads an `options` record leniently. Missing or mistyped fields fall
    /// back to their defaults; the interval may also arrive as a numeric string.
    pub fn from_record(record: &Value) -> Self {
        let defaults = Settings::default();

        let alert = record
            .get("alert")
            .and_then(Value::as_str)
            .map(AlertMode::parse)
            .unwrap_or(defaults.alert);

        let interval = record
            .get("interval")
            .and_then(|v| match v {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .unwrap_or(defaults.interval);

        Self { alert, interval }
    }

    /// True when both `alert` and `interval` are present in the record.
    pub fn is_complete(record: &Value) -> bool {
        record
            .as_object()
            .is_some_and(|o| o.contains_key("alert") && o.contains_key("interval"))
    }

    pub fn next_delay(&self) -> Duration {
        Duration::from_secs(clamp_interval(self.interval))
    }
}

pub fn clamp_interval(raw: i64) -> u64 {
    if raw >= MIN_INTERVAL_SECS as i64 {
        raw as u64
    } else {
        MIN_INTERVAL_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interval_clamp() {
        let cases = [(0, 60), (1, 60), (59, 60), (60, 60), (61, 61), (3600, 3600), (-5, 60)];
        for (raw, expected) in cases {
            let settings = Settings {
                alert: AlertMode::None,
                interval: raw,
            };
            assert_eq!(settings.next_delay(), Duration::from_secs(expected), "raw {raw}");
        }
    }

    #[test]
    fn test_alert_mode_parse() {
        assert_eq!(AlertMode::parse("none"), AlertMode::None);
        assert_eq!(AlertMode::parse("voice"), AlertMode::Voice);
        assert_eq!(AlertMode::parse("sound-3"), AlertMode::Sound(3));
        assert_eq!(AlertMode::parse("sweet-alert-5"), AlertMode::Sound(5));
        assert_eq!(
            AlertMode::parse("sound-9"),
            AlertMode::Unrecognized("sound-9".to_string())
        );
        assert_eq!(
            AlertMode::parse("klaxon"),
            AlertMode::Unrecognized("klaxon".to_string())
        );
    }

    #[test]
    fn test_default_record_serialization() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(value, json!({"alert": "voice", "interval": 60}));
    }

    #[test]
    fn test_from_record_is_lenient() {
        let settings = Settings::from_record(&json!({"alert": "sound-2", "interval": "90"}));
        assert_eq!(settings.alert, AlertMode::Sound(2));
        assert_eq!(settings.interval, 90);

        let settings = Settings::from_record(&json!({"interval": true}));
        assert_eq!(settings, Settings::default());

        let settings = Settings::from_record(&Value::Null);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_completeness() {
        assert!(Settings::is_complete(&json!({"alert": "none", "interval": 60})));
        assert!(!Settings::is_complete(&json!({"alert": "none"})));
        assert!(!Settings::is_complete(&json!({"interval": 60})));
        assert!(!Settings::is_complete(&Value::Null));
    }
}
