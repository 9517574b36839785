use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Researcher {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One study as returned by the listing endpoint.
///
/// Fields the watcher does not use are kept in `extra` so the persisted
/// snapshot carries the full record for other consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub researcher: Researcher,
    #[serde(deserialize_with = "whole_number")]
    pub reward: i64,
    #[serde(deserialize_with = "whole_number")]
    pub average_reward_per_hour: i64,
    #[serde(deserialize_with = "whole_number")]
    pub total_available_places: i64,
    #[serde(deserialize_with = "whole_number")]
    pub places_taken: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    pub fn researcher_name(&self) -> &str {
        &self.researcher.name
    }

    pub fn remaining_places(&self) -> i64 {
        self.total_available_places - self.places_taken
    }
}

#[derive(Debug, Deserialize)]
pub struct ListingResponse {
    pub results: Vec<Item>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsSnapshot {
    #[serde(default)]
    pub studies: Vec<Item>,
    #[serde(default)]
    pub checked: Option<String>,
}

/// External trigger delivered to the daemon's event router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    RunNow,
    AlertActivated(String),
}

impl InboundEvent {
    /// Decodes a loosely typed message. Unknown kinds yield `None`.
    pub fn from_message(kind: &str, argument: &str) -> Option<Self> {
        match kind {
            "prolific" | "refresh" | "run-now" => Some(InboundEvent::RunNow),
            "activate" | "open" if !argument.is_empty() => {
                Some(InboundEvent::AlertActivated(argument.to_string()))
            }
            _ => None,
        }
    }
}

/// Formats an amount in cents as units with two decimals: `1050` -> `"10.50"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

fn whole_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    value
        .as_f64()
        .map(|f| f.round() as i64)
        .ok_or_else(|| serde::de::Error::custom(format!("not a representable number: {value}")))
}

#[cfg(test)]
pub(crate) fn make_item(id: &str) -> Item {
    Item {
        id: id.to_string(),
        name: format!("Study {id}"),
        researcher: Researcher {
            name: "Dr. Smith".to_string(),
            extra: Map::new(),
        },
        reward: 1050,
        average_reward_per_hour: 900,
        total_available_places: 40,
        places_taken: 12,
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(1050), "10.50");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-250), "-2.50");
    }

    #[test]
    fn test_parse_listing_response() {
        let body = r#"{
            "results": [{
                "id": "64a1f",
                "name": "Decision making survey",
                "researcher": {"id": "r1", "name": "Jane Doe"},
                "reward": 150,
                "average_reward_per_hour": 912.4,
                "total_available_places": 100,
                "places_taken": 37,
                "estimated_completion_time": 10
            }],
            "meta": {"count": 1}
        }"#;

        let parsed: ListingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 1);

        let item = &parsed.results[0];
        assert_eq!(item.id, "64a1f");
        assert_eq!(item.researcher_name(), "Jane Doe");
        assert_eq!(item.average_reward_per_hour, 912);
        assert_eq!(item.remaining_places(), 63);
        assert_eq!(item.extra.get("estimated_completion_time"), Some(&Value::from(10)));
    }

    #[test]
    fn test_missing_results_is_an_error() {
        let parsed = serde_json::from_str::<ListingResponse>(r#"{"detail": "nope"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_inbound_event_from_message() {
        assert_eq!(
            InboundEvent::from_message("prolific", ""),
            Some(InboundEvent::RunNow)
        );
        assert_eq!(
            InboundEvent::from_message("activate", "64a1f"),
            Some(InboundEvent::AlertActivated("64a1f".to_string()))
        );
        assert_eq!(InboundEvent::from_message("activate", ""), None);
        assert_eq!(InboundEvent::from_message("shutdown", "now"), None);
    }

    #[test]
    fn test_snapshot_keeps_unknown_fields() {
        let mut item = make_item("a");
        item.extra
            .insert("study_type".to_string(), Value::from("SINGLE"));

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["study_type"], "SINGLE");
        assert_eq!(json["researcher"]["name"], "Dr. Smith");
    }
}
