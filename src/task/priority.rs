//! Task priority: an integer from 1 (highest) to 5 (lowest).
//!
//! Hand-edited files may carry a number, a word (`high`, `medium-low`, ...)
//! or garbage. [`LenientPriority`] decodes all of them without failing.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;

pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 5;
pub const DEFAULT_PRIORITY: i32 = 3;

/// Clamp any integer into the priority range.
pub fn clamp_priority(value: i64) -> i32 {
    value.clamp(MIN_PRIORITY as i64, MAX_PRIORITY as i64) as i32
}

/// Map a word form to its priority.
pub fn priority_from_word(input: &str) -> Option<i32> {
    let key: String = input
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| if ch == '_' || ch == ' ' { '-' } else { ch })
        .collect();
    match key.as_str() {
        "high" => Some(1),
        "medium-high" | "high-medium" => Some(2),
        "medium" => Some(3),
        "medium-low" | "low-medium" => Some(4),
        "low" => Some(5),
        _ => None,
    }
}

/// Parse a numeric or word priority, clamping numbers and falling back to
/// medium for anything unrecognized.
pub fn normalize_priority(input: &str) -> i32 {
    let trimmed = input.trim();
    if let Ok(number) = trimmed.parse::<i64>() {
        return clamp_priority(number);
    }
    match priority_from_word(trimmed) {
        Some(priority) => priority,
        None => {
            tracing::warn!(value = input, "unrecognized priority, using medium");
            DEFAULT_PRIORITY
        }
    }
}

pub fn priority_label(priority: i32) -> &'static str {
    match priority {
        1 => "High",
        2 => "Medium-High",
        3 => "Medium",
        4 => "Medium-Low",
        _ => "Low",
    }
}

/// Priority decoded leniently from any YAML node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LenientPriority(pub i32);

impl Default for LenientPriority {
    fn default() -> Self {
        LenientPriority(DEFAULT_PRIORITY)
    }
}

impl LenientPriority {
    pub fn from_value(value: &Value) -> Self {
        let priority = match value {
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    clamp_priority(int)
                } else if let Some(float) = number.as_f64() {
                    clamp_priority(float.round() as i64)
                } else {
                    DEFAULT_PRIORITY
                }
            }
            Value::String(text) => normalize_priority(text),
            other => {
                tracing::warn!(node = ?other, "priority is not a number or word, using medium");
                DEFAULT_PRIORITY
            }
        };
        LenientPriority(priority)
    }
}

impl Serialize for LenientPriority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.0)
    }
}

impl<'de> Deserialize<'de> for LenientPriority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(LenientPriority::from_value(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(yaml: &str) -> i32 {
        serde_yaml::from_str::<LenientPriority>(yaml).expect("never fails").0
    }

    #[test]
    fn in_range_values_round_trip() {
        for value in 1..=5 {
            let decoded = decode(&value.to_string());
            assert_eq!(decoded, value);
            let encoded = serde_yaml::to_string(&LenientPriority(decoded)).unwrap();
            assert_eq!(encoded.trim(), value.to_string());
        }
    }

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(decode("0"), 1);
        assert_eq!(decode("-4"), 1);
        assert_eq!(decode("6"), 5);
        assert_eq!(decode("99"), 5);
    }

    #[test]
    fn word_forms_are_accepted() {
        assert_eq!(decode("high"), 1);
        assert_eq!(decode("Medium High"), 2);
        assert_eq!(decode("high_medium"), 2);
        assert_eq!(decode("medium"), 3);
        assert_eq!(decode("medium-low"), 4);
        assert_eq!(decode("low medium"), 4);
        assert_eq!(decode("LOW"), 5);
        assert_eq!(decode("\"2\""), 2);
    }

    #[test]
    fn invalid_nodes_fall_back_to_medium() {
        assert_eq!(decode("urgent"), DEFAULT_PRIORITY);
        assert_eq!(decode("true"), DEFAULT_PRIORITY);
        assert_eq!(decode("{a: 1}"), DEFAULT_PRIORITY);
        assert_eq!(decode("[1, 2]"), DEFAULT_PRIORITY);
        assert_eq!(decode("~"), DEFAULT_PRIORITY);
    }
}
