//! Tag list normalization and lenient YAML decoding.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;

/// Trim every tag, drop empties and duplicates, keep first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Tags decoded from any YAML node; non-list nodes become an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LenientTags(pub Vec<String>);

impl LenientTags {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Sequence(items) => {
                let mut raw = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(text) => raw.push(text.clone()),
                        Value::Number(number) => raw.push(number.to_string()),
                        Value::Bool(flag) => raw.push(flag.to_string()),
                        other => {
                            tracing::warn!(node = ?other, "dropping non-scalar tag entry");
                        }
                    }
                }
                LenientTags(normalize_tags(raw))
            }
            other => {
                tracing::warn!(node = ?other, "tags is not a list, using no tags");
                LenientTags(Vec::new())
            }
        }
    }
}

impl Serialize for LenientTags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LenientTags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(LenientTags::from_value(&value))
    }
}
