use serde_json::Value;

/// Canonical per-request feature vector: unique keys, sorted by key, numeric
/// values only.
///
/// The sort order keeps diagnostics reproducible; scoring itself is
/// order-independent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    pairs: Vec<(String, f64)>,
}

impl FeatureVector {
    /// Builds a feature vector from an arbitrary decoded payload.
    ///
    /// Non-object input yields an empty vector and entries whose values
    /// cannot be read as a real number are dropped silently. This is a
    /// best-effort policy, not an error path.
    pub fn from_value(raw: &Value) -> Self {
        let mut pairs: Vec<(String, f64)> = match raw {
            Value::Object(map) => map
                .iter()
                .filter_map(|(key, value)| coerce(value).map(|n| (key.clone(), n)))
                .collect(),
            _ => Vec::new(),
        };
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.pairs.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(key, _)| key.as_str())
    }
}

/// Numeric coercion: JSON numbers as-is, booleans as 1.0/0.0, strings
/// through a trimmed float parse.
fn coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
