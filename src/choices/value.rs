use std::fmt;

use serde::Serialize;

/// A resolved answer stored in the choice tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContextValue {
    Text(String),
    Boolean(bool),
    /// Selected option identifiers in selection order, without duplicates.
    /// A single-valued select holds exactly one entry.
    Select(Vec<String>),
}

impl ContextValue {
    pub fn select<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected: Vec<String> = Vec::new();
        for id in ids {
            let id = id.into();
            if !selected.contains(&id) {
                selected.push(id);
            }
        }
        ContextValue::Select(selected)
    }

    /// Truthiness used by the `${path}` existence test. Only an explicit
    /// boolean `false` counts as absent.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, ContextValue::Boolean(false))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ContextValue::Text(_) => "text",
            ContextValue::Boolean(_) => "boolean",
            ContextValue::Select(_) => "select",
        }
    }

    pub fn selects(&self, id: &str) -> bool {
        matches!(self, ContextValue::Select(ids) if ids.iter().any(|s| s == id))
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ContextValue::Text(s) => serde_json::Value::String(s.clone()),
            ContextValue::Boolean(b) => serde_json::Value::Bool(*b),
            ContextValue::Select(ids) => serde_json::Value::Array(
                ids.iter().cloned().map(serde_json::Value::String).collect(),
            ),
        }
    }

    /// Flat string form used in properties files and error messages.
    pub fn to_flat_string(&self) -> String {
        match self {
            ContextValue::Text(s) => s.clone(),
            ContextValue::Boolean(b) => b.to_string(),
            ContextValue::Select(ids) => ids.join(","),
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_flat_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_deduplicates_preserving_order() {
        let value = ContextValue::select(["b", "a", "b"]);
        assert_eq!(
            value,
            ContextValue::Select(vec!["b".to_string(), "a".to_string()])
        );
        assert!(value.selects("a"));
        assert!(!value.selects("c"));
        assert_eq!(value.to_flat_string(), "b,a");
    }

    #[test]
    fn only_false_is_falsy() {
        assert!(!ContextValue::Boolean(false).is_truthy());
        assert!(ContextValue::Boolean(true).is_truthy());
        assert!(ContextValue::Text(String::new()).is_truthy());
        assert!(ContextValue::Select(vec![]).is_truthy());
    }
}
