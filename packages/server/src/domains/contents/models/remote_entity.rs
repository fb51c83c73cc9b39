use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An entity as returned by the remote platform. Opaque apart from its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteEntity(pub Value);

impl RemoteEntity {
    pub fn id_string(&self) -> Option<String> {
        self.0.get("id").and_then(id_to_string)
    }
}

impl From<Value> for RemoteEntity {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Ids arrive as JSON numbers from the platform and as strings locally.
pub fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_string_ids_compare_equal() {
        let from_remote = RemoteEntity(json!({ "id": 632910392, "title": "IPod Nano" }));
        let from_local = RemoteEntity(json!({ "id": "632910392" }));
        assert_eq!(from_remote.id_string(), from_local.id_string());
    }

    #[test]
    fn missing_or_odd_ids_yield_none() {
        assert_eq!(RemoteEntity(json!({ "title": "x" })).id_string(), None);
        assert_eq!(RemoteEntity(json!({ "id": null })).id_string(), None);
        assert_eq!(RemoteEntity(json!({ "id": "" })).id_string(), None);
    }
}
