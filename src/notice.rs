//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`.
//! Role: Shared contract helper for CLI diagnostics (non-error events).
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: JSON schema is stable once published; fields are additive-only.
use serde::Serialize;
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub field: String,
    pub message: String,
    pub details: Map<String, Value>,
}

pub fn notice_json(notice: &Notice) -> Value {
    json!({ "notice": notice })
}

#[cfg(test)]
mod tests {
    use super::{Notice, notice_json};
    use serde_json::{Map, Value};

    #[test]
    fn notice_json_has_required_fields() {
        let mut details = Map::new();
        details.insert("record".to_string(), Value::from(7));

        let notice = Notice {
            kind: "skip".to_string(),
            time: "2026-08-01T00:00:00Z".to_string(),
            cmd: "get".to_string(),
            field: "port".to_string(),
            message: "field 'port' not found".to_string(),
            details,
        };

        let value = notice_json(&notice);
        let obj = value
            .get("notice")
            .and_then(|v| v.as_object())
            .expect("notice object");

        assert_eq!(obj.get("kind").and_then(|v| v.as_str()), Some("skip"));
        assert_eq!(
            obj.get("time").and_then(|v| v.as_str()),
            Some("2026-08-01T00:00:00Z")
        );
        assert_eq!(obj.get("cmd").and_then(|v| v.as_str()), Some("get"));
        assert_eq!(obj.get("field").and_then(|v| v.as_str()), Some("port"));
        assert_eq!(
            obj.get("message").and_then(|v| v.as_str()),
            Some("field 'port' not found")
        );
        assert!(obj.get("details").and_then(|v| v.as_object()).is_some());
    }
}
