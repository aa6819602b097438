//! Loosely-typed view of a `serverStatus` reply.
//!
//! The driver hands back a BSON [`Document`] whose shape varies between
//! server versions and storage engines. It is narrowed here into a closed
//! [`StatusValue`] type so traversal code can match on every case.

use mongodb::bson::{Bson, Document};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A nested mapping of status fields, as reported by the server for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StatusDocument(BTreeMap<String, StatusValue>);

/// A single value inside a [`StatusDocument`].
///
/// BSON types without a direct counterpart (arrays, dates, object ids,
/// timestamps, binary) are kept as [`StatusValue::Text`] holding their
/// display form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusValue {
    Mapping(StatusDocument),
    Integer(i64),
    Double(f64),
    Text(String),
    Boolean(bool),
    /// An explicit `null`/`undefined` from the server.
    Absent,
}

impl StatusDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&StatusValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: StatusValue) -> Option<StatusValue> {
        self.0.insert(key.into(), value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the document as indented JSON for operator debugging.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl From<Document> for StatusDocument {
    fn from(document: Document) -> Self {
        Self(
            document
                .into_iter()
                .map(|(key, value)| (key, StatusValue::from(value)))
                .collect(),
        )
    }
}

impl From<Bson> for StatusValue {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Document(nested) => StatusValue::Mapping(nested.into()),
            Bson::Int32(v) => StatusValue::Integer(i64::from(v)),
            Bson::Int64(v) => StatusValue::Integer(v),
            Bson::Double(v) => StatusValue::Double(v),
            Bson::String(v) => StatusValue::Text(v),
            Bson::Boolean(v) => StatusValue::Boolean(v),
            Bson::Null | Bson::Undefined => StatusValue::Absent,
            other => StatusValue::Text(other.to_string()),
        }
    }
}

/// Textual form used by numeric coercion and diagnostics.
impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusValue::Mapping(nested) => {
                let rendered = serde_json::to_string(nested).map_err(|_| fmt::Error)?;
                f.write_str(&rendered)
            }
            StatusValue::Integer(v) => write!(f, "{v}"),
            StatusValue::Double(v) => write!(f, "{v}"),
            StatusValue::Text(v) => f.write_str(v),
            StatusValue::Boolean(v) => write!(f, "{v}"),
            StatusValue::Absent => f.write_str("<absent>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn converts_nested_bson_into_status_values() {
        let status = StatusDocument::from(doc! {
            "host": "db-1",
            "ok": 1.0,
            "connections": { "current": 42_i32, "totalCreated": 9_000_000_000_i64 },
            "repl": Bson::Null,
            "writeBacksQueued": false,
        });

        assert_eq!(status.len(), 5);
        assert_eq!(status.get("host"), Some(&StatusValue::Text("db-1".into())));
        assert_eq!(status.get("ok"), Some(&StatusValue::Double(1.0)));
        assert_eq!(status.get("repl"), Some(&StatusValue::Absent));
        assert_eq!(status.get("writeBacksQueued"), Some(&StatusValue::Boolean(false)));

        let Some(StatusValue::Mapping(connections)) = status.get("connections") else {
            panic!("connections should be a mapping");
        };
        assert_eq!(connections.get("current"), Some(&StatusValue::Integer(42)));
        assert_eq!(
            connections.get("totalCreated"),
            Some(&StatusValue::Integer(9_000_000_000))
        );
    }

    #[test]
    fn arrays_are_kept_as_text() {
        let status = StatusDocument::from(doc! { "versionArray": [3, 6, 0] });
        assert!(matches!(status.get("versionArray"), Some(StatusValue::Text(_))));
    }

    #[test]
    fn display_matches_textual_representation() {
        assert_eq!(StatusValue::Integer(17).to_string(), "17");
        assert_eq!(StatusValue::Double(2.5).to_string(), "2.5");
        assert_eq!(StatusValue::Text("17".into()).to_string(), "17");
        assert_eq!(StatusValue::Boolean(true).to_string(), "true");
        assert_eq!(StatusValue::Absent.to_string(), "<absent>");

        let mut nested = StatusDocument::new();
        nested.insert("current", StatusValue::Integer(3));
        assert_eq!(StatusValue::Mapping(nested).to_string(), r#"{"current":3}"#);
    }

    #[test]
    fn pretty_json_uses_plain_values() {
        let status = StatusDocument::from(doc! { "opcounters": { "insert": 5_i64 }, "repl": Bson::Null });
        let json: serde_json::Value =
            serde_json::from_str(&status.to_pretty_json().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "opcounters": { "insert": 5 }, "repl": null }));
    }
}
