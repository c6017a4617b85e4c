//! Wire messages exchanged with the worker context
//!
//! Outbound (coordinator to worker):
//! `{ "type": <kind>, "mid": <id>, "use"?: <Data>, <operation fields> }`
//!
//! Inbound success: `{ "type": <kind>, "mid": <id>, "data": <Data> }`
//! Inbound failure: `{ "type": "error", "mid": <id>, "code": .., "message": .., "cause": .. }`

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::record::{Data, Record, Value};

/// Error codes carried by failure replies
pub mod codes {
    pub const UNKNOWN_OPERATION: &str = "UNKNOWN_OPERATION";
    pub const INVALID_OPERAND_KIND: &str = "INVALID_OPERAND_KIND";
    pub const INVALID_PARAMETERS: &str = "INVALID_PARAMETERS";
    pub const DATASET_NOT_LOADED: &str = "DATASET_NOT_LOADED";
    pub const LOADER_FAILURE: &str = "LOADER_FAILURE";
    pub const MALFORMED_MESSAGE: &str = "MALFORMED_MESSAGE";
}

/// Kind string of failure replies
pub const ERROR_KIND: &str = "error";

/// Correlation id of one request.
///
/// Hex Unix millis followed by a random alphanumeric suffix. Unique enough
/// for the lifetime of a session; not a security token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        Self(format!("{:x}{}", millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_key_attr() -> String {
    "id".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadParams {
    #[serde(alias = "file")]
    pub resource: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortParams {
    #[serde(rename = "sortBy", default)]
    pub sort_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetweenParams {
    pub attr: String,
    pub low: Value,
    pub high: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualsParams {
    pub attr: String,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "ignoreCase", default = "default_true")]
    pub ignore_case: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingParams {
    pub attr: String,
    #[serde(rename = "matches")]
    pub pattern: String,
}

/// Half-open index window; missing bounds default to the collection edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeParams {
    #[serde(default)]
    pub low: Option<usize>,
    #[serde(default)]
    pub high: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyParams {
    pub key: Value,
    #[serde(default = "default_key_attr")]
    pub attr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrParams {
    pub attr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionParams {
    pub union: Vec<Record>,
    #[serde(default = "default_key_attr")]
    pub attr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectParams {
    pub intersect: Vec<Record>,
}

/// Every operation the worker context understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    Load(LoadParams),
    All(SortParams),
    SortBy(SortParams),
    Between(BetweenParams),
    Equals(EqualsParams),
    Matching(MatchingParams),
    Range(RangeParams),
    Key(KeyParams),
    Sum(AttrParams),
    Avg(AttrParams),
    GroupBy(AttrParams),
    Or(UnionParams),
    And(IntersectParams),
    Invert {},
}

impl Operation {
    /// Message kind as it appears in the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Load(_) => "load",
            Operation::All(_) => "all",
            Operation::SortBy(_) => "sortBy",
            Operation::Between(_) => "between",
            Operation::Equals(_) => "equals",
            Operation::Matching(_) => "matching",
            Operation::Range(_) => "range",
            Operation::Key(_) => "key",
            Operation::Sum(_) => "sum",
            Operation::Avg(_) => "avg",
            Operation::GroupBy(_) => "groupBy",
            Operation::Or(_) => "or",
            Operation::And(_) => "and",
            Operation::Invert {} => "invert",
        }
    }
}

/// Outbound request
#[derive(Debug, Clone)]
pub struct Request {
    pub mid: MessageId,
    pub operation: Operation,
    /// Explicit operand; absent means "the held dataset"
    pub operand: Option<Data>,
}

impl Request {
    pub fn new(operation: Operation, operand: Option<Data>) -> Self {
        Self {
            mid: MessageId::generate(),
            operation,
            operand,
        }
    }

    /// Serializes the request into a single JSON frame
    pub fn to_frame(&self) -> serde_json::Result<String> {
        let JsonValue::Object(mut message) = serde_json::to_value(&self.operation)? else {
            return Err(serde::ser::Error::custom(
                "operation did not serialize to an object",
            ));
        };
        message.insert("mid".to_string(), JsonValue::String(self.mid.0.clone()));
        if let Some(operand) = &self.operand {
            message.insert("use".to_string(), serde_json::to_value(operand)?);
        }
        serde_json::to_string(&message)
    }
}

/// A request as seen by the worker: kind and id split off, operation
/// fields left raw for the kind's handler to interpret.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub kind: String,
    pub mid: String,
    pub operand: Option<Data>,
    pub params: Map<String, JsonValue>,
}

impl Envelope {
    /// Parses an inbound frame
    pub fn parse(frame: &str) -> Result<Self, String> {
        let value: JsonValue =
            serde_json::from_str(frame).map_err(|e| format!("invalid JSON: {}", e))?;
        let JsonValue::Object(mut fields) = value else {
            return Err("message is not an object".to_string());
        };

        let mid = match fields.remove("mid") {
            Some(JsonValue::String(s)) => s,
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => return Err("missing mid".to_string()),
        };
        let kind = match fields.remove("type") {
            Some(JsonValue::String(s)) => s,
            _ => return Err("missing type".to_string()),
        };
        let operand = match fields.remove("use") {
            None | Some(JsonValue::Null) => None,
            Some(raw) => Some(
                serde_json::from_value(raw).map_err(|e| format!("invalid operand: {}", e))?,
            ),
        };

        Ok(Self {
            kind,
            mid,
            operand,
            params: fields,
        })
    }

    /// Best-effort id extraction from a frame that failed to parse
    pub fn peek_mid(frame: &str) -> String {
        serde_json::from_str::<JsonValue>(frame)
            .ok()
            .and_then(|v| match v.get("mid") {
                Some(JsonValue::String(s)) => Some(s.clone()),
                Some(JsonValue::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// The message without its operand, for error context
    pub fn context(&self) -> JsonValue {
        let mut message = self.params.clone();
        message.insert("type".to_string(), JsonValue::String(self.kind.clone()));
        message.insert("mid".to_string(), JsonValue::String(self.mid.clone()));
        JsonValue::Object(message)
    }
}

/// Inbound reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "type")]
    pub kind: String,
    pub mid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<JsonValue>,
}

impl Reply {
    pub fn success(kind: impl Into<String>, mid: impl Into<String>, data: Data) -> Self {
        Self {
            kind: kind.into(),
            mid: mid.into(),
            data: Some(data),
            code: None,
            message: None,
            cause: None,
        }
    }

    pub fn failure(
        mid: impl Into<String>,
        code: &str,
        message: impl Into<String>,
        cause: JsonValue,
    ) -> Self {
        Self {
            kind: ERROR_KIND.to_string(),
            mid: mid.into(),
            data: None,
            code: Some(code.to_string()),
            message: Some(message.into()),
            cause: Some(cause),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == ERROR_KIND
    }

    pub fn parse(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }

    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_ids_differ() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().len() > 8);
    }

    #[test]
    fn test_request_frame_shape() {
        let request = Request::new(
            Operation::Between(BetweenParams {
                attr: "year".to_string(),
                low: Value::Number(1990.0),
                high: Value::Number(1999.0),
            }),
            Some(Data::Collection(vec![])),
        );

        let frame: JsonValue = serde_json::from_str(&request.to_frame().unwrap()).unwrap();
        assert_eq!(frame["type"], "between");
        assert_eq!(frame["mid"], request.mid.as_str());
        assert_eq!(frame["attr"], "year");
        assert_eq!(frame["use"], json!({"collection": []}));
    }

    #[test]
    fn test_request_without_operand_omits_use() {
        let request = Request::new(Operation::Invert {}, None);
        let frame: JsonValue = serde_json::from_str(&request.to_frame().unwrap()).unwrap();
        assert_eq!(frame["type"], "invert");
        assert!(frame.get("use").is_none());
    }

    #[test]
    fn test_envelope_splits_fields() {
        let frame = r#"{"type": "groupBy", "mid": "abc", "attr": "genre", "use": {"collection": []}}"#;
        let envelope = Envelope::parse(frame).unwrap();
        assert_eq!(envelope.kind, "groupBy");
        assert_eq!(envelope.mid, "abc");
        assert_eq!(envelope.operand, Some(Data::Collection(vec![])));
        assert_eq!(envelope.params.get("attr"), Some(&json!("genre")));
        assert!(envelope.params.get("use").is_none());
    }

    #[test]
    fn test_envelope_accepts_numeric_mid() {
        let envelope = Envelope::parse(r#"{"type": "load", "mid": 1, "resource": "x"}"#).unwrap();
        assert_eq!(envelope.mid, "1");
    }

    #[test]
    fn test_envelope_rejects_missing_type() {
        let err = Envelope::parse(r#"{"mid": "abc"}"#).unwrap_err();
        assert!(err.contains("type"));
        assert_eq!(Envelope::peek_mid(r#"{"mid": "abc"}"#), "abc");
        assert_eq!(Envelope::peek_mid("not json"), "");
    }

    #[test]
    fn test_operation_kinds_match_tags() {
        let op = Operation::GroupBy(AttrParams {
            attr: "genre".to_string(),
        });
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], op.kind());

        let json = serde_json::to_value(Operation::Invert {}).unwrap();
        assert_eq!(json, json!({"type": "invert"}));
    }

    #[test]
    fn test_reply_roundtrip_error() {
        let reply = Reply::failure("m1", codes::UNKNOWN_OPERATION, "unknown type drop", json!({"type": "drop"}));
        let back = Reply::parse(&reply.to_frame().unwrap()).unwrap();
        assert!(back.is_error());
        assert_eq!(back.code.as_deref(), Some(codes::UNKNOWN_OPERATION));
        assert_eq!(back.cause, Some(json!({"type": "drop"})));
    }
}
