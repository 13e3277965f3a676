use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// JSON-RPC request id. Per spec.md §3, restricted to string, finite
/// number, or null — the `null` case is handled one level up, at the raw
/// envelope, since a `RequestId` only exists once an id is known to be
/// present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Integer(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Integer(i) => write!(f, "{i}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Integer(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        RequestId::String(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_id_round_trips() {
        let id = RequestId::Integer(0);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "0");
        assert_eq!(serde_json::from_str::<RequestId>(&json).unwrap(), id);
    }

    #[test]
    fn negative_and_large_integer_ids_round_trip() {
        for raw in [i64::MIN, -1, i64::MAX] {
            let id = RequestId::Integer(raw);
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(serde_json::from_str::<RequestId>(&json).unwrap(), id);
        }
    }

    #[test]
    fn string_id_round_trips_byte_for_byte() {
        let id = RequestId::String(String::new());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"\"");
        assert_eq!(serde_json::from_str::<RequestId>(&json).unwrap(), id);
    }
}
