// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Conversion of buffered records into wire events.
//!
//! A record is a JSON object. Its `time` field becomes the event timestamp and
//! its `v` field is format metadata, so neither is repeated in the message:
//!
//! ```text
//! {"time":"2024-01-01T00:00:00Z","v":0,"level":30,"msg":"hi"}
//!   => timestamp = 1704067200000, message = {"level":30,"msg":"hi"}
//! ```

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::constants::{INVALID_TIMESTAMP, TIME_FIELD, VERSION_FIELD};
use crate::errors::WriteError;

/// A structured log record as accepted by the stream service.
pub type Record = Map<String, Value>;

/// One event as submitted to the remote stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Checks that `value` is a JSON object and unwraps it.
pub fn into_record(value: Value) -> Result<Record, WriteError> {
    match value {
        Value::Object(record) => Ok(record),
        Value::Null => Err(WriteError::InvalidRecordKind("null")),
        Value::Bool(_) => Err(WriteError::InvalidRecordKind("boolean")),
        Value::Number(_) => Err(WriteError::InvalidRecordKind("number")),
        Value::String(_) => Err(WriteError::InvalidRecordKind("string")),
        Value::Array(_) => Err(WriteError::InvalidRecordKind("array")),
    }
}

#[must_use]
pub fn build_log_event(record: &Record) -> LogEvent {
    let body: Record = record
        .iter()
        .filter(|(key, _)| key.as_str() != TIME_FIELD && key.as_str() != VERSION_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    LogEvent {
        message: Value::Object(body).to_string(),
        timestamp: record
            .get(TIME_FIELD)
            .map_or(INVALID_TIMESTAMP, parse_timestamp),
    }
}

/// Interprets a `time` value as milliseconds since the Unix epoch.
///
/// Numbers are taken as milliseconds (fractions truncated). Strings must be
/// RFC 3339. Anything else maps to [`INVALID_TIMESTAMP`].
#[must_use]
pub fn parse_timestamp(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(INVALID_TIMESTAMP),
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|time| time.timestamp_millis())
            .unwrap_or(INVALID_TIMESTAMP),
        _ => INVALID_TIMESTAMP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        into_record(value).expect("test record must be an object")
    }

    #[test]
    fn test_into_record_rejects_non_objects() {
        assert_eq!(
            into_record(json!("plain text")),
            Err(WriteError::InvalidRecordKind("string"))
        );
        assert_eq!(
            into_record(json!([1, 2])),
            Err(WriteError::InvalidRecordKind("array"))
        );
        assert_eq!(
            into_record(Value::Null),
            Err(WriteError::InvalidRecordKind("null"))
        );
        assert_eq!(
            into_record(json!(12)),
            Err(WriteError::InvalidRecordKind("number"))
        );
        assert!(into_record(json!({})).is_ok());
    }

    #[test]
    fn test_build_log_event_strips_envelope_fields() {
        let events: Vec<LogEvent> = [
            json!({"time": 1000, "v": 1, "msg": "a"}),
            json!({"time": 2000, "v": 2, "msg": "b"}),
        ]
        .into_iter()
        .map(|value| build_log_event(&record(value)))
        .collect();

        assert_eq!(events[0].timestamp, 1000);
        assert_eq!(events[1].timestamp, 2000);
        assert_eq!(events[0].message, r#"{"msg":"a"}"#);
        assert_eq!(events[1].message, r#"{"msg":"b"}"#);
    }

    #[test]
    fn test_build_log_event_keeps_field_order() {
        let event = build_log_event(&record(json!({
            "name": "api",
            "time": "2024-01-01T00:00:00.250Z",
            "level": 30,
            "msg": "started",
            "v": 0
        })));

        assert_eq!(event.message, r#"{"name":"api","level":30,"msg":"started"}"#);
        assert_eq!(event.timestamp, 1_704_067_200_250);
    }

    #[test]
    fn test_build_log_event_without_time() {
        let event = build_log_event(&record(json!({"msg": "no clock"})));
        assert_eq!(event.timestamp, INVALID_TIMESTAMP);
        assert_eq!(event.message, r#"{"msg":"no clock"}"#);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(parse_timestamp(&json!(1_500)), 1_500);
        assert_eq!(parse_timestamp(&json!(1_500.9)), 1_500);
        assert_eq!(
            parse_timestamp(&json!("2024-01-01T01:00:00+01:00")),
            1_704_067_200_000
        );
        assert_eq!(parse_timestamp(&json!("yesterday")), INVALID_TIMESTAMP);
        assert_eq!(parse_timestamp(&json!(true)), INVALID_TIMESTAMP);
        assert_eq!(parse_timestamp(&Value::Null), INVALID_TIMESTAMP);
    }

    proptest! {
        #[test]
        fn prop_message_never_carries_envelope_fields(
            time in 0i64..4_102_444_800_000,
            version in 0u8..4,
            text in "[a-zA-Z0-9 ]{0,32}",
        ) {
            let event = build_log_event(&record(json!({
                "time": time,
                "v": version,
                "msg": text,
            })));

            prop_assert_eq!(event.timestamp, time);
            let body: Value = serde_json::from_str(&event.message).unwrap();
            prop_assert!(body.get(TIME_FIELD).is_none());
            prop_assert!(body.get(VERSION_FIELD).is_none());
            prop_assert_eq!(body.get("msg"), Some(&Value::String(text)));
        }
    }
}
