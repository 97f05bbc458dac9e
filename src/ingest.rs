use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{MaterialDelta, MaterialRecord};

#[derive(Debug, Error)]
pub enum DeltaParseError {
    #[error("delta payload is not valid JSON: {0}")]
    BadJson(#[from] serde_json::Error),

    #[error("delta payload has no usable record id")]
    MissingRecord,

    #[error("unknown event type {0:?}")]
    UnknownEventType(String),
}

/// Validates one raw record object into a typed `MaterialRecord`.
///
/// Returns `None` only when the record has no usable id. Every other
/// malformed field is substituted with its default so one corrupt record
/// never blocks the rest of the set.
pub fn record_from_value(value: &Value) -> Option<MaterialRecord> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())?
        .to_string();

    Some(MaterialRecord {
        id,
        owner_id: owner_from_value(value).unwrap_or_else(Uuid::nil),
        title: text_or(value, "title", "Untitled"),
        category: text_or(value, "category", ""),
        school: text_or(value, "school", ""),
        course: text_or(value, "course", ""),
        views: counter(value, "views"),
        downloads: counter(value, "downloads"),
        diamonds: counter(value, "diamonds"),
        earnings: value
            .get("earnings")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .max(0.0),
        created_at: created_at(value),
    })
}

pub fn delta_from_payload(payload: &str) -> Result<MaterialDelta, DeltaParseError> {
    let value: Value = serde_json::from_str(payload)?;
    delta_from_value(&value)
}

pub fn delta_from_value(value: &Value) -> Result<MaterialDelta, DeltaParseError> {
    let event_type = value
        .get("eventType")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match event_type {
        "INSERT" => new_record(value).map(MaterialDelta::Inserted),
        "UPDATE" => new_record(value).map(MaterialDelta::Updated),
        "DELETE" => value
            .get("old")
            .and_then(|old| old.get("id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(|id| MaterialDelta::Deleted(id.to_string()))
            .ok_or(DeltaParseError::MissingRecord),
        other => Err(DeltaParseError::UnknownEventType(other.to_string())),
    }
}

/// Owner of the record a delta concerns, from either side of the payload.
pub fn delta_owner(value: &Value) -> Option<Uuid> {
    value
        .get("new")
        .and_then(owner_from_value)
        .or_else(|| value.get("old").and_then(owner_from_value))
}

fn new_record(value: &Value) -> Result<MaterialRecord, DeltaParseError> {
    value
        .get("new")
        .and_then(record_from_value)
        .ok_or(DeltaParseError::MissingRecord)
}

fn owner_from_value(value: &Value) -> Option<Uuid> {
    value
        .get("owner_id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

fn text_or(value: &Value, key: &str, default: &str) -> String {
    match value.get(key).and_then(Value::as_str) {
        Some(text) => text.to_string(),
        None => default.to_string(),
    }
}

fn counter(value: &Value, key: &str) -> i64 {
    value
        .get(key)
        .and_then(|raw| raw.as_i64().or_else(|| raw.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
        .max(0)
}

fn created_at(value: &Value) -> DateTime<Utc> {
    let raw = match value.get("created_at").and_then(Value::as_str) {
        Some(raw) => raw,
        None => return DateTime::UNIX_EPOCH,
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    // timestamps without an offset are taken as UTC
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Utc.from_utc_datetime(&parsed);
    }

    DateTime::UNIX_EPOCH
}
