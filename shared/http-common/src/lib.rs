//! Shared HTTP utilities for the postr workspace.
//!
//! Provides the response envelope builders, the DomainError-to-body and
//! code-to-status mappings, and time helpers used by api-server and the
//! migration runner. Framework-agnostic: everything returns plain
//! `serde_json::Value` or std types.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::SystemTime;

use domain::{DomainError, Pagination};

// ============================================================================
// Response Envelope
// ============================================================================

/// Success envelope: `{"status": "success", "message": ..., "data": ...}`.
pub fn success(message: &str, data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "status": "success",
        "message": message,
        "data": data,
    })
}

/// Success envelope with a pagination block alongside the data.
pub fn success_paginated(
    message: &str,
    data: serde_json::Value,
    pagination: &Pagination,
) -> serde_json::Value {
    serde_json::json!({
        "status": "success",
        "message": message,
        "pagination": pagination,
        "data": data,
    })
}

/// Error body built from the stable code/message/field-errors triple only;
/// store-native error text never appears here.
///
/// Shape: `{"status": "error", "code": ..., "message": ..., "fieldErrors": {...}?}`.
pub fn error_body(err: &DomainError) -> serde_json::Value {
    let mut body = serde_json::json!({
        "status": "error",
        "code": err.code(),
        "message": err.message(),
    });
    if let (Some(fields), Some(obj)) = (err.field_errors(), body.as_object_mut()) {
        obj.insert(
            "fieldErrors".to_string(),
            serde_json::json!(fields),
        );
    }
    body
}

/// HTTP status for a domain error code. Unknown codes are treated as
/// internal failures.
pub fn status_for(err: &DomainError) -> u16 {
    match err.code() {
        "USR-404001" | "PST-404001" => 404,
        "APP-400" => 400,
        _ => 500,
    }
}

// ============================================================================
// Time Utilities
// ============================================================================

/// Convert SystemTime to RFC3339 string (seconds precision, UTC).
pub fn system_time_to_rfc3339(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 string to SystemTime.
///
/// Returns an error if the string is not a valid RFC3339 timestamp.
pub fn parse_rfc3339(s: &str) -> Result<SystemTime, chrono::ParseError> {
    let dt = DateTime::parse_from_rfc3339(s)?;
    Ok(dt.with_timezone(&Utc).into())
}
