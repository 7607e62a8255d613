//! IMMEDIATE_ACTION responses for red-flag cases.

use super::emergency;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const INTENT_IMMEDIATE_ACTION: &str = "IMMEDIATE_ACTION";
pub const ACTION_CALL_EMERGENCY: &str = "CALL_EMERGENCY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub source: String,
    pub confidence: String,
}

/// Structured "call emergency services" response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmediateActionResponse {
    pub intent: String,
    pub action: String,
    /// First entry is the primary number and matches `call_uri`.
    pub preferred_emergency_numbers: Vec<String>,
    pub call_uri: String,
    /// Always true: the client must confirm before dialing.
    pub confirm_before_call: bool,
    pub message: String,
    /// UTC, ISO-8601 with millisecond precision.
    pub timestamp_utc: String,
    pub meta: ResponseMeta,
}

/// Compose the response for a detected red flag, timestamped now.
pub fn compose(reason: &str, country_code: Option<&str>) -> ImmediateActionResponse {
    compose_at(reason, country_code, Utc::now())
}

pub fn compose_at(
    reason: &str,
    country_code: Option<&str>,
    now: DateTime<Utc>,
) -> ImmediateActionResponse {
    let numbers = emergency::resolve(country_code);
    // resolve() never returns an empty list
    let primary = numbers.first().map(String::as_str).unwrap_or("112");
    let call_uri = format!("tel:{}", primary);

    ImmediateActionResponse {
        intent: INTENT_IMMEDIATE_ACTION.to_string(),
        action: ACTION_CALL_EMERGENCY.to_string(),
        call_uri,
        preferred_emergency_numbers: numbers,
        confirm_before_call: true,
        message: format!(
            "Critical symptoms detected ({}). Call emergency services immediately.",
            reason
        ),
        timestamp_utc: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        meta: ResponseMeta {
            source: "system".to_string(),
            confidence: "high".to_string(),
        },
    }
}
