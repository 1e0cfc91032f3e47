use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, TimeDelta, TimeZone, Utc};
use serde_json::Value;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Expiry carried in the `exp` claim of a JWT, if the token is one.
pub fn jwt_expires_at(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    parts.next()?;
    let payload = parts.next()?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let value: Value = serde_json::from_slice(&decoded).ok()?;
    let exp = value.get("exp").and_then(Value::as_i64)?;
    Utc.timestamp_opt(exp, 0).single()
}

/// `start` shifted by `secs`, or `None` when the result leaves chrono's range.
pub fn checked_after(start: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(secs).and_then(|delta| start.checked_add_signed(delta))
}

pub fn checked_after_minutes(start: DateTime<Utc>, minutes: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_minutes(minutes).and_then(|delta| start.checked_add_signed(delta))
}

/// `true` once `now` is within `skew` of `expires_at`.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>, skew: Duration) -> bool {
    now + skew >= expires_at
}
