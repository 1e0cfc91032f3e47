use chrono::{DateTime, NaiveDate, Utc};
use leptos::{IntoView, View};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Characters escaped when an id is placed in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Opaque backend identifier. The backend emits both numeric and string ids;
/// both normalize to the same string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The id escaped for use as a single URL path segment.
    pub fn path_segment(&self) -> String {
        utf8_percent_encode(&self.0, PATH_SEGMENT).to_string()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Uint(u64),
            Text(String),
        }
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(value) => Id(value.to_string()),
            RawId::Uint(value) => Id(value.to_string()),
            RawId::Text(value) => Id(value),
        })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Local input problem; never sent to the backend.
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    Request {
        status: u16,
        message: String,
        code: Option<String>,
    },
    #[error("{message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },
    #[error("Failed to parse response: {0}")]
    Decode(String),
    #[error("The operation was cancelled")]
    Cancelled,
    #[error("No refresh token is available")]
    NoRefreshToken,
}

pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "The service is temporarily unavailable. Please try again later.";

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn request(status: u16, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
            code: None,
        }
    }

    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Network {
            kind,
            message: message.into(),
        }
    }

    /// Builds a request error from a non-2xx response, preferring the message
    /// in the backend's error body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let code = parsed.as_ref().and_then(|body| body.code.clone());
        let message = if status >= 500 {
            SERVICE_UNAVAILABLE_MESSAGE.to_string()
        } else {
            parsed
                .and_then(ErrorBody::message)
                .unwrap_or_else(|| default_status_message(status))
        };
        Self::Request {
            status,
            message,
            code,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_some_and(|status| status >= 500)
    }

    /// Transient connectivity failure; callers may offer a retry.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the error belongs in a model's transient `error` field.
    /// Validation errors stay with the form that raised them and a
    /// cancellation is not a failure.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::Cancelled)
    }
}

fn default_status_message(status: u16) -> String {
    match status {
        400 => "The request was invalid.".to_string(),
        401 => "Your session has expired. Please sign in again.".to_string(),
        403 => "You do not have permission to perform this action.".to_string(),
        404 => "The requested resource was not found.".to_string(),
        409 => "The request conflicts with the current state.".to_string(),
        422 => "The submitted data was rejected.".to_string(),
        _ => format!("Request failed with status {}", status),
    }
}

impl From<ApiError> for String {
    fn from(error: ApiError) -> Self {
        error.to_string()
    }
}

impl IntoView for ApiError {
    fn into_view(self) -> View {
        self.to_string().into_view()
    }
}

/// Error body shapes the backend emits: `{"error": ..}`, `{"message": ..}`
/// or `{"detail": ..}` where `detail` may be a string or a list of
/// validation entries carrying `msg`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorBody {
    pub fn message(self) -> Option<String> {
        if let Some(message) = self.error.or(self.message).filter(|m| !m.trim().is_empty()) {
            return Some(message);
        }
        match self.detail? {
            Value::String(text) if !text.trim().is_empty() => Some(text),
            Value::Array(entries) => {
                let messages: Vec<String> = entries
                    .iter()
                    .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Profiles and auth payloads
// ---------------------------------------------------------------------------

/// The one user representation used past the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Id,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Profile {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// User record as the backend sends it. Field spellings vary between
/// endpoints, so every known alias is accepted here and folded into
/// [`Profile`] once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProfile {
    #[serde(default, alias = "_id")]
    pub id: Option<Id>,
    #[serde(default, alias = "firstName", alias = "given_name")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName", alias = "family_name", alias = "surname")]
    pub last_name: Option<String>,
    #[serde(default, alias = "fullName", alias = "name")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "dateOfBirth", alias = "dob")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub country: Option<String>,
}

impl From<RawProfile> for Profile {
    fn from(raw: RawProfile) -> Self {
        let email = raw.email.unwrap_or_default();
        let mut first_name = raw.first_name.unwrap_or_default();
        let mut last_name = raw.last_name.unwrap_or_default();
        if first_name.trim().is_empty() && last_name.trim().is_empty() {
            if let Some(full) = raw.full_name.filter(|name| !name.trim().is_empty()) {
                let mut parts = full.trim().splitn(2, char::is_whitespace);
                first_name = parts.next().unwrap_or_default().to_string();
                last_name = parts.next().unwrap_or_default().trim().to_string();
            }
        }
        Profile {
            id: raw.id.unwrap_or_else(|| Id::new(email.clone())),
            first_name,
            last_name,
            email,
            date_of_birth: raw.date_of_birth,
            country: raw.country,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "otpExpiresAt")]
    pub otp_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Tokens plus the signed-in user, as returned by verify-otp, login and
/// (optionally with `user` omitted) refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(alias = "accessToken", alias = "token")]
    pub access_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<RawProfile>,
}

// ---------------------------------------------------------------------------
// Organizations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Id,
    pub name: String,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationPayload {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Meetings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingSource {
    #[default]
    Manual,
    Upload,
    Zoom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    Started,
    Ended,
}

/// A meeting as held client-side. Status is not stored; see
/// [`Meeting::status_at`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Id,
    pub topic: String,
    #[serde(alias = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(alias = "duration", alias = "durationMinutes")]
    pub duration_minutes: i64,
    #[serde(default)]
    pub agenda: Option<String>,
    #[serde(default, alias = "joinUrl")]
    pub join_url: Option<String>,
    #[serde(default, alias = "organizationId")]
    pub organization_id: Option<Id>,
    #[serde(default)]
    pub source: MeetingSource,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub insights: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateMeetingRequest {
    pub topic: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Id>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeetingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Id>,
}

impl MeetingPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadMetadata {
    pub topic: String,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub organization_id: Option<Id>,
}

// ---------------------------------------------------------------------------
// Zoom
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomAccount {
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "display_name")]
    pub name: String,
    #[serde(alias = "accountId")]
    pub account_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoomTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoomStatusResponse {
    #[serde(alias = "is_connected")]
    pub connected: bool,
    #[serde(default, alias = "account_info")]
    pub account: Option<ZoomAccount>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, alias = "token_expiry")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoomExchangeRequest {
    pub organization_id: Id,
    pub code: String,
    pub state: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoomRefreshRequest {
    pub organization_id: Id,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoomOrganizationRequest {
    pub organization_id: Id,
}

/// Either a bare list or an object wrapping it under `meetings`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MeetingList {
    Bare(Vec<Meeting>),
    Wrapped { meetings: Vec<Meeting> },
}

impl MeetingList {
    pub fn into_vec(self) -> Vec<Meeting> {
        match self {
            Self::Bare(meetings) | Self::Wrapped { meetings } => meetings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_accepts_numbers_and_strings() {
        let numeric: Id = serde_json::from_value(json!(1)).unwrap();
        let text: Id = serde_json::from_value(json!("1")).unwrap();
        assert_eq!(numeric, text);
        assert_eq!(serde_json::to_value(&numeric).unwrap(), json!("1"));
    }

    #[test]
    fn path_segment_escapes_separators() {
        assert_eq!(Id::from(42).path_segment(), "42");
        assert_eq!(Id::from("mtg-7_a.b~c").path_segment(), "mtg-7_a.b~c");
        assert_eq!(Id::from("a/b?c#d").path_segment(), "a%2Fb%3Fc%23d");
        assert_eq!(Id::from("50% off").path_segment(), "50%25%20off");
        assert_eq!(Id::from("../admin").path_segment(), "..%2Fadmin");
    }

    #[test]
    fn raw_profile_normalizes_camel_case_fields() {
        let raw: RawProfile = serde_json::from_value(json!({
            "id": 42,
            "firstName": "John",
            "lastName": "Doe",
            "email": "john@example.com",
            "dateOfBirth": "1990-04-01",
            "country": "US"
        }))
        .unwrap();
        let profile = Profile::from(raw);
        assert_eq!(profile.id, Id::new("42"));
        assert_eq!(profile.display_name(), "John Doe");
        assert_eq!(profile.date_of_birth, NaiveDate::from_ymd_opt(1990, 4, 1));
    }

    #[test]
    fn raw_profile_splits_full_name_when_parts_missing() {
        let raw: RawProfile = serde_json::from_value(json!({
            "_id": "u1",
            "name": "Ada King Lovelace",
            "email": "ada@example.com"
        }))
        .unwrap();
        let profile = Profile::from(raw);
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.last_name, "King Lovelace");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let profile = Profile::from(RawProfile {
            id: Some(Id::new("u1")),
            email: Some("anon@example.com".into()),
            ..Default::default()
        });
        assert_eq!(profile.display_name(), "anon@example.com");
    }

    #[test]
    fn error_body_message_is_preferred() {
        let err = ApiError::from_response(403, r#"{"error":"Not your organization","code":"FORBIDDEN"}"#);
        assert_eq!(
            err,
            ApiError::Request {
                status: 403,
                message: "Not your organization".into(),
                code: Some("FORBIDDEN".into()),
            }
        );
    }

    #[test]
    fn error_body_detail_list_is_joined() {
        let err = ApiError::from_response(
            422,
            r#"{"detail":[{"msg":"email is invalid"},{"msg":"password too short"}]}"#,
        );
        assert_eq!(err.to_string(), "email is invalid; password too short");
    }

    #[test]
    fn missing_body_uses_status_fallback() {
        assert_eq!(
            ApiError::from_response(404, "").to_string(),
            "The requested resource was not found."
        );
        assert!(ApiError::from_response(401, "not json").is_unauthorized());
    }

    #[test]
    fn server_errors_use_transient_message() {
        let err = ApiError::from_response(502, r#"{"error":"upstream exploded"}"#);
        assert!(err.is_server_error());
        assert_eq!(err.to_string(), SERVICE_UNAVAILABLE_MESSAGE);
    }

    #[test]
    fn reportable_excludes_validation_and_cancellation() {
        assert!(!ApiError::validation("bad").is_reportable());
        assert!(!ApiError::Cancelled.is_reportable());
        assert!(ApiError::request(500, "x").is_reportable());
        assert!(ApiError::network(NetworkErrorKind::Timeout, "slow").is_network());
    }

    #[test]
    fn meeting_accepts_zoom_field_spellings() {
        let meeting: Meeting = serde_json::from_value(json!({
            "id": 85746065432u64,
            "topic": "Weekly sync",
            "start_time": "2025-03-01T10:00:00Z",
            "duration": 45,
            "join_url": "https://zoom.us/j/85746065432",
            "status": "waiting"
        }))
        .unwrap();
        assert_eq!(meeting.id, Id::new("85746065432"));
        assert_eq!(meeting.duration_minutes, 45);
        assert_eq!(meeting.source, MeetingSource::Manual);
    }

    #[test]
    fn meeting_list_accepts_wrapped_form() {
        let list: MeetingList = serde_json::from_value(json!({
            "meetings": [{
                "id": "m1",
                "topic": "Kickoff",
                "start_time": "2025-03-01T10:00:00Z",
                "duration_minutes": 30
            }]
        }))
        .unwrap();
        assert_eq!(list.into_vec().len(), 1);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(MeetingPatch::default().is_empty());
        assert!(!MeetingPatch {
            topic: Some("x".into()),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn api_error_can_be_converted_to_view() {
        let runtime = leptos::create_runtime();
        let _: View = ApiError::request(500, "boom").into_view();
        runtime.dispose();
    }
}
