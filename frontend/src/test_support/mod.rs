#[cfg(all(test, not(target_arch = "wasm32")))]
pub mod ssr;

#[cfg(test)]
pub mod fixtures {
    use crate::api::{Id, Meeting, MeetingSource, Organization, Profile};
    use chrono::{DateTime, Utc};
    use serde_json::{json, Value};

    pub fn user_json() -> Value {
        json!({
            "id": 7,
            "first_name": "John",
            "last_name": "Doe",
            "email": "john@example.com"
        })
    }

    pub fn profile() -> Profile {
        Profile {
            id: Id::from(7),
            first_name: "John".into(),
            last_name: "Doe".into(),
            email: "john@example.com".into(),
            date_of_birth: None,
            country: None,
        }
    }

    /// Login/verify response carrying `token` and a matching refresh token.
    pub fn auth_json(token: &str) -> Value {
        json!({
            "access_token": token,
            "refresh_token": format!("refresh-{}", token),
            "user": user_json()
        })
    }

    pub fn organization_json(id: i64, name: &str) -> Value {
        json!({ "id": id, "name": name })
    }

    pub fn organization(id: i64, name: &str) -> Organization {
        Organization {
            id: Id::from(id),
            name: name.into(),
            created_at: None,
        }
    }

    pub fn meeting_json(id: i64, topic: &str, start_time: &str, duration_minutes: i64) -> Value {
        json!({
            "id": id,
            "topic": topic,
            "start_time": start_time,
            "duration_minutes": duration_minutes
        })
    }

    pub fn meeting(id: i64, topic: &str, start_time: DateTime<Utc>, duration_minutes: i64) -> Meeting {
        Meeting {
            id: Id::from(id),
            topic: topic.into(),
            start_time,
            duration_minutes,
            agenda: None,
            join_url: None,
            organization_id: None,
            source: MeetingSource::Manual,
            transcript: None,
            summary: None,
            insights: None,
        }
    }
}
