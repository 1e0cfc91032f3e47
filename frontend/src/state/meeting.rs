use chrono::{DateTime, NaiveDate, Utc};
use leptos::*;
use std::collections::BTreeMap;

use super::{ErrorReporter, TransientError};
use crate::{
    api::{
        ApiClient, ApiError, CreateMeetingRequest, Id, Meeting, MeetingPatch, MeetingSource,
        MeetingStatus, UploadFile, UploadMetadata,
    },
    utils::{
        storage::{keys, Storage},
        time, validation,
    },
};

impl Meeting {
    /// `None` when the duration reaches past the representable range; such a
    /// meeting never ends.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        time::checked_after_minutes(self.start_time, self.duration_minutes)
    }

    /// Status relative to `now`: started from `start_time` inclusive, ended
    /// from `start_time + duration` inclusive.
    pub fn status_at(&self, now: DateTime<Utc>) -> MeetingStatus {
        if now < self.start_time {
            return MeetingStatus::Scheduled;
        }
        match self.end_time() {
            Some(end) if now >= end => MeetingStatus::Ended,
            _ => MeetingStatus::Started,
        }
    }

    pub fn status(&self) -> MeetingStatus {
        self.status_at(time::now())
    }
}

/// Client-side filter over loaded meetings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeetingFilter {
    pub search: String,
    pub source: Option<MeetingSource>,
    pub status: Option<MeetingStatus>,
    /// Inclusive, compared against the UTC start date.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl MeetingFilter {
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self.source.is_none()
            && self.status.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    pub fn matches(&self, meeting: &Meeting, now: DateTime<Utc>) -> bool {
        let needle = self.search.trim().to_lowercase();
        if !needle.is_empty() {
            let hit = [
                Some(meeting.topic.as_str()),
                meeting.agenda.as_deref(),
                meeting.summary.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if self.source.is_some_and(|source| source != meeting.source) {
            return false;
        }
        if self.status.is_some_and(|status| status != meeting.status_at(now)) {
            return false;
        }
        let day = meeting.start_time.date_naive();
        if self.date_from.is_some_and(|from| day < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| day > to) {
            return false;
        }
        true
    }

    pub fn apply(&self, meetings: &[Meeting], now: DateTime<Utc>) -> Vec<Meeting> {
        meetings
            .iter()
            .filter(|meeting| self.matches(meeting, now))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingState {
    pub user_meetings: Vec<Meeting>,
    /// Meetings per organization, for organizations that have been fetched.
    pub organization_meetings: BTreeMap<Id, Vec<Meeting>>,
    pub current: Option<Meeting>,
    pub filter: MeetingFilter,
    pub loading: bool,
    pub error: Option<ApiError>,
}

impl TransientError for MeetingState {
    fn error_slot(&mut self) -> &mut Option<ApiError> {
        &mut self.error
    }
}

fn upsert_by_id(list: &mut Vec<Meeting>, meeting: &Meeting) {
    match list.iter_mut().find(|m| m.id == meeting.id) {
        Some(existing) => *existing = meeting.clone(),
        None => list.push(meeting.clone()),
    }
}

fn replace_by_id(list: &mut [Meeting], meeting: &Meeting) -> bool {
    match list.iter_mut().find(|m| m.id == meeting.id) {
        Some(existing) => {
            *existing = meeting.clone();
            true
        }
        None => false,
    }
}

impl MeetingState {
    pub fn find(&self, id: &Id) -> Option<&Meeting> {
        self.user_meetings
            .iter()
            .chain(self.organization_meetings.values().flatten())
            .find(|meeting| &meeting.id == id)
    }

    pub fn filtered_user_meetings(&self, now: DateTime<Utc>) -> Vec<Meeting> {
        self.filter.apply(&self.user_meetings, now)
    }

    pub fn filtered_organization_meetings(&self, organization_id: &Id, now: DateTime<Utc>) -> Vec<Meeting> {
        self.organization_meetings
            .get(organization_id)
            .map(|meetings| self.filter.apply(meetings, now))
            .unwrap_or_default()
    }

    /// Writes the server copy of `meeting` into every collection that holds
    /// it. A meeting whose organization changed moves between lists.
    fn reconcile(&mut self, meeting: &Meeting) {
        replace_by_id(&mut self.user_meetings, meeting);
        for (organization_id, meetings) in self.organization_meetings.iter_mut() {
            if meeting.organization_id.as_ref() == Some(organization_id) {
                upsert_by_id(meetings, meeting);
            } else {
                meetings.retain(|m| m.id != meeting.id);
            }
        }
        if self.current.as_ref().map(|c| &c.id) == Some(&meeting.id) {
            self.current = Some(meeting.clone());
        }
    }

    /// Adds a meeting the user just created.
    fn insert_created(&mut self, meeting: &Meeting) {
        upsert_by_id(&mut self.user_meetings, meeting);
        self.reconcile(meeting);
    }

    fn remove(&mut self, id: &Id) {
        self.user_meetings.retain(|m| &m.id != id);
        for meetings in self.organization_meetings.values_mut() {
            meetings.retain(|m| &m.id != id);
        }
        if self.current.as_ref().map(|c| &c.id) == Some(id) {
            self.current = None;
        }
    }
}

fn validate_new_meeting(request: &CreateMeetingRequest) -> Result<(), ApiError> {
    validation::require(&request.topic, "Topic")?;
    if request.duration_minutes <= 0 {
        return Err(ApiError::validation("Duration must be at least one minute"));
    }
    Ok(())
}

fn validate_patch(patch: &MeetingPatch) -> Result<(), ApiError> {
    if patch.is_empty() {
        return Err(ApiError::validation("Nothing to update"));
    }
    if let Some(topic) = &patch.topic {
        validation::require(topic, "Topic")?;
    }
    if patch.duration_minutes.is_some_and(|minutes| minutes <= 0) {
        return Err(ApiError::validation("Duration must be at least one minute"));
    }
    Ok(())
}

fn validate_id(id: &Id) -> Result<(), ApiError> {
    if id.is_blank() {
        return Err(ApiError::validation("Meeting id is required"));
    }
    Ok(())
}

fn validate_upload(file: &UploadFile, metadata: &UploadMetadata) -> Result<(), ApiError> {
    validation::require(&file.file_name, "File name")?;
    if file.bytes.is_empty() {
        return Err(ApiError::validation("The selected file is empty"));
    }
    validation::require(&metadata.topic, "Topic")?;
    if metadata.duration_minutes.is_some_and(|minutes| minutes <= 0) {
        return Err(ApiError::validation("Duration must be at least one minute"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct MeetingStore {
    state: RwSignal<MeetingState>,
    api: ApiClient,
    storage: Storage,
    errors: ErrorReporter,
}

impl MeetingStore {
    pub fn new(api: ApiClient, storage: Storage, errors: ErrorReporter) -> Self {
        Self {
            state: create_rw_signal(MeetingState::default()),
            api,
            storage,
            errors,
        }
    }

    pub fn state(&self) -> RwSignal<MeetingState> {
        self.state
    }

    pub fn snapshot(&self) -> MeetingState {
        self.state.get_untracked()
    }

    fn commit(&self, change: impl FnOnce(&mut MeetingState)) {
        let mut next = self.snapshot();
        change(&mut next);
        next.loading = false;
        self.storage.set(keys::USER_MEETINGS, &next.user_meetings);
        self.state.set(next);
    }

    fn failed(&self, err: &ApiError) {
        self.errors.fail(self.state, err, |s| s.loading = false);
    }

    pub fn hydrate(&self) {
        let cached = self
            .storage
            .get::<Vec<Meeting>>(keys::USER_MEETINGS)
            .unwrap_or_default();
        self.state.update(|s| s.user_meetings = cached);
    }

    pub async fn fetch_for_user(&self) -> Result<Vec<Meeting>, ApiError> {
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.list_my_meetings().await {
            Ok(meetings) => {
                self.commit(|s| {
                    s.user_meetings = meetings.clone();
                    if let Some(current) = s.current.clone() {
                        if let Some(fresh) = meetings.iter().find(|m| m.id == current.id) {
                            s.current = Some(fresh.clone());
                        }
                    }
                });
                Ok(meetings)
            }
            Err(err) => {
                self.failed(&err);
                Err(err)
            }
        }
    }

    pub async fn fetch_for_organization(&self, organization_id: &Id) -> Result<Vec<Meeting>, ApiError> {
        if organization_id.is_blank() {
            return Err(ApiError::validation("Organization id is required"));
        }
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.list_organization_meetings(organization_id).await {
            Ok(meetings) => {
                let meetings: Vec<Meeting> = meetings
                    .into_iter()
                    .map(|mut meeting| {
                        meeting
                            .organization_id
                            .get_or_insert_with(|| organization_id.clone());
                        meeting
                    })
                    .collect();
                self.commit(|s| {
                    for meeting in &meetings {
                        replace_by_id(&mut s.user_meetings, meeting);
                    }
                    s.organization_meetings
                        .insert(organization_id.clone(), meetings.clone());
                });
                Ok(meetings)
            }
            Err(err) => {
                self.failed(&err);
                Err(err)
            }
        }
    }

    /// Loads one meeting and makes it current.
    pub async fn fetch_details(&self, id: &Id) -> Result<Meeting, ApiError> {
        validate_id(id)?;
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.get_meeting(id).await {
            Ok(meeting) => {
                self.commit(|s| {
                    s.current = Some(meeting.clone());
                    s.reconcile(&meeting);
                });
                Ok(meeting)
            }
            Err(err) => {
                self.failed(&err);
                Err(err)
            }
        }
    }

    pub async fn create(&self, request: CreateMeetingRequest) -> Result<Meeting, ApiError> {
        validate_new_meeting(&request)?;
        let request = CreateMeetingRequest {
            topic: request.topic.trim().to_string(),
            ..request
        };
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.create_meeting(&request).await {
            Ok(meeting) => {
                self.commit(|s| s.insert_created(&meeting));
                log::info!("Meeting {} created", meeting.id);
                Ok(meeting)
            }
            Err(err) => {
                self.failed(&err);
                Err(err)
            }
        }
    }

    pub async fn update(&self, id: &Id, patch: MeetingPatch) -> Result<Meeting, ApiError> {
        validate_id(id)?;
        validate_patch(&patch)?;
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.update_meeting(id, &patch).await {
            Ok(meeting) => {
                self.commit(|s| s.reconcile(&meeting));
                Ok(meeting)
            }
            Err(err) => {
                self.failed(&err);
                Err(err)
            }
        }
    }

    pub async fn delete(&self, id: &Id) -> Result<(), ApiError> {
        validate_id(id)?;
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.delete_meeting(id).await {
            Ok(()) => {
                self.commit(|s| s.remove(id));
                log::info!("Meeting {} deleted", id);
                Ok(())
            }
            Err(err) => {
                self.failed(&err);
                Err(err)
            }
        }
    }

    /// Uploads a recording; the meeting the backend creates for it is added
    /// like a manually created one.
    pub async fn upload_file(&self, file: UploadFile, metadata: UploadMetadata) -> Result<Meeting, ApiError> {
        validate_upload(&file, &metadata)?;
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.upload_meeting(file, &metadata).await {
            Ok(mut meeting) => {
                if meeting.organization_id.is_none() {
                    meeting.organization_id = metadata.organization_id.clone();
                }
                self.commit(|s| s.insert_created(&meeting));
                log::info!("Recording uploaded as meeting {}", meeting.id);
                Ok(meeting)
            }
            Err(err) => {
                self.failed(&err);
                Err(err)
            }
        }
    }

    pub async fn summarize(&self, id: &Id) -> Result<Meeting, ApiError> {
        validate_id(id)?;
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.summarize_meeting(id).await {
            Ok(meeting) => {
                self.commit(|s| s.reconcile(&meeting));
                Ok(meeting)
            }
            Err(err) => {
                self.failed(&err);
                Err(err)
            }
        }
    }

    /// Merges meetings listed from Zoom into the organization's collection.
    pub fn import_zoom_meetings(&self, organization_id: &Id, meetings: &[Meeting]) {
        self.state.update(|s| {
            let list = s
                .organization_meetings
                .entry(organization_id.clone())
                .or_default();
            for meeting in meetings {
                let mut meeting = meeting.clone();
                meeting.source = MeetingSource::Zoom;
                meeting.organization_id = Some(organization_id.clone());
                upsert_by_id(list, &meeting);
            }
        });
    }

    pub fn set_current(&self, meeting: Option<Meeting>) {
        self.state.update(|s| s.current = meeting);
    }

    pub fn set_filter(&self, filter: MeetingFilter) {
        self.state.update(|s| s.filter = filter);
    }

    pub fn clear_filter(&self) {
        self.state.update(|s| s.filter = MeetingFilter::default());
    }

    pub fn reset(&self) {
        self.storage.remove(keys::USER_MEETINGS);
        self.state.set(MeetingState::default());
    }

    pub(crate) fn invalidator(&self) -> impl Fn() + 'static {
        let state = self.state;
        let storage = self.storage.clone();
        move || {
            storage.remove(keys::USER_MEETINGS);
            state.try_set(MeetingState::default());
        }
    }
}


#[cfg(all(test, not(target_arch = "wasm32")))]
mod host_tests {
    use super::*;
    use crate::test_support::{
        fixtures::meeting_json,
        ssr::{with_runtime, with_runtime_async},
    };
    use httpmock::prelude::*;
    use serde_json::json;

    fn store(server: &MockServer, storage: &Storage) -> MeetingStore {
        let api = ApiClient::new_with_base_url(server.url("/api"));
        api.set_bearer(Some("tok-1".into()));
        MeetingStore::new(api, storage.clone(), ErrorReporter::default())
    }

    fn with_org(mut meeting: serde_json::Value, organization_id: i64) -> serde_json::Value {
        meeting["organization_id"] = json!(organization_id);
        meeting
    }

    #[tokio::test]
    async fn update_reaches_user_org_and_current_collections() {
        let server = MockServer::start_async().await;
        let original = with_org(meeting_json(5, "Standup", "2025-03-10T09:00:00Z", 15), 1);
        server.mock(|when, then| {
            when.method(GET).path("/api/meetings");
            then.status(200).json_body(json!([original.clone()]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/organizations/1/meetings");
            then.status(200)
                .json_body(json!({ "meetings": [original.clone()] }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/meetings/5");
            then.status(200).json_body(original.clone());
        });
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/meetings/5")
                .json_body(json!({ "topic": "Daily standup" }));
            then.status(200).json_body(with_org(
                meeting_json(5, "Daily standup", "2025-03-10T09:00:00Z", 15),
                1,
            ));
        });

        with_runtime_async(|| async {
            let storage = Storage::memory();
            let meetings = store(&server, &storage);
            meetings.fetch_for_user().await.unwrap();
            meetings.fetch_for_organization(&Id::from(1)).await.unwrap();
            meetings.fetch_details(&Id::from(5)).await.unwrap();

            let patch = MeetingPatch {
                topic: Some("Daily standup".into()),
                ..Default::default()
            };
            meetings.update(&Id::from(5), patch).await.unwrap();
            update.assert();

            let state = meetings.snapshot();
            assert_eq!(state.user_meetings[0].topic, "Daily standup");
            assert_eq!(state.organization_meetings[&Id::from(1)][0].topic, "Daily standup");
            assert_eq!(state.current.map(|m| m.topic).as_deref(), Some("Daily standup"));
            let cached = storage.get::<Vec<Meeting>>(keys::USER_MEETINGS).unwrap();
            assert_eq!(cached[0].topic, "Daily standup");
        })
        .await;
    }

    #[tokio::test]
    async fn failed_update_leaves_collections_untouched() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/meetings");
            then.status(200)
                .json_body(json!([meeting_json(5, "Standup", "2025-03-10T09:00:00Z", 15)]));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/api/meetings/5");
            then.status(404).json_body(json!({ "detail": "Meeting not found" }));
        });

        with_runtime_async(|| async {
            let meetings = store(&server, &Storage::memory());
            meetings.fetch_for_user().await.unwrap();
            let before = meetings.snapshot().user_meetings;

            let err = meetings
                .update(
                    &Id::from(5),
                    MeetingPatch {
                        duration_minutes: Some(45),
                        ..Default::default()
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), Some(404));
            let state = meetings.snapshot();
            assert_eq!(state.user_meetings, before);
            assert_eq!(state.error, Some(err));
        })
        .await;
    }

    #[tokio::test]
    async fn create_then_delete_round_trip() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/meetings")
                .json_body_partial(r#"{"topic":"Kickoff","duration_minutes":45}"#);
            then.status(201)
                .json_body(meeting_json(9, "Kickoff", "2025-03-11T15:00:00Z", 45));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/api/meetings/9");
            then.status(204);
        });

        with_runtime_async(|| async {
            let storage = Storage::memory();
            let meetings = store(&server, &storage);
            let created = meetings
                .create(CreateMeetingRequest {
                    topic: " Kickoff ".into(),
                    start_time: "2025-03-11T15:00:00Z".parse().unwrap(),
                    duration_minutes: 45,
                    agenda: None,
                    join_url: None,
                    organization_id: None,
                })
                .await
                .unwrap();
            assert_eq!(meetings.snapshot().user_meetings, vec![created.clone()]);
            meetings.set_current(Some(created.clone()));

            meetings.delete(&created.id).await.unwrap();
            delete.assert();
            let state = meetings.snapshot();
            assert!(state.user_meetings.is_empty());
            assert!(state.current.is_none());
            assert_eq!(storage.get::<Vec<Meeting>>(keys::USER_MEETINGS), Some(Vec::new()));
        })
        .await;
    }

    #[tokio::test]
    async fn upload_posts_multipart_and_adds_meeting() {
        let server = MockServer::start_async().await;
        let upload = server.mock(|when, then| {
            when.method(POST)
                .path("/api/meetings/upload")
                .header_exists("content-type")
                .body_contains("name=\"topic\"")
                .body_contains("Board meeting");
            then.status(201).json_body(json!({
                "id": 11,
                "topic": "Board meeting",
                "start_time": "2025-03-10T08:00:00Z",
                "duration": 90,
                "source": "upload"
            }));
        });

        with_runtime_async(|| async {
            let meetings = store(&server, &Storage::memory());
            let file = UploadFile {
                file_name: "board.mp3".into(),
                mime_type: "audio/mpeg".into(),
                bytes: vec![1, 2, 3, 4],
            };
            let metadata = UploadMetadata {
                topic: "Board meeting".into(),
                start_time: None,
                duration_minutes: None,
                organization_id: Some(Id::from(1)),
            };
            let meeting = meetings.upload_file(file, metadata).await.unwrap();
            upload.assert();
            assert_eq!(meeting.source, MeetingSource::Upload);
            assert_eq!(meeting.duration_minutes, 90);
            assert_eq!(meeting.organization_id, Some(Id::from(1)));
            assert_eq!(meetings.snapshot().user_meetings.len(), 1);

            let empty = UploadFile {
                file_name: "empty.mp3".into(),
                mime_type: "audio/mpeg".into(),
                bytes: Vec::new(),
            };
            let err = meetings
                .upload_file(
                    empty,
                    UploadMetadata {
                        topic: "Empty".into(),
                        start_time: None,
                        duration_minutes: None,
                        organization_id: None,
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
            assert_eq!(upload.hits(), 1);
        })
        .await;
    }

    #[tokio::test]
    async fn summarize_stores_summary_and_insights() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/meetings/3");
            then.status(200)
                .json_body(meeting_json(3, "Retro", "2025-03-09T10:00:00Z", 30));
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/meetings/3/summarize");
            then.status(200).json_body(json!({
                "id": 3,
                "topic": "Retro",
                "start_time": "2025-03-09T10:00:00Z",
                "duration_minutes": 30,
                "transcript": "We shipped.",
                "summary": "Team shipped the release.",
                "insights": { "action_items": ["Write changelog"] }
            }));
        });

        with_runtime_async(|| async {
            let meetings = store(&server, &Storage::memory());
            meetings.fetch_details(&Id::from(3)).await.unwrap();
            meetings.summarize(&Id::from(3)).await.unwrap();
            let current = meetings.snapshot().current.unwrap();
            assert_eq!(current.summary.as_deref(), Some("Team shipped the release."));
            assert!(current.insights.is_some());
        })
        .await;
    }

    #[tokio::test]
    async fn server_error_uses_generic_message() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/organizations/1/meetings");
            then.status(502).body("<html>bad gateway</html>");
        });
        with_runtime_async(|| async {
            let meetings = store(&server, &Storage::memory());
            let err = meetings
                .fetch_for_organization(&Id::from(1))
                .await
                .unwrap_err();
            assert!(err.is_server_error());
            assert_eq!(meetings.snapshot().error, Some(err));
            assert!(meetings.snapshot().organization_meetings.is_empty());
        })
        .await;
    }

    #[test]
    fn zoom_import_merges_by_id() {
        with_runtime(|| {
            let meetings = MeetingStore::new(
                ApiClient::new_with_base_url("http://127.0.0.1:9/api"),
                Storage::memory(),
                ErrorReporter::default(),
            );
            let listed: Vec<Meeting> = serde_json::from_value(json!([
                meeting_json(88001, "Standup", "2025-03-10T09:00:00Z", 15),
                meeting_json(88002, "Sync", "2025-03-10T10:00:00Z", 30)
            ]))
            .unwrap();
            let org = Id::from(1);
            meetings.import_zoom_meetings(&org, &listed);
            meetings.import_zoom_meetings(&org, &listed[..1]);

            let imported = &meetings.snapshot().organization_meetings[&org];
            assert_eq!(imported.len(), 2);
            assert!(imported.iter().all(|m| m.source == MeetingSource::Zoom));
            assert!(imported.iter().all(|m| m.organization_id == Some(org.clone())));

            meetings.set_filter(MeetingFilter {
                search: "sync".into(),
                ..Default::default()
            });
            let now = Utc::now();
            assert_eq!(meetings.snapshot().filtered_organization_meetings(&org, now).len(), 1);
            meetings.clear_filter();
            assert_eq!(meetings.snapshot().filtered_organization_meetings(&org, now).len(), 2);
        });
    }

    #[test]
    fn hydrate_restores_cached_user_meetings() {
        with_runtime(|| {
            let storage = Storage::memory();
            storage.set(
                keys::USER_MEETINGS,
                &json!([meeting_json(1, "Standup", "2025-03-10T09:00:00Z", 15)]),
            );
            let meetings = MeetingStore::new(
                ApiClient::new_with_base_url("http://127.0.0.1:9/api"),
                storage.clone(),
                ErrorReporter::default(),
            );
            meetings.hydrate();
            assert_eq!(meetings.snapshot().user_meetings.len(), 1);
            meetings.reset();
            assert!(meetings.snapshot().user_meetings.is_empty());
            assert!(storage.raw(keys::USER_MEETINGS).is_none());
        });
    }
}
