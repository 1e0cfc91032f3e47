use reqwest::multipart::{Form, Part};

use super::{
    client::{ApiClient, Auth},
    types::{
        ApiError, CreateMeetingRequest, Id, Meeting, MeetingList, MeetingPatch, UploadFile,
        UploadMetadata,
    },
};

impl ApiClient {
    pub async fn list_my_meetings(&self) -> Result<Vec<Meeting>, ApiError> {
        let url = self.url("/meetings").await;
        self.execute::<MeetingList>(self.http_client().get(url), Auth::Bearer)
            .await
            .map(MeetingList::into_vec)
    }

    pub async fn list_organization_meetings(
        &self,
        organization_id: &Id,
    ) -> Result<Vec<Meeting>, ApiError> {
        let url = self
            .url(&format!("/organizations/{}/meetings", organization_id.path_segment()))
            .await;
        self.execute::<MeetingList>(self.http_client().get(url), Auth::Bearer)
            .await
            .map(MeetingList::into_vec)
    }

    pub async fn get_meeting(&self, id: &Id) -> Result<Meeting, ApiError> {
        let url = self.url(&format!("/meetings/{}", id.path_segment())).await;
        self.execute(self.http_client().get(url), Auth::Bearer).await
    }

    pub async fn create_meeting(&self, request: &CreateMeetingRequest) -> Result<Meeting, ApiError> {
        let url = self.url("/meetings").await;
        self.execute(self.http_client().post(url).json(request), Auth::Bearer)
            .await
    }

    pub async fn update_meeting(&self, id: &Id, patch: &MeetingPatch) -> Result<Meeting, ApiError> {
        let url = self.url(&format!("/meetings/{}", id.path_segment())).await;
        self.execute(self.http_client().put(url).json(patch), Auth::Bearer)
            .await
    }

    pub async fn delete_meeting(&self, id: &Id) -> Result<(), ApiError> {
        let url = self.url(&format!("/meetings/{}", id.path_segment())).await;
        self.execute_empty(self.http_client().delete(url), Auth::Bearer)
            .await
    }

    pub async fn upload_meeting(
        &self,
        file: UploadFile,
        metadata: &UploadMetadata,
    ) -> Result<Meeting, ApiError> {
        let url = self.url("/meetings/upload").await;
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime_type)
            .map_err(|_| ApiError::validation("Unsupported file type"))?;
        let mut form = Form::new()
            .part("file", part)
            .text("topic", metadata.topic.clone());
        if let Some(start_time) = metadata.start_time {
            form = form.text("start_time", start_time.to_rfc3339());
        }
        if let Some(duration) = metadata.duration_minutes {
            form = form.text("duration_minutes", duration.to_string());
        }
        if let Some(organization_id) = &metadata.organization_id {
            form = form.text("organization_id", organization_id.to_string());
        }
        self.execute(self.http_client().post(url).multipart(form), Auth::Bearer)
            .await
    }

    pub async fn summarize_meeting(&self, id: &Id) -> Result<Meeting, ApiError> {
        let url = self.url(&format!("/meetings/{}/summarize", id.path_segment())).await;
        self.execute(self.http_client().post(url), Auth::Bearer).await
    }
}
