use super::{
    client::{ApiClient, Auth},
    types::{ApiError, Id, Organization, OrganizationPayload},
};

impl ApiClient {
    pub async fn list_organizations(&self) -> Result<Vec<Organization>, ApiError> {
        let url = self.url("/organizations").await;
        self.execute(self.http_client().get(url), Auth::Bearer).await
    }

    pub async fn create_organization(&self, name: &str) -> Result<Organization, ApiError> {
        let url = self.url("/organizations").await;
        let body = OrganizationPayload {
            name: name.to_string(),
        };
        self.execute(self.http_client().post(url).json(&body), Auth::Bearer)
            .await
    }

    pub async fn update_organization(&self, id: &Id, name: &str) -> Result<Organization, ApiError> {
        let url = self.url(&format!("/organizations/{}", id.path_segment())).await;
        let body = OrganizationPayload {
            name: name.to_string(),
        };
        self.execute(self.http_client().put(url).json(&body), Auth::Bearer)
            .await
    }

    pub async fn delete_organization(&self, id: &Id) -> Result<(), ApiError> {
        let url = self.url(&format!("/organizations/{}", id.path_segment())).await;
        self.execute_empty(self.http_client().delete(url), Auth::Bearer)
            .await
    }
}
