use reqwest::RequestBuilder;

use super::{
    client::{ApiClient, Auth},
    types::{
        ApiError, Id, Meeting, MeetingList, ZoomAccount, ZoomExchangeRequest,
        ZoomOrganizationRequest, ZoomRefreshRequest, ZoomStatusResponse, ZoomTokenResponse,
    },
};

/// Header carrying the Zoom access token on Zoom-scoped calls.
pub const ZOOM_TOKEN_HEADER: &str = "X-Zoom-Token";

fn with_zoom_token(request: RequestBuilder, zoom_token: &str) -> RequestBuilder {
    request.header(ZOOM_TOKEN_HEADER, zoom_token)
}

impl ApiClient {
    pub async fn zoom_status(&self, organization_id: &Id) -> Result<ZoomStatusResponse, ApiError> {
        let url = self.url("/zoom/status").await;
        let request = self
            .http_client()
            .get(url)
            .query(&[("organization_id", organization_id.as_str())]);
        self.execute(request, Auth::Bearer).await
    }

    pub async fn zoom_exchange_code(
        &self,
        request: &ZoomExchangeRequest,
    ) -> Result<ZoomTokenResponse, ApiError> {
        let url = self.url("/zoom/callback").await;
        self.execute(self.http_client().post(url).json(request), Auth::Bearer)
            .await
    }

    pub async fn zoom_refresh_token(
        &self,
        request: &ZoomRefreshRequest,
    ) -> Result<ZoomTokenResponse, ApiError> {
        let url = self.url("/zoom/refresh").await;
        self.execute(self.http_client().post(url).json(request), Auth::Bearer)
            .await
    }

    pub async fn zoom_account(&self, zoom_token: &str) -> Result<ZoomAccount, ApiError> {
        let url = self.url("/zoom/account").await;
        self.execute(with_zoom_token(self.http_client().get(url), zoom_token), Auth::Bearer)
            .await
    }

    pub async fn zoom_meetings(
        &self,
        organization_id: &Id,
        zoom_token: &str,
    ) -> Result<Vec<Meeting>, ApiError> {
        let url = self.url("/zoom/meetings").await;
        let request = self
            .http_client()
            .get(url)
            .query(&[("organization_id", organization_id.as_str())]);
        self.execute::<MeetingList>(with_zoom_token(request, zoom_token), Auth::Bearer)
            .await
            .map(MeetingList::into_vec)
    }

    pub async fn zoom_disconnect(&self, organization_id: &Id) -> Result<(), ApiError> {
        let url = self.url("/zoom/disconnect").await;
        let body = ZoomOrganizationRequest {
            organization_id: organization_id.clone(),
        };
        self.execute_empty(self.http_client().post(url).json(&body), Auth::Bearer)
            .await
    }
}
