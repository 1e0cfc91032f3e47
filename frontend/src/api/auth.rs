use super::{
    client::{ApiClient, Auth},
    types::{
        ApiError, AuthResponse, EmailRequest, LoginRequest, Profile, RawProfile,
        RefreshRequest, RegisterRequest, RegisterResponse, ResetPasswordRequest, VerifyOtpRequest,
    },
};

impl ApiClient {
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        let url = self.url("/auth/register").await;
        self.execute(self.http_client().post(url).json(request), Auth::Anonymous)
            .await
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<AuthResponse, ApiError> {
        let url = self.url("/auth/verify-otp").await;
        let body = VerifyOtpRequest {
            email: email.to_string(),
            otp: otp.to_string(),
        };
        self.execute(self.http_client().post(url).json(&body), Auth::Anonymous)
            .await
    }

    pub async fn resend_otp(&self, email: &str) -> Result<RegisterResponse, ApiError> {
        let url = self.url("/auth/resend-otp").await;
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.execute(self.http_client().post(url).json(&body), Auth::Anonymous)
            .await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let url = self.url("/auth/login").await;
        self.execute(self.http_client().post(url).json(request), Auth::Anonymous)
            .await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthResponse, ApiError> {
        let url = self.url("/auth/refresh").await;
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.execute(self.http_client().post(url).json(&body), Auth::Anonymous)
            .await
    }

    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), ApiError> {
        let url = self.url("/auth/logout").await;
        let body = match refresh_token {
            Some(token) => serde_json::json!({ "refresh_token": token }),
            None => serde_json::json!({}),
        };
        // Anonymous so a 401 here does not re-enter the sign-out path.
        let mut request = self.http_client().post(url).json(&body);
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }
        self.execute_empty(request, Auth::Anonymous).await
    }

    pub async fn get_me(&self) -> Result<Profile, ApiError> {
        let url = self.url("/auth/me").await;
        self.execute::<RawProfile>(self.http_client().get(url), Auth::Bearer)
            .await
            .map(Profile::from)
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let url = self.url("/auth/forgot-password").await;
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.execute_empty(self.http_client().post(url).json(&body), Auth::Anonymous)
            .await
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let url = self.url("/auth/reset-password").await;
        let body = ResetPasswordRequest {
            token: token.to_string(),
            new_password: new_password.to_string(),
        };
        self.execute_empty(self.http_client().post(url).json(&body), Auth::Anonymous)
            .await
    }
}
