use reqwest::Method;

use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest,
    User,
};

impl ApiClient {
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        self.send_json(self.request(Method::POST, "user/login").json(request))
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthResponse> {
        self.send_json(self.request(Method::POST, "user/register").json(request))
            .await
    }

    /// Current user record for the attached token.
    pub async fn refresh_user(&self) -> ApiResult<User> {
        self.send_json(self.request(Method::GET, "user/refresh")).await
    }

    pub async fn logout(&self) -> ApiResult<()> {
        self.send_unit(self.request(Method::POST, "user/logout")).await
    }

    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> ApiResult<User> {
        self.send_json(self.request(Method::PUT, "user/profile").json(request))
            .await
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> ApiResult<()> {
        self.send_unit(
            self.request(Method::POST, "user/change-password")
                .json(request),
        )
        .await
    }
}
