//! Authentication API client methods

use super::{ApiClient, ClientError, REFRESH_PATH};
use crate::client::request::ApiRequest;
use hepatica_core::{AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest, User};
use tracing::info;

impl ApiClient {
    /// Exchange credentials for a user record and token pair
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let request = ApiRequest::post("/api/auth/login/")
            .without_session()
            .json(credentials)?;
        self.execute(request).await
    }

    /// Create an account; the server signs the new user in
    pub async fn register(&self, data: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let request = ApiRequest::post("/api/auth/register/")
            .without_session()
            .json(data)?;
        self.execute(request).await
    }

    /// Mint a new access token from a refresh token
    pub async fn refresh(&self, refresh: &str) -> Result<RefreshResponse, ClientError> {
        let request = ApiRequest::post(REFRESH_PATH)
            .without_session()
            .json(&RefreshRequest {
                refresh: refresh.to_string(),
            })?;
        self.execute(request).await
    }

    /// Log in and store the resulting session
    #[tracing::instrument(skip_all, fields(username = %credentials.username))]
    pub async fn sign_in(&self, credentials: &LoginRequest) -> Result<User, ClientError> {
        let AuthResponse { user, tokens } = self.login(credentials).await?;
        info!(user_id = user.id, role = %user.role, "Signed in");
        self.session().set_auth(user.clone(), tokens);
        Ok(user)
    }

    /// Register and store the resulting session
    #[tracing::instrument(skip_all, fields(username = %data.username))]
    pub async fn sign_up(&self, data: &RegisterRequest) -> Result<User, ClientError> {
        let AuthResponse { user, tokens } = self.register(data).await?;
        info!(user_id = user.id, role = %user.role, "Registered");
        self.session().set_auth(user.clone(), tokens);
        Ok(user)
    }

    /// Forget the stored session. The backend keeps no server-side session.
    pub fn sign_out(&self) {
        self.session().logout();
    }
}
