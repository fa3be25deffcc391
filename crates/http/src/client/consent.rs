//! Consent API client methods

use super::{ApiClient, ClientError};
use crate::client::request::ApiRequest;
use hepatica_core::ConsentStatus;

impl ApiClient {
    /// Consent record of the signed-in user
    pub async fn get_consent_status(&self) -> Result<ConsentStatus, ClientError> {
        self.execute(ApiRequest::get("/api/consent/status/")).await
    }

    /// Record that the signed-in user accepted data processing
    pub async fn accept_consent(&self) -> Result<ConsentStatus, ClientError> {
        self.execute(ApiRequest::post("/api/consent/accept/")).await
    }
}
