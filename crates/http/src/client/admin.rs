//! Admin API client methods

use super::{ApiClient, ClientError};
use crate::client::request::ApiRequest;
use hepatica_core::AdminMetrics;

impl ApiClient {
    /// System-wide counters shown on the clinician dashboard
    pub async fn get_metrics(&self) -> Result<AdminMetrics, ClientError> {
        self.execute(ApiRequest::get("/api/admin/metrics/")).await
    }
}
