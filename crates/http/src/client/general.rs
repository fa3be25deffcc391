//! Public reference data: FAQs and hospitals

use super::{ApiClient, ClientError};
use crate::client::request::ApiRequest;
use hepatica_core::{Faq, Hospital};

impl ApiClient {
    pub async fn get_faqs(&self) -> Result<Vec<Faq>, ClientError> {
        self.execute(ApiRequest::get("/api/faqs/")).await
    }

    pub async fn get_hospitals(&self) -> Result<Vec<Hospital>, ClientError> {
        self.execute(ApiRequest::get("/api/hospitals/")).await
    }
}
