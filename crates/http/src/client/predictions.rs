//! Prediction API client methods

use super::{ApiClient, ClientError};
use crate::client::request::ApiRequest;
use bytes::Bytes;
use hepatica_core::{Prediction, PredictionRequest};

impl ApiClient {
    /// Submit feature values and get the stored prediction back
    pub async fn predict(&self, request: &PredictionRequest) -> Result<Prediction, ClientError> {
        let request = ApiRequest::post("/api/predict/").json(request)?;
        self.execute(request).await
    }

    /// Predictions visible to the signed-in user
    pub async fn get_predictions(&self) -> Result<Vec<Prediction>, ClientError> {
        self.execute(ApiRequest::get("/api/predictions/")).await
    }

    /// Prediction history as CSV
    pub async fn export_predictions(&self) -> Result<Bytes, ClientError> {
        self.execute_bytes(ApiRequest::get("/api/predictions/export/"))
            .await
    }
}
