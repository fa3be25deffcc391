//! Model feature API client methods

use super::{ApiClient, ClientError};
use crate::client::request::ApiRequest;
use serde::Deserialize;

/// The endpoint has answered both as a bare list and wrapped in an object
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureList {
    Plain(Vec<String>),
    Wrapped { features: Vec<String> },
}

impl ApiClient {
    /// Names of the features the prediction model expects
    pub async fn get_features(&self) -> Result<Vec<String>, ClientError> {
        let list: FeatureList = self.execute(ApiRequest::get("/api/features/")).await?;
        Ok(match list {
            FeatureList::Plain(features) | FeatureList::Wrapped { features } => features,
        })
    }
}
