//! Role-based dashboards

use hepatica_core::{AdminMetrics, ConsentStatus, Faq, Hospital, Prediction, Role};
use hepatica_http::{ApiClient, ClientError};
use tracing::{debug, warn};

/// Data shown on a role's dashboard
#[derive(Debug, Clone, PartialEq)]
pub enum Dashboard {
    Patient {
        predictions: Vec<Prediction>,
        faqs: Vec<Faq>,
        hospitals: Vec<Hospital>,
        /// `None` when the consent record could not be fetched
        consent: Option<ConsentStatus>,
    },
    Clinician {
        metrics: AdminMetrics,
        predictions: Vec<Prediction>,
        faqs: Vec<Faq>,
        hospitals: Vec<Hospital>,
    },
}

impl Dashboard {
    /// Fetch every section for `role` concurrently.
    ///
    /// The first failing section fails the dashboard, except the patient's
    /// consent record, which is left out instead.
    pub async fn load(client: &ApiClient, role: Role) -> Result<Self, ClientError> {
        debug!(%role, "Loading dashboard");
        match role {
            Role::Patient => {
                let sections = async {
                    futures::try_join!(
                        client.get_predictions(),
                        client.get_faqs(),
                        client.get_hospitals(),
                    )
                };
                let (sections, consent) = futures::join!(sections, client.get_consent_status());
                let (predictions, faqs, hospitals) = sections?;
                let consent = consent
                    .inspect_err(|e| warn!("Hiding consent section: {e}"))
                    .ok();
                Ok(Self::Patient {
                    predictions,
                    faqs,
                    hospitals,
                    consent,
                })
            }
            Role::Clinician => {
                let (metrics, predictions, faqs, hospitals) = futures::try_join!(
                    client.get_metrics(),
                    client.get_predictions(),
                    client.get_faqs(),
                    client.get_hospitals(),
                )?;
                Ok(Self::Clinician {
                    metrics,
                    predictions,
                    faqs,
                    hospitals,
                })
            }
        }
    }
}
