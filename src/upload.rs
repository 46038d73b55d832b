//! Re-upload harvested scenarios to an account.
//!
//! Each top-level scenario is published in two steps: create an empty
//! scenario to obtain a fresh public id, then update it with the stored
//! fields. Nested options are skipped since the create/update pair cannot
//! attach them to a parent.

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use crate::container::ResultContainer;
use crate::error::HarvestError;
use crate::models::Item;

/// Destination for uploaded scenarios.
#[async_trait]
pub trait ScenarioPublisher: Send + Sync {
    /// Create an empty scenario and return its public id.
    async fn create_scenario(&self) -> Result<String, HarvestError>;

    /// Overwrite the scenario `public_id` with the fields of `scenario`.
    async fn update_scenario(&self, public_id: &str, scenario: &Item) -> Result<(), HarvestError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: usize,
    /// Nested options left out.
    pub skipped: usize,
    pub failed: usize,
}

/// Upload every top-level scenario in `scenarios`.
///
/// A failure on one scenario is logged and counted; only a
/// [`HarvestError::Transient`] (the service is unreachable) stops the run.
#[instrument(skip_all, fields(count = scenarios.len()))]
pub async fn upload_scenarios<P: ScenarioPublisher + ?Sized>(
    publisher: &P,
    scenarios: &ResultContainer,
) -> Result<UploadReport, HarvestError> {
    let mut report = UploadReport::default();

    for scenario in scenarios {
        if scenario.is_option {
            report.skipped += 1;
            continue;
        }

        match upload_one(publisher, scenario).await {
            Ok(public_id) => {
                info!("{} successfully uploaded as {}", scenario.display_title(), public_id);
                report.uploaded += 1;
            }
            Err(e @ HarvestError::Transient { .. }) => {
                error!("Upload aborted at \"{}\": {}", scenario.display_title(), e);
                return Err(e);
            }
            Err(e) => {
                warn!("Failed to upload \"{}\": {}", scenario.display_title(), e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn upload_one<P: ScenarioPublisher + ?Sized>(
    publisher: &P,
    scenario: &Item,
) -> Result<String, HarvestError> {
    let public_id = publisher.create_scenario().await?;
    let mut stamped = scenario.clone();
    stamped.public_id = Some(public_id.clone());
    publisher.update_scenario(&public_id, &stamped).await?;
    Ok(public_id)
}
