//! Waiting on the process that owns the auth flow.

// self
use crate::{
	_prelude::*,
	config::AdoptionPolicy,
	lock::LockProbe,
	obs::{self, AuthStage, StageOutcome},
};

/// Long-polls the owner's `/wait-for-auth` endpoint until it reports completion.
///
/// - `200` ends the wait successfully.
/// - `202` means the owner is still waiting; retry after [`AdoptionPolicy::pending_retry`].
/// - Transport failures retry after [`AdoptionPolicy::error_retry`] without any bound.
/// - Any other status aborts with [`Error::AdoptionFailed`].
pub async fn wait_for_authentication(
	probe: &dyn LockProbe,
	port: u16,
	policy: &AdoptionPolicy,
) -> Result<()> {
	obs::record_stage_outcome(AuthStage::Adoption, StageOutcome::Attempt);

	loop {
		match probe.endpoint_status(port, true).await {
			Ok(200) => {
				tracing::info!(port, "Authentication completed by the owning process.");
				obs::record_stage_outcome(AuthStage::Adoption, StageOutcome::Success);

				return Ok(());
			},
			Ok(202) => {
				tracing::debug!(port, "Owner still waiting for authorization.");
				tokio::time::sleep(policy.pending_retry).await;
			},
			Ok(status) => {
				obs::record_stage_outcome(AuthStage::Adoption, StageOutcome::Failure);

				return Err(Error::AdoptionFailed { status });
			},
			Err(e) => {
				tracing::debug!(port, error = %e, "Owner unreachable; retrying.");
				tokio::time::sleep(policy.error_retry).await;
			},
		}
	}
}
