//! Observability helpers for the coordination flows.
//!
//! - Spans named `mcp_remote_auth.stage` carry a `stage` field for every coordination step.
//! - Enable `metrics` to increment the `mcp_remote_auth_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.
//! - [`Diagnostic`] values describe soft anomalies and emitted events; they are delivered to a
//!   [`DiagnosticSink`] instead of being raised.

mod counter;
mod diagnostic;
mod span;

pub use counter::*;
pub use diagnostic::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Coordination stages observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthStage {
	/// Validating an existing lock record.
	LockCheck,
	/// Waiting on another process that owns the flow.
	Adoption,
	/// Waiting for the local redirect callback.
	Callback,
	/// Polling the remote auth bridge.
	BridgePoll,
	/// Posting the authorization URL to the bridge notify endpoint.
	Notify,
}
impl AuthStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthStage::LockCheck => "lock_check",
			AuthStage::Adoption => "adoption",
			AuthStage::Callback => "callback",
			AuthStage::BridgePoll => "bridge_poll",
			AuthStage::Notify => "notify",
		}
	}
}
impl Display for AuthStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
