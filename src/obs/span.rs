// crates.io
use tracing::instrument::Instrumented;
// self
use crate::{_prelude::*, obs::AuthStage};

/// A span builder used by coordination flows.
#[derive(Clone, Debug)]
pub struct StageSpan {
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span tagged with the provided stage and server identity.
	pub fn new(stage: AuthStage, server: &str) -> Self {
		let span = tracing::info_span!("mcp_remote_auth.stage", stage = stage.as_str(), server);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		tracing::Instrument::instrument(fut, self.span.clone())
	}
}
