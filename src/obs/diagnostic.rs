// std
use std::io::Write;
// self
use crate::{
	_prelude::*,
	auth::{ExpiresInAnomaly, ServerIdentity},
	strategy::AuthUrlEvent,
};

/// Which token-store operation observed an anomaly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenOperation {
	/// Reading persisted tokens.
	Read,
	/// Persisting freshly issued tokens.
	Save,
}
impl TokenOperation {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenOperation::Read => "read",
			TokenOperation::Save => "save",
		}
	}
}

/// Structured events that are reported rather than raised.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
	/// A token set carried an `expires_in` value that is not a non-negative number.
	InvalidExpiresIn {
		/// Server identity owning the token set.
		server: ServerIdentity,
		/// Operation that observed the value.
		operation: TokenOperation,
		/// Detected shape problem.
		anomaly: ExpiresInAnomaly,
	},
	/// Bridge mode published an authorization URL instead of opening a browser.
	AuthorizationUrl(AuthUrlEvent),
}

/// Receiver for [`Diagnostic`] events.
pub trait DiagnosticSink
where
	Self: Send + Sync,
{
	/// Handles one event. Must not block or fail.
	fn emit(&self, diagnostic: Diagnostic);
}

/// Default sink: logs anomalies through `tracing` and writes authorization-URL events to stderr
/// as one JSON line so a supervising process can pick them up.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;
impl DiagnosticSink for TracingSink {
	fn emit(&self, diagnostic: Diagnostic) {
		match diagnostic {
			Diagnostic::InvalidExpiresIn { server, operation, anomaly } => tracing::warn!(
				%server,
				operation = operation.as_str(),
				%anomaly,
				"Token set has an unexpected expires_in value."
			),
			Diagnostic::AuthorizationUrl(event) => match serde_json::to_string(&event) {
				Ok(line) => {
					tracing::info!(session_id = %event.session_id, "Emitting authorization URL event.");

					let _ = writeln!(std::io::stderr().lock(), "{line}");
				},
				Err(e) => tracing::warn!(error = %e, "Failed to encode authorization URL event."),
			},
		}
	}
}

/// Sink that keeps every event in memory; intended for tests.
#[derive(Debug, Default)]
pub struct RecordingSink(Mutex<Vec<Diagnostic>>);
impl RecordingSink {
	/// Snapshot of the events recorded so far.
	pub fn events(&self) -> Vec<Diagnostic> {
		self.0.lock().clone()
	}

	/// Drains the recorded events.
	pub fn take(&self) -> Vec<Diagnostic> {
		std::mem::take(&mut *self.0.lock())
	}
}
impl DiagnosticSink for RecordingSink {
	fn emit(&self, diagnostic: Diagnostic) {
		self.0.lock().push(diagnostic);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_sink_collects_and_drains() {
		let sink = RecordingSink::default();
		let server = ServerIdentity::from_server_url("https://mcp.example.com/sse");
		let diagnostic = Diagnostic::InvalidExpiresIn {
			server,
			operation: TokenOperation::Save,
			anomaly: ExpiresInAnomaly::Negative { raw: "-1".into() },
		};

		sink.emit(diagnostic.clone());

		assert_eq!(sink.events(), vec![diagnostic.clone()]);
		assert_eq!(sink.take(), vec![diagnostic]);
		assert!(sink.events().is_empty());
	}

	#[test]
	fn tracing_sink_never_panics() {
		TracingSink.emit(Diagnostic::InvalidExpiresIn {
			server: ServerIdentity::from_server_url("https://mcp.example.com/sse"),
			operation: TokenOperation::Read,
			anomaly: ExpiresInAnomaly::NotNumeric { raw: "\"soon\"".into() },
		});
	}
}
