//! Crate-level error types shared by the coordinator, strategies, and credential store.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The auth bridge reported that the session no longer exists (HTTP 410).
	#[error("Auth bridge session expired.")]
	BridgeSessionExpired,
	/// The auth bridge never produced a code within the overall auth timeout.
	#[error("Timed out waiting for the auth bridge to return an authorization code within {seconds}s.")]
	BridgeTimeout {
		/// Configured timeout, rounded to whole seconds.
		seconds: u64,
	},
	/// The local callback endpoint never received a code within the overall auth timeout.
	#[error("Timed out waiting for the OAuth callback within {seconds}s.")]
	CallbackTimeout {
		/// Configured timeout, rounded to whole seconds.
		seconds: u64,
	},
	/// The local callback server stopped before a code arrived.
	#[error("OAuth callback server stopped before an authorization code arrived.")]
	CallbackClosed,
	/// Emit-only bridge mode never collects an authorization code.
	#[error("Authorization URL was emitted; emit-only mode does not wait for an authorization code.")]
	EmitOnly,
	/// The process that owns the auth flow answered the long-poll with an unexpected status.
	#[error("Authentication owner answered with unexpected HTTP status {status}.")]
	AdoptionFailed {
		/// HTTP status returned by the owning process.
		status: u16,
	},
	/// No PKCE verifier has been persisted for the server identity.
	#[error("No code verifier saved for session.")]
	MissingCodeVerifier,
	/// Credential invalidation was requested with an unsupported scope label.
	#[error("Unknown credential invalidation scope: {scope}.")]
	UnknownInvalidationScope {
		/// The rejected label.
		scope: String,
	},
}
impl Error {
	/// Returns `true` for failures that end an auth flow without retrying.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			Self::BridgeSessionExpired
				| Self::BridgeTimeout { .. }
				| Self::CallbackTimeout { .. }
				| Self::EmitOnly
		)
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A request body could not be encoded as JSON.
	#[error("Request body could not be encoded as JSON.")]
	RequestBody {
		/// Underlying serde failure.
		#[source]
		source: serde_json::Error,
	},
	/// A configured URL cannot be parsed.
	#[error("Configured {field} is not a valid URL.")]
	InvalidUrl {
		/// Configuration field holding the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// No config directory was given and the home directory cannot be determined.
	#[error("Home directory is unknown; set {env} or configure a config directory explicitly.")]
	MissingHomeDir {
		/// Environment variable that overrides the config directory.
		env: &'static str,
	},
	/// Bridge mode was selected without a poll URL template.
	#[error("Bridge auth mode requires a poll URL template.")]
	MissingBridgePollUrl,
	/// The static client metadata override could not be merged with the defaults.
	#[error("Static client metadata override is invalid.")]
	InvalidClientMetadata {
		/// Underlying serde failure.
		#[source]
		source: serde_json::Error,
	},
	/// The local callback server could not bind its listener.
	#[error("Callback server could not bind {host}:{port}.")]
	CallbackBind {
		/// Requested host.
		host: String,
		/// Requested port (`0` for an OS-assigned port).
		port: u16,
		/// Underlying socket failure.
		#[source]
		source: std::io::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a URL parsing failure for the named configuration field.
	pub fn invalid_url(field: &'static str, source: url::ParseError) -> Self {
		Self::InvalidUrl { field, source }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, per-request timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Host or endpoint label for the failed call.
		target: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not finish within its per-request timeout.
	#[error("Request timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during an HTTP call.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		target: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { target: target.into(), source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() {
			return Self::Timeout;
		}

		let target = e.url().and_then(|url| url.host_str()).unwrap_or("remote endpoint").to_owned();

		Self::network(target, e)
	}
}
