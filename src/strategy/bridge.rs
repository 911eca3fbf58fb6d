//! Auth-bridge strategy: a remote collaborator receives the redirect and this process polls it for
//! the code.

// crates.io
use oauth2::http::StatusCode;
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::{ServerIdentity, SessionId},
	config::{self, AuthConfig, BridgeConfig},
	error::ConfigError,
	http::{self, AuthHttpClient},
	obs::{self, AuthStage, StageOutcome, StageSpan},
	strategy::{AuthCodeWait, AuthState},
};

/// Value of the `type` field of [`AuthUrlEvent`].
pub const AUTH_URL_EVENT_TYPE: &str = "mcp-remote-auth-url";
/// Per-request timeout for poll requests.
pub const POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// `Accept` header sent with poll requests.
pub const POLL_ACCEPT: &str = "application/json, text/plain";

const SESSION_PLACEHOLDER: &str = "{session_id}";
const SERVER_HASH_PLACEHOLDER: &str = "{server_url_hash}";

/// Authorization URL published to the bridge instead of opening a browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUrlEvent {
	/// Always [`AUTH_URL_EVENT_TYPE`].
	#[serde(rename = "type")]
	pub kind: String,
	/// Bridge session identifier.
	pub session_id: SessionId,
	/// OAuth `state` parameter of the authorization URL.
	pub state: Option<String>,
	/// Full authorization URL the user must visit.
	pub authorization_url: String,
	/// Redirect URL registered for the flow.
	pub redirect_url: String,
}
impl AuthUrlEvent {
	/// Builds the event, copying `state` from the authorization URL's query.
	pub fn new(session_id: SessionId, authorization_url: &Url, redirect_url: impl Into<String>) -> Self {
		let state = authorization_url
			.query_pairs()
			.find(|(name, _)| name == "state")
			.map(|(_, value)| value.into_owned());

		Self {
			kind: AUTH_URL_EVENT_TYPE.into(),
			session_id,
			state,
			authorization_url: authorization_url.to_string(),
			redirect_url: redirect_url.into(),
		}
	}
}

/// Returns the bridge state: a poller, or the emit-only variant.
pub fn start(
	config: &AuthConfig,
	bridge: &BridgeConfig,
	http: Arc<dyn AuthHttpClient>,
) -> Result<AuthState> {
	let template = bridge.poll_url.as_deref().ok_or(ConfigError::MissingBridgePollUrl)?;
	let identity = config.identity();
	let url = build_poll_url(template, &bridge.session_id, &identity)?;

	if bridge.emit_only {
		tracing::info!(
			server = %identity,
			session_id = %bridge.session_id,
			"Bridge emit-only mode; the authorization URL will be published without polling."
		);

		return Ok(AuthState::primary(AuthCodeWait::EmitOnly, None));
	}

	tracing::info!(server = %identity, session_id = %bridge.session_id, "Polling the auth bridge.");

	Ok(AuthState::primary(
		AuthCodeWait::Bridge(BridgePoller {
			http,
			url,
			identity,
			interval: bridge.poll_interval,
			timeout: config.auth_timeout,
		}),
		None,
	))
}

/// Resolves the poll URL template.
///
/// Placeholders are substituted with percent-encoded values; a template without placeholders gets
/// `session_id` and `server_url_hash` query parameters appended.
pub fn build_poll_url(
	template: &str,
	session_id: &SessionId,
	server_hash: &ServerIdentity,
) -> Result<Url, ConfigError> {
	if template.contains(SESSION_PLACEHOLDER) || template.contains(SERVER_HASH_PLACEHOLDER) {
		let resolved = template
			.replace(SESSION_PLACEHOLDER, &percent_encode(session_id))
			.replace(SERVER_HASH_PLACEHOLDER, &percent_encode(server_hash));

		return Url::parse(&resolved).map_err(|e| ConfigError::invalid_url("bridge poll URL", e));
	}

	let mut url = Url::parse(template).map_err(|e| ConfigError::invalid_url("bridge poll URL", e))?;

	url.query_pairs_mut()
		.append_pair("session_id", session_id)
		.append_pair("server_url_hash", server_hash);

	Ok(url)
}

fn percent_encode(value: &str) -> String {
	url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Polls the bridge until it hands out a code.
#[derive(Clone)]
pub struct BridgePoller {
	http: Arc<dyn AuthHttpClient>,
	url: Url,
	identity: ServerIdentity,
	interval: Duration,
	timeout: Duration,
}
impl BridgePoller {
	/// Concrete poll URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Runs the poll loop.
	///
	/// The deadline is checked before each request; an in-flight request is never cancelled by it.
	pub async fn poll(&self) -> Result<String> {
		let span = StageSpan::new(AuthStage::BridgePoll, &self.identity);

		obs::record_stage_outcome(AuthStage::BridgePoll, StageOutcome::Attempt);

		let result = span.instrument(self.poll_inner()).await;

		obs::record_stage_outcome(
			AuthStage::BridgePoll,
			if result.is_ok() { StageOutcome::Success } else { StageOutcome::Failure },
		);

		result
	}

	async fn poll_inner(&self) -> Result<String> {
		let started = Instant::now();

		loop {
			if started.elapsed() >= self.timeout {
				return Err(Error::BridgeTimeout { seconds: config::whole_seconds(self.timeout) });
			}

			match self.poll_once().await? {
				PollOutcome::Code(code) => {
					tracing::info!(server = %self.identity, "Auth bridge returned an authorization code.");

					return Ok(code);
				},
				PollOutcome::Pending => {},
			}

			tokio::time::sleep(self.interval).await;
		}
	}

	async fn poll_once(&self) -> Result<PollOutcome> {
		let request = http::get_request(&self.url, Some(POLL_ACCEPT))?;
		let response = match self.http.execute(request, POLL_REQUEST_TIMEOUT).await {
			Ok(response) => response,
			Err(e) => {
				tracing::debug!(error = %e, "Auth bridge poll failed; retrying.");

				return Ok(PollOutcome::Pending);
			},
		};

		match response.status() {
			StatusCode::OK => Ok(match extract_code(response.body()) {
				Some(code) => PollOutcome::Code(code),
				None => {
					tracing::debug!("Auth bridge answered without a code; still waiting.");

					PollOutcome::Pending
				},
			}),
			StatusCode::ACCEPTED | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND =>
				Ok(PollOutcome::Pending),
			StatusCode::GONE => Err(Error::BridgeSessionExpired),
			status => {
				tracing::warn!(status = status.as_u16(), "Unexpected auth bridge status; retrying.");

				Ok(PollOutcome::Pending)
			},
		}
	}
}
impl Debug for BridgePoller {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BridgePoller")
			.field("url", &self.url.as_str())
			.field("interval", &self.interval)
			.field("timeout", &self.timeout)
			.finish()
	}
}

enum PollOutcome {
	Code(String),
	Pending,
}

/// Reads `code`, then `authorization_code`, from a JSON object body.
///
/// Non-object bodies, non-string values, and empty strings count as missing.
fn extract_code(body: &[u8]) -> Option<String> {
	let body = serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(body).ok()?;

	["code", "authorization_code"]
		.into_iter()
		.filter_map(|field| body.get(field).and_then(serde_json::Value::as_str))
		.find(|code| !code.is_empty())
		.map(str::to_owned)
}
