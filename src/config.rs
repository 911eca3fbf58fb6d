//! Runtime configuration for the coordinator, strategies, and credential store.
//!
//! Values usually come from the proxy's command line; every field has a default so a config can
//! also be deserialized from a partial JSON document.

// std
use std::path::{Path, PathBuf};
// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{ClientRegistration, ServerIdentity, SessionId},
	error::ConfigError,
};

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "MCP_REMOTE_CONFIG_DIR";
/// Default local callback port.
pub const DEFAULT_CALLBACK_PORT: u16 = 3334;
/// Default redirect path served by the callback strategy.
pub const DEFAULT_CALLBACK_PATH: &str = "/oauth/callback";

const DEFAULT_CLIENT_NAME: &str = "MCP CLI Proxy";
const DEFAULT_CLIENT_URI: &str = "https://github.com/modelcontextprotocol/mcp-cli";
const DEFAULT_SOFTWARE_ID: &str = "2e6dc280-f3c3-4e01-99a7-8181dbd1d23d";

/// How the authorization code reaches this process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthMode {
	/// Run a local callback listener and open the user's browser.
	#[default]
	Local,
	/// Poll a remote auth bridge for the code.
	Bridge(BridgeConfig),
}

/// Settings for the auth-bridge strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
	/// Poll URL template; may contain `{session_id}` and `{server_url_hash}` placeholders.
	pub poll_url: Option<String>,
	/// Endpoint receiving a POST with the authorization-URL event.
	pub notify_url: Option<String>,
	/// Bridge session identifier; a random one is generated when absent.
	pub session_id: SessionId,
	/// Delay between poll requests.
	#[serde(with = "duration_ms")]
	pub poll_interval: Duration,
	/// Only publish the authorization URL; never poll for a code.
	pub emit_only: bool,
}
impl BridgeConfig {
	/// Creates a polling bridge config for the given URL template.
	pub fn polling(poll_url: impl Into<String>) -> Self {
		Self { poll_url: Some(poll_url.into()), ..Default::default() }
	}

	/// Sets the notify endpoint.
	pub fn with_notify_url(mut self, notify_url: impl Into<String>) -> Self {
		self.notify_url = Some(notify_url.into());

		self
	}

	/// Sets the bridge session identifier.
	pub fn with_session_id(mut self, session_id: SessionId) -> Self {
		self.session_id = session_id;

		self
	}

	/// Overrides the poll interval (defaults to 2 seconds).
	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;

		self
	}

	/// Switches to emit-only mode.
	pub fn emit_only(mut self) -> Self {
		self.emit_only = true;

		self
	}
}
impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			poll_url: None,
			notify_url: None,
			session_id: SessionId::random(),
			poll_interval: Duration::from_millis(2_000),
			emit_only: false,
		}
	}
}

/// Retry delays used while adopting another process's auth flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdoptionPolicy {
	/// Delay after the owner answers "still pending".
	#[serde(with = "duration_ms")]
	pub pending_retry: Duration,
	/// Delay after the owner could not be reached.
	#[serde(with = "duration_ms")]
	pub error_retry: Duration,
}
impl Default for AdoptionPolicy {
	fn default() -> Self {
		Self { pending_retry: Duration::from_secs(1), error_retry: Duration::from_secs(2) }
	}
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
	/// Remote server URL; its hash partitions all persisted state.
	pub server_url: String,
	/// Authorization-code acquisition mode.
	pub auth_mode: AuthMode,
	/// Host used in the redirect URL.
	pub callback_host: String,
	/// Local callback port (`0` lets the OS pick one).
	pub callback_port: u16,
	/// Redirect path served by the callback listener.
	pub callback_path: String,
	/// Overall deadline for receiving an authorization code.
	#[serde(with = "duration_ms")]
	pub auth_timeout: Duration,
	/// How long one `/wait-for-auth` long-poll request may hang.
	#[serde(with = "duration_ms")]
	pub long_poll_timeout: Duration,
	/// Static scope override.
	pub static_scope: Option<String>,
	/// Static client metadata merged over the defaults.
	pub static_client_metadata: Option<Map<String, Value>>,
	/// Pre-registered client; bypasses dynamic registration and persistence.
	pub static_client_info: Option<ClientRegistration>,
	/// Resource indicator (RFC 8707) appended to the authorization URL.
	pub resource: Option<String>,
	/// Client name sent during registration.
	pub client_name: String,
	/// Client URI sent during registration.
	pub client_uri: String,
	/// Software identifier sent during registration.
	pub software_id: String,
	/// Software version sent during registration.
	pub software_version: String,
	/// Directory holding persisted state; see [`AuthConfig::resolved_config_dir`].
	pub config_dir: Option<PathBuf>,
	/// On Ctrl-C, delete the lock record and terminate the whole process with exit status 130.
	///
	/// The exit skips the host's own shutdown path. Hosts that handle interrupts themselves turn
	/// this off and await [`LockGuard::release_on`](crate::lock::LockGuard::release_on) from their
	/// handler instead.
	pub interrupt_cleanup: bool,
	/// Adoption retry delays.
	pub adoption: AdoptionPolicy,
}
impl AuthConfig {
	/// Creates a local-mode config for the given server URL.
	pub fn new(server_url: impl Into<String>) -> Self {
		Self { server_url: server_url.into(), ..Default::default() }
	}

	/// Identity derived from [`server_url`](Self::server_url).
	pub fn identity(&self) -> ServerIdentity {
		ServerIdentity::from_server_url(&self.server_url)
	}

	/// Returns `true` in bridge mode.
	pub fn is_bridge(&self) -> bool {
		matches!(self.auth_mode, AuthMode::Bridge(_))
	}

	/// Bridge settings, if bridge mode is active.
	pub fn bridge(&self) -> Option<&BridgeConfig> {
		match &self.auth_mode {
			AuthMode::Bridge(bridge) => Some(bridge),
			AuthMode::Local => None,
		}
	}

	/// Config directory: the explicit value, then `$MCP_REMOTE_CONFIG_DIR`, then
	/// `~/.mcp-auth/mcp-remote-{version}`.
	///
	/// Fails with [`ConfigError::MissingHomeDir`] when only the home fallback applies and no home
	/// directory can be found.
	pub fn resolved_config_dir(&self) -> Result<PathBuf, ConfigError> {
		resolve_config_dir(
			self.config_dir.as_deref(),
			std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from),
			dirs::home_dir(),
			&self.software_version,
		)
	}

	/// Selects the auth mode.
	pub fn with_auth_mode(mut self, mode: AuthMode) -> Self {
		self.auth_mode = mode;

		self
	}

	/// Switches to bridge mode.
	pub fn with_bridge(self, bridge: BridgeConfig) -> Self {
		self.with_auth_mode(AuthMode::Bridge(bridge))
	}

	/// Overrides the callback port.
	pub fn with_callback_port(mut self, port: u16) -> Self {
		self.callback_port = port;

		self
	}

	/// Overrides the callback host used in redirect URLs.
	pub fn with_callback_host(mut self, host: impl Into<String>) -> Self {
		self.callback_host = host.into();

		self
	}

	/// Overrides the overall auth timeout.
	pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
		self.auth_timeout = timeout;

		self
	}

	/// Overrides the long-poll window of `/wait-for-auth`.
	pub fn with_long_poll_timeout(mut self, timeout: Duration) -> Self {
		self.long_poll_timeout = timeout;

		self
	}

	/// Sets the static scope override.
	pub fn with_static_scope(mut self, scope: impl Into<String>) -> Self {
		self.static_scope = Some(scope.into());

		self
	}

	/// Sets the static client metadata override.
	pub fn with_static_client_metadata(mut self, metadata: Map<String, Value>) -> Self {
		self.static_client_metadata = Some(metadata);

		self
	}

	/// Sets a pre-registered client.
	pub fn with_static_client_info(mut self, client: ClientRegistration) -> Self {
		self.static_client_info = Some(client);

		self
	}

	/// Sets the resource indicator.
	pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
		self.resource = Some(resource.into());

		self
	}

	/// Sets the config directory.
	pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.config_dir = Some(dir.into());

		self
	}

	/// Toggles interrupt cleanup.
	pub fn with_interrupt_cleanup(mut self, enabled: bool) -> Self {
		self.interrupt_cleanup = enabled;

		self
	}

	/// Overrides the adoption retry delays.
	pub fn with_adoption_policy(mut self, policy: AdoptionPolicy) -> Self {
		self.adoption = policy;

		self
	}
}
impl Default for AuthConfig {
	fn default() -> Self {
		Self {
			server_url: String::new(),
			auth_mode: AuthMode::Local,
			callback_host: "localhost".into(),
			callback_port: DEFAULT_CALLBACK_PORT,
			callback_path: DEFAULT_CALLBACK_PATH.into(),
			auth_timeout: Duration::from_secs(30),
			long_poll_timeout: Duration::from_secs(30),
			static_scope: None,
			static_client_metadata: None,
			static_client_info: None,
			resource: None,
			client_name: DEFAULT_CLIENT_NAME.into(),
			client_uri: DEFAULT_CLIENT_URI.into(),
			software_id: DEFAULT_SOFTWARE_ID.into(),
			software_version: env!("CARGO_PKG_VERSION").into(),
			config_dir: None,
			interrupt_cleanup: true,
			adoption: AdoptionPolicy::default(),
		}
	}
}

/// Rounds a duration to whole seconds for user-facing messages.
pub(crate) fn whole_seconds(duration: Duration) -> u64 {
	(duration.as_millis() as u64).saturating_add(500) / 1_000
}

mod duration_ms {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(value.as_millis() as u64)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}

fn resolve_config_dir(
	explicit: Option<&Path>,
	from_env: Option<PathBuf>,
	home: Option<PathBuf>,
	software_version: &str,
) -> Result<PathBuf, ConfigError> {
	if let Some(dir) = explicit {
		return Ok(dir.to_path_buf());
	}
	if let Some(dir) = from_env.filter(|dir| !dir.as_os_str().is_empty()) {
		return Ok(dir);
	}

	let home = home.ok_or(ConfigError::MissingHomeDir { env: CONFIG_DIR_ENV })?;

	Ok(home.join(".mcp-auth").join(format!("mcp-remote-{software_version}")))
}
