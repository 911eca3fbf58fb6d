//! Process-wide facade that runs the lock check once and memoizes the selected strategy.

// crates.io
use async_lock::OnceCell;
// self
use crate::{
	_prelude::*,
	auth::ServerIdentity,
	config::{AuthConfig, AuthMode},
	credentials::CredentialStore,
	http::AuthHttpClient,
	lock::{HttpLockProbe, LockCoordinator, LockDecision, LockProbe},
	obs::{DiagnosticSink, TracingSink},
	store::ConfigStore,
	strategy::{AuthState, bridge, callback},
};
#[cfg(feature = "reqwest")] use crate::{http, store::FileStore};

/// Selects and memoizes the auth strategy for one server identity.
pub struct AuthCoordinator {
	config: AuthConfig,
	identity: ServerIdentity,
	store: Arc<dyn ConfigStore>,
	http: Arc<dyn AuthHttpClient>,
	probe: Arc<dyn LockProbe>,
	sink: Arc<dyn DiagnosticSink>,
	state: OnceCell<Arc<AuthState>>,
}
impl AuthCoordinator {
	/// Creates a coordinator backed by the config directory and the default HTTP client.
	#[cfg(feature = "reqwest")]
	pub fn open(config: AuthConfig) -> Result<Self> {
		let store = Arc::new(FileStore::open(config.resolved_config_dir()?)?);

		Ok(Self::new(config, store, http::default_client()))
	}

	/// Creates a coordinator over explicit backends.
	pub fn new(
		config: AuthConfig,
		store: Arc<dyn ConfigStore>,
		http: Arc<dyn AuthHttpClient>,
	) -> Self {
		let probe = Arc::new(HttpLockProbe::new(Arc::clone(&http), config.long_poll_timeout));

		Self {
			identity: config.identity(),
			config,
			store,
			http,
			probe,
			sink: Arc::new(TracingSink),
			state: OnceCell::new(),
		}
	}

	/// Replaces the lock probe.
	pub fn with_lock_probe(mut self, probe: Arc<dyn LockProbe>) -> Self {
		self.probe = probe;

		self
	}

	/// Replaces the diagnostic sink handed to credential stores.
	pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
		self.sink = sink;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &AuthConfig {
		&self.config
	}

	/// Identity derived from the server URL.
	pub fn identity(&self) -> &ServerIdentity {
		&self.identity
	}

	/// Memoized state, if [`initialize_auth`](Self::initialize_auth) already succeeded.
	pub fn state(&self) -> Option<Arc<AuthState>> {
		self.state.get().cloned()
	}

	/// Runs the lock check and starts the configured strategy on first use.
	///
	/// Later and concurrent calls return the same [`AuthState`]. A failed first call is not
	/// memoized.
	pub async fn initialize_auth(&self) -> Result<Arc<AuthState>> {
		let state = self
			.state
			.get_or_try_init(|| async { self.select_strategy().await.map(Arc::new) })
			.await?;

		Ok(Arc::clone(state))
	}

	/// Credential store sharing this coordinator's backends and the state's callback port.
	pub fn credential_store(&self, state: &AuthState) -> CredentialStore {
		let store = CredentialStore::new(
			self.config.clone(),
			Arc::clone(&self.store),
			Arc::clone(&self.http),
		)
		.with_sink(Arc::clone(&self.sink));

		match state.port() {
			Some(port) => store.with_callback_port(port),
			None => store,
		}
	}

	/// Stops the callback listener and releases the lock if this process created it.
	pub async fn shutdown(&self) -> Result<()> {
		match self.state.get() {
			Some(state) => state.shutdown().await,
			None => Ok(()),
		}
	}

	async fn select_strategy(&self) -> Result<AuthState> {
		let locks = Arc::new(
			LockCoordinator::new(
				Arc::clone(&self.store),
				Arc::clone(&self.probe),
				self.identity.clone(),
			)
			.with_policy(self.config.adoption),
		);

		if let LockDecision::Adopted { owner } = locks.check_and_adopt().await? {
			tracing::info!(
				server = %self.identity,
				owner_pid = owner.pid,
				"Using credentials obtained by another process."
			);

			return Ok(AuthState::adopted());
		}

		match &self.config.auth_mode {
			AuthMode::Local => {
				tracing::info!(server = %self.identity, "Selected the local callback strategy.");

				callback::start(&self.config, locks).await
			},
			AuthMode::Bridge(bridge_config) => {
				tracing::info!(server = %self.identity, "Selected the auth bridge strategy.");

				bridge::start(&self.config, bridge_config, Arc::clone(&self.http))
			},
		}
	}
}
impl Debug for AuthCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthCoordinator")
			.field("identity", &self.identity)
			.field("initialized", &self.state.is_initialized())
			.finish()
	}
}
