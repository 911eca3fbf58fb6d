//! Persisted client registration, tokens, and PKCE verifier for one server identity.
//!
//! [`CredentialStore`] is the [`OAuthClientProvider`] handed to the OAuth protocol library. It
//! recomputes the effective scope on every metadata read from whatever discovery information has
//! been recorded so far, and it reports soft token anomalies through a [`DiagnosticSink`].

pub mod browser;
pub mod provider;

pub use browser::*;
pub use provider::*;

// crates.io
use oauth2::{CsrfToken, PkceCodeVerifier};
// self
use crate::{
	_prelude::*,
	auth::{
		AuthorizationServerMetadata, BearerChallenge, ClientMetadata, ClientRegistration,
		EffectiveScope, ProtectedResourceMetadata, ScopeSources, ServerIdentity, TokenSet,
		resolve_scope_with_tier,
	},
	config::AuthConfig,
	error::ConfigError,
	http::{self, AuthHttpClient},
	obs::{self, AuthStage, Diagnostic, DiagnosticSink, StageOutcome, TokenOperation, TracingSink},
	store::{self, ConfigStore, StoreEntry},
	strategy::AuthUrlEvent,
};

/// Timeout for the bridge notify POST.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Default)]
struct DiscoveredScopes {
	challenge: Option<String>,
	protected_resource: Option<Vec<String>>,
	authorization_server: Option<Vec<String>>,
}

/// Credential persistence and user-agent redirection for one server identity.
pub struct CredentialStore {
	config: AuthConfig,
	identity: ServerIdentity,
	store: Arc<dyn ConfigStore>,
	http: Arc<dyn AuthHttpClient>,
	sink: Arc<dyn DiagnosticSink>,
	browser: Arc<dyn BrowserLauncher>,
	callback_port: u16,
	client_cache: RwLock<Option<ClientRegistration>>,
	discovered: RwLock<DiscoveredScopes>,
}
impl CredentialStore {
	/// Creates a store over explicit backends.
	pub fn new(
		config: AuthConfig,
		store: Arc<dyn ConfigStore>,
		http: Arc<dyn AuthHttpClient>,
	) -> Self {
		Self {
			identity: config.identity(),
			callback_port: config.callback_port,
			config,
			store,
			http,
			sink: Arc::new(TracingSink),
			browser: Arc::new(SystemBrowser),
			client_cache: RwLock::new(None),
			discovered: RwLock::new(DiscoveredScopes::default()),
		}
	}

	/// Uses the port the callback listener actually bound.
	pub fn with_callback_port(mut self, port: u16) -> Self {
		self.callback_port = port;

		self
	}

	/// Replaces the diagnostic sink.
	pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
		self.sink = sink;

		self
	}

	/// Replaces the browser launcher.
	pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
		self.browser = browser;

		self
	}

	/// Identity whose records this store manages.
	pub fn identity(&self) -> &ServerIdentity {
		&self.identity
	}

	/// Records the scope requested by a `WWW-Authenticate` challenge.
	pub fn record_challenge(&self, challenge: &BearerChallenge) {
		self.discovered.write().challenge = challenge.scope.clone();
	}

	/// Records the scopes advertised by protected-resource metadata.
	pub fn record_protected_resource_metadata(&self, metadata: &ProtectedResourceMetadata) {
		self.discovered.write().protected_resource = metadata.scopes_supported.clone();
	}

	/// Records the scopes advertised by authorization-server metadata.
	pub fn record_authorization_server_metadata(&self, metadata: &AuthorizationServerMetadata) {
		self.discovered.write().authorization_server = metadata.scopes_supported.clone();
	}

	/// Inputs currently available to the scope resolver.
	pub fn scope_sources(&self) -> ScopeSources {
		let discovered = self.discovered.read().clone();
		let registration = match &self.config.static_client_info {
			Some(client) => client.scope.clone(),
			None => self.client_cache.read().as_ref().and_then(|client| client.scope.clone()),
		};

		ScopeSources {
			configured: self.config.static_scope.clone(),
			challenge: discovered.challenge,
			protected_resource: discovered.protected_resource,
			registration,
			authorization_server: discovered.authorization_server,
		}
	}

	/// Effective scope and the tier that produced it.
	pub fn effective_scope(&self) -> EffectiveScope {
		resolve_scope_with_tier(&self.scope_sources())
	}

	fn default_metadata(&self) -> ClientMetadata {
		ClientMetadata {
			redirect_uris: vec![self.redirect_url()],
			token_endpoint_auth_method: Some("none".into()),
			grant_types: vec!["authorization_code".into(), "refresh_token".into()],
			response_types: vec!["code".into()],
			client_name: Some(self.config.client_name.clone()),
			client_uri: Some(self.config.client_uri.clone()),
			software_id: Some(self.config.software_id.clone()),
			software_version: Some(self.config.software_version.clone()),
			scope: None,
			extra: Default::default(),
		}
	}

	fn report_anomaly(&self, tokens: &TokenSet, operation: TokenOperation) {
		if let Some(anomaly) = tokens.expires_in_anomaly() {
			self.sink.emit(Diagnostic::InvalidExpiresIn {
				server: self.identity.clone(),
				operation,
				anomaly,
			});
		}
	}

	fn authorization_url_with_params(&self, mut url: Url) -> Url {
		let scope = self.effective_scope().value;

		if let Some(resource) = &self.config.resource {
			set_query_param(&mut url, "resource", resource);
		}

		set_query_param(&mut url, "scope", &scope);

		url
	}

	async fn notify_bridge(&self, notify_url: &str, event: &AuthUrlEvent) {
		obs::record_stage_outcome(AuthStage::Notify, StageOutcome::Attempt);

		let outcome = async {
			let url = Url::parse(notify_url)
				.map_err(|e| Error::from(ConfigError::invalid_url("bridge notify URL", e)))?;
			let request = http::post_json_request(&url, event)?;
			let response = self.http.execute(request, NOTIFY_TIMEOUT).await?;

			Ok::<_, Error>(response.status())
		}
		.await;

		match outcome {
			Ok(status) if status.is_success() => {
				tracing::debug!(status = status.as_u16(), "Notified the auth bridge.");
				obs::record_stage_outcome(AuthStage::Notify, StageOutcome::Success);
			},
			Ok(status) => {
				tracing::warn!(status = status.as_u16(), "Auth bridge notify endpoint rejected the event.");
				obs::record_stage_outcome(AuthStage::Notify, StageOutcome::Failure);
			},
			Err(e) => {
				tracing::warn!(error = %e, "Failed to notify the auth bridge.");
				obs::record_stage_outcome(AuthStage::Notify, StageOutcome::Failure);
			},
		}
	}

	async fn delete(&self, entry: StoreEntry) -> Result<()> {
		Ok(self.store.delete(&self.identity, entry).await?)
	}
}
impl OAuthClientProvider for CredentialStore {
	fn redirect_url(&self) -> String {
		format!(
			"http://{}:{}{}",
			self.config.callback_host, self.callback_port, self.config.callback_path
		)
	}

	fn client_metadata(&self) -> Result<ClientMetadata> {
		let mut metadata = match &self.config.static_client_metadata {
			Some(overrides) => self
				.default_metadata()
				.merged_with(overrides)
				.map_err(|source| ConfigError::InvalidClientMetadata { source })?,
			None => self.default_metadata(),
		};

		metadata.scope = Some(self.effective_scope().value);

		Ok(metadata)
	}

	fn state(&self) -> String {
		CsrfToken::new_random().secret().to_owned()
	}

	fn client_information(&self) -> ProviderFuture<'_, Option<ClientRegistration>> {
		Box::pin(async move {
			if let Some(client) = &self.config.static_client_info {
				return Ok(Some(client.clone()));
			}

			let client: Option<ClientRegistration> =
				store::read_json(self.store.as_ref(), &self.identity, StoreEntry::ClientInfo).await?;

			self.client_cache.write().clone_from(&client);

			Ok(client)
		})
	}

	fn save_client_information(&self, client: ClientRegistration) -> ProviderFuture<'_, ()> {
		Box::pin(async move {
			if self.config.static_client_info.is_some() {
				tracing::debug!(server = %self.identity, "Static client info configured; not persisting registration.");

				return Ok(());
			}

			store::write_json(self.store.as_ref(), &self.identity, StoreEntry::ClientInfo, &client)
				.await?;
			*self.client_cache.write() = Some(client);

			Ok(())
		})
	}

	fn tokens(&self) -> ProviderFuture<'_, Option<TokenSet>> {
		Box::pin(async move {
			let tokens: Option<TokenSet> =
				store::read_json(self.store.as_ref(), &self.identity, StoreEntry::Tokens).await?;

			if let Some(tokens) = &tokens {
				self.report_anomaly(tokens, TokenOperation::Read);
			}

			Ok(tokens)
		})
	}

	fn save_tokens(&self, tokens: TokenSet) -> ProviderFuture<'_, ()> {
		Box::pin(async move {
			self.report_anomaly(&tokens, TokenOperation::Save);

			Ok(store::write_json(self.store.as_ref(), &self.identity, StoreEntry::Tokens, &tokens)
				.await?)
		})
	}

	fn redirect_to_authorization(&self, authorization_url: Url) -> ProviderFuture<'_, ()> {
		Box::pin(async move {
			let url = self.authorization_url_with_params(authorization_url);

			match self.config.bridge() {
				Some(bridge) => {
					let event = AuthUrlEvent::new(bridge.session_id.clone(), &url, self.redirect_url());

					self.sink.emit(Diagnostic::AuthorizationUrl(event.clone()));

					if let Some(notify_url) = &bridge.notify_url {
						self.notify_bridge(notify_url, &event).await;
					}
				},
				None => browser::launch_or_print(self.browser.as_ref(), &url),
			}

			Ok(())
		})
	}

	fn save_code_verifier(&self, verifier: PkceCodeVerifier) -> ProviderFuture<'_, ()> {
		Box::pin(async move {
			Ok(self
				.store
				.write(&self.identity, StoreEntry::CodeVerifier, verifier.secret().to_owned())
				.await?)
		})
	}

	fn code_verifier(&self) -> ProviderFuture<'_, PkceCodeVerifier> {
		Box::pin(async move {
			self.store
				.read(&self.identity, StoreEntry::CodeVerifier)
				.await?
				.map(PkceCodeVerifier::new)
				.ok_or(Error::MissingCodeVerifier)
		})
	}

	fn invalidate_credentials(&self, scope: InvalidationScope) -> ProviderFuture<'_, ()> {
		Box::pin(async move {
			tracing::info!(server = %self.identity, %scope, "Invalidating credentials.");

			match scope {
				InvalidationScope::All => {
					self.delete(StoreEntry::ClientInfo).await?;
					self.delete(StoreEntry::Tokens).await?;
					self.delete(StoreEntry::CodeVerifier).await?;
					*self.client_cache.write() = None;
				},
				InvalidationScope::Client => {
					self.delete(StoreEntry::ClientInfo).await?;
					*self.client_cache.write() = None;
				},
				InvalidationScope::Tokens => self.delete(StoreEntry::Tokens).await?,
				InvalidationScope::Verifier => self.delete(StoreEntry::CodeVerifier).await?,
			}

			Ok(())
		})
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialStore")
			.field("identity", &self.identity)
			.field("callback_port", &self.callback_port)
			.finish()
	}
}

/// Replaces every `name` query pair with a single `name=value`.
fn set_query_param(url: &mut Url, name: &str, value: &str) {
	let retained = url
		.query_pairs()
		.filter(|(key, _)| key != name)
		.map(|(key, value)| (key.into_owned(), value.into_owned()))
		.collect::<Vec<_>>();
	let mut pairs = url.query_pairs_mut();

	pairs.clear();

	for (key, value) in &retained {
		pairs.append_pair(key, value);
	}

	pairs.append_pair(name, value);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn set_query_param_replaces_existing_values() {
		let mut url = Url::parse("https://auth.example.com/authorize?scope=old&client_id=c&scope=x")
			.expect("URL should parse.");

		set_query_param(&mut url, "scope", "openid email");

		assert_eq!(url.as_str(), "https://auth.example.com/authorize?client_id=c&scope=openid+email");
	}
}
