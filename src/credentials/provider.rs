//! Contract consumed by the OAuth protocol library.

// crates.io
use oauth2::PkceCodeVerifier;
// self
use crate::{
	_prelude::*,
	auth::{ClientMetadata, ClientRegistration, TokenSet},
};

/// Boxed future returned by [`OAuthClientProvider`] operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Which persisted credentials to discard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidationScope {
	/// Registration, tokens, and verifier.
	All,
	/// Client registration only.
	Client,
	/// Token set only.
	Tokens,
	/// PKCE verifier only.
	Verifier,
}
impl InvalidationScope {
	/// Returns the stable label accepted by [`FromStr`].
	pub const fn as_str(self) -> &'static str {
		match self {
			InvalidationScope::All => "all",
			InvalidationScope::Client => "client",
			InvalidationScope::Tokens => "tokens",
			InvalidationScope::Verifier => "verifier",
		}
	}
}
impl Display for InvalidationScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for InvalidationScope {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"all" => Ok(Self::All),
			"client" => Ok(Self::Client),
			"tokens" => Ok(Self::Tokens),
			"verifier" => Ok(Self::Verifier),
			other => Err(Error::UnknownInvalidationScope { scope: other.to_owned() }),
		}
	}
}

/// Client-side hooks an OAuth authorization-code flow needs: metadata, persistence, and
/// user-agent redirection.
pub trait OAuthClientProvider
where
	Self: Send + Sync,
{
	/// Redirect URL registered for the flow.
	fn redirect_url(&self) -> String;

	/// Registration metadata with the current effective scope.
	fn client_metadata(&self) -> Result<ClientMetadata>;

	/// Fresh random `state` value.
	fn state(&self) -> String;

	/// Stored client registration, if any.
	fn client_information(&self) -> ProviderFuture<'_, Option<ClientRegistration>>;

	/// Persists a client registration.
	fn save_client_information(&self, client: ClientRegistration) -> ProviderFuture<'_, ()>;

	/// Stored token set, if any.
	fn tokens(&self) -> ProviderFuture<'_, Option<TokenSet>>;

	/// Persists a token set.
	fn save_tokens(&self, tokens: TokenSet) -> ProviderFuture<'_, ()>;

	/// Sends the user to the authorization URL.
	fn redirect_to_authorization(&self, authorization_url: Url) -> ProviderFuture<'_, ()>;

	/// Persists the PKCE verifier of the current flow.
	fn save_code_verifier(&self, verifier: PkceCodeVerifier) -> ProviderFuture<'_, ()>;

	/// Stored PKCE verifier; fails with [`Error::MissingCodeVerifier`] when none exists.
	fn code_verifier(&self) -> ProviderFuture<'_, PkceCodeVerifier>;

	/// Discards persisted credentials.
	fn invalidate_credentials(&self, scope: InvalidationScope) -> ProviderFuture<'_, ()>;
}
