//! Cross-process OAuth coordination for local MCP proxies: lock-file leader election between
//! sibling processes, callback and bridge authorization-code acquisition, and persisted client
//! credentials with deterministic scope negotiation.
//!
//! A process typically wires the pieces together like this:
//!
//! 1. Build an [`AuthConfig`](config::AuthConfig) and derive the
//!    [`ServerIdentity`](auth::ServerIdentity) from the remote server URL.
//! 2. Call [`AuthCoordinator::initialize_auth`](coordinator::AuthCoordinator::initialize_auth).
//!    The coordinator either adopts a sibling process that already owns the flow or becomes the
//!    primary and starts the configured strategy.
//! 3. Hand a [`CredentialStore`](credentials::CredentialStore) (bound to the callback port reported
//!    by the auth state) to the OAuth protocol library as its
//!    [`OAuthClientProvider`](credentials::OAuthClientProvider).

#![deny(clippy::all, missing_docs)]

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod http;
pub mod lock;
pub mod obs;
pub mod store;
pub mod strategy;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		auth::ServerIdentity,
		config::AuthConfig,
		error::TransportError,
		http::{AuthHttpClient, HttpFuture},
		lock::{LockProbe, ProbeFuture},
		obs::RecordingSink,
		store::MemoryStore,
	};

	/// Server URL shared by fixtures.
	pub const TEST_SERVER_URL: &str = "https://mcp.example.com/sse";

	/// Identity derived from [`TEST_SERVER_URL`].
	pub fn test_identity() -> ServerIdentity {
		ServerIdentity::from_server_url(TEST_SERVER_URL)
	}

	/// Local-mode configuration that binds an ephemeral callback port and skips signal hooks.
	pub fn test_config() -> AuthConfig {
		AuthConfig::new(TEST_SERVER_URL)
			.with_callback_port(0)
			.with_interrupt_cleanup(false)
			.with_auth_timeout(Duration::from_secs(5))
	}

	/// Fresh in-memory store plus a recording diagnostic sink.
	pub fn test_backends() -> (Arc<MemoryStore>, Arc<RecordingSink>) {
		(Arc::new(MemoryStore::default()), Arc::new(RecordingSink::default()))
	}

	/// [`AuthHttpClient`] that fails every request with a timeout; counts attempts.
	#[derive(Debug, Default)]
	pub struct OfflineHttpClient {
		calls: AtomicUsize,
	}
	impl OfflineHttpClient {
		/// Number of requests attempted so far.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl AuthHttpClient for OfflineHttpClient {
		fn execute(&self, _request: oauth2::HttpRequest, _timeout: Duration) -> HttpFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async { Err(TransportError::Timeout) })
		}
	}

	/// Scripted [`LockProbe`] with fixed liveness and a queue of endpoint answers.
	///
	/// Once the queue is drained, the last answer repeats.
	#[derive(Debug)]
	pub struct FakeLockProbe {
		alive: bool,
		answers: Mutex<Vec<Result<u16, ()>>>,
		calls: AtomicUsize,
	}
	impl FakeLockProbe {
		/// Creates a probe reporting `alive` for every PID and replaying `answers` in order.
		///
		/// `Err(())` replays a transport failure.
		pub fn new(alive: bool, answers: impl IntoIterator<Item = Result<u16, ()>>) -> Self {
			let mut answers = answers.into_iter().collect::<Vec<_>>();

			answers.reverse();

			Self { alive, answers: Mutex::new(answers), calls: AtomicUsize::new(0) }
		}

		/// Number of endpoint requests issued so far.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl LockProbe for FakeLockProbe {
		fn process_alive(&self, _pid: u32) -> bool {
			self.alive
		}

		fn endpoint_status(&self, _port: u16, _poll: bool) -> ProbeFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let answer = {
				let mut answers = self.answers.lock();

				if answers.len() > 1 { answers.pop() } else { answers.last().cloned() }
			};

			Box::pin(async move {
				match answer {
					Some(Ok(status)) => Ok(status),
					_ => Err(TransportError::Timeout),
				}
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
