//! Local callback listener: receives the redirect and answers sibling long-polls.

// std
use std::net::Ipv4Addr;
// crates.io
use axum::{
	Router,
	extract::{Query, State},
	http::StatusCode,
	response::{Html, IntoResponse, Response},
	routing::get,
};
use tokio::{
	net::TcpListener,
	sync::{oneshot, watch},
	task::JoinHandle,
};
// self
use crate::{
	_prelude::*,
	config::{self, AuthConfig},
	error::ConfigError,
	lock::{LockCoordinator, LockGuard, WAIT_FOR_AUTH_PATH},
	obs::{self, AuthStage, StageOutcome, StageSpan},
	strategy::{AuthCodeWait, AuthState},
};

const SUCCESS_PAGE: &str = "Authorization successful! You may close this window and return to the CLI.";
const MISSING_CODE: &str = "Error: No authorization code received";

/// Starts the listener, writes the lock record for its port, and returns the primary state.
pub async fn start(config: &AuthConfig, locks: Arc<LockCoordinator>) -> Result<AuthState> {
	let server = CallbackServer::bind(config).await?;
	let lock = LockGuard::acquire(locks, server.port(), config.interrupt_cleanup).await?;

	tracing::info!(
		server = %config.identity(),
		port = server.port(),
		path = %config.callback_path,
		"Waiting for the OAuth callback."
	);

	Ok(AuthState::primary(AuthCodeWait::Callback(server), Some(lock)))
}

/// Running loopback HTTP listener.
#[derive(Debug)]
pub struct CallbackServer {
	port: u16,
	server: String,
	auth_timeout: Duration,
	code_rx: watch::Receiver<Option<String>>,
	shutdown: Mutex<Option<oneshot::Sender<()>>>,
	task: JoinHandle<()>,
}
impl CallbackServer {
	/// Binds `127.0.0.1:{callback_port}` and starts serving.
	pub async fn bind(config: &AuthConfig) -> Result<Self> {
		let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, config.callback_port))
			.await
			.map_err(|source| ConfigError::CallbackBind {
				host: Ipv4Addr::LOCALHOST.to_string(),
				port: config.callback_port,
				source,
			})?;
		let port = listener
			.local_addr()
			.map_err(|source| ConfigError::CallbackBind {
				host: Ipv4Addr::LOCALHOST.to_string(),
				port: config.callback_port,
				source,
			})?
			.port();
		let (code_tx, code_rx) = watch::channel(None);
		let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
		let router = router(
			&config.callback_path,
			Arc::new(CallbackShared { code_tx, long_poll: config.long_poll_timeout }),
		);
		let task = tokio::spawn(async move {
			let served = axum::serve(listener, router)
				.with_graceful_shutdown(async move {
					let _ = shutdown_rx.await;
				})
				.await;

			if let Err(e) = served {
				tracing::warn!(port, error = %e, "Callback server stopped with an error.");
			}
		});

		Ok(Self {
			port,
			server: config.identity().to_string(),
			auth_timeout: config.auth_timeout,
			code_rx,
			shutdown: Mutex::new(Some(shutdown_tx)),
			task,
		})
	}

	/// Port the listener actually bound.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Code received so far, if any.
	pub fn received_code(&self) -> Option<String> {
		self.code_rx.borrow().clone()
	}

	/// Waits for the redirect, failing with [`Error::CallbackTimeout`] once the auth timeout
	/// elapses.
	pub async fn wait_for_code(&self) -> Result<String> {
		let span = StageSpan::new(AuthStage::Callback, &self.server);
		let mut code_rx = self.code_rx.clone();

		obs::record_stage_outcome(AuthStage::Callback, StageOutcome::Attempt);

		let waited = span
			.instrument(tokio::time::timeout(self.auth_timeout, async move {
				code_rx.wait_for(|code| code.is_some()).await.map(|code| code.clone())
			}))
			.await;
		let result = match waited {
			Ok(Ok(code)) => code.ok_or(Error::CallbackClosed),
			Ok(Err(_)) => Err(Error::CallbackClosed),
			Err(_) =>
				Err(Error::CallbackTimeout { seconds: config::whole_seconds(self.auth_timeout) }),
		};

		obs::record_stage_outcome(
			AuthStage::Callback,
			if result.is_ok() { StageOutcome::Success } else { StageOutcome::Failure },
		);

		result
	}

	/// Stops accepting connections; in-flight requests finish first.
	pub fn shutdown(&self) {
		if let Some(shutdown) = self.shutdown.lock().take() {
			let _ = shutdown.send(());
		}
	}
}
impl Drop for CallbackServer {
	fn drop(&mut self) {
		self.shutdown();
		self.task.abort();
	}
}

#[derive(Debug)]
struct CallbackShared {
	code_tx: watch::Sender<Option<String>>,
	long_poll: Duration,
}
impl CallbackShared {
	fn has_code(&self) -> bool {
		self.code_tx.borrow().is_some()
	}
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
	code: Option<String>,
	error: Option<String>,
	error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaitParams {
	poll: Option<String>,
}

fn router(callback_path: &str, shared: Arc<CallbackShared>) -> Router {
	Router::new()
		.route(callback_path, get(handle_callback))
		.route(WAIT_FOR_AUTH_PATH, get(handle_wait_for_auth))
		.with_state(shared)
}

async fn handle_callback(
	State(shared): State<Arc<CallbackShared>>,
	Query(params): Query<CallbackParams>,
) -> Response {
	if let Some(error) = params.error {
		let message = match params.error_description {
			Some(description) => format!("Error: {error}: {description}"),
			None => format!("Error: {error}"),
		};

		tracing::warn!(%error, "Authorization server returned an error to the callback.");

		return (StatusCode::BAD_REQUEST, message).into_response();
	}

	match params.code.filter(|code| !code.is_empty()) {
		Some(code) => {
			tracing::info!("Authorization code received.");
			shared.code_tx.send_replace(Some(code));

			(StatusCode::OK, Html(SUCCESS_PAGE)).into_response()
		},
		None => (StatusCode::BAD_REQUEST, MISSING_CODE).into_response(),
	}
}

async fn handle_wait_for_auth(
	State(shared): State<Arc<CallbackShared>>,
	Query(params): Query<WaitParams>,
) -> Response {
	if shared.has_code() {
		return (StatusCode::OK, "Authentication completed").into_response();
	}
	if params.poll.as_deref() == Some("false") {
		return (StatusCode::ACCEPTED, "Authentication in progress").into_response();
	}

	let mut code_rx = shared.code_tx.subscribe();
	let arrived = tokio::time::timeout(shared.long_poll, async move {
		code_rx.wait_for(|code| code.is_some()).await.is_ok()
	})
	.await
	.unwrap_or(false);

	if arrived {
		(StatusCode::OK, "Authentication completed").into_response()
	} else {
		(StatusCode::ACCEPTED, "Authentication in progress").into_response()
	}
}
