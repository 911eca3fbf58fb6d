//! Authorization-code acquisition strategies and the per-process auth state they produce.

pub mod bridge;
pub mod callback;

pub use bridge::{AuthUrlEvent, BridgePoller};
pub use callback::CallbackServer;

// self
use crate::{_prelude::*, lock::LockGuard};

/// How [`AuthState::wait_for_auth_code`] obtains the code.
#[derive(Debug)]
pub enum AuthCodeWait {
	/// The local callback listener receives the redirect.
	Callback(CallbackServer),
	/// The auth bridge is polled for the code.
	Bridge(BridgePoller),
	/// Another process finished authentication; the wait never resolves.
	PermanentlyPending,
	/// Emit-only bridge mode; the wait fails immediately.
	EmitOnly,
}

/// Per-process auth state, memoized by the coordinator.
#[derive(Debug)]
pub struct AuthState {
	wait: AuthCodeWait,
	skip_browser_auth: bool,
	lock: Option<LockGuard>,
}
impl AuthState {
	/// State of a process that runs the flow itself.
	pub fn primary(wait: AuthCodeWait, lock: Option<LockGuard>) -> Self {
		Self { wait, skip_browser_auth: false, lock }
	}

	/// State of a process that adopted another process's completed flow.
	pub fn adopted() -> Self {
		Self { wait: AuthCodeWait::PermanentlyPending, skip_browser_auth: true, lock: None }
	}

	/// Returns `true` when tokens persisted by another process should be used instead of opening
	/// a browser.
	pub fn skip_browser_auth(&self) -> bool {
		self.skip_browser_auth
	}

	/// Wait strategy in use.
	pub fn wait(&self) -> &AuthCodeWait {
		&self.wait
	}

	/// Local callback listener, if this process runs one.
	pub fn server(&self) -> Option<&CallbackServer> {
		match &self.wait {
			AuthCodeWait::Callback(server) => Some(server),
			_ => None,
		}
	}

	/// Port of the local callback listener, if any.
	pub fn port(&self) -> Option<u16> {
		self.server().map(CallbackServer::port)
	}

	/// Lock owned by this process, if it created one.
	pub fn lock(&self) -> Option<&LockGuard> {
		self.lock.as_ref()
	}

	/// Resolves with the authorization code.
	pub async fn wait_for_auth_code(&self) -> Result<String> {
		match &self.wait {
			AuthCodeWait::Callback(server) => server.wait_for_code().await,
			AuthCodeWait::Bridge(poller) => poller.poll().await,
			AuthCodeWait::PermanentlyPending => std::future::pending().await,
			AuthCodeWait::EmitOnly => Err(Error::EmitOnly),
		}
	}

	/// Stops the callback listener and releases the lock this process created.
	pub async fn shutdown(&self) -> Result<()> {
		if let Some(server) = self.server() {
			server.shutdown();
		}
		if let Some(lock) = &self.lock {
			lock.release().await?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn adopted_state_never_resolves() {
		let state = AuthState::adopted();

		assert!(state.skip_browser_auth());
		assert_eq!(state.port(), None);
		assert!(
			tokio::time::timeout(Duration::from_millis(50), state.wait_for_auth_code())
				.await
				.is_err(),
			"Adopted wait must stay pending."
		);
	}

	#[tokio::test]
	async fn emit_only_fails_immediately() {
		let state = AuthState::primary(AuthCodeWait::EmitOnly, None);
		let err = state.wait_for_auth_code().await.expect_err("Emit-only wait must fail.");

		assert!(matches!(err, Error::EmitOnly));
		assert!(!state.skip_browser_auth());
		state.shutdown().await.expect("Shutdown without resources should succeed.");
	}
}
