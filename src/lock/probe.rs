//! HTTP and OS-backed [`LockProbe`] implementation.

// self
use crate::{
	_prelude::*,
	error::TransportError,
	http::{self, AuthHttpClient},
	lock::{LockProbe, ProbeFuture, WAIT_FOR_AUTH_PATH},
};

/// Timeout for the `?poll=false` status probe.
pub const STATUS_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Probes lock owners over loopback HTTP and checks liveness through the OS.
#[derive(Clone)]
pub struct HttpLockProbe {
	http: Arc<dyn AuthHttpClient>,
	long_poll_timeout: Duration,
}
impl HttpLockProbe {
	/// Creates a probe whose long-poll requests may hang for up to `long_poll_window` plus a grace
	/// period.
	pub fn new(http: Arc<dyn AuthHttpClient>, long_poll_window: Duration) -> Self {
		Self { http, long_poll_timeout: long_poll_window + Duration::from_secs(5) }
	}
}
impl Debug for HttpLockProbe {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpLockProbe").field("long_poll_timeout", &self.long_poll_timeout).finish()
	}
}
impl LockProbe for HttpLockProbe {
	fn process_alive(&self, pid: u32) -> bool {
		process_alive(pid)
	}

	fn endpoint_status(&self, port: u16, poll: bool) -> ProbeFuture<'_> {
		Box::pin(async move {
			let target = format!("127.0.0.1:{port}");
			let url = owner_url(port, poll).map_err(|e| TransportError::network(&target, e))?;
			let request =
				http::get_request(&url, None).map_err(|e| TransportError::network(&target, e))?;
			let timeout = if poll { self.long_poll_timeout } else { STATUS_PROBE_TIMEOUT };
			let response = self.http.execute(request, timeout).await?;

			Ok(response.status().as_u16())
		})
	}
}

/// Loopback URL of the owner's `/wait-for-auth` endpoint.
pub fn owner_url(port: u16, poll: bool) -> Result<Url, url::ParseError> {
	let query = if poll { "" } else { "?poll=false" };

	Url::parse(&format!("http://127.0.0.1:{port}{WAIT_FOR_AUTH_PATH}{query}"))
}

/// Signal-0 existence check; permission errors count as "not alive".
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
	let Ok(pid) = libc::pid_t::try_from(pid) else {
		return false;
	};

	if pid <= 0 {
		return false;
	}

	// SAFETY: signal 0 performs only the existence and permission checks; nothing is delivered.
	unsafe { libc::kill(pid, 0) == 0 }
}

/// Without a portable existence check the owner is assumed alive; the endpoint probe still
/// decides validity.
#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
	true
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn owner_url_targets_loopback() {
		let probe = owner_url(4567, false).expect("Probe URL should parse.");
		let poll = owner_url(4567, true).expect("Poll URL should parse.");

		assert_eq!(probe.as_str(), "http://127.0.0.1:4567/wait-for-auth?poll=false");
		assert_eq!(poll.as_str(), "http://127.0.0.1:4567/wait-for-auth");
	}

	#[test]
	fn current_process_is_alive() {
		assert!(process_alive(std::process::id()));
	}

	#[cfg(unix)]
	#[test]
	fn invalid_pids_are_not_alive() {
		assert!(!process_alive(0));
		assert!(!process_alive(u32::MAX));
	}
}
