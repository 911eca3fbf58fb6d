//! Lock-file leader election between sibling processes sharing one server identity.
//!
//! A [`LockRecord`] names the process that currently owns the interactive auth flow and the local
//! port its long-poll endpoint listens on. Validity is decided by [`assess`], a pure function over
//! the record, the current time, and the two probe results gathered through a [`LockProbe`].
//! Creation is check-then-act against the store; two processes can both become primary inside a
//! narrow window.

pub mod adopt;
pub mod probe;

pub use adopt::*;
pub use probe::*;

// std
use std::{
	fs,
	path::PathBuf,
	sync::atomic::{AtomicBool, Ordering},
};
// crates.io
use tokio::task::JoinHandle;
// self
use crate::{
	_prelude::*,
	auth::ServerIdentity,
	config::AdoptionPolicy,
	error::TransportError,
	obs::{self, AuthStage, StageOutcome, StageSpan},
	store::{self, ConfigStore, StoreEntry},
};

/// Lock records older than this are invalid regardless of probe results.
pub const LOCK_MAX_AGE: Duration = Duration::from_millis(1_800_000);
/// Path of the probe and long-poll endpoint served by the owning process.
pub const WAIT_FOR_AUTH_PATH: &str = "/wait-for-auth";

/// Boxed future returned by [`LockProbe::endpoint_status`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = Result<u16, TransportError>> + 'a + Send>>;

/// Persisted claim over the auth flow of one server identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
	/// Process identifier of the owner.
	pub pid: u32,
	/// Port of the owner's `/wait-for-auth` endpoint.
	pub port: u16,
	/// Creation time in Unix epoch milliseconds.
	pub timestamp: i64,
}
impl LockRecord {
	/// Creates a record owned by the current process.
	pub fn for_current_process(port: u16, now: OffsetDateTime) -> Self {
		Self { pid: std::process::id(), port, timestamp: epoch_millis(now) }
	}

	/// Age of the record at `now_ms`.
	pub fn age_ms(&self, now_ms: i64) -> i64 {
		now_ms.saturating_sub(self.timestamp)
	}

	/// Returns `true` once the record is older than [`LOCK_MAX_AGE`].
	pub fn is_expired_at(&self, now_ms: i64) -> bool {
		self.age_ms(now_ms) > LOCK_MAX_AGE.as_millis() as i64
	}
}

/// Result of validating a lock record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockValidity {
	/// The owner is alive and answering.
	Valid,
	/// The record exceeded [`LOCK_MAX_AGE`].
	Expired,
	/// The owning process no longer exists.
	OwnerGone,
	/// The owner's endpoint did not answer 200 or 202.
	Unreachable,
}
impl LockValidity {
	/// Returns `true` for [`LockValidity::Valid`].
	pub const fn is_valid(self) -> bool {
		matches!(self, Self::Valid)
	}

	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LockValidity::Valid => "valid",
			LockValidity::Expired => "expired",
			LockValidity::OwnerGone => "owner_gone",
			LockValidity::Unreachable => "unreachable",
		}
	}
}
impl Display for LockValidity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Validates a lock record. Age is checked first, then liveness, then reachability.
pub fn assess(now_ms: i64, record: &LockRecord, alive: bool, reachable: bool) -> LockValidity {
	if record.is_expired_at(now_ms) {
		LockValidity::Expired
	} else if !alive {
		LockValidity::OwnerGone
	} else if !reachable {
		LockValidity::Unreachable
	} else {
		LockValidity::Valid
	}
}

/// Liveness and reachability checks against a lock owner.
pub trait LockProbe
where
	Self: Send + Sync,
{
	/// Best-effort check that `pid` names a running process; any failure means "not alive".
	fn process_alive(&self, pid: u32) -> bool;

	/// Issues `GET /wait-for-auth` against the owner on `port`.
	///
	/// With `poll == false` the request carries `?poll=false` and only probes status; otherwise the
	/// owner may hold the request open while it waits for a code.
	fn endpoint_status(&self, port: u16, poll: bool) -> ProbeFuture<'_>;
}

/// Outcome of [`LockCoordinator::check_and_adopt`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockDecision {
	/// Another process completed authentication; persisted tokens can be used as-is.
	Adopted {
		/// The owner that finished the flow.
		owner: LockRecord,
	},
	/// No usable owner exists; this process must run the flow itself.
	BecomePrimary,
}

/// Validates, creates, and deletes the lock record for one server identity.
pub struct LockCoordinator {
	store: Arc<dyn ConfigStore>,
	probe: Arc<dyn LockProbe>,
	identity: ServerIdentity,
	policy: AdoptionPolicy,
}
impl LockCoordinator {
	/// Creates a coordinator for `identity`.
	pub fn new(
		store: Arc<dyn ConfigStore>,
		probe: Arc<dyn LockProbe>,
		identity: ServerIdentity,
	) -> Self {
		Self { store, probe, identity, policy: AdoptionPolicy::default() }
	}

	/// Overrides the adoption retry delays.
	pub fn with_policy(mut self, policy: AdoptionPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Identity guarded by this coordinator.
	pub fn identity(&self) -> &ServerIdentity {
		&self.identity
	}

	/// Reads the current lock record, if any.
	pub async fn current(&self) -> Result<Option<LockRecord>> {
		Ok(store::read_json(self.store.as_ref(), &self.identity, StoreEntry::Lock).await?)
	}

	/// Validates an existing record against the probes.
	pub async fn validate(&self, record: &LockRecord) -> LockValidity {
		let now_ms = epoch_millis(OffsetDateTime::now_utc());

		if record.is_expired_at(now_ms) {
			return LockValidity::Expired;
		}

		let alive = self.probe.process_alive(record.pid);
		let reachable = alive
			&& match self.probe.endpoint_status(record.port, false).await {
				Ok(status) => matches!(status, 200 | 202),
				Err(e) => {
					tracing::debug!(port = record.port, error = %e, "Lock owner probe failed.");

					false
				},
			};

		assess(now_ms, record, alive, reachable)
	}

	/// Decides whether to adopt an existing owner or become primary.
	///
	/// Invalid records and failed adoptions delete the lock before returning
	/// [`LockDecision::BecomePrimary`].
	pub async fn check_and_adopt(&self) -> Result<LockDecision> {
		let span = StageSpan::new(AuthStage::LockCheck, &self.identity);

		obs::record_stage_outcome(AuthStage::LockCheck, StageOutcome::Attempt);

		let result = span.instrument(self.check_and_adopt_inner()).await;

		obs::record_stage_outcome(
			AuthStage::LockCheck,
			if result.is_ok() { StageOutcome::Success } else { StageOutcome::Failure },
		);

		result
	}

	async fn check_and_adopt_inner(&self) -> Result<LockDecision> {
		let Some(record) = self.current().await? else {
			tracing::info!(server = %self.identity, "No lock record found; becoming primary.");

			return Ok(LockDecision::BecomePrimary);
		};
		let validity = self.validate(&record).await;

		if !validity.is_valid() {
			tracing::warn!(
				server = %self.identity,
				pid = record.pid,
				port = record.port,
				%validity,
				"Removing stale lock record."
			);
			self.release().await?;

			return Ok(LockDecision::BecomePrimary);
		}

		tracing::info!(
			server = %self.identity,
			pid = record.pid,
			port = record.port,
			"Another process owns the auth flow; waiting for it to finish."
		);

		match wait_for_authentication(self.probe.as_ref(), record.port, &self.policy).await {
			Ok(()) => Ok(LockDecision::Adopted { owner: record }),
			Err(e) => {
				tracing::warn!(
					server = %self.identity,
					error = %e,
					"Adoption failed; taking over the auth flow."
				);
				self.release().await?;

				Ok(LockDecision::BecomePrimary)
			},
		}
	}

	/// Writes a lock record owned by the current process.
	pub async fn create_lock(&self, port: u16) -> Result<LockRecord> {
		let record = LockRecord::for_current_process(port, OffsetDateTime::now_utc());

		store::write_json(self.store.as_ref(), &self.identity, StoreEntry::Lock, &record).await?;
		tracing::info!(server = %self.identity, pid = record.pid, port, "Created lock record.");

		Ok(record)
	}

	/// Deletes the lock record.
	pub async fn release(&self) -> Result<()> {
		Ok(self.store.delete(&self.identity, StoreEntry::Lock).await?)
	}

	/// Path of the lock file, when the store is file-backed.
	pub fn lock_path(&self) -> Option<PathBuf> {
		self.store.entry_path(&self.identity, StoreEntry::Lock)
	}
}
impl Debug for LockCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LockCoordinator")
			.field("identity", &self.identity)
			.field("policy", &self.policy)
			.finish()
	}
}

/// Exit status used after an interrupt-triggered cleanup.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

/// Ownership of a lock record created by this process.
///
/// [`release`](Self::release) deletes the record through the store. If the guard is dropped
/// without being released, a file-backed lock is unlinked synchronously. With interrupt cleanup
/// enabled, a Ctrl-C deletes the record and exits with [`INTERRUPT_EXIT_CODE`].
pub struct LockGuard {
	locks: Arc<LockCoordinator>,
	record: LockRecord,
	path: Option<PathBuf>,
	released: AtomicBool,
	interrupt: Option<JoinHandle<()>>,
}
impl LockGuard {
	/// Creates the lock record for `port` and takes ownership of it.
	pub async fn acquire(
		locks: Arc<LockCoordinator>,
		port: u16,
		interrupt_cleanup: bool,
	) -> Result<Self> {
		let record = locks.create_lock(port).await?;
		let path = locks.lock_path();
		let interrupt = interrupt_cleanup.then(|| spawn_interrupt_cleanup(Arc::clone(&locks)));

		Ok(Self { locks, record, path, released: AtomicBool::new(false), interrupt })
	}

	/// Record written by [`acquire`](Self::acquire).
	pub fn record(&self) -> &LockRecord {
		&self.record
	}

	/// Deletes the lock record; later calls are no-ops.
	pub async fn release(&self) -> Result<()> {
		if self.released.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		if let Some(interrupt) = &self.interrupt {
			interrupt.abort();
		}

		tracing::info!(server = %self.locks.identity(), "Releasing lock record.");

		self.locks.release().await
	}

	/// Waits for `signal`, then releases the lock.
	///
	/// Lets a host tie lock cleanup to its own interrupt handling, e.g.
	/// `guard.release_on(tokio::signal::ctrl_c())`.
	pub async fn release_on<F>(&self, signal: F) -> Result<()>
	where
		F: Future,
	{
		signal.await;

		self.release().await
	}
}
impl Debug for LockGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LockGuard")
			.field("record", &self.record)
			.field("path", &self.path)
			.field("released", &self.released.load(Ordering::SeqCst))
			.finish()
	}
}
impl Drop for LockGuard {
	fn drop(&mut self) {
		if let Some(interrupt) = self.interrupt.take() {
			interrupt.abort();
		}
		if self.released.load(Ordering::SeqCst) {
			return;
		}
		if let Some(path) = &self.path {
			let _ = fs::remove_file(path);
		}
	}
}

fn spawn_interrupt_cleanup(locks: Arc<LockCoordinator>) -> JoinHandle<()> {
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_err() {
			return;
		}

		tracing::info!(server = %locks.identity(), "Interrupted; removing lock record.");

		if let Err(e) = locks.release().await {
			tracing::warn!(error = %e, "Failed to remove lock record on interrupt.");
		}

		std::process::exit(INTERRUPT_EXIT_CODE);
	})
}

/// Unix epoch milliseconds for `moment`.
pub(crate) fn epoch_millis(moment: OffsetDateTime) -> i64 {
	(moment.unix_timestamp_nanos() / 1_000_000) as i64
}
