// std
use std::{env, fs, path::PathBuf, process};
// crates.io
use tokio::sync::oneshot;
// self
use mcp_remote_auth::{
	_preludet::*,
	config::AdoptionPolicy,
	lock::{LockCoordinator, LockDecision, LockGuard, LockRecord},
	store::{self, ConfigStore, FileStore, MemoryStore, StoreEntry},
};

fn fast_policy() -> AdoptionPolicy {
	AdoptionPolicy { pending_retry: Duration::from_millis(5), error_retry: Duration::from_millis(5) }
}

fn coordinator(store: &Arc<MemoryStore>, probe: &Arc<FakeLockProbe>) -> LockCoordinator {
	LockCoordinator::new(store.clone(), probe.clone(), test_identity()).with_policy(fast_policy())
}

async fn seed_lock(store: &MemoryStore, record: LockRecord) {
	store::write_json(store, &test_identity(), StoreEntry::Lock, &record)
		.await
		.expect("Seeding the lock record should succeed.");
}

fn fresh_record() -> LockRecord {
	LockRecord::for_current_process(4711, OffsetDateTime::now_utc())
}

#[tokio::test]
async fn missing_lock_becomes_primary_without_probing() {
	let (store, _) = test_backends();
	let probe = Arc::new(FakeLockProbe::new(true, [Ok(200)]));
	let decision = coordinator(&store, &probe)
		.check_and_adopt()
		.await
		.expect("Lock check should succeed.");

	assert_eq!(decision, LockDecision::BecomePrimary);
	assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn expired_lock_is_removed_even_when_owner_answers() {
	let (store, _) = test_backends();
	let probe = Arc::new(FakeLockProbe::new(true, [Ok(200)]));
	let record = LockRecord::for_current_process(
		4711,
		OffsetDateTime::now_utc() - Duration::from_secs(31 * 60),
	);

	seed_lock(&store, record).await;

	let decision = coordinator(&store, &probe)
		.check_and_adopt()
		.await
		.expect("Lock check should succeed.");

	assert_eq!(decision, LockDecision::BecomePrimary);
	assert_eq!(probe.calls(), 0, "Expired records must not be probed.");
	assert!(!store.contains(&test_identity(), StoreEntry::Lock));
}

#[tokio::test]
async fn live_owner_with_unreachable_endpoint_is_stale() {
	let (store, _) = test_backends();
	let probe = Arc::new(FakeLockProbe::new(true, [Err(())]));

	seed_lock(&store, fresh_record()).await;

	let decision = coordinator(&store, &probe)
		.check_and_adopt()
		.await
		.expect("Lock check should succeed.");

	assert_eq!(decision, LockDecision::BecomePrimary);
	assert_eq!(probe.calls(), 1);
	assert!(!store.contains(&test_identity(), StoreEntry::Lock));
}

#[tokio::test]
async fn unexpected_probe_status_is_stale() {
	let (store, _) = test_backends();
	let probe = Arc::new(FakeLockProbe::new(true, [Ok(404)]));

	seed_lock(&store, fresh_record()).await;

	let decision = coordinator(&store, &probe)
		.check_and_adopt()
		.await
		.expect("Lock check should succeed.");

	assert_eq!(decision, LockDecision::BecomePrimary);
	assert!(!store.contains(&test_identity(), StoreEntry::Lock));
}

#[tokio::test]
async fn dead_owner_is_stale_without_probing_the_endpoint() {
	let (store, _) = test_backends();
	let probe = Arc::new(FakeLockProbe::new(false, [Ok(200)]));

	seed_lock(&store, fresh_record()).await;

	let decision = coordinator(&store, &probe)
		.check_and_adopt()
		.await
		.expect("Lock check should succeed.");

	assert_eq!(decision, LockDecision::BecomePrimary);
	assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn valid_owner_is_adopted_after_it_completes() {
	let (store, _) = test_backends();
	let probe = Arc::new(FakeLockProbe::new(true, [Ok(202), Ok(202), Err(()), Ok(200)]));
	let record = fresh_record();

	seed_lock(&store, record).await;

	let decision = coordinator(&store, &probe)
		.check_and_adopt()
		.await
		.expect("Lock check should succeed.");

	assert_eq!(decision, LockDecision::Adopted { owner: record });
	assert_eq!(probe.calls(), 4);
	assert!(
		store.contains(&test_identity(), StoreEntry::Lock),
		"The owner's lock must survive a successful adoption."
	);
}

#[tokio::test]
async fn failed_adoption_takes_over() {
	let (store, _) = test_backends();
	let probe = Arc::new(FakeLockProbe::new(true, [Ok(202), Ok(500)]));

	seed_lock(&store, fresh_record()).await;

	let decision = coordinator(&store, &probe)
		.check_and_adopt()
		.await
		.expect("Lock check should succeed.");

	assert_eq!(decision, LockDecision::BecomePrimary);
	assert!(!store.contains(&test_identity(), StoreEntry::Lock));
}

#[tokio::test]
async fn malformed_lock_reads_as_absent() {
	let (store, _) = test_backends();
	let probe = Arc::new(FakeLockProbe::new(true, [Ok(200)]));

	store
		.write(&test_identity(), StoreEntry::Lock, "{\"pid\":\"not-a-number\"}".into())
		.await
		.expect("Raw write should succeed.");

	let locks = coordinator(&store, &probe);

	assert_eq!(locks.current().await.expect("Read should succeed."), None);
	assert_eq!(
		locks.check_and_adopt().await.expect("Lock check should succeed."),
		LockDecision::BecomePrimary
	);
}

#[tokio::test]
async fn create_and_release_round_trip() {
	let (store, _) = test_backends();
	let probe = Arc::new(FakeLockProbe::new(true, [Ok(200)]));
	let locks = coordinator(&store, &probe);
	let created = locks.create_lock(5150).await.expect("Lock creation should succeed.");

	assert_eq!(created.pid, std::process::id());
	assert_eq!(created.port, 5150);
	assert_eq!(locks.current().await.expect("Read should succeed."), Some(created));
	assert_eq!(locks.lock_path(), None);

	locks.release().await.expect("Release should succeed.");

	assert_eq!(locks.current().await.expect("Read should succeed."), None);
}

fn temp_root(label: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"mcp_remote_auth_{label}_{}_{}",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	))
}

#[tokio::test]
async fn dropped_guard_unlinks_file_backed_lock() {
	let root = temp_root("guard_drop");
	let store = Arc::new(FileStore::open(&root).expect("File store should open."));
	let probe = Arc::new(FakeLockProbe::new(true, [Ok(200)]));
	let locks = Arc::new(LockCoordinator::new(store, probe, test_identity()));
	let guard = LockGuard::acquire(Arc::clone(&locks), 6001, false)
		.await
		.expect("Lock should be created.");
	let path = locks.lock_path().expect("File-backed locks have a path.");

	assert!(path.is_file(), "Lock file should exist at {}.", path.display());

	drop(guard);

	assert!(!path.exists(), "Dropping an unreleased guard must unlink the lock file.");
	assert_eq!(locks.current().await.expect("Read should succeed."), None);

	fs::remove_dir_all(&root).expect("Temporary store root should be removable.");
}

#[tokio::test]
async fn release_on_waits_for_the_host_signal() {
	let (store, _) = test_backends();
	let probe = Arc::new(FakeLockProbe::new(true, [Ok(200)]));
	let locks = Arc::new(coordinator(&store, &probe));
	let guard = LockGuard::acquire(Arc::clone(&locks), 6002, false)
		.await
		.expect("Lock should be created.");
	let (signal_tx, signal_rx) = oneshot::channel::<()>();
	let release = guard.release_on(signal_rx);

	tokio::pin!(release);

	assert!(
		tokio::time::timeout(Duration::from_millis(50), &mut release).await.is_err(),
		"Release must wait for the signal."
	);
	assert!(store.contains(&test_identity(), StoreEntry::Lock));

	signal_tx.send(()).expect("Receiver should still be alive.");
	release.await.expect("Release should succeed.");

	assert!(!store.contains(&test_identity(), StoreEntry::Lock));
}
