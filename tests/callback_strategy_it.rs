#![cfg(feature = "reqwest")]

// self
use mcp_remote_auth::{
	_preludet::*,
	config::AuthConfig,
	coordinator::AuthCoordinator,
	http::ReqwestHttpClient,
	lock::LockRecord,
	reqwest::{self, StatusCode},
	store::{self, MemoryStore, StoreEntry},
	strategy::AuthState,
};

fn coordinator_with(config: AuthConfig, store: Arc<MemoryStore>) -> AuthCoordinator {
	AuthCoordinator::new(config, store, Arc::new(ReqwestHttpClient::default()))
		.with_lock_probe(Arc::new(FakeLockProbe::new(true, [Ok(200)])))
}

fn base_url(state: &AuthState) -> String {
	format!("http://127.0.0.1:{}", state.port().expect("Local mode should bind a port."))
}

async fn get(url: String) -> (StatusCode, String) {
	let response = reqwest::get(url).await.expect("Callback server should answer.");
	let status = response.status();

	(status, response.text().await.expect("Body should be readable."))
}

#[tokio::test]
async fn callback_delivers_code_and_answers_probes() {
	let (store, _) = test_backends();
	let coordinator = coordinator_with(test_config(), store.clone());
	let state = coordinator.initialize_auth().await.expect("Callback strategy should start.");
	let base = base_url(&state);

	assert!(!state.skip_browser_auth());

	let lock: LockRecord = store::read_json(store.as_ref(), &test_identity(), StoreEntry::Lock)
		.await
		.expect("Lock read should succeed.")
		.expect("Primary must register a lock record.");

	assert_eq!(lock.pid, std::process::id());
	assert_eq!(Some(lock.port), state.port());

	let (status, _) = get(format!("{base}/wait-for-auth?poll=false")).await;

	assert_eq!(status, StatusCode::ACCEPTED);

	let (status, body) = get(format!("{base}/oauth/callback")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body, "Error: No authorization code received");

	let (status, body) = get(format!("{base}/oauth/callback?error=access_denied")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body.contains("access_denied"));
	assert_eq!(state.server().and_then(|server| server.received_code()), None);

	let (status, body) = get(format!("{base}/oauth/callback?code=abc123&state=xyz")).await;

	assert_eq!(status, StatusCode::OK);
	assert!(body.contains("You may close this window"));
	assert_eq!(state.wait_for_auth_code().await.expect("Code should be delivered."), "abc123");

	let (status, _) = get(format!("{base}/wait-for-auth?poll=false")).await;

	assert_eq!(status, StatusCode::OK);

	let (status, _) = get(format!("{base}/wait-for-auth")).await;

	assert_eq!(status, StatusCode::OK);

	coordinator.shutdown().await.expect("Shutdown should succeed.");

	assert!(!store.contains(&test_identity(), StoreEntry::Lock));
}

#[tokio::test]
async fn long_poll_answers_accepted_when_window_elapses() {
	let (store, _) = test_backends();
	let config = test_config().with_long_poll_timeout(Duration::from_millis(200));
	let coordinator = coordinator_with(config, store);
	let state = coordinator.initialize_auth().await.expect("Callback strategy should start.");
	let (status, _) = get(format!("{}/wait-for-auth", base_url(&state))).await;

	assert_eq!(status, StatusCode::ACCEPTED);

	coordinator.shutdown().await.expect("Shutdown should succeed.");
}

#[tokio::test]
async fn long_poll_resolves_when_code_arrives() {
	let (store, _) = test_backends();
	let coordinator = coordinator_with(test_config(), store);
	let state = coordinator.initialize_auth().await.expect("Callback strategy should start.");
	let base = base_url(&state);
	let waiter = tokio::spawn(get(format!("{base}/wait-for-auth")));

	tokio::time::sleep(Duration::from_millis(100)).await;

	let (status, _) = get(format!("{base}/oauth/callback?code=late")).await;

	assert_eq!(status, StatusCode::OK);

	let (status, _) = waiter.await.expect("Long-poll task should not panic.");

	assert_eq!(status, StatusCode::OK);

	coordinator.shutdown().await.expect("Shutdown should succeed.");
}

#[tokio::test]
async fn callback_wait_times_out() {
	let (store, _) = test_backends();
	let config = test_config().with_auth_timeout(Duration::from_secs(1));
	let coordinator = coordinator_with(config, store);
	let state = coordinator.initialize_auth().await.expect("Callback strategy should start.");
	let err = state.wait_for_auth_code().await.expect_err("No redirect should mean a timeout.");

	assert!(matches!(err, Error::CallbackTimeout { seconds: 1 }));

	coordinator.shutdown().await.expect("Shutdown should succeed.");
}

#[tokio::test]
async fn initialize_auth_is_memoized() {
	let (store, _) = test_backends();
	let coordinator = coordinator_with(test_config(), store);
	let (first, second) = tokio::join!(coordinator.initialize_auth(), coordinator.initialize_auth());
	let first = first.expect("First initialization should succeed.");
	let second = second.expect("Concurrent initialization should succeed.");
	let third = coordinator.initialize_auth().await.expect("Later initialization should succeed.");

	assert!(Arc::ptr_eq(&first, &second));
	assert!(Arc::ptr_eq(&first, &third));
	assert!(
		coordinator.state().is_some_and(|state| Arc::ptr_eq(&state, &first)),
		"The memoized state must be observable."
	);

	coordinator.shutdown().await.expect("Shutdown should succeed.");
}

#[tokio::test]
async fn second_process_adopts_the_running_flow() {
	let (store, _) = test_backends();
	let primary = coordinator_with(test_config(), store.clone());
	let primary_state = primary.initialize_auth().await.expect("Primary should start.");
	let base = base_url(&primary_state);
	// The sibling uses the real loopback probe against the primary's listener.
	let sibling = AuthCoordinator::new(
		test_config(),
		store.clone(),
		Arc::new(ReqwestHttpClient::default()),
	);
	let adopting = tokio::spawn(async move {
		let state = sibling.initialize_auth().await.expect("Sibling should adopt.");

		state.skip_browser_auth()
	});

	tokio::time::sleep(Duration::from_millis(300)).await;

	let (status, _) = get(format!("{base}/oauth/callback?code=shared")).await;

	assert_eq!(status, StatusCode::OK);
	assert!(adopting.await.expect("Sibling task should not panic."));
	assert!(
		store.contains(&test_identity(), StoreEntry::Lock),
		"Adoption must leave the primary's lock in place."
	);

	primary.shutdown().await.expect("Shutdown should succeed.");
}
