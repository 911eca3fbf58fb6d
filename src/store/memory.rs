//! Thread-safe in-memory [`ConfigStore`] implementation for tests and embedded use.

// self
use crate::{
	_prelude::*,
	auth::ServerIdentity,
	store::{ConfigStore, StoreEntry, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<(ServerIdentity, StoreEntry), String>>>;

/// Storage backend that keeps entries in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns `true` if the entry is currently stored.
	pub fn contains(&self, identity: &ServerIdentity, entry: StoreEntry) -> bool {
		self.0.read().contains_key(&(identity.clone(), entry))
	}

	/// Entry kinds currently stored for an identity, in [`StoreEntry::ALL`] order.
	pub fn entries(&self, identity: &ServerIdentity) -> Vec<StoreEntry> {
		let map = self.0.read();

		StoreEntry::ALL
			.into_iter()
			.filter(|entry| map.contains_key(&(identity.clone(), *entry)))
			.collect()
	}
}
impl ConfigStore for MemoryStore {
	fn read<'a>(
		&'a self,
		identity: &'a ServerIdentity,
		entry: StoreEntry,
	) -> StoreFuture<'a, Option<String>> {
		let value = self.0.read().get(&(identity.clone(), entry)).cloned();

		Box::pin(async move { Ok(value) })
	}

	fn write<'a>(
		&'a self,
		identity: &'a ServerIdentity,
		entry: StoreEntry,
		contents: String,
	) -> StoreFuture<'a, ()> {
		self.0.write().insert((identity.clone(), entry), contents);

		Box::pin(async { Ok(()) })
	}

	fn delete<'a>(&'a self, identity: &'a ServerIdentity, entry: StoreEntry) -> StoreFuture<'a, ()> {
		self.0.write().remove(&(identity.clone(), entry));

		Box::pin(async { Ok(()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn entries_are_partitioned_by_identity() {
		let store = MemoryStore::default();
		let first = ServerIdentity::from_server_url("https://one.example.com");
		let second = ServerIdentity::from_server_url("https://two.example.com");

		store.write(&first, StoreEntry::Tokens, "a".into()).await.expect("Write should succeed.");
		store.write(&first, StoreEntry::Lock, "b".into()).await.expect("Write should succeed.");

		assert_eq!(store.entries(&first), vec![StoreEntry::Lock, StoreEntry::Tokens]);
		assert!(store.entries(&second).is_empty());

		store.delete(&first, StoreEntry::Lock).await.expect("Delete should succeed.");

		assert!(!store.contains(&first, StoreEntry::Lock));
		assert_eq!(
			store.read(&first, StoreEntry::Tokens).await.expect("Read should succeed."),
			Some("a".into())
		);
	}
}
