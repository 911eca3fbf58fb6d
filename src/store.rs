//! Per-identity persistence contract and built-in store implementations.
//!
//! Stores deal in raw text; [`read_json`] layers schema validation on top and treats malformed
//! content exactly like a missing entry.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// std
use std::path::PathBuf;
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, auth::ServerIdentity};

/// Boxed future returned by [`ConfigStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend keyed by server identity and entry kind.
///
/// Implementations must make the creation and deletion of a single entry atomic. They provide no
/// mutual exclusion across processes.
pub trait ConfigStore
where
	Self: Send + Sync,
{
	/// Reads the raw contents of an entry, if present.
	fn read<'a>(
		&'a self,
		identity: &'a ServerIdentity,
		entry: StoreEntry,
	) -> StoreFuture<'a, Option<String>>;

	/// Creates or replaces an entry.
	fn write<'a>(
		&'a self,
		identity: &'a ServerIdentity,
		entry: StoreEntry,
		contents: String,
	) -> StoreFuture<'a, ()>;

	/// Deletes an entry; deleting a missing entry succeeds.
	fn delete<'a>(&'a self, identity: &'a ServerIdentity, entry: StoreEntry) -> StoreFuture<'a, ()>;

	/// Filesystem path backing an entry, for synchronous cleanup on process exit.
	fn entry_path(&self, _identity: &ServerIdentity, _entry: StoreEntry) -> Option<PathBuf> {
		None
	}
}

/// Kinds of records persisted per server identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreEntry {
	/// Lock record naming the process that owns the auth flow.
	Lock,
	/// Dynamic client registration.
	ClientInfo,
	/// Token set.
	Tokens,
	/// PKCE code verifier.
	CodeVerifier,
}
impl StoreEntry {
	/// All entry kinds.
	pub const ALL: [StoreEntry; 4] =
		[StoreEntry::Lock, StoreEntry::ClientInfo, StoreEntry::Tokens, StoreEntry::CodeVerifier];

	/// File-name suffix appended to the identity hash.
	pub const fn file_suffix(self) -> &'static str {
		match self {
			StoreEntry::Lock => "lock.json",
			StoreEntry::ClientInfo => "client_info.json",
			StoreEntry::Tokens => "tokens.json",
			StoreEntry::CodeVerifier => "code_verifier.txt",
		}
	}

	/// File name for the entry under the given identity.
	pub fn file_name(self, identity: &ServerIdentity) -> String {
		format!("{identity}_{}", self.file_suffix())
	}
}
impl Display for StoreEntry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.file_suffix())
	}
}

/// Error type produced by [`ConfigStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced while encoding a record.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Reads and schema-validates a JSON entry.
///
/// Content that fails to deserialize into `T` is reported at `debug` level with the failing JSON
/// path and then treated as absent.
pub async fn read_json<T>(
	store: &dyn ConfigStore,
	identity: &ServerIdentity,
	entry: StoreEntry,
) -> Result<Option<T>, StoreError>
where
	T: DeserializeOwned,
{
	let Some(raw) = store.read(identity, entry).await? else {
		return Ok(None);
	};
	let mut deserializer = serde_json::Deserializer::from_str(&raw);

	match serde_path_to_error::deserialize(&mut deserializer) {
		Ok(value) => Ok(Some(value)),
		Err(e) => {
			tracing::debug!(
				server = %identity,
				%entry,
				path = %e.path(),
				error = %e.inner(),
				"Ignoring malformed persisted entry."
			);

			Ok(None)
		},
	}
}

/// Serializes and writes a JSON entry.
pub async fn write_json<T>(
	store: &dyn ConfigStore,
	identity: &ServerIdentity,
	entry: StoreEntry,
	value: &T,
) -> Result<(), StoreError>
where
	T: Serialize + ?Sized,
{
	let contents = serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialization {
		message: format!("Failed to serialize {entry}: {e}"),
	})?;

	store.write(identity, entry, contents).await
}
