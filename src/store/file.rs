//! File-backed [`ConfigStore`] rooted at the proxy's config directory.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::ServerIdentity,
	store::{ConfigStore, StoreEntry, StoreError, StoreFuture},
};

/// Persists each entry as `{identity}_{suffix}` inside one directory.
///
/// Writes go through a temporary sibling file followed by a rename, so readers in other
/// processes observe either the old or the new contents.
#[derive(Clone, Debug)]
pub struct FileStore {
	root: PathBuf,
}
impl FileStore {
	/// Opens (or creates) a store rooted at `root`.
	pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let root = root.into();

		fs::create_dir_all(&root).map_err(|e| StoreError::Backend {
			message: format!("Failed to create config directory {}: {e}", root.display()),
		})?;

		Ok(Self { root })
	}

	/// Directory holding every entry.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Full path of an entry.
	pub fn path_for(&self, identity: &ServerIdentity, entry: StoreEntry) -> PathBuf {
		self.root.join(entry.file_name(identity))
	}

	fn read_now(path: &Path) -> Result<Option<String>, StoreError> {
		match fs::read_to_string(path) {
			Ok(contents) => Ok(Some(contents)),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to read {}: {e}", path.display()),
			}),
		}
	}

	fn write_now(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
		fs::create_dir_all(&self.root).map_err(|e| StoreError::Backend {
			message: format!("Failed to create config directory {}: {e}", self.root.display()),
		})?;

		let mut tmp_path = path.to_path_buf();

		tmp_path.set_extension(format!("{}.tmp", std::process::id()));

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(contents.as_bytes()).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", path.display()),
		})
	}

	fn delete_now(path: &Path) -> Result<(), StoreError> {
		match fs::remove_file(path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to delete {}: {e}", path.display()),
			}),
		}
	}
}
impl ConfigStore for FileStore {
	fn read<'a>(
		&'a self,
		identity: &'a ServerIdentity,
		entry: StoreEntry,
	) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Self::read_now(&self.path_for(identity, entry)) })
	}

	fn write<'a>(
		&'a self,
		identity: &'a ServerIdentity,
		entry: StoreEntry,
		contents: String,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.write_now(&self.path_for(identity, entry), &contents) })
	}

	fn delete<'a>(&'a self, identity: &'a ServerIdentity, entry: StoreEntry) -> StoreFuture<'a, ()> {
		Box::pin(async move { Self::delete_now(&self.path_for(identity, entry)) })
	}

	fn entry_path(&self, identity: &ServerIdentity, entry: StoreEntry) -> Option<PathBuf> {
		Some(self.path_for(identity, entry))
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_root() -> PathBuf {
		let unique = format!(
			"mcp_remote_auth_file_store_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[tokio::test]
	async fn write_read_delete_round_trip() {
		let root = temp_root();
		let store = FileStore::open(&root).expect("Failed to open file store.");
		let identity = ServerIdentity::from_server_url("https://mcp.example.com/sse");

		assert_eq!(
			store.read(&identity, StoreEntry::Tokens).await.expect("Read should succeed."),
			None
		);

		store
			.write(&identity, StoreEntry::Tokens, "{\"access_token\":\"a\"}".into())
			.await
			.expect("Write should succeed.");

		let path = store.path_for(&identity, StoreEntry::Tokens);

		assert!(path.exists());
		assert_eq!(
			fs::read_dir(&root).expect("Root should be listable.").count(),
			1,
			"Temporary files must not linger after a write."
		);
		assert_eq!(
			store.read(&identity, StoreEntry::Tokens).await.expect("Read should succeed."),
			Some("{\"access_token\":\"a\"}".into())
		);

		store.delete(&identity, StoreEntry::Tokens).await.expect("Delete should succeed.");
		store.delete(&identity, StoreEntry::Tokens).await.expect("Repeated delete should succeed.");

		assert!(!path.exists());
		assert_eq!(store.entry_path(&identity, StoreEntry::Tokens), Some(path));

		fs::remove_dir_all(&root).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store root {}: {e}", root.display())
		});
	}
}
