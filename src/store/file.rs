//! Simple file-backed [`CredentialStore`] for sharing one credential across processes.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::AccessCredential,
	store::{CredentialStore, StoreError, StoreFuture},
};

/// Persists the credential to a JSON file after each save.
///
/// Loads always hit the filesystem so refreshes performed by other processes become visible
/// on the next read. Writes go through a temporary file plus rename, so readers never
/// observe a partial snapshot; whole refreshes from different processes can still
/// interleave, and either outcome is a valid credential.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
}
impl FileStore {
	/// Opens a store at the provided path, creating parent directories on demand. The file
	/// itself is created on the first save.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		Ok(Self { path })
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn load_now(&self) -> Result<Option<AccessCredential>, StoreError> {
		if !self.path.exists() {
			return Ok(None);
		}

		let bytes = fs::read(&self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", self.path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(None);
		}

		let credential =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", self.path.display()),
			})?;

		Ok(Some(credential))
	}

	fn save_now(&self, credential: &AccessCredential) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(credential).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credential snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn load(&self) -> StoreFuture<'_, Option<AccessCredential>> {
		Box::pin(async move { self.load_now() })
	}

	fn save(&self, credential: AccessCredential) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.save_now(&credential) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"wecom_client_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store.");
		let credential = AccessCredential::from_exchange(
			"file-backed",
			OffsetDateTime::now_utc(),
			Duration::hours(2),
		);
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		assert!(
			rt.block_on(store.load()).expect("Failed to load from empty file store.").is_none()
		);

		rt.block_on(store.save(credential.clone()))
			.expect("Failed to save fixture credential to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store.");
		let fetched = rt
			.block_on(reopened.load())
			.expect("Failed to load fixture credential from file store.")
			.expect("File store lost the credential after reopen.");

		assert_eq!(fetched.token.expose(), credential.token.expose());
		assert_eq!(fetched.expires_at, credential.expires_at);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
