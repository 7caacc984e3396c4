//! Storage contracts and built-in credential stores.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::AccessCredential};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for the shared access credential.
///
/// The core only requires read-after-write visibility within a single call chain. Two
/// processes refreshing simultaneously can each [`save`](CredentialStore::save) a different
/// but equally valid credential; a store that needs strict single-refresh semantics must
/// provide its own global source of truth.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Fetches the currently stored credential, if any.
	fn load(&self) -> StoreFuture<'_, Option<AccessCredential>>;

	/// Persists or replaces the stored credential.
	fn save(&self, credential: AccessCredential) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
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
