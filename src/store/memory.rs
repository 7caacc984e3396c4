//! In-process [`CredentialStore`] holder for single-process deployments.

// self
use crate::{
	_prelude::*,
	auth::AccessCredential,
	store::{CredentialStore, StoreFuture},
};

type Slot = Arc<RwLock<Option<AccessCredential>>>;

/// Keeps the credential in process memory.
///
/// Every process (and machine) using this store authenticates on its own, so the remote
/// service sees one exchange per process instead of one shared credential. Construct it via
/// [`MemoryStore::single_process`] to make that choice explicit; cluster and multi-machine
/// deployments should use [`FileStore`](crate::store::FileStore) or a caller-supplied store
/// backed by a shared database or cache.
#[derive(Clone, Debug)]
pub struct MemoryStore(Slot);
impl MemoryStore {
	/// Creates an in-memory store, acknowledging that the credential stays local to this
	/// process.
	pub fn single_process() -> Self {
		Self(Arc::new(RwLock::new(None)))
	}

	/// Returns a copy of the stored credential without going through the async contract.
	pub fn snapshot(&self) -> Option<AccessCredential> {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<AccessCredential>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn save(&self, credential: AccessCredential) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(credential);

			Ok(())
		})
	}
}
