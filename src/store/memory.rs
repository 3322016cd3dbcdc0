//! In-process [`CredentialStore`] used by tests and embedders that persist elsewhere.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	store::{CredentialRecord, CredentialStore, StoreError, StoreFuture},
};

/// Thread-safe store keeping the credential in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<Credential>>>);
impl MemoryStore {
	/// Creates a store pre-populated with `credential`.
	pub fn with_credential(credential: Credential) -> Self {
		Self(Arc::new(RwLock::new(Some(credential))))
	}

	/// Returns the stored credential without going through the async contract.
	pub fn snapshot(&self) -> Option<Credential> {
		self.0.read().clone()
	}

	fn save_now(&self, credential: Credential) -> Result<(), StoreError> {
		// Same acceptance rule as the file store.
		CredentialRecord::try_from(&credential)?;

		*self.0.write() = Some(credential);

		Ok(())
	}
}
impl CredentialStore for MemoryStore {
	fn save(&self, credential: Credential) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.save_now(credential) })
	}

	fn load(&self) -> StoreFuture<'_, Option<Credential>> {
		Box::pin(async move { Ok(self.snapshot()) })
	}
}
