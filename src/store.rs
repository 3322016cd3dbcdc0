//! Storage contract and built-in stores for the persisted login credential.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AccessGrant, ConsumerCredentials, Credential, ProtocolVersion, TokenSecret},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the single credential a login produces.
///
/// `save` replaces the whole record; readers never observe a partial write.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the credential.
	fn save(&self, credential: Credential) -> StoreFuture<'_, ()>;

	/// Loads the credential, if one was saved.
	fn load(&self) -> StoreFuture<'_, Option<Credential>>;
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
	/// Only authorized credentials may be persisted.
	#[error("Refusing to persist a credential without an access token.")]
	Unauthorized,
}

/// Flat key-value record as written to disk.
///
/// Keys match the historical `.oacurl.properties` names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
	/// Consumer key.
	pub consumer_key: String,
	/// Consumer secret.
	pub consumer_secret: String,
	/// Access token.
	pub access_token: String,
	/// Token secret; empty for WRAP and 2.0.
	#[serde(default)]
	pub token_secret: String,
	/// Protocol tag; records written before the tag existed are 1.0a.
	#[serde(default)]
	pub oauth_version: ProtocolVersion,
}
impl TryFrom<&Credential> for CredentialRecord {
	type Error = StoreError;

	fn try_from(credential: &Credential) -> Result<Self, Self::Error> {
		let access = credential.access.as_ref().ok_or(StoreError::Unauthorized)?;

		Ok(Self {
			consumer_key: credential.consumer.key.clone(),
			consumer_secret: credential.consumer.secret.expose().into(),
			access_token: access.token.expose().into(),
			token_secret: access.secret.expose().into(),
			oauth_version: credential.version,
		})
	}
}
impl From<CredentialRecord> for Credential {
	fn from(record: CredentialRecord) -> Self {
		Credential {
			consumer: ConsumerCredentials::new(record.consumer_key, record.consumer_secret),
			access: Some(AccessGrant {
				token: TokenSecret::new(record.access_token),
				secret: TokenSecret::new(record.token_secret),
			}),
			version: record.oauth_version,
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk full"));

		let source = StdError::source(&error)
			.expect("Crate error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn pending_credentials_cannot_become_records() {
		let pending = Credential::pending(ConsumerCredentials::anonymous(), ProtocolVersion::V1);

		assert_eq!(CredentialRecord::try_from(&pending), Err(StoreError::Unauthorized));
	}

	#[test]
	fn records_without_version_default_to_v1() {
		let record: CredentialRecord = toml::from_str(
			"consumerKey = \"anonymous\"\nconsumerSecret = \"anonymous\"\naccessToken = \"tok\"\n",
		)
		.expect("Legacy record should parse.");
		let credential = Credential::from(record);

		assert_eq!(credential.version, ProtocolVersion::V1);
		assert!(credential.access.as_ref().is_some_and(|grant| grant.secret.is_empty()));
	}
}
