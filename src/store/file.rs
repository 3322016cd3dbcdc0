//! TOML file-backed [`CredentialStore`] (`~/.oacurl.toml` by default).

// std
use std::{
	fs::{self, OpenOptions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	store::{CredentialRecord, CredentialStore, StoreError, StoreFuture},
};

/// File name used under the home directory when no `--access-file` is given.
pub const DEFAULT_FILE_NAME: &str = ".oacurl.toml";

/// Persists the credential as a flat TOML record, replacing the file on every save.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
}
impl FileStore {
	/// Creates a store rooted at `path`; nothing is read until [`CredentialStore::load`].
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `$HOME/.oacurl.toml` (`%USERPROFILE%` on Windows), falling back to the working
	/// directory.
	pub fn default_path() -> PathBuf {
		std::env::var_os("HOME")
			.or_else(|| std::env::var_os("USERPROFILE"))
			.map(PathBuf::from)
			.unwrap_or_default()
			.join(DEFAULT_FILE_NAME)
	}

	/// Location of the credential file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read_record(&self) -> Result<Option<CredentialRecord>, StoreError> {
		let raw = match fs::read_to_string(&self.path) {
			Ok(raw) => raw,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", self.path.display()),
				}),
		};

		if raw.trim().is_empty() {
			return Ok(None);
		}

		toml::from_str(&raw).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", self.path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create credential directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn write_record(&self, record: &CredentialRecord) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = toml::to_string(record).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize credential: {e}"),
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut options = OpenOptions::new();

			options.write(true).create(true).truncate(true);

			#[cfg(unix)]
			{
				use std::os::unix::fs::OpenOptionsExt;

				options.mode(0o600);
			}

			let mut file = options.open(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(serialized.as_bytes()).map_err(|e| StoreError::Backend {
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
	fn save(&self, credential: Credential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let record = CredentialRecord::try_from(&credential)?;

			self.write_record(&record)?;

			tracing::debug!(path = %self.path.display(), version = %record.oauth_version, "Saved credential.");

			Ok(())
		})
	}

	fn load(&self) -> StoreFuture<'_, Option<Credential>> {
		Box::pin(async move { Ok(self.read_record()?.map(Credential::from)) })
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
	use crate::auth::{AccessGrant, ConsumerCredentials, ProtocolVersion};

	fn temp_path() -> PathBuf {
		let unique = format!(
			"oacurl_file_store_{}_{}.toml",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn build_credential() -> Credential {
		Credential::pending(
			ConsumerCredentials::new("example.com", "c0nsumer=secret&"),
			ProtocolVersion::V1,
		)
		.with_access(AccessGrant::new("1/access token", "t0ken secret"))
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::new(&path);
		let credential = build_credential();
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.save(credential.clone()))
			.expect("Failed to save fixture credential to file store.");

		let reopened = FileStore::new(&path);
		let loaded = rt
			.block_on(reopened.load())
			.expect("Failed to load fixture credential from file store.")
			.expect("File store lost credential after reopen.");

		assert_eq!(loaded, credential);

		let raw = fs::read_to_string(&path).expect("Credential file should be readable.");

		assert!(raw.contains("consumerKey = \"example.com\""));
		assert!(raw.contains("oauthVersion = \"V1\""));
		assert!(!path.with_extension("tmp").exists());

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;

			let mode = fs::metadata(&path)
				.expect("Credential file metadata should be readable.")
				.permissions()
				.mode();

			assert_eq!(mode & 0o777, 0o600);
		}

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary credential file {}: {e}", path.display())
		});
	}

	#[test]
	fn save_replaces_previous_record() {
		let path = temp_path();
		let store = FileStore::new(&path);
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let wrap = Credential::pending(ConsumerCredentials::anonymous(), ProtocolVersion::Wrap)
			.with_access(AccessGrant::bearer("ABC123"));

		rt.block_on(store.save(build_credential())).expect("First save should succeed.");
		rt.block_on(store.save(wrap.clone())).expect("Second save should succeed.");

		let loaded = rt
			.block_on(store.load())
			.expect("Load should succeed.")
			.expect("Credential should be present.");

		assert_eq!(loaded, wrap);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary credential file {}: {e}", path.display())
		});
	}

	#[test]
	fn missing_file_loads_as_none() {
		let store = FileStore::new(temp_path());
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		assert_eq!(rt.block_on(store.load()).expect("Missing file should not error."), None);
	}
}
