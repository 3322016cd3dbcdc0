//! Built-in service providers and TOML provider files.

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, expand_alias},
	error::ConfigError,
	provider::{ProviderQuirks, ServiceProvider, ServiceProviderError},
};

/// Names accepted by [`ServiceProvider::named`].
pub const BUILTIN_PROVIDERS: &[&str] = &["GOOGLE", "BUZZ", "LATITUDE"];

const BUZZ_ICON_URL: &str = "http://www.gstatic.com/codesite/ph/images/defaultlogo.png";

/// On-disk provider description (`requestTokenUrl`, `userAuthorizationUrl`, ...).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ProviderFile {
	request_token_url: Option<String>,
	user_authorization_url: Option<String>,
	access_token_url: Option<String>,
	#[serde(default)]
	v2: V2File,
	#[serde(default)]
	quirks: ProviderQuirks,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct V2File {
	authorization_url: Option<String>,
	token_url: Option<String>,
	default_client_id: Option<String>,
	default_client_secret: Option<String>,
}

impl ServiceProvider {
	/// Returns a built-in provider by case-insensitive name.
	pub fn named(name: &str) -> Result<Self, ServiceProviderError> {
		let unknown = || ServiceProviderError::Unknown { name: name.into() };
		let upper = name.to_ascii_uppercase();
		let quirks = match upper.as_str() {
			"GOOGLE" => ProviderQuirks::default(),
			"BUZZ" => ProviderQuirks {
				scope_in_authorization_url: true,
				domain_hint: true,
				display_name_hint: true,
				default_scopes: vec![expand_alias("BUZZ").into()],
				default_icon_url: Url::parse(BUZZ_ICON_URL).ok(),
			},
			"LATITUDE" => ProviderQuirks {
				domain_hint: true,
				default_scopes: vec![expand_alias("LATITUDE").into()],
				..Default::default()
			},
			_ => return Err(unknown()),
		};
		let id = ProviderId::new(&upper).map_err(|_| unknown())?;

		ServiceProvider::builder(id).quirks(quirks).build()
	}

	/// Loads a built-in provider by name, or else a TOML provider file at `name`.
	pub fn load(name: &str) -> Result<Self, ConfigError> {
		if BUILTIN_PROVIDERS.iter().any(|builtin| builtin.eq_ignore_ascii_case(name)) {
			return Ok(Self::named(name)?);
		}

		Self::from_file(Path::new(name))
	}

	/// Parses a TOML provider file.
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let raw = fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.into(), source })?;
		let file: ProviderFile = toml::from_str(&raw)
			.map_err(|source| ConfigError::Parse { path: path.into(), source })?;
		let id = ProviderId::new(path.display().to_string().replace(char::is_whitespace, "_"))
			.map_err(|_| ServiceProviderError::Unknown { name: path.display().to_string() })?;
		let mut builder = ServiceProvider::builder(id)
			.quirks(file.quirks)
			.v2_default_client(file.v2.default_client_id, file.v2.default_client_secret);

		if let Some(raw) = file.request_token_url {
			builder = builder.request_token_endpoint(ConfigError::parse_url("requestTokenUrl", &raw)?);
		}
		if let Some(raw) = file.user_authorization_url {
			builder = builder
				.user_authorization_endpoint(ConfigError::parse_url("userAuthorizationUrl", &raw)?);
		}
		if let Some(raw) = file.access_token_url {
			builder = builder.access_token_endpoint(ConfigError::parse_url("accessTokenUrl", &raw)?);
		}
		if let Some(raw) = file.v2.authorization_url {
			builder =
				builder.v2_authorization_endpoint(ConfigError::parse_url("v2.authorizationUrl", &raw)?);
		}
		if let Some(raw) = file.v2.token_url {
			builder = builder.v2_token_endpoint(ConfigError::parse_url("v2.tokenUrl", &raw)?);
		}

		Ok(builder.build()?)
	}
}
