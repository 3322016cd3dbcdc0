// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{ProviderEndpoints, ProviderQuirks, ServiceProvider, V2Endpoints},
};

const DEFAULT_REQUEST_TOKEN_URL: &str = "https://www.google.com/accounts/OAuthGetRequestToken";
const DEFAULT_USER_AUTHORIZATION_URL: &str = "https://www.google.com/accounts/OAuthAuthorizeToken";
const DEFAULT_ACCESS_TOKEN_URL: &str = "https://www.google.com/accounts/OAuthGetAccessToken";
const DEFAULT_V2_AUTHORIZATION_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_V2_TOKEN_URL: &str = "https://accounts.google.com/o/oauth2/token";

/// Errors raised while constructing or validating service providers.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ServiceProviderError {
	/// Endpoints must use HTTP or HTTPS.
	#[error("The {endpoint} endpoint must use HTTP or HTTPS: {url}.")]
	UnsupportedScheme {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoint URL cannot be parsed.
	#[error("The {endpoint} endpoint is not a valid URL: {url}.")]
	InvalidUrl {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Raw value that failed to parse.
		url: String,
	},
	/// A default client secret was given without its client id.
	#[error("A default 2.0 client secret requires a default client id.")]
	SecretWithoutClientId,
	/// The named built-in provider does not exist.
	#[error("Unknown service provider `{name}`.")]
	Unknown {
		/// Requested name.
		name: String,
	},
}

/// Builder for [`ServiceProvider`] values.
///
/// Unset 1.0a endpoints fall back to Google's historical OAuthGet* endpoints and unset 2.0
/// endpoints to Google's `o/oauth2` pair.
#[derive(Debug)]
pub struct ServiceProviderBuilder {
	/// Identifier for the provider being constructed.
	pub id: ProviderId,
	/// 1.0a request-token endpoint.
	pub request_token_endpoint: Option<Url>,
	/// User authorization page.
	pub user_authorization_endpoint: Option<Url>,
	/// Access-token exchange endpoint.
	pub access_token_endpoint: Option<Url>,
	/// 2.0 authorization endpoint.
	pub v2_authorization_endpoint: Option<Url>,
	/// 2.0 token endpoint.
	pub v2_token_endpoint: Option<Url>,
	/// 2.0 default client id.
	pub v2_default_client_id: Option<String>,
	/// 2.0 default client secret.
	pub v2_default_client_secret: Option<String>,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ServiceProviderBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			request_token_endpoint: None,
			user_authorization_endpoint: None,
			access_token_endpoint: None,
			v2_authorization_endpoint: None,
			v2_token_endpoint: None,
			v2_default_client_id: None,
			v2_default_client_secret: None,
			quirks: ProviderQuirks::default(),
		}
	}

	/// Sets the 1.0a request-token endpoint.
	pub fn request_token_endpoint(mut self, url: Url) -> Self {
		self.request_token_endpoint = Some(url);

		self
	}

	/// Sets the user authorization page.
	pub fn user_authorization_endpoint(mut self, url: Url) -> Self {
		self.user_authorization_endpoint = Some(url);

		self
	}

	/// Sets the access-token exchange endpoint.
	pub fn access_token_endpoint(mut self, url: Url) -> Self {
		self.access_token_endpoint = Some(url);

		self
	}

	/// Sets the 2.0 authorization endpoint.
	pub fn v2_authorization_endpoint(mut self, url: Url) -> Self {
		self.v2_authorization_endpoint = Some(url);

		self
	}

	/// Sets the 2.0 token endpoint.
	pub fn v2_token_endpoint(mut self, url: Url) -> Self {
		self.v2_token_endpoint = Some(url);

		self
	}

	/// Sets the 2.0 client registration used when the user supplies none.
	pub fn v2_default_client(mut self, id: Option<String>, secret: Option<String>) -> Self {
		self.v2_default_client_id = id;
		self.v2_default_client_secret = secret;

		self
	}

	/// Overrides the provider quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting provider.
	pub fn build(self) -> Result<ServiceProvider, ServiceProviderError> {
		let endpoints = ProviderEndpoints {
			request_token: or_default(
				self.request_token_endpoint,
				"request_token",
				DEFAULT_REQUEST_TOKEN_URL,
			)?,
			user_authorization: or_default(
				self.user_authorization_endpoint,
				"user_authorization",
				DEFAULT_USER_AUTHORIZATION_URL,
			)?,
			access_token: or_default(
				self.access_token_endpoint,
				"access_token",
				DEFAULT_ACCESS_TOKEN_URL,
			)?,
		};
		let v2 = V2Endpoints {
			authorization: or_default(
				self.v2_authorization_endpoint,
				"v2_authorization",
				DEFAULT_V2_AUTHORIZATION_URL,
			)?,
			token: or_default(self.v2_token_endpoint, "v2_token", DEFAULT_V2_TOKEN_URL)?,
			default_client_id: self.v2_default_client_id,
			default_client_secret: self.v2_default_client_secret,
		};
		let provider = ServiceProvider { id: self.id, endpoints, v2, quirks: self.quirks };

		provider.validate()?;

		Ok(provider)
	}
}

fn or_default(
	url: Option<Url>,
	endpoint: &'static str,
	fallback: &'static str,
) -> Result<Url, ServiceProviderError> {
	match url {
		Some(url) => Ok(url),
		None => Url::parse(fallback)
			.map_err(|_| ServiceProviderError::InvalidUrl { endpoint, url: fallback.into() }),
	}
}
