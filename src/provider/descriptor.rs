//! Service provider data structures shared by the login orchestrator.
//!
//! A [`ServiceProvider`] carries the 1.0a/WRAP endpoint triple, the 2.0 endpoint pair with
//! optional default client registration, and the quirks that decorate authorization URLs.

/// Builder API for assembling service providers.
pub mod builder;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use quirks::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// Endpoint triple used by 1.0a (all three) and WRAP (authorization + access token).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// 1.0a request-token endpoint.
	pub request_token: Url,
	/// Page the user is sent to for approval.
	pub user_authorization: Url,
	/// Exchange endpoint for the access token.
	pub access_token: Url,
}

/// 2.0 endpoints plus the client registration used when no consumer is configured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct V2Endpoints {
	/// Authorization endpoint.
	pub authorization: Url,
	/// Token endpoint.
	pub token: Url,
	/// Client id used when the user supplies none.
	pub default_client_id: Option<String>,
	/// Client secret paired with `default_client_id`.
	pub default_client_secret: Option<String>,
}

/// Immutable service provider description consumed by the login orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProvider {
	/// Provider name (built-in name or file path).
	pub id: ProviderId,
	/// 1.0a / WRAP endpoints.
	pub endpoints: ProviderEndpoints,
	/// 2.0 endpoints.
	pub v2: V2Endpoints,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ServiceProvider {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ServiceProviderBuilder {
		ServiceProviderBuilder::new(id)
	}

	fn validate(&self) -> Result<(), ServiceProviderError> {
		for (endpoint, url) in [
			("request_token", &self.endpoints.request_token),
			("user_authorization", &self.endpoints.user_authorization),
			("access_token", &self.endpoints.access_token),
			("v2_authorization", &self.v2.authorization),
			("v2_token", &self.v2.token),
		] {
			if !matches!(url.scheme(), "http" | "https") {
				return Err(ServiceProviderError::UnsupportedScheme {
					endpoint,
					url: url.to_string(),
				});
			}
		}
		if self.v2.default_client_secret.is_some() && self.v2.default_client_id.is_none() {
			return Err(ServiceProviderError::SecretWithoutClientId);
		}

		Ok(())
	}
}
