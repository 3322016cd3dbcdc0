// self
use crate::_prelude::*;

/// Provider-specific quirks that decorate the 1.0a authorization URL.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Repeats the requested scope on the authorization URL.
	pub scope_in_authorization_url: bool,
	/// Adds the consumer key as a `domain` parameter on the authorization URL.
	pub domain_hint: bool,
	/// Adds `xoauth_displayname=OACurl` on the authorization URL for the anonymous consumer.
	pub display_name_hint: bool,
	/// Scope used when the user requests none.
	pub default_scopes: Vec<String>,
	/// Icon passed as `iconUrl` unless the user supplies one.
	pub default_icon_url: Option<Url>,
}
