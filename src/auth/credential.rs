//! Protocol versions, consumer identities, and the persisted credential.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Consumer key used when no consumer is configured for 1.0a or WRAP.
pub const ANONYMOUS_CONSUMER: &str = "anonymous";

/// Protocol variant driving URL building, parameter names, and response parsing.
///
/// Fixed at login start and persisted so later fetches know how to authorize requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
	/// OAuth 1.0a: server-issued request token, signed exchanges.
	#[default]
	V1,
	/// OAuth WRAP: locally minted tracking token, form-encoded exchange response.
	#[serde(rename = "WRAP")]
	Wrap,
	/// OAuth 2.0: `state` correlation, JSON exchange response.
	V2,
}
impl ProtocolVersion {
	/// Returns the tag persisted in credential files.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProtocolVersion::V1 => "V1",
			ProtocolVersion::Wrap => "WRAP",
			ProtocolVersion::V2 => "V2",
		}
	}
}
impl Display for ProtocolVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ProtocolVersion {
	type Err = UnknownProtocolVersion;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"V1" | "1" | "1.0A" | "OAUTH1" => Ok(Self::V1),
			"WRAP" => Ok(Self::Wrap),
			"V2" | "2" | "2.0" | "OAUTH2" => Ok(Self::V2),
			_ => Err(UnknownProtocolVersion(s.into())),
		}
	}
}

/// Raised when a protocol version tag is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown protocol version `{0}`; expected V1, WRAP, or V2.")]
pub struct UnknownProtocolVersion(pub String);

/// Registered identity of the requesting application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerCredentials {
	/// Consumer key (2.0 client id).
	pub key: String,
	/// Consumer secret (2.0 client secret).
	pub secret: TokenSecret,
}
impl ConsumerCredentials {
	/// Creates a consumer from its key and secret.
	pub fn new(key: impl Into<String>, secret: impl Into<TokenSecret>) -> Self {
		Self { key: key.into(), secret: secret.into() }
	}

	/// The `anonymous`/`anonymous` consumer accepted by Google for 1.0a and WRAP.
	pub fn anonymous() -> Self {
		Self::new(ANONYMOUS_CONSUMER, ANONYMOUS_CONSUMER)
	}

	/// Returns true for the anonymous consumer.
	pub fn is_anonymous(&self) -> bool {
		self.key == ANONYMOUS_CONSUMER
	}
}

/// Access token paired with its secret. The secret is empty for WRAP and 2.0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
	/// Access token presented on fetches.
	pub token: TokenSecret,
	/// Token secret used for 1.0a signatures.
	pub secret: TokenSecret,
}
impl AccessGrant {
	/// Creates a grant with a token secret (1.0a).
	pub fn new(token: impl Into<TokenSecret>, secret: impl Into<TokenSecret>) -> Self {
		Self { token: token.into(), secret: secret.into() }
	}

	/// Creates a grant without a token secret (WRAP, 2.0).
	pub fn bearer(token: impl Into<TokenSecret>) -> Self {
		Self { token: token.into(), secret: TokenSecret::default() }
	}
}

/// Consumer identity, access grant, and protocol version of one login.
///
/// `access` stays `None` until an exchange succeeds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Consumer identity used for the dance.
	pub consumer: ConsumerCredentials,
	/// Grant obtained from the exchange.
	pub access: Option<AccessGrant>,
	/// Protocol variant the grant belongs to.
	pub version: ProtocolVersion,
}
impl Credential {
	/// Starts a credential that has not been exchanged yet.
	pub fn pending(consumer: ConsumerCredentials, version: ProtocolVersion) -> Self {
		Self { consumer, access: None, version }
	}

	/// Returns a copy carrying the provided grant.
	pub fn with_access(mut self, access: AccessGrant) -> Self {
		self.access = Some(access);

		self
	}

	/// Returns true once an access token is present.
	pub fn is_authorized(&self) -> bool {
		self.access.is_some()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn protocol_version_parses_cli_and_file_tags() {
		for (raw, expected) in [
			("V1", ProtocolVersion::V1),
			("1.0a", ProtocolVersion::V1),
			("wrap", ProtocolVersion::Wrap),
			("WRAP", ProtocolVersion::Wrap),
			("2.0", ProtocolVersion::V2),
			("V2", ProtocolVersion::V2),
		] {
			assert_eq!(raw.parse::<ProtocolVersion>(), Ok(expected), "Tag `{raw}` should parse.");
		}

		assert!("3".parse::<ProtocolVersion>().is_err());
		assert_eq!(ProtocolVersion::Wrap.to_string(), "WRAP");
	}

	#[test]
	fn protocol_version_serializes_as_persisted_tag() {
		let payload = serde_json::to_string(&ProtocolVersion::Wrap)
			.expect("ProtocolVersion should serialize to JSON.");

		assert_eq!(payload, "\"WRAP\"");
	}

	#[test]
	fn credential_starts_unauthorized() {
		let credential = Credential::pending(ConsumerCredentials::anonymous(), ProtocolVersion::V2);

		assert!(!credential.is_authorized());
		assert!(credential.consumer.is_anonymous());

		let credential = credential.with_access(AccessGrant::bearer("XYZ"));

		assert!(credential.is_authorized());
		assert!(credential.access.as_ref().is_some_and(|grant| grant.secret.is_empty()));
	}
}
