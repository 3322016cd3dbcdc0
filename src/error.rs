//! Crate-level error types shared by the login orchestrator, the callback listener, stores, and
//! the fetch executor.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// A provider rejecting the user's verification is not an error; it surfaces as
/// [`AttemptOutcome::Rejected`](crate::flows::AttemptOutcome::Rejected) instead.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Provider answered with something the dance cannot continue from.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Callback listener failure.
	#[error(transparent)]
	Listener(#[from] crate::listener::ListenerError),
	/// Request signing failure.
	#[error(transparent)]
	Signer(#[from] crate::ext::SignerError),
	/// The authorization URL could not be presented to the user.
	#[error(transparent)]
	Launch(#[from] crate::ext::LaunchError),

	/// The user or the process aborted the dance.
	#[error("Authorization aborted: {reason}.")]
	Aborted {
		/// Human-readable abort cause.
		reason: String,
	},
	/// No credential has been persisted yet.
	#[error("{} not found; run `oacurl login` first.", path.display())]
	NotLoggedIn {
		/// Location that was expected to hold the credential.
		path: std::path::PathBuf,
	},
}
impl Error {
	/// Process exit code reported by the binary for this error.
	pub fn exit_code(&self) -> u8 {
		match self {
			Self::Aborted { .. } => 130,
			_ => 1,
		}
	}

	pub(crate) fn aborted(reason: impl Into<String>) -> Self {
		Self::Aborted { reason: reason.into() }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured URL cannot be parsed.
	#[error("The {field} URL is invalid: {value}.")]
	InvalidUrl {
		/// Configuration field carrying the URL.
		field: &'static str,
		/// Raw value that failed to parse.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Service provider description is incomplete.
	#[error(transparent)]
	Provider(#[from] crate::provider::ServiceProviderError),
	/// A configuration file could not be read.
	#[error("Failed to read {}.", path.display())]
	Read {
		/// File that failed to load.
		path: std::path::PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// A configuration file could not be parsed.
	#[error("Failed to parse {}.", path.display())]
	Parse {
		/// File that failed to parse.
		path: std::path::PathBuf,
		/// Underlying TOML failure.
		#[source]
		source: toml::de::Error,
	},
	/// A command-line value is malformed.
	#[error("Invalid {option} value `{value}`: {reason}.")]
	InvalidOption {
		/// Option name as shown to the user.
		option: &'static str,
		/// Raw value supplied by the user.
		value: String,
		/// Why the value was rejected.
		reason: &'static str,
	},
	/// A request body part could not be read.
	#[error("Request body file {} could not be read.", path.display())]
	Body {
		/// File that failed to load.
		path: std::path::PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Parses `value` as a URL, naming the configuration `field` on failure.
	pub fn parse_url(field: &'static str, value: &str) -> Result<Url, Self> {
		Url::parse(value).map_err(|source| Self::InvalidUrl { field, value: value.into(), source })
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Provider responses the dance cannot recover from.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Endpoint answered with a status outside the tolerated set.
	#[error("The {endpoint} endpoint returned HTTP {status}: {body}")]
	UnexpectedStatus {
		/// Endpoint label (request_token, access_token, token).
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
		/// Response body, lossily decoded.
		body: String,
	},
	/// Endpoint answered successfully but omitted a required field.
	#[error("The {endpoint} endpoint response is missing `{field}`.")]
	MissingField {
		/// Endpoint label.
		endpoint: &'static str,
		/// Missing parameter name.
		field: &'static str,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: impl Into<String>, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}
}
