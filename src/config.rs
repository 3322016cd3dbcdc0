//! Explicit configuration handed to the login orchestrator and the fetch executor.
//!
//! The binary assembles these from command-line flags; library callers build them directly.

// std
use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration as StdDuration,
};
// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{ConsumerCredentials, ProtocolVersion, ScopeList},
	error::ConfigError,
	listener::ListenerConfig,
	provider::ServiceProvider,
};

/// Content type used for request bodies when none is given.
pub const DEFAULT_CONTENT_TYPE: &str = "application/atom+xml";

/// Short names accepted by `--content-type`.
pub const CONTENT_TYPE_ALIASES: &[(&str, &str)] = &[
	("ATOM", "application/atom+xml"),
	("XML", "application/xml"),
	("JSON", "application/json"),
	("CSV", "text/csv"),
	("TEXT", "text/plain"),
];

/// How the orchestrator obtains the verifier. Fixed for the whole session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifierSource {
	/// Run the local callback listener and wait for the provider's redirect.
	Listener(ListenerConfig),
	/// Prompt on the console and read the pasted verifier (`--noserver`).
	Console,
}
impl Default for VerifierSource {
	fn default() -> Self {
		Self::Listener(ListenerConfig::default())
	}
}

/// Everything one `oacurl login` invocation needs.
#[derive(Clone, Debug)]
pub struct LoginConfig {
	/// Protocol variant for the dance.
	pub version: ProtocolVersion,
	/// Endpoints and quirks of the provider.
	pub provider: ServiceProvider,
	/// Resolved consumer identity.
	pub consumer: ConsumerCredentials,
	/// Requested scopes; empty falls back to the provider's default scopes.
	pub scopes: ScopeList,
	/// Explicit callback URL overriding the listener's.
	pub callback: Option<String>,
	/// Verifier channel.
	pub verifier: VerifierSource,
	/// Repeat the dance until interrupted, presenting the demo page.
	pub demo: bool,
	/// Extra query parameters appended to the 1.0a authorization URL.
	pub params: Vec<(String, String)>,
	/// Icon shown on the authorization page (`iconUrl`).
	pub icon_url: Option<String>,
	/// Upper bound on the listener wait; `None` waits until interrupted.
	pub timeout: Option<StdDuration>,
}
impl LoginConfig {
	/// Creates a configuration with a listener on `localhost` and no scopes.
	pub fn new(
		version: ProtocolVersion,
		provider: ServiceProvider,
		consumer: ConsumerCredentials,
	) -> Self {
		Self {
			version,
			provider,
			consumer,
			scopes: ScopeList::default(),
			callback: None,
			verifier: VerifierSource::default(),
			demo: false,
			params: Vec::new(),
			icon_url: None,
			timeout: None,
		}
	}

	/// Sets the requested scopes.
	pub fn with_scopes(mut self, scopes: ScopeList) -> Self {
		self.scopes = scopes;

		self
	}

	/// Overrides the callback URL.
	pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
		self.callback = Some(callback.into());

		self
	}

	/// Selects the verifier channel.
	pub fn with_verifier(mut self, verifier: VerifierSource) -> Self {
		self.verifier = verifier;

		self
	}

	/// Enables or disables demo mode.
	pub fn with_demo(mut self, demo: bool) -> Self {
		self.demo = demo;

		self
	}

	/// Appends a custom authorization URL parameter.
	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.push((key.into(), value.into()));

		self
	}

	/// Sets the icon URL passed on the authorization URL.
	pub fn with_icon_url(mut self, icon_url: impl Into<String>) -> Self {
		self.icon_url = Some(icon_url.into());

		self
	}

	/// Bounds the listener wait.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Rejects combinations the orchestrator cannot run.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.demo && self.verifier == VerifierSource::Console {
			return Err(ConfigError::InvalidOption {
				option: "--demo",
				value: "--noserver".into(),
				reason: "demo mode serves its page from the callback listener",
			});
		}

		Ok(())
	}

	/// Scope string sent to the provider, space separated.
	pub fn scope(&self) -> Option<String> {
		if self.scopes.is_empty() {
			let defaults = self.provider.quirks.default_scopes.join(" ");

			return (!defaults.is_empty()).then_some(defaults);
		}

		self.scopes.joined()
	}

	/// `iconUrl` followed by the custom parameters, in the order they are appended.
	pub fn authorization_params(&self) -> Vec<(String, String)> {
		let icon = self
			.icon_url
			.clone()
			.or_else(|| self.provider.quirks.default_icon_url.as_ref().map(ToString::to_string));

		icon.map(|icon| ("iconUrl".to_owned(), icon)).into_iter().chain(self.params.clone()).collect()
	}
}

/// Parses `key=value` from `-P/--param`.
pub fn parse_param(raw: &str) -> Result<(String, String), ConfigError> {
	let (key, value) = raw.split_once('=').ok_or_else(|| ConfigError::InvalidOption {
		option: "--param",
		value: raw.into(),
		reason: "expected key=value",
	})?;
	let key = key.trim();

	if key.is_empty() {
		return Err(ConfigError::InvalidOption {
			option: "--param",
			value: raw.into(),
			reason: "the parameter name is empty",
		});
	}

	Ok((key.into(), value.trim().into()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConsumerFile {
	consumer_key: Option<String>,
	consumer_secret: Option<String>,
}

/// Where the consumer identity may come from, highest priority first.
#[derive(Clone, Debug, Default)]
pub struct ConsumerSource {
	/// `--consumer-key`.
	pub key: Option<String>,
	/// `--consumer-secret`.
	pub secret: Option<String>,
	/// `-c/--consumer` TOML file with `consumerKey`/`consumerSecret`.
	pub file: Option<PathBuf>,
}
impl ConsumerSource {
	/// Resolves the consumer for `version` against `provider`.
	///
	/// Flags override the file field by field. With neither, 2.0 uses the provider's default
	/// client registration and everything else uses the anonymous consumer.
	pub fn resolve(
		&self,
		provider: &ServiceProvider,
		version: ProtocolVersion,
	) -> Result<ConsumerCredentials, ConfigError> {
		let file = match &self.file {
			Some(path) => read_consumer_file(path)?,
			None => ConsumerFile::default(),
		};
		let key = self.key.clone().or(file.consumer_key);
		let secret = self.secret.clone().or(file.consumer_secret);

		if key.is_none() && secret.is_none() {
			let default_client =
				provider.v2.default_client_id.as_ref().filter(|_| version == ProtocolVersion::V2);

			return Ok(match default_client {
				Some(id) => ConsumerCredentials::new(
					id.as_str(),
					provider.v2.default_client_secret.clone().unwrap_or_default(),
				),
				None => ConsumerCredentials::anonymous(),
			});
		}

		let key = key.ok_or(ConfigError::InvalidOption {
			option: "--consumer-key",
			value: String::new(),
			reason: "a consumer secret was given without its key",
		})?;

		Ok(ConsumerCredentials::new(key, secret.unwrap_or_default()))
	}
}

fn read_consumer_file(path: &Path) -> Result<ConsumerFile, ConfigError> {
	let raw =
		fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.into(), source })?;

	toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.into(), source })
}

/// One part of a `multipart/related` body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatedPart {
	/// Part content type, aliases expanded.
	pub content_type: String,
	/// File holding the part.
	pub path: PathBuf,
}
impl FromStr for RelatedPart {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.split_once(':') {
			Some((content_type, path)) if !content_type.is_empty() && !path.is_empty() =>
				Ok(Self { content_type: expand_content_type(content_type).into(), path: path.into() }),
			_ => Err(ConfigError::InvalidOption {
				option: "--related",
				value: s.into(),
				reason: "expected CONTENT-TYPE:PATH",
			}),
		}
	}
}

/// Where a fetch body comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BodySource {
	/// No body.
	#[default]
	Empty,
	/// Standard input, read to the end.
	Stdin,
	/// A single file.
	File(PathBuf),
	/// Several files assembled into `multipart/related`.
	Related(Vec<RelatedPart>),
}

/// One authorized request issued by `oacurl fetch`.
#[derive(Clone, Debug)]
pub struct FetchRequest {
	/// Target URL.
	pub url: Url,
	/// HTTP method.
	pub method: Method,
	/// Extra headers, in order.
	pub headers: Vec<(String, String)>,
	/// Body content type (ignored without a body).
	pub content_type: String,
	/// Body source.
	pub body: BodySource,
	/// Print the status line and headers before the body.
	pub include: bool,
}
impl FetchRequest {
	/// A bodiless GET for `url`.
	pub fn get(url: Url) -> Self {
		Self {
			url,
			method: Method::GET,
			headers: Vec::new(),
			content_type: DEFAULT_CONTENT_TYPE.into(),
			body: BodySource::Empty,
			include: false,
		}
	}

	/// Sets the method. POST and PUT default to a body read from standard input.
	pub fn with_method(mut self, method: Method) -> Self {
		if self.body == BodySource::Empty && (method == Method::POST || method == Method::PUT) {
			self.body = BodySource::Stdin;
		}
		if method != Method::POST && method != Method::PUT {
			self.body = BodySource::Empty;
		}

		self.method = method;

		self
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Sets the body content type, expanding aliases.
	pub fn with_content_type(mut self, content_type: &str) -> Self {
		self.content_type = expand_content_type(content_type).into();

		self
	}

	/// Sets the body source.
	pub fn with_body(mut self, body: BodySource) -> Self {
		self.body = body;

		self
	}

	/// Prints the status line and headers before the body.
	pub fn with_include(mut self, include: bool) -> Self {
		self.include = include;

		self
	}
}

/// Parses `-X/--request`; only GET, POST, PUT, and DELETE are accepted.
pub fn parse_method(raw: &str) -> Result<Method, ConfigError> {
	match raw.to_ascii_uppercase().as_str() {
		"GET" => Ok(Method::GET),
		"POST" => Ok(Method::POST),
		"PUT" => Ok(Method::PUT),
		"DELETE" => Ok(Method::DELETE),
		_ => Err(ConfigError::InvalidOption {
			option: "--request",
			value: raw.into(),
			reason: "expected GET, POST, PUT, or DELETE",
		}),
	}
}

/// Parses `-H/--header` as `Name: value`.
pub fn parse_header(raw: &str) -> Result<(String, String), ConfigError> {
	match raw.split_once(':') {
		Some((name, value)) if !name.trim().is_empty() =>
			Ok((name.trim().into(), value.trim().into())),
		_ => Err(ConfigError::InvalidOption {
			option: "--header",
			value: raw.into(),
			reason: "expected `Name: value`",
		}),
	}
}

/// Maps `ATOM`, `XML`, `JSON`, `CSV`, and `TEXT` to their media types.
pub fn expand_content_type(raw: &str) -> &str {
	CONTENT_TYPE_ALIASES
		.iter()
		.find_map(|(alias, media)| (*alias == raw).then_some(*media))
		.unwrap_or(raw)
}
