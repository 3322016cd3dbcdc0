//! Request signing contract plus the default OAuth 1.0a HMAC-SHA1 signer.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::{Rng, distr::Alphanumeric};
use sha1::Sha1;
// self
use crate::{_prelude::*, auth::ConsumerCredentials};

/// RFC 3986 unreserved characters stay literal; everything else is percent-encoded.
pub const OAUTH_ENCODE_SET: &AsciiSet =
	&NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

const NONCE_LEN: usize = 16;

/// Errors raised while signing a request.
#[derive(Debug, ThisError)]
pub enum SignerError {
	/// The signing key was rejected by the MAC implementation.
	#[error("Signing key was rejected: {message}.")]
	InvalidKey {
		/// Backend message.
		message: String,
	},
	/// The request URL has no host to sign.
	#[error("Cannot sign a request without a host: {url}.")]
	MissingHost {
		/// Offending URL.
		url: String,
	},
}

/// Everything a 1.0a signature covers.
#[derive(Clone, Debug)]
pub struct SigningRequest<'a> {
	/// HTTP method, upper case.
	pub method: &'a str,
	/// Target URL; its query parameters are signed.
	pub url: &'a Url,
	/// Consumer identity.
	pub consumer: &'a ConsumerCredentials,
	/// Request or access token, absent when fetching a request token.
	pub token: Option<&'a str>,
	/// Secret paired with `token`; empty when there is none.
	pub token_secret: &'a str,
	/// Extra `oauth_*` protocol parameters carried in the header (`oauth_callback`,
	/// `oauth_verifier`).
	pub protocol_params: Vec<(String, String)>,
	/// Form-encoded body parameters; signed but sent in the body.
	pub form_params: Vec<(String, String)>,
}
impl<'a> SigningRequest<'a> {
	/// Starts a request signed only with the consumer credential.
	pub fn new(method: &'a str, url: &'a Url, consumer: &'a ConsumerCredentials) -> Self {
		Self {
			method,
			url,
			consumer,
			token: None,
			token_secret: "",
			protocol_params: Vec::new(),
			form_params: Vec::new(),
		}
	}

	/// Adds the token and its secret.
	pub fn token(mut self, token: &'a str, secret: &'a str) -> Self {
		self.token = Some(token);
		self.token_secret = secret;

		self
	}

	/// Adds an `oauth_*` protocol parameter.
	pub fn protocol_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.protocol_params.push((key.into(), value.into()));

		self
	}

	/// Adds form body parameters.
	pub fn form_params<I, K, V>(mut self, params: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.form_params.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));

		self
	}
}

/// Produces the `Authorization` header value for a 1.0a request.
///
/// Signing internals stay behind this seam so the orchestrator and the fetch executor can be
/// exercised with a stub.
pub trait RequestSigner
where
	Self: Send + Sync,
{
	/// Returns the full header value, e.g. `OAuth oauth_consumer_key="...", ...`.
	fn authorization_header(&self, request: &SigningRequest<'_>) -> Result<String, SignerError>;
}

/// HMAC-SHA1 signer with fresh nonce and timestamp per request.
#[derive(Clone, Debug, Default)]
pub struct HmacSha1Signer {
	fixed: Option<(String, i64)>,
}
impl HmacSha1Signer {
	/// Creates a signer drawing random nonces and the current time.
	pub fn new() -> Self {
		Self::default()
	}

	/// Pins nonce and timestamp so signatures are reproducible.
	pub fn with_fixed_nonce(nonce: impl Into<String>, timestamp: i64) -> Self {
		Self { fixed: Some((nonce.into(), timestamp)) }
	}

	fn nonce_and_timestamp(&self) -> (String, i64) {
		match &self.fixed {
			Some((nonce, timestamp)) => (nonce.clone(), *timestamp),
			None => (
				rand::rng().sample_iter(Alphanumeric).take(NONCE_LEN).map(char::from).collect(),
				OffsetDateTime::now_utc().unix_timestamp(),
			),
		}
	}

	/// Computes the base64 signature over `request` using `oauth_params`.
	pub fn signature(
		&self,
		request: &SigningRequest<'_>,
		oauth_params: &[(String, String)],
	) -> Result<String, SignerError> {
		let base = signature_base_string(request, oauth_params)?;
		let key = format!(
			"{}&{}",
			encode(request.consumer.secret.expose()),
			encode(request.token_secret)
		);
		let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
			.map_err(|e| SignerError::InvalidKey { message: e.to_string() })?;

		mac.update(base.as_bytes());

		Ok(STANDARD.encode(mac.finalize().into_bytes()))
	}
}
impl RequestSigner for HmacSha1Signer {
	fn authorization_header(&self, request: &SigningRequest<'_>) -> Result<String, SignerError> {
		let (nonce, timestamp) = self.nonce_and_timestamp();
		let mut oauth_params = vec![
			("oauth_consumer_key".to_owned(), request.consumer.key.clone()),
			("oauth_nonce".to_owned(), nonce),
			("oauth_signature_method".to_owned(), "HMAC-SHA1".to_owned()),
			("oauth_timestamp".to_owned(), timestamp.to_string()),
			("oauth_version".to_owned(), "1.0".to_owned()),
		];

		if let Some(token) = request.token {
			oauth_params.push(("oauth_token".into(), token.into()));
		}

		oauth_params.extend(request.protocol_params.iter().cloned());

		let signature = self.signature(request, &oauth_params)?;

		oauth_params.push(("oauth_signature".into(), signature));
		oauth_params.sort();

		let fields = oauth_params
			.iter()
			.map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
			.collect::<Vec<_>>()
			.join(", ");

		Ok(format!("OAuth {fields}"))
	}
}

/// Percent-encodes `value` per RFC 3986 as 1.0a requires.
pub fn encode(value: &str) -> String {
	utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Builds `METHOD&base-url&normalized-params`.
pub fn signature_base_string(
	request: &SigningRequest<'_>,
	oauth_params: &[(String, String)],
) -> Result<String, SignerError> {
	let url = request.url;
	let host = url.host_str().ok_or_else(|| SignerError::MissingHost { url: url.to_string() })?;
	let base_url = match url.port() {
		Some(port) => format!("{}://{host}:{port}{}", url.scheme(), url.path()),
		None => format!("{}://{host}{}", url.scheme(), url.path()),
	};
	let mut params = url
		.query_pairs()
		.map(|(k, v)| (encode(&k), encode(&v)))
		.chain(request.form_params.iter().map(|(k, v)| (encode(k), encode(v))))
		.chain(oauth_params.iter().map(|(k, v)| (encode(k), encode(v))))
		.collect::<Vec<_>>();

	params.sort();

	let normalized =
		params.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");

	Ok(format!(
		"{}&{}&{}",
		request.method.to_ascii_uppercase(),
		encode(&base_url),
		encode(&normalized)
	))
}
