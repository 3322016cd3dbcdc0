//! Authorized requests with the stored credential (`oacurl fetch`).

// std
use std::{
	fs,
	io::{self, Read, Write},
	path::{Path, PathBuf},
};
// crates.io
use oauth2::http::{
	HeaderName, HeaderValue, Request,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{AccessGrant, Credential, ProtocolVersion},
	config::{BodySource, FetchRequest, RelatedPart},
	error::ConfigError,
	ext::{HmacSha1Signer, RequestSigner, SigningRequest},
	http::{FORM_CONTENT_TYPE, HttpRequest, HttpResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CredentialStore,
};

const BOUNDARY_LEN: usize = 24;

/// Request body ready to send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedBody {
	/// `Content-Type` header value.
	pub content_type: String,
	/// Raw bytes.
	pub bytes: Vec<u8>,
}

/// Sends one request authorized with the persisted credential.
pub struct Fetch {
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn CredentialStore>,
	signer: Arc<dyn RequestSigner>,
	location: PathBuf,
}
impl Fetch {
	/// Creates an executor; `location` names the credential in "not logged in" errors.
	pub fn new(
		transport: Arc<dyn HttpTransport>,
		store: Arc<dyn CredentialStore>,
		location: impl Into<PathBuf>,
	) -> Self {
		Self { transport, store, signer: Arc::new(HmacSha1Signer::new()), location: location.into() }
	}

	/// Replaces the 1.0a request signer.
	pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
		self.signer = signer;

		self
	}

	/// Loads the credential, authorizes `request` per its protocol version, and sends it.
	///
	/// Any HTTP status is returned as-is; only transport failures are errors.
	pub async fn execute(&self, request: &FetchRequest) -> Result<HttpResponse> {
		let credential = self.store.load().await?.filter(Credential::is_authorized);
		let Some(credential) = credential else {
			return Err(Error::NotLoggedIn { path: self.location.clone() });
		};
		let version = credential.version;
		let span = FlowSpan::new(FlowKind::Fetch, version, "execute");

		obs::record_flow_outcome(FlowKind::Fetch, version, FlowOutcome::Attempt);

		let result = span.instrument(self.send(&credential, request)).await;

		obs::record_flow_outcome(
			FlowKind::Fetch,
			version,
			if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		result
	}

	async fn send(&self, credential: &Credential, request: &FetchRequest) -> Result<HttpResponse> {
		let body = {
			let source = request.body.clone();
			let content_type = request.content_type.clone();

			tokio::task::spawn_blocking(move || load_body(&source, &content_type))
				.await
				.map_err(|e| Error::aborted(format!("reading the request body failed: {e}")))??
		};
		let http_request = self.build_request(credential, request, body)?;

		tracing::info!(method = %request.method, url = %request.url, "Fetching.");

		let response = self.transport.execute(http_request).await?;

		tracing::info!(status = response.status().as_u16(), "Fetch completed.");

		Ok(response)
	}

	/// Builds the authorized request without sending it.
	pub fn build_request(
		&self,
		credential: &Credential,
		request: &FetchRequest,
		body: Option<PreparedBody>,
	) -> Result<HttpRequest> {
		let Some(AccessGrant { token, secret }) = &credential.access else {
			return Err(Error::NotLoggedIn { path: self.location.clone() });
		};
		let authorization = match credential.version {
			ProtocolVersion::V1 => {
				let form_params = body
					.as_ref()
					.filter(|body| is_form(&body.content_type))
					.map(|body| url::form_urlencoded::parse(&body.bytes).into_owned().collect())
					.unwrap_or_else(Vec::new);
				let signing =
					SigningRequest::new(request.method.as_str(), &request.url, &credential.consumer)
						.token(token.expose(), secret.expose())
						.form_params(form_params);

				self.signer.authorization_header(&signing)?
			},
			ProtocolVersion::Wrap => format!("WRAP access_token={}", token.expose()),
			ProtocolVersion::V2 => format!("Bearer {}", token.expose()),
		};
		let mut builder = Request::builder()
			.method(request.method.clone())
			.uri(request.url.as_str())
			.header(AUTHORIZATION, authorization);

		for (name, value) in &request.headers {
			let name = HeaderName::from_bytes(name.as_bytes())
				.map_err(|e| ConfigError::from(oauth2::http::Error::from(e)))?;
			let value = HeaderValue::from_str(value)
				.map_err(|e| ConfigError::from(oauth2::http::Error::from(e)))?;

			builder = builder.header(name, value);
		}

		let bytes = match body {
			Some(PreparedBody { content_type, bytes }) => {
				builder = builder.header(CONTENT_TYPE, content_type);

				bytes
			},
			None => Vec::new(),
		};

		Ok(builder.body(bytes).map_err(ConfigError::from)?)
	}
}
impl Debug for Fetch {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Fetch").field("location", &self.location).finish()
	}
}

fn is_form(content_type: &str) -> bool {
	content_type
		.split(';')
		.next()
		.is_some_and(|media| media.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// Reads the body described by `source`. Files missing on disk are configuration errors.
pub fn load_body(
	source: &BodySource,
	content_type: &str,
) -> Result<Option<PreparedBody>, ConfigError> {
	match source {
		BodySource::Empty => Ok(None),
		BodySource::Stdin => {
			let mut bytes = Vec::new();

			io::stdin()
				.lock()
				.read_to_end(&mut bytes)
				.map_err(|source| ConfigError::Body { path: "<stdin>".into(), source })?;

			Ok(Some(PreparedBody { content_type: content_type.into(), bytes }))
		},
		BodySource::File(path) => Ok(Some(PreparedBody {
			content_type: content_type.into(),
			bytes: read_file(path)?,
		})),
		BodySource::Related(parts) => {
			let boundary = format!(
				"oacurl-{}",
				rand::rng()
					.sample_iter(Alphanumeric)
					.take(BOUNDARY_LEN)
					.map(char::from)
					.collect::<String>()
			);

			multipart_related(parts, &boundary).map(Some)
		},
	}
}

/// Assembles a `multipart/related` body (RFC 2387) from files.
pub fn multipart_related(
	parts: &[RelatedPart],
	boundary: &str,
) -> Result<PreparedBody, ConfigError> {
	let mut bytes = Vec::new();

	for part in parts {
		bytes.extend_from_slice(
			format!("--{boundary}\r\nContent-Type: {}\r\n\r\n", part.content_type).as_bytes(),
		);
		bytes.extend_from_slice(&read_file(&part.path)?);
		bytes.extend_from_slice(b"\r\n");
	}

	bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

	let content_type = match parts.first() {
		Some(root) => format!(
			"multipart/related; boundary=\"{boundary}\"; type=\"{}\"",
			root.content_type
		),
		None => format!("multipart/related; boundary=\"{boundary}\""),
	};

	Ok(PreparedBody { content_type, bytes })
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
	fs::read(path).map_err(|source| ConfigError::Body { path: path.to_path_buf(), source })
}

/// Writes the response like curl: optional status line and headers, then the raw body.
pub fn write_response(
	response: &HttpResponse,
	include: bool,
	out: &mut impl Write,
) -> io::Result<()> {
	if include {
		let status = response.status();

		write!(
			out,
			"{:?} {} {}\r\n",
			response.version(),
			status.as_u16(),
			status.canonical_reason().unwrap_or_default()
		)?;

		for (name, value) in response.headers() {
			out.write_all(name.as_str().as_bytes())?;
			out.write_all(b": ")?;
			out.write_all(value.as_bytes())?;
			out.write_all(b"\r\n")?;
		}

		out.write_all(b"\r\n")?;
	}

	out.write_all(response.body())?;
	out.flush()
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use oauth2::http::{Method, StatusCode};
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::ConsumerCredentials,
		store::MemoryStore,
	};

	fn temp_path(label: &str) -> PathBuf {
		env::temp_dir().join(format!(
			"oacurl_fetch_{label}_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		))
	}

	fn credential(version: ProtocolVersion, grant: AccessGrant) -> Credential {
		Credential::pending(ConsumerCredentials::new("key", "secret"), version).with_access(grant)
	}

	fn fetch(transport: &ScriptedTransport, store: MemoryStore) -> Fetch {
		Fetch::new(Arc::new(transport.clone()), Arc::new(store), "/tmp/.oacurl.toml")
	}

	fn feed() -> Url {
		Url::parse("https://www.google.com/m8/feeds/contacts/default/full?max-results=1")
			.expect("Fixture URL should parse.")
	}

	#[tokio::test]
	async fn bearer_and_wrap_headers_follow_the_stored_version() {
		for (version, expected) in [
			(ProtocolVersion::V2, "Bearer XYZ"),
			(ProtocolVersion::Wrap, "WRAP access_token=XYZ"),
		] {
			let transport = ScriptedTransport::new([(200, "ok")]);
			let store = MemoryStore::with_credential(credential(version, AccessGrant::bearer("XYZ")));
			let response = fetch(&transport, store)
				.execute(&FetchRequest::get(feed()).with_header("GData-Version", "3.0"))
				.await
				.expect("Fetch should succeed.");

			assert_eq!(response.status(), StatusCode::OK);

			let requests = transport.requests();

			assert_eq!(requests[0].authorization.as_deref(), Some(expected));
			assert_eq!(requests[0].header("gdata-version").as_deref(), Some("3.0"));
		}
	}

	#[tokio::test]
	async fn v1_fetch_is_signed_with_the_access_token() {
		let transport = ScriptedTransport::new([(404, "missing")]);
		let store = MemoryStore::with_credential(credential(
			ProtocolVersion::V1,
			AccessGrant::new("AT", "ATS"),
		));
		let response = fetch(&transport, store)
			.with_signer(Arc::new(HmacSha1Signer::with_fixed_nonce("nonce", 1_300_000_000)))
			.execute(&FetchRequest::get(feed()).with_method(Method::DELETE))
			.await
			.expect("HTTP errors are passed through.");

		assert_eq!(response.status(), StatusCode::NOT_FOUND);

		let request = &transport.requests()[0];
		let header = request.authorization.as_deref().expect("Request should be signed.");

		assert_eq!(request.method, "DELETE");
		assert!(header.starts_with("OAuth "));
		assert!(header.contains("oauth_token=\"AT\""));
		assert!(header.contains("oauth_nonce=\"nonce\""));
	}

	#[tokio::test]
	async fn missing_credential_points_to_login() {
		let transport = ScriptedTransport::default();
		let err = fetch(&transport, MemoryStore::default())
			.execute(&FetchRequest::get(feed()))
			.await
			.expect_err("Fetching without a credential should fail.");

		assert!(matches!(err, Error::NotLoggedIn { .. }));
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn file_body_is_sent_with_its_content_type() {
		let path = temp_path("body");

		fs::write(&path, "{\"a\":1}").expect("Body fixture should be writable.");

		let transport = ScriptedTransport::new([(201, "")]);
		let store =
			MemoryStore::with_credential(credential(ProtocolVersion::V2, AccessGrant::bearer("T")));

		fetch(&transport, store)
			.execute(
				&FetchRequest::get(feed())
					.with_body(BodySource::File(path.clone()))
					.with_method(Method::POST)
					.with_content_type("JSON"),
			)
			.await
			.expect("POST should succeed.");

		let request = &transport.requests()[0];

		assert_eq!(request.header("content-type").as_deref(), Some("application/json"));
		assert_eq!(request.body, "{\"a\":1}");

		let _ = fs::remove_file(path);
	}

	#[test]
	fn missing_body_file_is_an_error() {
		let err = load_body(&BodySource::File(temp_path("absent")), "text/plain")
			.expect_err("A missing body file should fail.");

		assert!(matches!(err, ConfigError::Body { .. }));
	}

	#[test]
	fn multipart_related_frames_each_part() {
		let first = temp_path("part1");
		let second = temp_path("part2");

		fs::write(&first, "<entry/>").expect("Part fixture should be writable.");
		fs::write(&second, "PNG").expect("Part fixture should be writable.");

		let body = multipart_related(
			&[
				RelatedPart { content_type: "application/atom+xml".into(), path: first.clone() },
				RelatedPart { content_type: "image/png".into(), path: second.clone() },
			],
			"B",
		)
		.expect("Parts should assemble.");

		assert_eq!(
			String::from_utf8_lossy(&body.bytes),
			"--B\r\nContent-Type: application/atom+xml\r\n\r\n<entry/>\r\n--B\r\nContent-Type: image/png\r\n\r\nPNG\r\n--B--\r\n"
		);
		assert_eq!(
			body.content_type,
			"multipart/related; boundary=\"B\"; type=\"application/atom+xml\""
		);

		let _ = fs::remove_file(first);
		let _ = fs::remove_file(second);
	}

	#[test]
	fn include_prints_status_and_headers_first() {
		let mut response = HttpResponse::new(b"body".to_vec());

		*response.status_mut() = StatusCode::CREATED;
		response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

		let mut out = Vec::new();

		write_response(&response, true, &mut out).expect("Writing to memory should succeed.");

		assert_eq!(
			String::from_utf8_lossy(&out),
			"HTTP/1.1 201 Created\r\ncontent-type: text/plain\r\n\r\nbody"
		);

		let mut out = Vec::new();

		write_response(&response, false, &mut out).expect("Writing to memory should succeed.");

		assert_eq!(out, b"body");
	}
}
