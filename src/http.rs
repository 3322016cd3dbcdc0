//! Transport primitives for provider round trips and fetches.
//!
//! Requests and responses use the `http` types re-exported by `oauth2`
//! ([`HttpRequest`], [`HttpResponse`]) so the orchestrator and the fetch executor never depend
//! on a concrete client. [`ReqwestTransport`] is the production implementation.

// std
use std::ops::Deref;
// crates.io
use oauth2::http::{
	HeaderValue, Method,
	header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
};
pub use oauth2::{HttpRequest, HttpResponse};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Content type of form-encoded bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP clients able to execute one request.
///
/// Implementations must not follow redirects: 1.0a exchanges and fetches report
/// redirects to the user instead of silently re-sending signed requests.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and buffers the whole response.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}
impl<T> HttpTransport for Arc<T>
where
	T: ?Sized + HttpTransport,
{
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		(**self).execute(request)
	}
}

/// Builds a form-encoded POST request.
pub fn form_post(url: &Url, params: &[(&str, &str)]) -> Result<HttpRequest, ConfigError> {
	let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish();

	Ok(oauth2::http::Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
		.body(body.into_bytes())?)
}

/// Builds a bodiless request for `method`.
pub fn empty_request(method: Method, url: &Url) -> Result<HttpRequest, ConfigError> {
	Ok(oauth2::http::Request::builder().method(method).uri(url.as_str()).body(Vec::new())?)
}

/// Sets (or replaces) the `Authorization` header.
pub fn set_authorization(request: &mut HttpRequest, value: &str) -> Result<(), ConfigError> {
	let value = HeaderValue::from_str(value).map_err(oauth2::http::Error::from)?;

	request.headers_mut().insert(AUTHORIZATION, value);

	Ok(())
}

/// Lossily decodes a response body for logs and error messages.
pub fn body_text(response: &HttpResponse) -> String {
	String::from_utf8_lossy(response.body()).into_owned()
}

/// Returns the `Location` header of a redirect, if any.
pub fn redirect_location(response: &HttpResponse) -> Option<&str> {
	response
		.status()
		.is_redirection()
		.then(|| response.headers().get(LOCATION))
		.flatten()
		.and_then(|value| value.to_str().ok())
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The client never follows redirects.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds the default transport. `insecure` accepts invalid certificates and host names.
	pub fn new(insecure: bool) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.danger_accept_invalid_certs(insecure)
			.danger_accept_invalid_hostnames(insecure)
			.user_agent(concat!("oacurl/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]; configure it to disable redirects.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let target = request.uri().to_string();
			let method = request.method().clone();

			tracing::debug!(%method, url = %target, "Sending request.");

			let request: reqwest::Request =
				request.try_into().map_err(|e| TransportError::network(&target, e))?;
			let response =
				self.0.execute(request).await.map_err(|e| TransportError::network(&target, e))?;
			let status = response.status();
			let version = response.version();
			let headers = response.headers().to_owned();
			let body =
				response.bytes().await.map_err(|e| TransportError::network(&target, e))?.to_vec();

			tracing::debug!(%method, url = %target, status = status.as_u16(), bytes = body.len(), "Received response.");

			let mut response_new = HttpResponse::new(body);

			*response_new.status_mut() = status;
			*response_new.version_mut() = version;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::StatusCode;
	// self
	use super::*;

	#[test]
	fn form_post_encodes_body_and_content_type() {
		let url = Url::parse("https://example.com/token").expect("Fixture URL should parse.");
		let request = form_post(&url, &[("wrap_client_id", "a b"), ("wrap_callback", "")])
			.expect("Form request should build.");

		assert_eq!(request.method(), &Method::POST);
		assert_eq!(request.uri(), "https://example.com/token");
		assert_eq!(
			request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
			Some(FORM_CONTENT_TYPE)
		);
		assert_eq!(request.body().as_slice(), b"wrap_client_id=a+b&wrap_callback=");
	}

	#[test]
	fn redirect_location_only_for_redirects() {
		let mut response = HttpResponse::new(Vec::new());

		response
			.headers_mut()
			.insert(LOCATION, HeaderValue::from_static("https://example.com/next"));

		assert_eq!(redirect_location(&response), None);

		*response.status_mut() = StatusCode::FOUND;

		assert_eq!(redirect_location(&response), Some("https://example.com/next"));
	}
}
