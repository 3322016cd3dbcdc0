//! Per-variant URL building and response parsing.
//!
//! Everything here is pure: no I/O, no clocks. The orchestrator feeds the results into its
//! state machine.

// self
use crate::{
	_prelude::*,
	auth::{ConsumerCredentials, CorrelationToken},
	error::ProtocolError,
	provider::ServiceProvider,
};

/// Redirect placeholder registered for 2.0 installed applications without a listener.
pub const OOB_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";
/// `oauth_callback` value announcing that the verifier will be typed in.
pub const OOB_CALLBACK: &str = "oob";
/// Display name shown to users authorizing the anonymous consumer.
pub const DISPLAY_NAME: &str = "OACurl";

/// Form-encoded parameters of the 1.0a request-token call.
pub fn v1_request_token_params(
	consumer: &ConsumerCredentials,
	scope: Option<&str>,
) -> Vec<(String, String)> {
	let mut params = Vec::new();

	if let Some(scope) = scope {
		params.push(("scope".to_owned(), scope.to_owned()));
	}
	if consumer.is_anonymous() {
		params.push(("xoauth_displayname".to_owned(), DISPLAY_NAME.to_owned()));
	}

	params
}

/// 1.0a authorization URL: provider quirks, then the caller's parameters, then `oauth_token`.
pub fn v1_authorization_url(
	provider: &ServiceProvider,
	consumer: &ConsumerCredentials,
	scope: Option<&str>,
	extra: &[(String, String)],
	request_token: &CorrelationToken,
) -> Url {
	let quirks = &provider.quirks;
	let mut url = provider.endpoints.user_authorization.clone();
	let mut pairs = url.query_pairs_mut();

	if quirks.scope_in_authorization_url {
		if let Some(scope) = scope {
			pairs.append_pair("scope", scope);
		}
	}
	if quirks.domain_hint {
		pairs.append_pair("domain", &consumer.key);
	}
	if quirks.display_name_hint && consumer.is_anonymous() {
		pairs.append_pair("xoauth_displayname", DISPLAY_NAME);
	}

	pairs.extend_pairs(extra);
	pairs.append_pair("oauth_token", request_token);

	drop(pairs);

	url
}

/// Appends the WRAP tracking token to the callback so the redirect names its attempt.
///
/// The access-token call must echo this exact value.
pub fn wrap_callback(callback: &str, token: &CorrelationToken) -> Result<Url, url::ParseError> {
	let mut url = Url::parse(callback)?;

	url.query_pairs_mut().append_pair("oauth_token", token);

	Ok(url)
}

/// WRAP authorization URL on the provider's user-authorization endpoint.
pub fn wrap_authorization_url(
	provider: &ServiceProvider,
	consumer: &ConsumerCredentials,
	callback: Option<&Url>,
	scope: Option<&str>,
) -> Url {
	let mut url = provider.endpoints.user_authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("wrap_client_id", &consumer.key);

	if let Some(callback) = callback {
		pairs.append_pair("wrap_callback", callback.as_str());
	}
	if let Some(scope) = scope {
		pairs.append_pair("wrap_scope", scope);
	}

	drop(pairs);

	url
}

/// 2.0 authorization-code request URL.
pub fn v2_authorization_url(
	provider: &ServiceProvider,
	consumer: &ConsumerCredentials,
	redirect_uri: &str,
	scope: Option<&str>,
	state: &CorrelationToken,
) -> Url {
	let mut url = provider.v2.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &consumer.key);
	pairs.append_pair("redirect_uri", redirect_uri);

	if let Some(scope) = scope {
		pairs.append_pair("scope", scope);
	}

	pairs.append_pair("state", state);

	drop(pairs);

	url
}

/// Decodes a form-encoded response body into ordered pairs.
pub fn decode_form(body: &[u8]) -> Vec<(String, String)> {
	url::form_urlencoded::parse(body).into_owned().collect()
}

/// Returns the first non-empty value for `key`.
pub fn form_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
	pairs.iter().find(|(k, v)| k == key && !v.is_empty()).map(|(_, v)| v.as_str())
}

/// Request token and secret from a 1.0a request-token response.
pub fn parse_v1_request_token(body: &[u8]) -> Result<(CorrelationToken, String), ProtocolError> {
	let pairs = decode_form(body);
	let token = form_value(&pairs, "oauth_token")
		.and_then(|raw| CorrelationToken::new(raw).ok())
		.ok_or(ProtocolError::MissingField { endpoint: "request_token", field: "oauth_token" })?;
	let secret = form_value(&pairs, "oauth_token_secret").unwrap_or_default().to_owned();

	Ok((token, secret))
}

/// Access token and secret from a 1.0a access-token response, if present.
pub fn parse_v1_access_token(body: &[u8]) -> Option<(String, String)> {
	let pairs = decode_form(body);
	let token = form_value(&pairs, "oauth_token")?.to_owned();
	let secret = form_value(&pairs, "oauth_token_secret").unwrap_or_default().to_owned();

	Some((token, secret))
}

/// `wrap_access_token` from a form-encoded WRAP response, if present.
pub fn parse_wrap_access_token(body: &[u8]) -> Option<String> {
	form_value(&decode_form(body), "wrap_access_token").map(ToOwned::to_owned)
}

#[derive(Debug, Deserialize)]
struct V2TokenResponse {
	#[serde(default)]
	access_token: Option<String>,
}

/// `access_token` from a JSON 2.0 token response, if present.
///
/// Only `access_token` is read; providers that omit `token_type` are accepted.
pub fn parse_v2_access_token(body: &[u8]) -> Result<Option<String>, ProtocolError> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let response: V2TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| ProtocolError::TokenResponseParse { source })?;

	Ok(response.access_token.filter(|token| !token.is_empty()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn token(raw: &str) -> CorrelationToken {
		CorrelationToken::new(raw).expect("Token fixture should be valid.")
	}

	#[test]
	fn v1_authorization_url_orders_quirks_params_and_token() {
		let buzz = ServiceProvider::named("BUZZ").expect("BUZZ should be a built-in provider.");
		let url = v1_authorization_url(
			&buzz,
			&ConsumerCredentials::anonymous(),
			Some("https://www.googleapis.com/auth/buzz"),
			&[("iconUrl".into(), "http://example.com/i.png".into())],
			&token("RT1"),
		);
		let keys = url.query_pairs().map(|(k, _)| k.into_owned()).collect::<Vec<_>>();

		assert_eq!(keys, ["scope", "domain", "xoauth_displayname", "iconUrl", "oauth_token"]);
		assert!(url.as_str().starts_with(buzz.endpoints.user_authorization.as_str()));
	}

	#[test]
	fn plain_v1_authorization_url_carries_only_the_token() {
		let google = ServiceProvider::named("GOOGLE").expect("GOOGLE should be a built-in provider.");
		let url = v1_authorization_url(
			&google,
			&ConsumerCredentials::anonymous(),
			Some("https://example.com/scope"),
			&[],
			&token("RT1"),
		);

		assert_eq!(url.query(), Some("oauth_token=RT1"));
	}

	#[test]
	fn anonymous_request_token_call_names_the_tool() {
		let params = v1_request_token_params(&ConsumerCredentials::anonymous(), Some("s"));

		assert_eq!(
			params,
			vec![
				("scope".to_owned(), "s".to_owned()),
				("xoauth_displayname".to_owned(), DISPLAY_NAME.to_owned())
			]
		);
		assert!(v1_request_token_params(&ConsumerCredentials::new("k", "s"), None).is_empty());
	}

	#[test]
	fn wrap_urls_embed_the_tracking_token() {
		let google = ServiceProvider::named("GOOGLE").expect("GOOGLE should be a built-in provider.");
		let callback = wrap_callback("http://localhost:8080/OAuthCallback", &token("abc123"))
			.expect("Callback should parse.");

		assert_eq!(callback.as_str(), "http://localhost:8080/OAuthCallback?oauth_token=abc123");

		let url = wrap_authorization_url(
			&google,
			&ConsumerCredentials::anonymous(),
			Some(&callback),
			Some("a b"),
		);
		let pairs = url.query_pairs().into_owned().collect::<Vec<_>>();

		assert_eq!(pairs[0], ("wrap_client_id".into(), "anonymous".into()));
		assert_eq!(pairs[1], ("wrap_callback".into(), callback.to_string()));
		assert_eq!(pairs[2], ("wrap_scope".into(), "a b".into()));
	}

	#[test]
	fn v2_authorization_url_uses_standard_names() {
		let google = ServiceProvider::named("GOOGLE").expect("GOOGLE should be a built-in provider.");
		let url = v2_authorization_url(
			&google,
			&ConsumerCredentials::new("client", "secret"),
			OOB_REDIRECT,
			Some("email"),
			&token("S1"),
		);
		let pairs = url.query_pairs().into_owned().collect::<HashMap<_, _>>();

		assert_eq!(pairs["response_type"], "code");
		assert_eq!(pairs["client_id"], "client");
		assert_eq!(pairs["redirect_uri"], OOB_REDIRECT);
		assert_eq!(pairs["scope"], "email");
		assert_eq!(pairs["state"], "S1");
		assert!(!pairs.contains_key("client_secret"));
	}

	#[test]
	fn token_responses_are_parsed_per_variant() {
		assert_eq!(parse_wrap_access_token(b"wrap_access_token=ABC123"), Some("ABC123".into()));
		assert_eq!(parse_wrap_access_token(b"wrap_refresh_token=R"), None);
		assert_eq!(
			parse_v2_access_token(br#"{"access_token":"XYZ"}"#).expect("JSON should parse."),
			Some("XYZ".into())
		);
		assert_eq!(parse_v2_access_token(br#"{"error":"nope"}"#).expect("JSON should parse."), None);
		assert!(matches!(
			parse_v2_access_token(br#"{"access_token":42}"#),
			Err(ProtocolError::TokenResponseParse { .. })
		));
		assert_eq!(
			parse_v1_access_token(b"oauth_token=AT&oauth_token_secret=ATS"),
			Some(("AT".into(), "ATS".into()))
		);

		let (request_token, secret) =
			parse_v1_request_token(b"oauth_token=RT1&oauth_token_secret=RS&oauth_callback_confirmed=true")
				.expect("Request token should parse.");

		assert_eq!(&*request_token, "RT1");
		assert_eq!(secret, "RS");
		assert!(parse_v1_request_token(b"oauth_token_secret=RS").is_err());
	}
}
