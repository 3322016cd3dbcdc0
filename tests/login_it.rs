#![cfg(feature = "reqwest")]

// std
use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};
// crates.io
use httpmock::prelude::*;
// self
use oacurl::{
	auth::{ConsumerCredentials, ProtocolVersion, ProviderId},
	config::{LoginConfig, VerifierSource},
	error::Error,
	ext::{LaunchError, UrlPresenter},
	flows::{Login, LoginOutcome, LoginState},
	http::ReqwestTransport,
	listener::{ListenerConfig, PendingVerifiers},
	provider::ServiceProvider,
	reqwest::Client,
	store::MemoryStore,
	url::Url,
};

const CLIENT_ID: &str = "client-it";
const CLIENT_SECRET: &str = "secret-it";

/// Plays the user's browser: follows the authorization URL straight to the callback.
struct BrowserBot {
	version: ProtocolVersion,
	verifier: &'static str,
	/// 1.0a callbacks come from the provider, so the bot hands the verifier over directly.
	pending: Option<PendingVerifiers>,
}
impl UrlPresenter for BrowserBot {
	fn present(&self, url: &Url) -> Result<(), LaunchError> {
		let pairs = url.query_pairs().into_owned().collect::<HashMap<_, _>>();
		let redirect = match self.version {
			ProtocolVersion::V1 => {
				let pending = self.pending.as_ref().expect("1.0a bot needs the verifier map.");

				pending.deliver(pairs["oauth_token"].as_str(), self.verifier);

				return Ok(());
			},
			ProtocolVersion::Wrap => {
				let mut callback =
					Url::parse(&pairs["wrap_callback"]).expect("WRAP callback should parse.");

				callback.query_pairs_mut().append_pair("wrap_verification_code", self.verifier);

				callback
			},
			ProtocolVersion::V2 => {
				let mut redirect =
					Url::parse(&pairs["redirect_uri"]).expect("Redirect URI should parse.");

				redirect
					.query_pairs_mut()
					.append_pair("state", &pairs["state"])
					.append_pair("code", self.verifier);

				redirect
			},
		};

		tokio::spawn(async move {
			let _ = Client::new().get(redirect).send().await;
		});

		Ok(())
	}
}

fn url(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock endpoint should parse.")
}

fn build_provider(server: &MockServer) -> ServiceProvider {
	let id = ProviderId::new("mock-http").expect("Provider identifier should be valid.");

	ServiceProvider::builder(id)
		.request_token_endpoint(url(server, "/request_token"))
		.user_authorization_endpoint(url(server, "/authorize"))
		.access_token_endpoint(url(server, "/access_token"))
		.v2_authorization_endpoint(url(server, "/o2/auth"))
		.v2_token_endpoint(url(server, "/o2/token"))
		.build()
		.expect("Provider should build.")
}

fn build_config(server: &MockServer, version: ProtocolVersion) -> LoginConfig {
	LoginConfig::new(
		version,
		build_provider(server),
		ConsumerCredentials::new(CLIENT_ID, CLIENT_SECRET),
	)
	.with_verifier(VerifierSource::Listener(ListenerConfig { host: "127.0.0.1".into() }))
	.with_timeout(StdDuration::from_secs(10))
}

fn build_login(config: LoginConfig, store: &MemoryStore) -> Login {
	// httpmock serves HTTPS with a self-signed certificate.
	let transport = ReqwestTransport::new(true).expect("Transport should build.");

	Login::new(config, Arc::new(transport), Arc::new(store.clone()))
		.expect("Login configuration should be valid.")
}

#[tokio::test]
async fn wrap_login_exchanges_the_verification_code() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/access_token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).body("wrap_access_token=ABC123&wrap_access_token_expires_in=3600");
		})
		.await;
	let store = MemoryStore::default();
	let mut login = build_login(build_config(&server, ProtocolVersion::Wrap), &store)
		.with_presenter(BrowserBot { version: ProtocolVersion::Wrap, verifier: "VC1", pending: None });
	let outcome = login.run().await.expect("WRAP login should complete.");

	mock.assert_async().await;

	let LoginOutcome::Authorized(credential) = outcome else {
		panic!("WRAP login should be authorized.");
	};
	let access = credential.access.as_ref().expect("Credential should carry a grant.");

	assert_eq!(access.token.expose(), "ABC123");
	assert!(access.secret.is_empty());
	assert_eq!(credential.version, ProtocolVersion::Wrap);
	assert_eq!(store.snapshot(), Some(credential));
	assert_eq!(login.state(), LoginState::Success);
}

#[tokio::test]
async fn v2_login_stores_a_bearer_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/o2/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"XYZ\",\"token_type\":\"Bearer\",\"expires_in\":3600}");
		})
		.await;
	let store = MemoryStore::default();
	let mut login = build_login(build_config(&server, ProtocolVersion::V2), &store)
		.with_presenter(BrowserBot { version: ProtocolVersion::V2, verifier: "CODE1", pending: None });
	let outcome = login.run().await.expect("2.0 login should complete.");

	mock.assert_async().await;

	assert!(matches!(outcome, LoginOutcome::Authorized(_)));
	assert_eq!(outcome.exit_code(), 0);

	let stored = store.snapshot().expect("Credential should be stored.");

	assert_eq!(
		stored.access.as_ref().map(|access| access.token.expose().to_owned()),
		Some("XYZ".into())
	);
	assert_eq!(stored.version, ProtocolVersion::V2);
}

#[tokio::test]
async fn v2_invalid_grant_is_a_rejection_not_an_error() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/o2/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let store = MemoryStore::default();
	let mut login = build_login(build_config(&server, ProtocolVersion::V2), &store)
		.with_presenter(BrowserBot { version: ProtocolVersion::V2, verifier: "STALE", pending: None });
	let outcome = login.run().await.expect("A rejected grant is not fatal.");

	mock.assert_async().await;

	assert!(matches!(outcome, LoginOutcome::Rejected { .. }));
	assert_eq!(outcome.exit_code(), 1, "A rejected verifier must end the session unsuccessfully.");
	assert_eq!(store.snapshot(), None);
	assert_eq!(login.state(), LoginState::Failed);
}

#[tokio::test]
async fn v1_login_signs_both_round_trips() {
	let server = MockServer::start_async().await;
	let request_token = server
		.mock_async(|when, then| {
			when.method(POST).path("/request_token");
			then.status(200)
				.body("oauth_token=RT1&oauth_token_secret=RS1&oauth_callback_confirmed=true");
		})
		.await;
	let access_token = server
		.mock_async(|when, then| {
			when.method(POST).path("/access_token");
			then.status(200).body("oauth_token=AT1&oauth_token_secret=ATS1");
		})
		.await;
	let store = MemoryStore::default();
	let login = build_login(build_config(&server, ProtocolVersion::V1), &store);
	let pending = login.verifiers();
	let mut login = login.with_presenter(BrowserBot {
		version: ProtocolVersion::V1,
		verifier: "VERIFIER",
		pending,
	});
	let outcome = login.run().await.expect("1.0a login should complete.");

	request_token.assert_async().await;
	access_token.assert_async().await;

	let LoginOutcome::Authorized(credential) = outcome else {
		panic!("1.0a login should be authorized.");
	};
	let access = credential.access.expect("Credential should carry a grant.");

	assert_eq!(access.token.expose(), "AT1");
	assert_eq!(access.secret.expose(), "ATS1");
}

#[tokio::test]
async fn request_token_failure_is_fatal_and_releases_the_listener() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/request_token");
			then.status(401).body("oauth_problem=consumer_key_unknown");
		})
		.await;
	let store = MemoryStore::default();
	let login = build_login(build_config(&server, ProtocolVersion::V1), &store);
	let pending = login.verifiers();
	let mut login = login.with_presenter(BrowserBot {
		version: ProtocolVersion::V1,
		verifier: "VERIFIER",
		pending: pending.clone(),
	});
	let err = login.run().await.expect_err("A failed request-token call is fatal.");

	mock.assert_async().await;

	assert!(matches!(err, Error::Protocol(_)));
	assert_eq!(err.exit_code(), 1);
	assert_eq!(login.state(), LoginState::Failed);
	assert!(pending.expect("Listener channel has a verifier map.").is_empty());
}
