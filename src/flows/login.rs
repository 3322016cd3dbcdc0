//! The authorization dance: one state machine for 1.0a, WRAP, and 2.0.
//!
//! ```text
//! Init -> AwaitingAuthorizationRequest -> AwaitingUserVerification -> ExchangingToken
//!      -> Success | Failed
//! ```
//!
//! Demo mode loops from `Success`/`Failed` back to `AwaitingAuthorizationRequest` until the
//! wait is interrupted. The callback listener is stopped on every exit path.

// std
use std::time::Duration as StdDuration;
// crates.io
use oauth2::http::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::{AccessGrant, Credential, CorrelationToken, ProtocolVersion, TokenSecret},
	config::{LoginConfig, VerifierSource},
	error::{ConfigError, ProtocolError},
	ext::{HmacSha1Signer, PrintUrl, RequestSigner, SigningRequest, UrlPresenter},
	flows::{
		protocol::{self, OOB_CALLBACK, OOB_REDIRECT},
		verifier::{ConsoleVerifier, VerifierChannel, VerifierReading},
	},
	http::{self, HttpResponse, HttpTransport},
	listener::{LandingStatus, PendingVerifiers},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CredentialStore,
};

/// Orchestrator states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginState {
	/// Verifier channel chosen, listener not yet started.
	Init,
	/// Building the authorization URL (1.0a fetches a request token here).
	AwaitingAuthorizationRequest,
	/// Waiting for the callback or the pasted verifier.
	AwaitingUserVerification,
	/// Trading the verifier for an access token.
	ExchangingToken,
	/// The last exchange produced a credential.
	Success,
	/// The last exchange was rejected, or the dance stopped on an error.
	Failed,
}

/// One pass through the authorization URL step.
#[derive(Clone, Debug)]
pub struct AuthorizationAttempt {
	/// URL the user must visit.
	pub url: Url,
	/// Token the callback must echo (request token, WRAP tracking token, or 2.0 `state`).
	pub correlation: CorrelationToken,
	/// 1.0a request-token secret; empty for WRAP and 2.0.
	pub request_secret: TokenSecret,
	/// Callback the exchange must repeat (`wrap_callback`, `redirect_uri`).
	pub callback: Option<String>,
}

/// Result of one exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
	/// The provider issued an access token.
	Granted(Credential),
	/// The provider rejected the verifier; the dance may continue.
	Rejected {
		/// Why the attempt failed.
		reason: String,
	},
}

/// Result of a whole login session outside demo mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
	/// A credential was obtained and persisted.
	Authorized(Credential),
	/// The provider rejected the verifier.
	Rejected {
		/// Why the attempt failed.
		reason: String,
	},
}
impl LoginOutcome {
	/// Process exit code for the session; a rejected verifier still ends it unsuccessfully.
	pub fn exit_code(&self) -> u8 {
		match self {
			Self::Authorized(_) => 0,
			Self::Rejected { .. } => 1,
		}
	}
}

/// Cancels a blocked listener wait from another task or thread (Ctrl-C).
#[derive(Clone, Debug, Default)]
pub struct InterruptHandle(Option<PendingVerifiers>);
impl InterruptHandle {
	/// Wakes the listener wait with an interruption. No-op for the console channel.
	pub fn interrupt(&self) {
		if let Some(pending) = &self.0 {
			pending.interrupt();
		}
	}
}

/// Drives one `oacurl login` invocation.
pub struct Login {
	config: LoginConfig,
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn CredentialStore>,
	signer: Arc<dyn RequestSigner>,
	presenter: Box<dyn UrlPresenter>,
	channel: VerifierChannel,
	state: LoginState,
}
impl Login {
	/// Validates `config` and prepares the verifier channel. Nothing is bound yet.
	///
	/// Defaults: HMAC-SHA1 signing, the URL printed to standard output, and standard input for
	/// the console channel.
	pub fn new(
		config: LoginConfig,
		transport: Arc<dyn HttpTransport>,
		store: Arc<dyn CredentialStore>,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let channel = match &config.verifier {
			VerifierSource::Listener(listener) => VerifierChannel::listener(listener.clone()),
			VerifierSource::Console => VerifierChannel::Console(ConsoleVerifier::stdin()),
		};

		Ok(Self {
			config,
			transport,
			store,
			signer: Arc::new(HmacSha1Signer::new()),
			presenter: Box::new(PrintUrl),
			channel,
			state: LoginState::Init,
		})
	}

	/// Replaces the request signer.
	pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
		self.signer = signer;

		self
	}

	/// Replaces the URL presenter.
	pub fn with_presenter(mut self, presenter: impl 'static + UrlPresenter) -> Self {
		self.presenter = Box::new(presenter);

		self
	}

	/// Replaces the console input. Ignored when the listener channel is in use.
	pub fn with_console(mut self, console: ConsoleVerifier) -> Self {
		if let VerifierChannel::Console(current) = &mut self.channel {
			*current = console;
		}

		self
	}

	/// Handle that interrupts the listener wait.
	pub fn interrupt_handle(&self) -> InterruptHandle {
		InterruptHandle(self.channel.pending())
	}

	/// Verifier map of the listener channel, for embedders delivering verifiers themselves.
	pub fn verifiers(&self) -> Option<PendingVerifiers> {
		self.channel.pending()
	}

	/// Current state.
	pub fn state(&self) -> LoginState {
		self.state
	}

	/// Runs the dance to completion.
	///
	/// Outside demo mode this returns after the first exchange. In demo mode it only returns
	/// with an error (typically [`Error::Aborted`] after an interrupt).
	pub async fn run(&mut self) -> Result<LoginOutcome> {
		let version = self.config.version;
		let span = FlowSpan::new(FlowKind::Login, version, "run");

		obs::record_flow_outcome(FlowKind::Login, version, FlowOutcome::Attempt);

		let result = span.instrument(self.dance()).await;

		if let Some(listener) = self.channel.as_listener_mut() {
			listener.stop();
		}

		let outcome = match &result {
			Ok(LoginOutcome::Authorized(_)) => FlowOutcome::Success,
			Ok(LoginOutcome::Rejected { .. }) => FlowOutcome::Rejected,
			Err(e) => {
				tracing::error!(error = %e, "Login failed.");
				self.transition(LoginState::Failed);

				FlowOutcome::Failure
			},
		};

		obs::record_flow_outcome(FlowKind::Login, version, outcome);

		result
	}

	async fn dance(&mut self) -> Result<LoginOutcome> {
		self.transition(LoginState::Init);

		if let Some(listener) = self.channel.as_listener_mut() {
			listener.start()?;
		}

		let callback = self.callback()?;
		let mut presented = false;

		loop {
			self.transition(LoginState::AwaitingAuthorizationRequest);

			let attempt = self.authorize(callback.as_deref()).await?;

			if let Some(listener) = self.channel.as_listener() {
				listener.set_authorization_url(attempt.url.clone());
			}
			if !presented {
				let url = match self.channel.as_listener() {
					Some(listener) if self.config.demo => listener.demo_url()?,
					_ => attempt.url.clone(),
				};

				self.presenter.present(&url)?;

				presented = true;
			}

			self.transition(LoginState::AwaitingUserVerification);
			tracing::info!(correlation = %attempt.correlation, "Waiting for verification token.");

			let verifier = match self.channel.receive(&attempt.correlation, self.config.timeout).await? {
				VerifierReading::Verifier(verifier) => verifier,
				VerifierReading::TimedOut =>
					return Err(Error::aborted(timeout_reason(self.config.timeout))),
				VerifierReading::Interrupted =>
					return Err(Error::aborted("wait for verifier interrupted")),
				VerifierReading::Closed =>
					return Err(Error::aborted("standard input closed before a verifier was entered")),
			};

			tracing::info!("Verification token received.");
			self.transition(LoginState::ExchangingToken);

			match self.exchange(&attempt, &verifier).await? {
				AttemptOutcome::Granted(credential) => {
					self.channel.set_token_status(LandingStatus::Valid);
					self.store.save(credential.clone()).await?;
					self.transition(LoginState::Success);

					if !self.config.demo {
						return Ok(LoginOutcome::Authorized(credential));
					}
				},
				AttemptOutcome::Rejected { reason } => {
					tracing::warn!(%reason, "Verification rejected.");
					self.channel.set_token_status(LandingStatus::Invalid);
					self.transition(LoginState::Failed);

					if !self.config.demo {
						return Ok(LoginOutcome::Rejected { reason });
					}
				},
			}
		}
	}

	fn transition(&mut self, next: LoginState) {
		tracing::debug!(from = ?self.state, to = ?next, "Login state change.");

		self.state = next;
	}

	/// Explicit override, else the listener, else the 2.0 out-of-band placeholder.
	fn callback(&self) -> Result<Option<String>> {
		if let Some(callback) = &self.config.callback {
			return Ok(Some(callback.clone()));
		}
		if let Some(listener) = self.channel.as_listener() {
			return Ok(Some(listener.callback_url()?.to_string()));
		}

		Ok((self.config.version == ProtocolVersion::V2).then(|| OOB_REDIRECT.to_owned()))
	}

	async fn authorize(&self, callback: Option<&str>) -> Result<AuthorizationAttempt> {
		let LoginConfig { provider, consumer, .. } = &self.config;
		let scope = self.config.scope();

		match self.config.version {
			ProtocolVersion::V1 => self.request_token(callback, scope.as_deref()).await,
			ProtocolVersion::Wrap => {
				let correlation = CorrelationToken::mint_wrap();
				let callback = callback
					.map(|raw| {
						protocol::wrap_callback(raw, &correlation).map_err(|source| {
							ConfigError::InvalidUrl { field: "callback", value: raw.into(), source }
						})
					})
					.transpose()?;
				let url = protocol::wrap_authorization_url(
					provider,
					consumer,
					callback.as_ref(),
					scope.as_deref(),
				);

				Ok(AuthorizationAttempt {
					url,
					correlation,
					request_secret: TokenSecret::default(),
					callback: callback.map(|url| url.to_string()),
				})
			},
			ProtocolVersion::V2 => {
				let correlation = CorrelationToken::mint_state();
				let redirect_uri = callback.unwrap_or(OOB_REDIRECT);
				let url = protocol::v2_authorization_url(
					provider,
					consumer,
					redirect_uri,
					scope.as_deref(),
					&correlation,
				);

				Ok(AuthorizationAttempt {
					url,
					correlation,
					request_secret: TokenSecret::default(),
					callback: Some(redirect_uri.to_owned()),
				})
			},
		}
	}

	async fn request_token(
		&self,
		callback: Option<&str>,
		scope: Option<&str>,
	) -> Result<AuthorizationAttempt> {
		let LoginConfig { provider, consumer, .. } = &self.config;
		let endpoint = &provider.endpoints.request_token;
		let params = protocol::v1_request_token_params(consumer, scope);

		tracing::debug!(?params, "Fetching request token.");

		let signing = SigningRequest::new("POST", endpoint, consumer)
			.protocol_param("oauth_callback", callback.unwrap_or(OOB_CALLBACK))
			.form_params(params.iter().cloned());
		let header = self.signer.authorization_header(&signing)?;
		let pairs = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect::<Vec<_>>();
		let mut request = http::form_post(endpoint, &pairs)?;

		http::set_authorization(&mut request, &header)?;

		let response = self.transport.execute(request).await?;

		ensure_success("request_token", &response)?;

		let (correlation, secret) = protocol::parse_v1_request_token(response.body())?;
		let url = protocol::v1_authorization_url(
			provider,
			consumer,
			scope,
			&self.config.authorization_params(),
			&correlation,
		);

		tracing::info!(request_token = %correlation, "Request token received.");

		Ok(AuthorizationAttempt {
			url,
			correlation,
			request_secret: secret.into(),
			callback: callback.map(ToOwned::to_owned),
		})
	}

	async fn exchange(
		&self,
		attempt: &AuthorizationAttempt,
		verifier: &str,
	) -> Result<AttemptOutcome> {
		let LoginConfig { provider, consumer, version, .. } = &self.config;
		let callback = attempt.callback.as_deref().unwrap_or_default();

		match version {
			ProtocolVersion::V1 => {
				let endpoint = &provider.endpoints.access_token;
				let signing = SigningRequest::new("POST", endpoint, consumer)
					.token(&attempt.correlation, attempt.request_secret.expose())
					.protocol_param("oauth_verifier", verifier);
				let header = self.signer.authorization_header(&signing)?;
				let mut request = http::form_post(endpoint, &[])?;

				http::set_authorization(&mut request, &header)?;

				let response = self.transport.execute(request).await?;

				if response.status() == StatusCode::BAD_REQUEST {
					return Ok(rejected("access_token", &response));
				}

				ensure_success("access_token", &response)?;

				Ok(match protocol::parse_v1_access_token(response.body()) {
					Some((token, secret)) => AttemptOutcome::Granted(
						Credential::pending(consumer.clone(), *version)
							.with_access(AccessGrant::new(token, secret)),
					),
					None => missing_token("oauth_token"),
				})
			},
			ProtocolVersion::Wrap => {
				let request = http::form_post(
					&provider.endpoints.access_token,
					&[
						("wrap_client_id", consumer.key.as_str()),
						("wrap_client_secret", consumer.secret.expose()),
						("wrap_callback", callback),
						("wrap_verification_code", verifier),
					],
				)?;
				let response = self.transport.execute(request).await?;

				if let Some(outcome) = bearer_rejection("access_token", &response) {
					return Ok(outcome);
				}

				ensure_success("access_token", &response)?;

				Ok(match protocol::parse_wrap_access_token(response.body()) {
					Some(token) => AttemptOutcome::Granted(
						Credential::pending(consumer.clone(), *version)
							.with_access(AccessGrant::bearer(token)),
					),
					None => missing_token("wrap_access_token"),
				})
			},
			ProtocolVersion::V2 => {
				let request = http::form_post(
					&provider.v2.token,
					&[
						("grant_type", "authorization_code"),
						("code", verifier),
						("redirect_uri", callback),
						("client_id", consumer.key.as_str()),
						("client_secret", consumer.secret.expose()),
					],
				)?;
				let response = self.transport.execute(request).await?;

				if let Some(outcome) = bearer_rejection("token", &response) {
					return Ok(outcome);
				}

				ensure_success("token", &response)?;

				Ok(match protocol::parse_v2_access_token(response.body())? {
					Some(token) => AttemptOutcome::Granted(
						Credential::pending(consumer.clone(), *version)
							.with_access(AccessGrant::bearer(token)),
					),
					None => missing_token("access_token"),
				})
			},
		}
	}
}
impl Debug for Login {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Login")
			.field("config", &self.config)
			.field("channel", &self.channel)
			.field("state", &self.state)
			.finish()
	}
}

fn ensure_success(endpoint: &'static str, response: &HttpResponse) -> Result<(), ProtocolError> {
	let status = response.status();

	if status.is_success() {
		return Ok(());
	}

	let body = match http::redirect_location(response) {
		Some(location) => format!("redirected to {location}"),
		None => http::body_text(response),
	};

	Err(ProtocolError::UnexpectedStatus { endpoint, status: status.as_u16(), body })
}

/// WRAP and 2.0 report a bad verifier with 400 or 401.
fn bearer_rejection(endpoint: &'static str, response: &HttpResponse) -> Option<AttemptOutcome> {
	matches!(response.status(), StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED)
		.then(|| rejected(endpoint, response))
}

fn rejected(endpoint: &'static str, response: &HttpResponse) -> AttemptOutcome {
	AttemptOutcome::Rejected {
		reason: format!(
			"the {endpoint} endpoint returned HTTP {}: {}",
			response.status().as_u16(),
			http::body_text(response).trim()
		),
	}
}

fn missing_token(field: &str) -> AttemptOutcome {
	AttemptOutcome::Rejected { reason: format!("the exchange response carried no `{field}`") }
}

fn timeout_reason(timeout: Option<StdDuration>) -> String {
	match timeout {
		Some(timeout) => format!("no verifier arrived within {}s", timeout.as_secs_f32()),
		None => "no verifier arrived".into(),
	}
}
