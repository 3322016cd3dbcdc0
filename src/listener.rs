//! Short-lived local HTTP listener receiving the provider's redirect on `/OAuthCallback`.
//!
//! The listener owns an ephemeral port and a dedicated thread running a single-threaded Tokio
//! runtime that serves an `axum` router. Verifiers travel to the orchestrator through
//! [`PendingVerifiers`]; the orchestrator blocks in [`CallbackListener::wait_for_verifier`].

pub mod page;
pub mod pending;

pub use pending::*;

// std
use std::{
	io,
	net::{SocketAddr, TcpListener as StdTcpListener},
	thread::{self, JoinHandle},
	time::Duration as StdDuration,
};
// crates.io
use axum::{
	Router,
	extract::{Query, State},
	http::{StatusCode, header::CONNECTION},
	response::{Html, IntoResponse, Response},
	routing::get,
};
use tokio::{net::TcpListener, sync::oneshot};
// self
use crate::{_prelude::*, auth::CorrelationToken};

/// Fixed callback path.
pub const CALLBACK_PATH: &str = "/OAuthCallback";

/// Default bind host.
pub const DEFAULT_HOST: &str = "localhost";

const TOKEN_PARAMS: &[&str] = &["oauth_token", "state"];
const VERIFIER_PARAMS: &[&str] = &["oauth_verifier", "wrap_verification_code", "code"];

/// Errors raised by [`CallbackListener`].
#[derive(Debug, ThisError)]
pub enum ListenerError {
	/// `start` was called on a running listener.
	#[error("Callback listener is already started.")]
	AlreadyStarted,
	/// The listener has not been started (or was stopped).
	#[error("Callback listener is not started.")]
	NotStarted,
	/// No port could be bound on the configured host.
	#[error("Failed to bind the callback listener on {host}.")]
	Bind {
		/// Configured bind host.
		host: String,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
	/// The serving thread could not be spawned.
	#[error("Failed to spawn the callback listener thread.")]
	Spawn(#[source] io::Error),
	/// The configured host does not form a valid URL.
	#[error("Callback URL for host `{host}` is invalid.")]
	CallbackUrl {
		/// Configured bind host.
		host: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}

/// Outcome shown on the demo landing page. Presentation only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandingStatus {
	/// The last exchange produced a credential.
	Valid,
	/// The last exchange was rejected.
	Invalid,
}
impl LandingStatus {
	/// Returns the label rendered on the landing page.
	pub const fn as_str(self) -> &'static str {
		match self {
			LandingStatus::Valid => "VALID",
			LandingStatus::Invalid => "INVALID",
		}
	}
}
impl Display for LandingStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Listener configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
	/// Host to bind and advertise in the callback URL.
	pub host: String,
}
impl Default for ListenerConfig {
	fn default() -> Self {
		Self { host: DEFAULT_HOST.into() }
	}
}

#[derive(Debug, Default)]
struct DemoPage {
	authorization_url: Option<Url>,
	status: Option<LandingStatus>,
}

#[derive(Debug, Default)]
struct ListenerShared {
	pending: PendingVerifiers,
	demo: Mutex<DemoPage>,
}

#[derive(Debug)]
struct Running {
	addr: SocketAddr,
	shutdown: oneshot::Sender<()>,
	thread: JoinHandle<()>,
}

/// Local callback receiver for one login invocation.
///
/// Dropping the listener stops it.
#[derive(Debug)]
pub struct CallbackListener {
	config: ListenerConfig,
	shared: Arc<ListenerShared>,
	running: Option<Running>,
}
impl CallbackListener {
	/// Creates a stopped listener.
	pub fn new(config: ListenerConfig) -> Self {
		Self { config, shared: Arc::default(), running: None }
	}

	/// Binds an OS-assigned port on the configured host and starts serving.
	pub fn start(&mut self) -> Result<(), ListenerError> {
		if self.running.is_some() {
			return Err(ListenerError::AlreadyStarted);
		}

		let host = self.config.host.as_str();
		let listener = StdTcpListener::bind((host, 0)).map_err(|e| bind_error(host, e))?;

		listener.set_nonblocking(true).map_err(|e| bind_error(host, e))?;

		let addr = listener.local_addr().map_err(|e| bind_error(host, e))?;
		let (shutdown, shutdown_rx) = oneshot::channel();
		let router = router(Arc::clone(&self.shared));
		let thread = thread::Builder::new()
			.name("oacurl-callback".into())
			.spawn(move || serve(listener, router, shutdown_rx))
			.map_err(ListenerError::Spawn)?;

		self.running = Some(Running { addr, shutdown, thread });

		tracing::info!(%addr, "Callback listener started.");

		Ok(())
	}

	/// Stops serving and releases the port. Safe to call repeatedly or before `start`.
	pub fn stop(&mut self) {
		let Some(running) = self.running.take() else {
			return;
		};

		if running.shutdown.send(()).is_err() {
			tracing::debug!(addr = %running.addr, "Callback listener already shut down.");
		}

		if running.thread.join().is_err() {
			tracing::warn!("Callback listener thread panicked.");
		}

		self.shared.pending.clear();

		tracing::info!(addr = %running.addr, "Callback listener stopped.");
	}

	/// Returns true while serving.
	pub fn is_running(&self) -> bool {
		self.running.is_some()
	}

	/// Bound socket address.
	pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
		self.running.as_ref().map(|running| running.addr).ok_or(ListenerError::NotStarted)
	}

	/// `http://<host>:<port>/OAuthCallback`.
	pub fn callback_url(&self) -> Result<Url, ListenerError> {
		self.url_for(CALLBACK_PATH)
	}

	/// Demo landing page, `http://<host>:<port>/`.
	pub fn demo_url(&self) -> Result<Url, ListenerError> {
		self.url_for("/")
	}

	fn url_for(&self, path: &str) -> Result<Url, ListenerError> {
		let port = self.local_addr()?.port();
		let host = &self.config.host;
		let raw = if host.contains(':') {
			format!("http://[{host}]:{port}{path}")
		} else {
			format!("http://{host}:{port}{path}")
		};

		Url::parse(&raw).map_err(|source| ListenerError::CallbackUrl { host: host.clone(), source })
	}

	/// Sets the authorization URL linked from the demo page.
	pub fn set_authorization_url(&self, url: Url) {
		self.shared.demo.lock().authorization_url = Some(url);
	}

	/// Sets the status shown on the demo page.
	pub fn set_token_status(&self, status: LandingStatus) {
		self.shared.demo.lock().status = Some(status);
	}

	/// Blocks until the callback for `token` arrives, `timeout` elapses, or the wait is
	/// interrupted. The verifier is removed from the map when returned.
	pub fn wait_for_verifier(
		&self,
		token: &CorrelationToken,
		timeout: Option<StdDuration>,
	) -> Result<WaitOutcome, ListenerError> {
		if self.running.is_none() {
			return Err(ListenerError::NotStarted);
		}

		Ok(self.shared.pending.wait(token, timeout))
	}

	/// Handle to the shared verifier map, usable from other threads.
	///
	/// The map exists before `start`, so an interruption recorded early is observed by the
	/// first wait.
	pub fn pending(&self) -> PendingVerifiers {
		self.shared.pending.clone()
	}
}
impl Drop for CallbackListener {
	fn drop(&mut self) {
		self.stop();
	}
}

fn bind_error(host: &str, source: io::Error) -> ListenerError {
	ListenerError::Bind { host: host.into(), source }
}

fn router(shared: Arc<ListenerShared>) -> Router {
	Router::new()
		.route(CALLBACK_PATH, get(handle_callback))
		.route("/", get(handle_demo))
		.fallback(handle_unknown)
		.with_state(shared)
}

fn serve(listener: StdTcpListener, router: Router, shutdown: oneshot::Receiver<()>) {
	let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(e) => {
			tracing::error!(error = %e, "Failed to build the callback listener runtime.");

			return;
		},
	};
	let result = runtime.block_on(async move {
		let listener = TcpListener::from_std(listener)?;

		axum::serve(listener, router)
			.with_graceful_shutdown(async move {
				let _ = shutdown.await;
			})
			.await
	});

	if let Err(e) = result {
		tracing::error!(error = %e, "Callback listener stopped unexpectedly.");
	}
}

async fn handle_callback(
	State(shared): State<Arc<ListenerShared>>,
	Query(params): Query<HashMap<String, String>>,
) -> Response {
	if let Some(error) = params.get("error") {
		tracing::warn!(%error, "Provider redirected with an error.");

		return Html(page::denied(error)).into_response();
	}

	let first = |names: &[&str]| {
		names.iter().find_map(|name| params.get(*name).filter(|value| !value.is_empty()))
	};
	let (Some(token), Some(verifier)) = (first(TOKEN_PARAMS), first(VERIFIER_PARAMS)) else {
		tracing::warn!(params = ?params.keys().collect::<Vec<_>>(), "Callback is missing its token or verifier.");

		return (StatusCode::BAD_REQUEST, Html(page::INCOMPLETE_PAGE)).into_response();
	};

	tracing::info!(%token, "Received verifier.");
	shared.pending.deliver(token.as_str(), verifier.as_str());

	([(CONNECTION, "close")], Html(page::CLOSING_PAGE)).into_response()
}

async fn handle_demo(State(shared): State<Arc<ListenerShared>>) -> Html<String> {
	let demo = shared.demo.lock();

	Html(page::demo(demo.authorization_url.as_ref(), demo.status))
}

async fn handle_unknown() -> StatusCode {
	StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn loopback() -> CallbackListener {
		CallbackListener::new(ListenerConfig { host: "127.0.0.1".into() })
	}

	#[test]
	fn callback_url_requires_start() {
		let mut listener = loopback();

		assert!(matches!(listener.callback_url(), Err(ListenerError::NotStarted)));

		listener.start().expect("Listener should bind an ephemeral port.");

		let url = listener.callback_url().expect("Callback URL should exist once started.");
		let port = listener.local_addr().expect("Bound address should exist.").port();

		assert_eq!(url.as_str(), format!("http://127.0.0.1:{port}/OAuthCallback"));
		assert_eq!(
			listener.demo_url().expect("Demo URL should exist once started.").as_str(),
			format!("http://127.0.0.1:{port}/")
		);

		listener.stop();

		assert!(matches!(listener.callback_url(), Err(ListenerError::NotStarted)));
	}

	#[test]
	fn double_start_fails_and_stop_is_idempotent() {
		let mut listener = loopback();

		listener.stop();
		listener.start().expect("First start should succeed.");

		assert!(matches!(listener.start(), Err(ListenerError::AlreadyStarted)));

		listener.stop();
		listener.stop();

		assert!(!listener.is_running());

		listener.start().expect("Restart after stop should succeed.");
	}

	#[test]
	fn wait_requires_a_running_listener() {
		let listener = loopback();
		let token = CorrelationToken::new("T1").expect("Token fixture should be valid.");

		assert!(matches!(
			listener.wait_for_verifier(&token, Some(StdDuration::ZERO)),
			Err(ListenerError::NotStarted)
		));
	}

	#[test]
	fn ipv6_hosts_are_bracketed() {
		let mut listener = CallbackListener::new(ListenerConfig { host: "::1".into() });

		// Hosts without IPv6 loopback cannot bind; nothing to check there.
		if listener.start().is_err() {
			return;
		}

		let url = listener.callback_url().expect("Callback URL should exist once started.");

		assert_eq!(url.host_str(), Some("[::1]"));
	}
}
