//! curl-like access to OAuth-protected resources.
//!
//! `oacurl login` runs the authorization dance (OAuth 1.0a, WRAP, or 2.0) with a short-lived
//! local callback listener or a console prompt, then persists the credential; `oacurl fetch`
//! authorizes single requests with it.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod ext;
pub mod flows;
pub mod http;
pub mod listener;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Test doubles and re-exports for unit and integration tests; enabled via `cfg(test)` or
	//! the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{collections::VecDeque, io};
	// crates.io
	use oauth2::http::{StatusCode, header::AUTHORIZATION};
	// self
	use crate::{
		error::TransportError,
		ext::{LaunchError, UrlPresenter},
		http::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
	};

	/// Request captured by [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// Upper-case method.
		pub method: String,
		/// Full request URI.
		pub uri: String,
		/// `Authorization` header, if any.
		pub authorization: Option<String>,
		/// Every header, names lower-cased.
		pub headers: Vec<(String, String)>,
		/// Body, lossily decoded.
		pub body: String,
	}
	impl RecordedRequest {
		/// First value of `name` (case-insensitive).
		pub fn header(&self, name: &str) -> Option<String> {
			self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone())
		}
	}

	#[derive(Debug, Default)]
	struct Script {
		responses: VecDeque<(u16, String)>,
		requests: Vec<RecordedRequest>,
	}

	/// Transport replaying canned responses in order and recording every request.
	///
	/// Running out of responses is a network error.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedTransport(Arc<Mutex<Script>>);
	impl ScriptedTransport {
		/// Queues `(status, body)` responses.
		pub fn new<'a>(responses: impl IntoIterator<Item = (u16, &'a str)>) -> Self {
			let script = Script {
				responses: responses.into_iter().map(|(status, body)| (status, body.into())).collect(),
				requests: Vec::new(),
			};

			Self(Arc::new(Mutex::new(script)))
		}

		/// Requests seen so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.0.lock().requests.clone()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				let uri = request.uri().to_string();
				let headers = request
					.headers()
					.iter()
					.map(|(k, v)| {
						(k.as_str().to_owned(), String::from_utf8_lossy(v.as_bytes()).into_owned())
					})
					.collect();
				let recorded = RecordedRequest {
					method: request.method().as_str().to_owned(),
					uri: uri.clone(),
					authorization: request
						.headers()
						.get(AUTHORIZATION)
						.and_then(|v| v.to_str().ok())
						.map(ToOwned::to_owned),
					headers,
					body: String::from_utf8_lossy(request.body()).into_owned(),
				};
				let mut script = self.0.lock();

				script.requests.push(recorded);

				let (status, body) = script.responses.pop_front().ok_or_else(|| {
					TransportError::network(&uri, io::Error::other("no scripted response left"))
				})?;
				let mut response = HttpResponse::new(body.into_bytes());

				*response.status_mut() = StatusCode::from_u16(status)
					.map_err(|e| TransportError::network(&uri, e))?;

				Ok(response)
			})
		}
	}

	/// Presenter remembering every URL instead of showing it.
	#[derive(Clone, Debug, Default)]
	pub struct RecordingPresenter(Arc<Mutex<Vec<Url>>>);
	impl RecordingPresenter {
		/// URLs presented so far.
		pub fn presented(&self) -> Vec<Url> {
			self.0.lock().clone()
		}
	}
	impl UrlPresenter for RecordingPresenter {
		fn present(&self, url: &Url) -> Result<(), LaunchError> {
			self.0.lock().push(url.clone());

			Ok(())
		}
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
// Used only by the binary.
use {clap as _, color_eyre as _, tracing_subscriber as _};
#[cfg(test)] use httpmock as _;
