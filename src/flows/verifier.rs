//! Verifier channels: the callback listener or a console prompt.

// std
use std::{
	io::{self, BufRead, BufReader, Write},
	time::Duration as StdDuration,
};
// self
use crate::{
	_prelude::*,
	auth::CorrelationToken,
	listener::{CallbackListener, LandingStatus, ListenerConfig, PendingVerifiers, WaitOutcome},
};

/// Prompt printed before reading a pasted verifier.
pub const PROMPT: &str = "Verification token: ";

type SharedInput = Arc<Mutex<Box<dyn BufRead + Send>>>;

/// Reads pasted verifiers line by line, skipping blank lines.
#[derive(Clone)]
pub struct ConsoleVerifier {
	input: SharedInput,
	echo_prompt: bool,
}
impl ConsoleVerifier {
	/// Reads from standard input and prompts on standard error.
	pub fn stdin() -> Self {
		Self { input: Arc::new(Mutex::new(Box::new(BufReader::new(io::stdin())))), echo_prompt: true }
	}

	/// Reads from `input` without prompting.
	pub fn from_reader(input: impl 'static + BufRead + Send) -> Self {
		Self { input: Arc::new(Mutex::new(Box::new(input))), echo_prompt: false }
	}

	/// Blocks until a non-empty line arrives. `None` means end of input.
	pub fn read(&self) -> io::Result<Option<String>> {
		if self.echo_prompt {
			let mut stderr = io::stderr().lock();

			write!(stderr, "{PROMPT}")?;
			stderr.flush()?;
		}

		let mut input = self.input.lock();
		let mut line = String::new();

		loop {
			line.clear();

			if input.read_line(&mut line)? == 0 {
				return Ok(None);
			}

			let trimmed = line.trim();

			if !trimmed.is_empty() {
				return Ok(Some(trimmed.to_owned()));
			}
		}
	}
}
impl Debug for ConsoleVerifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConsoleVerifier").field("echo_prompt", &self.echo_prompt).finish()
	}
}

/// What one wait on a verifier channel produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifierReading {
	/// A verifier for the awaited attempt.
	Verifier(String),
	/// The listener wait timed out.
	TimedOut,
	/// The wait was interrupted.
	Interrupted,
	/// The console reached end of input.
	Closed,
}
impl From<WaitOutcome> for VerifierReading {
	fn from(outcome: WaitOutcome) -> Self {
		match outcome {
			WaitOutcome::Verifier(verifier) => Self::Verifier(verifier),
			WaitOutcome::TimedOut => Self::TimedOut,
			WaitOutcome::Interrupted => Self::Interrupted,
		}
	}
}

/// Verifier channel chosen at login start.
#[derive(Debug)]
pub enum VerifierChannel {
	/// Local callback listener.
	Listener(CallbackListener),
	/// Console prompt.
	Console(ConsoleVerifier),
}
impl VerifierChannel {
	/// Creates a listener channel; the listener is started by the orchestrator.
	pub fn listener(config: ListenerConfig) -> Self {
		Self::Listener(CallbackListener::new(config))
	}

	/// The listener, when this channel has one.
	pub fn as_listener(&self) -> Option<&CallbackListener> {
		match self {
			Self::Listener(listener) => Some(listener),
			Self::Console(_) => None,
		}
	}

	/// Mutable access to the listener, when this channel has one.
	pub fn as_listener_mut(&mut self) -> Option<&mut CallbackListener> {
		match self {
			Self::Listener(listener) => Some(listener),
			Self::Console(_) => None,
		}
	}

	/// Shared map an interrupt handle can wake.
	pub fn pending(&self) -> Option<PendingVerifiers> {
		self.as_listener().map(CallbackListener::pending)
	}

	/// Records the status shown on the demo page.
	pub fn set_token_status(&self, status: LandingStatus) {
		if let Some(listener) = self.as_listener() {
			listener.set_token_status(status);
		}
	}

	/// Waits for the verifier of `token` on a blocking thread.
	pub async fn receive(
		&self,
		token: &CorrelationToken,
		timeout: Option<StdDuration>,
	) -> Result<VerifierReading> {
		match self {
			Self::Listener(listener) => {
				// Fails early when the listener is not running.
				listener.local_addr()?;

				let pending = listener.pending();
				let token = token.to_string();
				let outcome =
					tokio::task::spawn_blocking(move || pending.wait(&token, timeout))
						.await
						.map_err(|e| Error::aborted(format!("verifier wait failed: {e}")))?;

				Ok(outcome.into())
			},
			Self::Console(console) => {
				let console = console.clone();
				let line = tokio::task::spawn_blocking(move || console.read())
					.await
					.map_err(|e| Error::aborted(format!("console read failed: {e}")))?
					.map_err(crate::error::TransportError::from)?;

				Ok(line.map_or(VerifierReading::Closed, VerifierReading::Verifier))
			},
		}
	}
}
