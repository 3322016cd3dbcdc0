//! Presenting the authorization URL: print it, or open it in a browser.

// std
use std::{
	io::{self, Write},
	process::Command,
};
// self
use crate::_prelude::*;

/// Failure to show the authorization URL to the user.
#[derive(Debug, ThisError)]
pub enum LaunchError {
	/// No browser could be started.
	#[error(
		"Failed to open a browser ({message}). Specify a browser with --browser or use --nobrowser to print the URL."
	)]
	Browser {
		/// Launcher message.
		message: String,
	},
	/// Writing the URL to standard output failed.
	#[error("Failed to print the authorization URL.")]
	Print(#[from] io::Error),
}

/// Shows a URL to the user exactly once per login session.
pub trait UrlPresenter
where
	Self: Send + Sync,
{
	/// Presents `url`.
	fn present(&self, url: &Url) -> Result<(), LaunchError>;
}
impl<T> UrlPresenter for Box<T>
where
	T: ?Sized + UrlPresenter,
{
	fn present(&self, url: &Url) -> Result<(), LaunchError> {
		(**self).present(url)
	}
}

/// Prints the URL on standard output (`--nobrowser`).
#[derive(Clone, Copy, Debug, Default)]
pub struct PrintUrl;
impl UrlPresenter for PrintUrl {
	fn present(&self, url: &Url) -> Result<(), LaunchError> {
		let mut stdout = io::stdout().lock();

		writeln!(stdout, "{url}")?;
		stdout.flush()?;

		Ok(())
	}
}

/// Opens the URL in the system browser, or in `command` when one is configured.
#[derive(Clone, Debug, Default)]
pub struct BrowserLauncher {
	command: Option<String>,
}
impl BrowserLauncher {
	/// Uses the platform default browser.
	pub fn system() -> Self {
		Self::default()
	}

	/// Runs `command <url>` instead of the platform default.
	pub fn with_command(command: impl Into<String>) -> Self {
		Self { command: Some(command.into()) }
	}
}
impl UrlPresenter for BrowserLauncher {
	fn present(&self, url: &Url) -> Result<(), LaunchError> {
		tracing::info!(%url, "Redirecting to authorization URL.");

		let outcome = match &self.command {
			Some(command) => Command::new(command).arg(url.as_str()).spawn().map(|_| ()),
			None => webbrowser::open(url.as_str()),
		};

		outcome.map_err(|e| {
			tracing::warn!(%url, "Browser launch failed; open the URL manually.");

			LaunchError::Browser { message: e.to_string() }
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn missing_browser_command_suggests_fallbacks() {
		let url = Url::parse("https://example.com/authorize").expect("Fixture URL should parse.");
		let err = BrowserLauncher::with_command("/definitely/not/a/browser")
			.present(&url)
			.expect_err("A missing browser executable must fail.");
		let message = err.to_string();

		assert!(message.contains("--browser"));
		assert!(message.contains("--nobrowser"));
	}
}
