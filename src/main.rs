//! `oacurl` command-line entry point.

// std
use std::{
	ffi::OsString,
	io,
	path::PathBuf,
	process::ExitCode,
	sync::Arc,
	time::Duration as StdDuration,
};
// crates.io
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Report;
use oacurl::{
	auth::{ProtocolVersion, ScopeList},
	config::{
		BodySource, ConsumerSource, FetchRequest, LoginConfig, RelatedPart, VerifierSource,
		parse_header, parse_method, parse_param,
	},
	error::{ConfigError, Error},
	ext::{BrowserLauncher, PrintUrl, UrlPresenter},
	flows::{self, Fetch, Login, LoginOutcome},
	http::{HttpTransport, ReqwestTransport},
	listener::ListenerConfig,
	provider::ServiceProvider,
	store::{CredentialStore, FileStore},
	url::Url,
};
use oauth2::http::Method;
use tracing_subscriber::EnvFilter;

const SUBCOMMANDS: &[&str] = &["login", "fetch", "help"];
const INFO_FLAGS: &[&str] = &["-h", "--help", "-V", "--version"];
// Flags that may precede the first positional and take a separate value.
const VALUE_FLAGS: &[&str] = &[
	"--access-file",
	"-X",
	"--request",
	"-H",
	"--header",
	"-t",
	"--content-type",
	"-f",
	"--file",
	"--related",
];

/// curl-like access to OAuth-protected resources.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	#[command(flatten)]
	common: CommonArgs,
	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Args)]
struct CommonArgs {
	/// Credential file (default: $HOME/.oacurl.toml).
	#[arg(long, global = true, value_name = "FILE")]
	access_file: Option<PathBuf>,
	/// Accept invalid TLS certificates and host names.
	#[arg(long, global = true)]
	insecure: bool,
	/// Debug logging and full error reports.
	#[arg(short, long, global = true)]
	verbose: bool,
	/// Log HTTP traffic.
	#[arg(long, global = true)]
	wirelog: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Authorize oacurl and store the credential.
	Login(LoginArgs),
	/// Send one request authorized with the stored credential.
	Fetch(FetchArgs),
}

#[derive(Debug, Args)]
struct LoginArgs {
	/// Use OAuth 1.0a (default).
	#[arg(short = '1', long = "oauth1.0a", conflicts_with_all = ["wrap", "oauth2"])]
	oauth1: bool,
	/// Use OAuth WRAP.
	#[arg(long, conflicts_with = "oauth2")]
	wrap: bool,
	/// Use OAuth 2.0.
	#[arg(short = '2', long)]
	oauth2: bool,
	/// Built-in provider (GOOGLE, BUZZ, LATITUDE) or a provider TOML file.
	#[arg(short = 'p', long, value_name = "PROVIDER")]
	service_provider: Option<String>,
	/// Use the Buzz provider defaults.
	#[arg(long, conflicts_with_all = ["service_provider", "latitude"])]
	buzz: bool,
	/// Use the Latitude provider defaults.
	#[arg(long, conflicts_with = "service_provider")]
	latitude: bool,
	/// TOML file with `consumerKey` and `consumerSecret`.
	#[arg(short, long, value_name = "FILE")]
	consumer: Option<PathBuf>,
	/// Consumer key; overrides the consumer file.
	#[arg(long)]
	consumer_key: Option<String>,
	/// Consumer secret; overrides the consumer file.
	#[arg(long)]
	consumer_secret: Option<String>,
	/// Comma-separated scopes or aliases (BUZZ, BUZZ_READONLY, LATITUDE, PICASAWEB).
	#[arg(short, long = "scope", value_name = "SCOPES")]
	scopes: Vec<String>,
	/// Browser program to open the authorization URL with.
	#[arg(short, long, value_name = "COMMAND", conflicts_with = "nobrowser")]
	browser: Option<String>,
	/// Print the authorization URL instead of opening a browser.
	#[arg(long)]
	nobrowser: bool,
	/// Read the verifier from standard input instead of running the callback listener.
	#[arg(long)]
	noserver: bool,
	/// Repeat the dance against the local demo page until interrupted.
	#[arg(long, conflicts_with = "noserver")]
	demo: bool,
	/// Host for the callback listener.
	#[arg(long)]
	host: Option<String>,
	/// Extra authorization URL parameter.
	#[arg(short = 'P', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
	params: Vec<(String, String)>,
	/// Icon shown on the authorization page.
	#[arg(long, value_name = "URL")]
	icon_url: Option<String>,
	/// Callback URL overriding the listener's.
	#[arg(long, value_name = "URL")]
	callback: Option<String>,
	/// Seconds to wait for the verifier before giving up.
	#[arg(long, value_name = "SECS")]
	timeout: Option<u64>,
}
impl LoginArgs {
	fn version(&self) -> ProtocolVersion {
		if self.oauth2 {
			ProtocolVersion::V2
		} else if self.wrap {
			ProtocolVersion::Wrap
		} else {
			ProtocolVersion::V1
		}
	}

	fn provider(&self) -> Result<ServiceProvider, ConfigError> {
		if self.buzz {
			return Ok(ServiceProvider::named("BUZZ")?);
		}
		if self.latitude {
			return Ok(ServiceProvider::named("LATITUDE")?);
		}

		ServiceProvider::load(self.service_provider.as_deref().unwrap_or("GOOGLE"))
	}

	fn config(&self) -> Result<LoginConfig, ConfigError> {
		let version = self.version();
		let provider = self.provider()?;
		let consumer = ConsumerSource {
			key: self.consumer_key.clone(),
			secret: self.consumer_secret.clone(),
			file: self.consumer.clone(),
		}
		.resolve(&provider, version)?;
		let scopes = ScopeList::new(&self.scopes).map_err(|e| ConfigError::InvalidOption {
			option: "--scope",
			value: e.to_string(),
			reason: "scopes must be non-empty and contain no whitespace",
		})?;
		let verifier = if self.noserver {
			VerifierSource::Console
		} else {
			VerifierSource::Listener(
				self.host.clone().map(|host| ListenerConfig { host }).unwrap_or_default(),
			)
		};
		let mut config = LoginConfig::new(version, provider, consumer)
			.with_scopes(scopes)
			.with_verifier(verifier)
			.with_demo(self.demo);

		for (key, value) in &self.params {
			config = config.with_param(key, value);
		}
		if let Some(icon_url) = &self.icon_url {
			config = config.with_icon_url(icon_url);
		}
		if let Some(callback) = &self.callback {
			config = config.with_callback(callback);
		}
		if let Some(timeout) = self.timeout {
			config = config.with_timeout(StdDuration::from_secs(timeout));
		}

		Ok(config)
	}

	fn presenter(&self) -> Box<dyn UrlPresenter> {
		match (&self.browser, self.nobrowser) {
			(_, true) => Box::new(PrintUrl),
			(Some(command), false) => Box::new(BrowserLauncher::with_command(command)),
			(None, false) => Box::new(BrowserLauncher::system()),
		}
	}
}

#[derive(Debug, Args)]
struct FetchArgs {
	/// HTTP method: GET, POST, PUT, or DELETE.
	#[arg(short = 'X', long = "request", value_name = "METHOD", value_parser = parse_method)]
	method: Option<Method>,
	/// Extra request header.
	#[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
	headers: Vec<(String, String)>,
	/// Body content type (or ATOM, XML, JSON, CSV, TEXT).
	#[arg(short = 't', long, value_name = "TYPE")]
	content_type: Option<String>,
	/// Read the body from this file instead of standard input.
	#[arg(short, long, value_name = "FILE", conflicts_with = "related")]
	file: Option<PathBuf>,
	/// Body part for a multipart/related request.
	#[arg(long, value_name = "TYPE:PATH")]
	related: Vec<RelatedPart>,
	/// Print the status line and headers before the body.
	#[arg(short, long)]
	include: bool,
	/// Resource URL.
	url: Url,
}
impl FetchArgs {
	fn request(&self) -> FetchRequest {
		let mut request = FetchRequest::get(self.url.clone()).with_include(self.include);

		if let Some(method) = &self.method {
			request = request.with_method(method.clone());
		}
		if let Some(content_type) = &self.content_type {
			request = request.with_content_type(content_type);
		}
		for (name, value) in &self.headers {
			request = request.with_header(name, value);
		}
		if request.body != BodySource::Empty {
			if let Some(file) = &self.file {
				request = request.with_body(BodySource::File(file.clone()));
			} else if !self.related.is_empty() {
				request = request.with_body(BodySource::Related(self.related.clone()));
			}
		}

		request
	}
}

fn main() -> ExitCode {
	let cli = Cli::parse_from(legacy_args(std::env::args_os()));

	if let Err(e) = color_eyre::install() {
		eprintln!("{e}");
	}

	init_tracing(&cli.common);

	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(e) => {
			eprintln!("Failed to start the async runtime: {e}");

			return ExitCode::FAILURE;
		},
	};
	let verbose = cli.common.verbose;
	let result = runtime.block_on(run(cli));

	// A console read may still be blocked on stdin.
	runtime.shutdown_background();

	match result {
		Ok(code) => ExitCode::from(code),
		Err(e) => {
			let code = e.exit_code();

			if verbose {
				eprintln!("{:?}", Report::new(e));
			} else {
				eprintln!("oacurl: {e}");
			}

			ExitCode::from(code)
		},
	}
}

/// `oacurl <url>` predates the subcommands and still means `oacurl fetch <url>`.
fn legacy_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
	let mut args = args.into_iter().collect::<Vec<_>>();
	let mut rest = args.iter().skip(1).map(|arg| arg.to_str().unwrap_or_default());
	let mut known = args.len() < 2;

	// Global flags may precede the subcommand (`oacurl -v login`); option values are skipped
	// so `oacurl -f login <url>` still means fetch.
	while let Some(arg) = rest.next() {
		if INFO_FLAGS.contains(&arg) {
			known = true;

			break;
		}
		if !arg.starts_with('-') {
			known = SUBCOMMANDS.contains(&arg);

			break;
		}
		if VALUE_FLAGS.contains(&arg) {
			rest.next();
		}
	}

	if !known {
		args.insert(1, "fetch".into());
	}

	args
}

fn init_tracing(common: &CommonArgs) {
	let mut directives = String::from(if common.verbose { "oacurl=debug" } else { "oacurl=warn" });

	if common.wirelog {
		directives.push_str(",reqwest=trace,hyper=debug");
	}

	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

async fn run(cli: Cli) -> Result<u8, Error> {
	let path = cli.common.access_file.clone().unwrap_or_else(FileStore::default_path);
	let store: Arc<dyn CredentialStore> = Arc::new(FileStore::new(&path));
	let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(cli.common.insecure)?);

	match cli.command {
		Command::Login(args) => login(&args, transport, store).await,
		Command::Fetch(args) => fetch(&args, transport, store, path).await.map(|()| 0),
	}
}

async fn login(
	args: &LoginArgs,
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn CredentialStore>,
) -> Result<u8, Error> {
	let mut login = Login::new(args.config()?, transport, store)?.with_presenter(args.presenter());
	let interrupt = login.interrupt_handle();
	let outcome = tokio::select! {
		outcome = login.run() => outcome?,
		_ = tokio::signal::ctrl_c() => {
			interrupt.interrupt();

			return Err(Error::Aborted { reason: "interrupted".into() });
		},
	};

	match &outcome {
		LoginOutcome::Authorized(credential) => {
			tracing::info!(version = %credential.version, "Credential stored.");
		},
		LoginOutcome::Rejected { reason } => {
			eprintln!("oacurl: verification rejected: {reason}");
		},
	}

	Ok(outcome.exit_code())
}

async fn fetch(
	args: &FetchArgs,
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn CredentialStore>,
	path: PathBuf,
) -> Result<(), Error> {
	let request = args.request();
	let response = Fetch::new(transport, store, path).execute(&request).await?;
	let mut stdout = io::stdout().lock();

	flows::write_response(&response, request.include, &mut stdout)
		.map_err(oacurl::error::TransportError::from)?;

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn args(raw: &[&str]) -> Vec<OsString> {
		raw.iter().map(OsString::from).collect()
	}

	#[test]
	fn bare_urls_are_fetches() {
		assert_eq!(
			legacy_args(args(&["oacurl", "https://example.com/feed"])),
			args(&["oacurl", "fetch", "https://example.com/feed"])
		);
		assert_eq!(
			legacy_args(args(&["oacurl", "-X", "DELETE", "https://example.com/item"])),
			args(&["oacurl", "fetch", "-X", "DELETE", "https://example.com/item"])
		);
		assert_eq!(legacy_args(args(&["oacurl", "login", "--wrap"])), args(&["oacurl", "login", "--wrap"]));
		assert_eq!(legacy_args(args(&["oacurl"])), args(&["oacurl"]));
		assert_eq!(
			legacy_args(args(&["oacurl", "-v", "login", "-2"])),
			args(&["oacurl", "-v", "login", "-2"])
		);
		assert_eq!(legacy_args(args(&["oacurl", "--help"])), args(&["oacurl", "--help"]));
		assert_eq!(
			legacy_args(args(&["oacurl", "-f", "login", "https://example.com/item"])),
			args(&["oacurl", "fetch", "-f", "login", "https://example.com/item"])
		);
		assert_eq!(
			legacy_args(args(&["oacurl", "--access-file", "a.toml", "fetch", "https://example.com/"])),
			args(&["oacurl", "--access-file", "a.toml", "fetch", "https://example.com/"])
		);
	}

	#[test]
	fn login_flags_build_the_config() {
		let cli = Cli::try_parse_from(legacy_args(args(&[
			"oacurl",
			"login",
			"--wrap",
			"--buzz",
			"--noserver",
			"-s",
			"BUZZ_READONLY,https://example.com/extra",
			"-P",
			"hd=example.com",
			"--timeout",
			"5",
		])))
		.expect("Login flags should parse.");
		let Command::Login(login) = cli.command else {
			panic!("Expected the login subcommand.");
		};
		let config = login.config().expect("Config should build.");

		assert_eq!(config.version, ProtocolVersion::Wrap);
		assert_eq!(config.verifier, VerifierSource::Console);
		assert_eq!(config.scopes.iter().count(), 2);
		assert_eq!(config.params, vec![("hd".to_owned(), "example.com".to_owned())]);
		assert_eq!(config.timeout, Some(StdDuration::from_secs(5)));
		assert!(config.consumer.is_anonymous());
	}

	#[test]
	fn conflicting_versions_are_rejected() {
		assert!(Cli::try_parse_from(args(&["oacurl", "login", "--wrap", "-2"])).is_err());
		assert!(Cli::try_parse_from(args(&["oacurl", "login", "--demo", "--noserver"])).is_err());
	}

	#[test]
	fn fetch_flags_build_the_request() {
		let cli = Cli::try_parse_from(legacy_args(args(&[
			"oacurl",
			"-X",
			"put",
			"-t",
			"JSON",
			"-H",
			"X-Trace: 1",
			"-f",
			"body.json",
			"-i",
			"https://example.com/item",
		])))
		.expect("Fetch flags should parse.");
		let Command::Fetch(fetch) = cli.command else {
			panic!("Expected the fetch subcommand.");
		};
		let request = fetch.request();

		assert_eq!(request.method, Method::PUT);
		assert_eq!(request.content_type, "application/json");
		assert_eq!(request.headers, vec![("X-Trace".to_owned(), "1".to_owned())]);
		assert_eq!(request.body, BodySource::File("body.json".into()));
		assert!(request.include);
	}

	#[test]
	fn get_ignores_body_flags() {
		let cli = Cli::try_parse_from(args(&[
			"oacurl",
			"fetch",
			"--related",
			"ATOM:entry.xml",
			"https://example.com/feed",
		]))
		.expect("Fetch flags should parse.");
		let Command::Fetch(fetch) = cli.command else {
			panic!("Expected the fetch subcommand.");
		};

		assert_eq!(fetch.request().body, BodySource::Empty);
	}
}
