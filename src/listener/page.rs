//! HTML served by the callback listener: the closing page, error pages, and the demo page.

// self
use crate::{_prelude::*, listener::LandingStatus};

/// Served after a verifier is received; the browser closes the tab a second later.
pub const CLOSING_PAGE: &str = "<html>
<head><title>OAuth Authentication Token Received</title></head>
<body>
Received verifier token. Closing...
<script type='text/javascript'>
window.setTimeout(function() {
    window.open('', '_self', ''); window.close(); }, 1000);
</script>
</body>
</html>
";

/// Served when a callback lacks its correlation token or verifier.
pub const INCOMPLETE_PAGE: &str = "<html>
<head><title>Incomplete OAuth Callback</title></head>
<body>The callback did not carry a token and a verifier.</body>
</html>
";

/// Served when the provider redirects with an `error` parameter.
pub fn denied(error: &str) -> String {
	format!(
		"<html>
<head><title>Authorization Denied</title></head>
<body>The provider reported: {}. You can close this window.</body>
</html>
",
		escape(error)
	)
}

/// Demo landing page: a link to the current authorization URL plus the last outcome.
pub fn demo(authorization_url: Option<&Url>, status: Option<LandingStatus>) -> String {
	let link = match authorization_url {
		Some(url) => {
			let href = escape(url.as_str());

			format!("<p><a href=\"{href}\">Authorize oacurl</a></p>")
		},
		None => "<p>No authorization URL yet.</p>".into(),
	};
	let status = match status {
		Some(status) => format!("<p>Last token: <strong>{status}</strong></p>"),
		None => String::new(),
	};

	format!(
		"<html>
<head><title>oacurl demo</title></head>
<body>
{link}
{status}
</body>
</html>
"
	)
}

fn escape(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for c in raw.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(c),
		}
	}

	out
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn demo_page_escapes_the_link_and_shows_status() {
		let url = Url::parse("https://example.com/authorize?a=1&b=2").expect("Fixture URL should parse.");
		let html = demo(Some(&url), Some(LandingStatus::Invalid));

		assert!(html.contains("href=\"https://example.com/authorize?a=1&amp;b=2\""));
		assert!(html.contains("INVALID"));
		assert!(denied("<script>").contains("&lt;script&gt;"));
	}
}
