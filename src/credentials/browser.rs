//! Opening the authorization URL in the user's browser.

// std
use std::io::{self, ErrorKind, Write};
// self
use crate::_prelude::*;

/// Opens URLs in a user agent.
pub trait BrowserLauncher
where
	Self: Send + Sync,
{
	/// Opens `url`.
	fn open(&self, url: &Url) -> io::Result<()>;
}

/// Launches the platform's default browser.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBrowser;
impl BrowserLauncher for SystemBrowser {
	fn open(&self, url: &Url) -> io::Result<()> {
		let url = sanitize(url)?;

		open::that(url.as_str())
	}
}

/// Accepts only `http` and `https` URLs.
pub fn sanitize(url: &Url) -> io::Result<&Url> {
	match url.scheme() {
		"http" | "https" => Ok(url),
		scheme => Err(io::Error::new(
			ErrorKind::InvalidInput,
			format!("Refusing to open a URL with scheme {scheme}."),
		)),
	}
}

/// Opens `url`, falling back to printing it for manual use.
pub(crate) fn launch_or_print(browser: &dyn BrowserLauncher, url: &Url) {
	match browser.open(url) {
		Ok(()) => tracing::info!("Opened the authorization URL in the browser."),
		Err(e) => {
			tracing::warn!(error = %e, %url, "Failed to open the browser.");

			let _ = writeln!(
				io::stderr().lock(),
				"Please authorize this client by visiting:\n{url}"
			);
		},
	}
}
