//! HTTP transport seam shared by the lock probe, the bridge poller, and the notify POST.
//!
//! Requests and responses use the `http` types re-exported by `oauth2`, so the same client can be
//! handed to the OAuth protocol layer. Every call carries its own timeout; implementations map an
//! elapsed timeout to [`TransportError::Timeout`].

// crates.io
use oauth2::{
	HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`AuthHttpClient::execute`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports used by the coordination flows.
///
/// Implementations must be `Send + Sync + 'static` so one client can be shared between the lock
/// probe, strategies, and the credential store behind an `Arc`.
pub trait AuthHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Executes `request`, failing with [`TransportError::Timeout`] once `timeout` elapses.
	///
	/// Non-2xx statuses are returned as responses, never as errors.
	fn execute(&self, request: HttpRequest, timeout: Duration) -> HttpFuture<'_>;
}

/// Builds a body-less `GET` request.
pub fn get_request(url: &Url, accept: Option<&str>) -> Result<HttpRequest, ConfigError> {
	let mut builder = Request::builder().method(Method::GET).uri(url.as_str());

	if let Some(accept) = accept {
		builder = builder.header(ACCEPT, accept);
	}

	Ok(builder.body(Vec::new())?)
}

/// Builds a `POST` request carrying `payload` as JSON.
pub fn post_json_request<T>(url: &Url, payload: &T) -> Result<HttpRequest, ConfigError>
where
	T: Serialize + ?Sized,
{
	let body = serde_json::to_vec(payload)
		.map_err(|source| ConfigError::RequestBody { source })?;

	Ok(Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, "application/json")
		.body(body)?)
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl AuthHttpClient for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest, timeout: Duration) -> HttpFuture<'_> {
		Box::pin(async move {
			let mut request: reqwest::Request = request.try_into()?;

			*request.timeout_mut() = Some(timeout);

			let response = self.0.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Default shared client for the enabled transport.
#[cfg(feature = "reqwest")]
pub fn default_client() -> Arc<dyn AuthHttpClient> {
	Arc::new(ReqwestHttpClient::default())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn get_request_sets_accept_header() {
		let url = Url::parse("https://bridge.example.com/poll?session=1").expect("URL should parse.");
		let request =
			get_request(&url, Some("application/json, text/plain")).expect("Request should build.");

		assert_eq!(request.method(), Method::GET);
		assert_eq!(request.uri().to_string(), "https://bridge.example.com/poll?session=1");
		assert_eq!(
			request.headers().get(ACCEPT).and_then(|value| value.to_str().ok()),
			Some("application/json, text/plain")
		);
		assert!(request.body().is_empty());
	}

	#[test]
	fn post_json_request_encodes_body() {
		let url = Url::parse("https://bridge.example.com/notify").expect("URL should parse.");
		let request = post_json_request(&url, &serde_json::json!({ "type": "ping" }))
			.expect("Request should build.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(
			request.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok()),
			Some("application/json")
		);
		assert_eq!(request.body().as_slice(), br#"{"type":"ping"}"#);
	}
}
