//! Transport primitives for the request executor.
//!
//! [`RequestOptions`] models the mergeable per-call options every API call goes through,
//! and [`HttpTransport`] abstracts the HTTP stack so the credential machinery stays
//! transport agnostic. The reqwest-backed [`ReqwestTransport`] ships behind the default
//! `reqwest` feature; bring-your-own stacks implement [`HttpTransport`] directly.

// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + 'a + Send>>;

/// HTTP verbs used by the client core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
	/// GET request.
	Get,
	/// POST request.
	Post,
}

/// Mergeable request options applied to every outbound call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
	/// Per-attempt timeout bounding one HTTP request. There is no cross-call deadline
	/// spanning an entire call chain; retries are bounded by count, not wall clock.
	pub timeout: Option<Duration>,
	/// Headers sent with the request.
	pub headers: BTreeMap<String, String>,
}
impl RequestOptions {
	/// Creates empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the per-attempt timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Adds one header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Merges `self` over `defaults`: scalar options fall back to the default when unset,
	/// while the header map is merged key by key with `self` winning on conflicts.
	pub fn merged_over(&self, defaults: &Self) -> Self {
		let mut headers = defaults.headers.clone();

		headers.extend(self.headers.iter().map(|(name, value)| (name.clone(), value.clone())));

		Self { timeout: self.timeout.or(defaults.timeout), headers }
	}
}

/// One fully prepared HTTP request ready for a transport.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
	/// HTTP verb.
	pub method: HttpMethod,
	/// Absolute request URL.
	pub url: Url,
	/// Request body, when present.
	pub body: Option<Vec<u8>>,
	/// Content type declared for the body.
	pub content_type: Option<String>,
	/// Per-call options; the client merges these over its defaults before dispatch.
	pub options: RequestOptions,
}
impl PreparedRequest {
	/// Builds a body-less GET request.
	pub fn get(url: Url) -> Self {
		Self {
			method: HttpMethod::Get,
			url,
			body: None,
			content_type: None,
			options: RequestOptions::default(),
		}
	}

	/// Builds a POST request carrying a JSON body.
	pub fn post_json(url: Url, body: Vec<u8>) -> Self {
		Self {
			method: HttpMethod::Post,
			url,
			body: Some(body),
			content_type: Some("application/json".into()),
			options: RequestOptions::default(),
		}
	}

	/// Replaces the per-call options.
	pub fn with_options(mut self, options: RequestOptions) -> Self {
		self.options = options;

		self
	}
}

/// Raw transport response: status, declared content type, and body bytes.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Declared `content-type` header value, when present.
	pub content_type: Option<String>,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Returns `true` when the declared content type is JSON (parameters ignored).
	pub fn is_json(&self) -> bool {
		self.content_type
			.as_deref()
			.and_then(|value| value.split(';').next())
			.is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
	}
}

/// Response payload classified by content type: JSON documents are parsed and
/// errcode-checked, anything else is handed back as raw bytes (media downloads).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiPayload {
	/// Parsed JSON document whose application error code was already checked.
	Json(Value),
	/// Raw binary body together with its declared content type.
	Binary {
		/// Declared `content-type` header value, when present.
		content_type: Option<String>,
		/// Body bytes, verbatim.
		bytes: Vec<u8>,
	},
}
impl ApiPayload {
	/// Returns the parsed JSON document, when this payload is one.
	pub fn as_json(&self) -> Option<&Value> {
		match self {
			Self::Json(value) => Some(value),
			Self::Binary { .. } => None,
		}
	}

	/// Returns the raw bytes, when this payload is binary.
	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			Self::Json(_) => None,
			Self::Binary { bytes, .. } => Some(bytes),
		}
	}
}

/// Abstraction over HTTP stacks capable of executing prepared requests.
///
/// The trait is the core's only dependency on an HTTP implementation. It performs no
/// credential logic and serves both the token exchange and authenticated endpoint calls.
/// Implementations must be `Send + Sync + 'static` so one transport can be shared across
/// clients, and the futures they return must be `Send` so wrapped calls can be boxed
/// without borrowing the transport.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes one HTTP attempt, honoring the timeout and headers carried by `request`.
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let PreparedRequest { method, url, body, content_type, options } = request;
			let mut builder = match method {
				HttpMethod::Get => client.get(url),
				HttpMethod::Post => client.post(url),
			};

			if let Some(timeout) =
				options.timeout.and_then(|value| std::time::Duration::try_from(value).ok())
			{
				builder = builder.timeout(timeout);
			}

			for (name, value) in &options.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}

			if let Some(content_type) = &content_type {
				builder = builder.header(reqwest::header::CONTENT_TYPE, content_type.as_str());
			}

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let content_type = response
				.headers()
				.get(reqwest::header::CONTENT_TYPE)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(RawResponse { status, content_type, body })
		})
	}
}
