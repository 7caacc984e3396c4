//! Client-level error types shared across the credential, transport, and extension layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response arrived over a healthy transport but could not be decoded.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Remote service reported an in-band application error code.
	#[error(transparent)]
	Api(#[from] ApiError),
}
impl Error {
	/// Returns `true` when the remote service rejected the presented credential mid-call,
	/// the one condition that triggers the interceptor's single retry.
	pub fn is_credential_rejected(&self) -> bool {
		matches!(self, Self::Api(api) if api.is_credential_rejected())
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Base URL prefix could not be parsed.
	#[error("Base URL prefix is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoint path cannot be joined onto the base URL prefix.
	#[error("Endpoint path `{path}` is invalid.")]
	InvalidEndpoint {
		/// Path that failed to join.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// No credential store was supplied at build time.
	#[error(
		"A credential store is required; call `single_process_store` to opt into the in-memory one."
	)]
	MissingStore,
	/// Extension method name collides with a core method or an existing extension.
	#[error("Method `{name}` is already defined.")]
	MethodCollision {
		/// Colliding method name.
		name: String,
	},
	/// No extension method is registered under the requested name.
	#[error("Method `{name}` is not registered.")]
	UnknownMethod {
		/// Requested method name.
		name: String,
	},
	/// Outbound request body could not be serialized.
	#[error("Request body could not be serialized to JSON.")]
	RequestBody {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
}

/// Decode failures for responses that arrived over a healthy transport.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Response body was expected to be JSON but failed to parse.
	#[error("Response body is not valid JSON.")]
	MalformedJson {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the offending response.
		status: u16,
		/// Raw response body, retained for diagnosis.
		body: String,
	},
	/// Token exchange reported a non-positive credential lifetime.
	#[error("The expires_in value must be positive, got {value}.")]
	NonPositiveExpiresIn {
		/// Lifetime reported by the remote service, in seconds.
		value: i64,
	},
}

/// In-band application failure returned inside an otherwise successful HTTP response.
///
/// Distinguished from transport errors because only [`ApiError::CREDENTIAL_REJECTED`]
/// triggers the single retry; every other code is surfaced immediately, unretried.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Remote service returned error code {code}: {message}.")]
pub struct ApiError {
	/// Numeric application error code.
	pub code: i64,
	/// Human-readable message supplied by the remote service.
	pub message: String,
}
impl ApiError {
	/// Application code signaling that the presented access token was invalidated
	/// server-side (revocation) independent of the locally tracked expiry.
	pub const CREDENTIAL_REJECTED: i64 = 42001;

	/// Returns `true` when this error carries the credential-rejected code.
	pub fn is_credential_rejected(&self) -> bool {
		self.code == Self::CREDENTIAL_REJECTED
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the remote service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the remote service.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
