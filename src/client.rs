//! Client core: token manager, request executor, call interceptor, and configuration.

// self
use crate::{
	_prelude::*,
	auth::AccessCredential,
	error::{ApiError, ConfigError, ProtocolError},
	ext::{EndpointMethod, MethodTable},
	http::{ApiPayload, HttpTransport, PreparedRequest, RawResponse, RequestOptions},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{CredentialStore, MemoryStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Default base URL prefix for the WeCom HTTP API.
pub const DEFAULT_BASE_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin/";

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = Client<ReqwestTransport>;

/// Marks whether a call chain is on its first attempt or its single permitted retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CallAttempt {
	Initial,
	Retried,
}
impl CallAttempt {
	fn is_initial(self) -> bool {
		matches!(self, Self::Initial)
	}
}

/// Successful `gettoken` exchange reply.
#[derive(Debug, Deserialize)]
struct TokenReply {
	access_token: String,
	expires_in: i64,
}

/// WeCom API client coordinating the credential lifecycle for every call.
///
/// The client owns the transport, the credential store, and the extension method table, so
/// endpoint modules can focus on building requests. Credentials are threaded into wrapped
/// calls as parameters; the only shared mutable state is the default request options.
pub struct Client<C>
where
	C: ?Sized + HttpTransport,
{
	transport: Arc<C>,
	store: Arc<dyn CredentialStore>,
	corp_id: String,
	corp_secret: String,
	agent_id: u64,
	base_url: Url,
	defaults: Arc<RwLock<RequestOptions>>,
	methods: MethodTable<C>,
}
impl<C> Client<C>
where
	C: ?Sized + HttpTransport,
{
	/// Starts a builder using a caller-provided transport.
	pub fn with_transport(
		corp_id: impl Into<String>,
		corp_secret: impl Into<String>,
		agent_id: u64,
		transport: impl Into<Arc<C>>,
	) -> ClientBuilder<C> {
		ClientBuilder {
			corp_id: corp_id.into(),
			corp_secret: corp_secret.into(),
			agent_id,
			base_url: None,
			store: None,
			transport: transport.into(),
			defaults: RequestOptions::default(),
			methods: MethodTable::new(),
		}
	}

	/// Numeric agent identifier this client was configured with.
	pub fn agent_id(&self) -> u64 {
		self.agent_id
	}

	/// Base URL prefix for the remote service.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Replaces the default request options applied to every subsequent call.
	/// Last write wins; defaults are not merged across calls to this setter.
	pub fn set_default_options(&self, options: RequestOptions) {
		*self.defaults.write() = options;
	}

	/// Returns a copy of the current default request options.
	pub fn default_options(&self) -> RequestOptions {
		self.defaults.read().clone()
	}

	/// Builds an absolute endpoint URL by joining `path` onto the base prefix and appending
	/// the query pairs.
	pub fn api_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
		let mut url = self
			.base_url
			.join(path)
			.map_err(|e| ConfigError::InvalidEndpoint { path: path.into(), source: e })?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query);
		}

		Ok(url)
	}

	/// Merges the per-call options over the client defaults and executes the request.
	///
	/// This is a pure transport primitive: no credential logic happens here, which is what
	/// lets the token exchange and authenticated endpoint calls share one dispatch path.
	pub async fn request(&self, request: PreparedRequest) -> Result<RawResponse> {
		let merged = request.options.merged_over(&self.defaults.read());
		let request = request.with_options(merged);

		Ok(self.transport.execute(request).await?)
	}

	/// Executes a request and parses the JSON reply, surfacing non-zero `errcode` payloads
	/// as [`ApiError`]s.
	pub async fn request_json(&self, request: PreparedRequest) -> Result<Value> {
		let raw = self.request(request).await?;

		ensure_api_ok(parse_json_body(&raw)?)
	}

	/// GET-a-JSON-reply convenience used by endpoint modules.
	pub async fn get_json(&self, url: Url, options: RequestOptions) -> Result<Value> {
		self.request_json(PreparedRequest::get(url).with_options(options)).await
	}

	/// POST-a-JSON-body convenience used by endpoint modules.
	pub async fn post_json(
		&self,
		url: Url,
		body: &impl Serialize,
		options: RequestOptions,
	) -> Result<Value> {
		let body = serde_json::to_vec(body).map_err(|e| ConfigError::RequestBody { source: e })?;

		self.request_json(PreparedRequest::post_json(url, body).with_options(options)).await
	}

	/// Executes a request whose reply may be JSON or raw bytes, classifying by the declared
	/// content type.
	///
	/// JSON replies still go through the `errcode` check; any other content type is returned
	/// verbatim, which is how media downloads hand back file bytes.
	pub async fn get_payload(&self, url: Url, options: RequestOptions) -> Result<ApiPayload> {
		let raw = self.request(PreparedRequest::get(url).with_options(options)).await?;

		if raw.is_json() {
			let value = ensure_api_ok(parse_json_body(&raw)?)?;

			Ok(ApiPayload::Json(value))
		} else {
			Ok(ApiPayload::Binary { content_type: raw.content_type, bytes: raw.body })
		}
	}

	/// Performs the id/secret exchange against the remote service and persists the resulting
	/// credential through the store before returning it.
	///
	/// Transport, decode, and application failures are propagated untouched; this layer
	/// never retries, since the interceptor's single retry covers call failures, not
	/// authentication failures, and a wrong secret will never succeed on a second attempt.
	/// Independent call chains do not coordinate: two callers racing past an expired
	/// credential can each trigger their own exchange and each save a valid credential.
	pub async fn authenticate(&self) -> Result<AccessCredential> {
		const KIND: FlowKind = FlowKind::Authenticate;

		let span = FlowSpan::new(KIND, "authenticate");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = self.api_url("gettoken", &[
					("corpid", self.corp_id.as_str()),
					("corpsecret", self.corp_secret.as_str()),
				])?;
				let raw = self.request(PreparedRequest::get(url)).await?;
				let reply = parse_token_reply(&raw)?;

				if reply.expires_in <= 0 {
					return Err(
						ProtocolError::NonPositiveExpiresIn { value: reply.expires_in }.into()
					);
				}

				let credential = AccessCredential::from_exchange(
					reply.access_token,
					OffsetDateTime::now_utc(),
					Duration::seconds(reply.expires_in),
				);

				self.store.save(credential.clone()).await?;

				Ok(credential)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Returns the latest valid credential, reading the store first and falling back to a
	/// fresh [`Client::authenticate`] exchange when the stored value is absent or invalid.
	pub async fn latest_credential(&self) -> Result<AccessCredential> {
		self.acquire_credential(None).await
	}

	/// Store-backed read path shared by [`Client::latest_credential`] and the interceptor.
	///
	/// `rejected` carries the token value the remote service rejected on the previous
	/// attempt of the current call chain: a stored credential matching it is treated as
	/// stale even when its local expiry says otherwise, while a different stored credential
	/// (for example one refreshed by another process) is used without a new exchange.
	async fn acquire_credential(&self, rejected: Option<&str>) -> Result<AccessCredential> {
		if let Some(stored) = self.store.load().await? {
			let distrusted = rejected.is_some_and(|token| stored.token.expose() == token);

			if !distrusted && stored.is_valid() {
				return Ok(stored);
			}
		}

		self.authenticate().await
	}

	/// Runs `call` with a guaranteed-valid credential, transparently retrying exactly once
	/// when the remote service rejects the credential mid-call.
	///
	/// One logical call chain: acquire a credential from the store (exchanging when it is
	/// absent or invalid), invoke `call` with the credential threaded in as a parameter,
	/// and inspect the outcome. An [`ApiError`] carrying
	/// [`ApiError::CREDENTIAL_REJECTED`] on the first attempt re-enters the chain once;
	/// every other outcome (success, transport or decode failures, other application
	/// codes, or a second rejection) terminates the chain and is surfaced verbatim.
	/// Credential-acquisition failures are always fatal to the chain.
	///
	/// The caller never observes the intermediate rejected attempt, only the added latency
	/// of at most one extra round trip.
	pub async fn pre_request<T, F, Fut>(&self, call: F) -> Result<T>
	where
		F: Fn(AccessCredential) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		const KIND: FlowKind = FlowKind::ApiCall;

		let span = FlowSpan::new(KIND, "pre_request");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut attempt = CallAttempt::Initial;
				let mut rejected = None;

				loop {
					let credential = self.acquire_credential(rejected.as_deref()).await?;

					match call(credential.clone()).await {
						Err(Error::Api(api))
							if api.is_credential_rejected() && attempt.is_initial() =>
						{
							attempt = CallAttempt::Retried;
							rejected = Some(credential.token.expose().to_owned());
						},
						outcome => return outcome,
					}
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Invokes a registered extension method by name.
	pub async fn invoke(&self, name: &str, params: Value) -> Result<ApiPayload> {
		let method = self
			.methods
			.get(name)
			.ok_or_else(|| ConfigError::UnknownMethod { name: name.into() })?
			.clone();

		method.call(self, params).await
	}

	/// Registered extension method names, in sorted order.
	pub fn method_names(&self) -> impl Iterator<Item = &str> {
		self.methods.names()
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport> {
	/// Starts a builder backed by the crate's default reqwest transport.
	pub fn builder(
		corp_id: impl Into<String>,
		corp_secret: impl Into<String>,
		agent_id: u64,
	) -> ClientBuilder<ReqwestTransport> {
		Self::with_transport(corp_id, corp_secret, agent_id, ReqwestTransport::default())
	}
}
impl<C> Clone for Client<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			corp_id: self.corp_id.clone(),
			corp_secret: self.corp_secret.clone(),
			agent_id: self.agent_id,
			base_url: self.base_url.clone(),
			defaults: self.defaults.clone(),
			methods: self.methods.clone(),
		}
	}
}
impl<C> Debug for Client<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("corp_id", &self.corp_id)
			.field("agent_id", &self.agent_id)
			.field("base_url", &self.base_url.as_str())
			.field("corp_secret_set", &!self.corp_secret.is_empty())
			.field("methods", &self.methods)
			.finish()
	}
}

/// Assembles a [`Client`] and its full capability set before it becomes usable.
pub struct ClientBuilder<C>
where
	C: ?Sized + HttpTransport,
{
	corp_id: String,
	corp_secret: String,
	agent_id: u64,
	base_url: Option<Url>,
	store: Option<Arc<dyn CredentialStore>>,
	transport: Arc<C>,
	defaults: RequestOptions,
	methods: MethodTable<C>,
}
impl<C> Debug for ClientBuilder<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientBuilder")
			.field("corp_id", &self.corp_id)
			.field("agent_id", &self.agent_id)
			.field("base_url", &self.base_url.as_ref().map(Url::as_str))
			.field("corp_secret_set", &!self.corp_secret.is_empty())
			.field("methods", &self.methods)
			.finish()
	}
}
impl<C> ClientBuilder<C>
where
	C: ?Sized + HttpTransport,
{
	/// Overrides the base URL prefix (defaults to [`DEFAULT_BASE_URL`]).
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Supplies the credential store shared by this client.
	pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Opts into the in-memory, single-process credential store.
	pub fn single_process_store(self) -> Self {
		self.store(Arc::new(MemoryStore::single_process()))
	}

	/// Seeds the default request options applied to every call.
	pub fn default_options(mut self, options: RequestOptions) -> Self {
		self.defaults = options;

		self
	}

	/// Registers one endpoint method, failing fast on name collision.
	pub fn register(
		mut self,
		name: impl Into<String>,
		method: impl EndpointMethod<C> + 'static,
	) -> Result<Self, ConfigError> {
		self.methods.register(name, method)?;

		Ok(self)
	}

	/// Bulk-registers endpoint methods, failing fast at the first name collision.
	pub fn extend<I, N, M>(mut self, methods: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = (N, M)>,
		N: Into<String>,
		M: EndpointMethod<C> + 'static,
	{
		self.methods.extend(methods)?;

		Ok(self)
	}

	/// Validates the configuration and produces the client.
	pub fn build(self) -> Result<Client<C>> {
		let store = self.store.ok_or(ConfigError::MissingStore)?;
		let base_url = match self.base_url {
			Some(url) => url,
			None => Url::parse(DEFAULT_BASE_URL)
				.map_err(|e| ConfigError::InvalidBaseUrl { source: e })?,
		};

		Ok(Client {
			transport: self.transport,
			store,
			corp_id: self.corp_id,
			corp_secret: self.corp_secret,
			agent_id: self.agent_id,
			base_url,
			defaults: Arc::new(RwLock::new(self.defaults)),
			methods: self.methods,
		})
	}
}

fn parse_json_body(raw: &RawResponse) -> Result<Value> {
	let mut deserializer = serde_json::Deserializer::from_slice(&raw.body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
		ProtocolError::MalformedJson {
			source: e,
			status: raw.status,
			body: String::from_utf8_lossy(&raw.body).into_owned(),
		}
		.into()
	})
}

fn parse_token_reply(raw: &RawResponse) -> Result<TokenReply> {
	let value = ensure_api_ok(parse_json_body(raw)?)?;

	serde_path_to_error::deserialize(value).map_err(|e| {
		ProtocolError::MalformedJson {
			source: e,
			status: raw.status,
			body: String::from_utf8_lossy(&raw.body).into_owned(),
		}
		.into()
	})
}

fn ensure_api_ok(value: Value) -> Result<Value> {
	match value.get("errcode").and_then(Value::as_i64) {
		None | Some(0) => Ok(value),
		Some(code) => {
			let message =
				value.get("errmsg").and_then(Value::as_str).unwrap_or_default().to_owned();

			Err(ApiError { code, message }.into())
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn json_response(body: &str) -> RawResponse {
		RawResponse {
			status: 200,
			content_type: Some("application/json".into()),
			body: body.as_bytes().to_vec(),
		}
	}

	#[test]
	fn errcode_zero_and_absent_both_pass() {
		let plain = parse_json_body(&json_response("{\"data\":\"ok\"}"))
			.and_then(ensure_api_ok)
			.expect("Payload without errcode should pass.");
		let zero = parse_json_body(&json_response("{\"errcode\":0,\"data\":\"ok\"}"))
			.and_then(ensure_api_ok)
			.expect("Payload with errcode 0 should pass.");

		assert_eq!(plain.get("data").and_then(Value::as_str), Some("ok"));
		assert_eq!(zero.get("data").and_then(Value::as_str), Some("ok"));
	}

	#[test]
	fn non_zero_errcode_becomes_api_error() {
		let err = parse_json_body(&json_response("{\"errcode\":40013,\"errmsg\":\"bad corpid\"}"))
			.and_then(ensure_api_ok)
			.expect_err("Non-zero errcode should be surfaced as an API error.");

		match err {
			Error::Api(api) => {
				assert_eq!(api.code, 40013);
				assert_eq!(api.message, "bad corpid");
			},
			other => panic!("Expected an API error, got {other:?}."),
		}
	}

	#[test]
	fn malformed_body_keeps_raw_payload_for_diagnosis() {
		let err = parse_json_body(&json_response("<html>oops</html>"))
			.expect_err("Non-JSON bodies should fail to parse.");

		match err {
			Error::Protocol(ProtocolError::MalformedJson { status, body, .. }) => {
				assert_eq!(status, 200);
				assert!(body.contains("<html>oops</html>"));
			},
			other => panic!("Expected a malformed JSON error, got {other:?}."),
		}
	}

	#[test]
	fn token_reply_requires_exchange_fields() {
		let err = parse_token_reply(&json_response("{\"errcode\":0,\"errmsg\":\"ok\"}"))
			.expect_err("Replies missing access_token should fail the typed parse.");

		assert!(matches!(err, Error::Protocol(ProtocolError::MalformedJson { .. })));
	}
}
