// crates.io
use httpmock::prelude::*;
// self
use wecom_client::{
	_preludet::*,
	auth::{AccessCredential, TokenSecret},
	client::ReqwestApiClient,
	error::ConfigError,
	ext::EndpointFuture,
	http::{ApiPayload, RequestOptions},
	serde_json::json,
	store::CredentialStore,
};

fn credential_valid_for(token: &str, ttl: Duration) -> AccessCredential {
	let now = OffsetDateTime::now_utc();

	AccessCredential {
		token: TokenSecret::new(token),
		issued_at: now - Duration::minutes(1),
		expires_at: now + ttl,
	}
}

/// Demo endpoint module: fetch media content, handing back raw bytes or an errcode-checked
/// JSON document depending on the response content type.
fn media_download<'a>(client: &'a ReqwestApiClient, params: Value) -> EndpointFuture<'a> {
	Box::pin(async move {
		let media_id =
			params.get("media_id").and_then(Value::as_str).unwrap_or_default().to_owned();

		client
			.pre_request(move |credential| {
				let media_id = media_id.clone();

				async move {
					let url = client.api_url("media/get", &[
						("access_token", credential.token.expose()),
						("media_id", &media_id),
					])?;

					client.get_payload(url, RequestOptions::default()).await
				}
			})
			.await
	})
}

/// Demo endpoint module: send a text message addressed to the configured agent.
fn message_send<'a>(client: &'a ReqwestApiClient, params: Value) -> EndpointFuture<'a> {
	Box::pin(async move {
		client
			.pre_request(move |credential| {
				let params = params.clone();

				async move {
					let url = client
						.api_url("message/send", &[("access_token", credential.token.expose())])?;
					let body = json!({
						"agentid": client.agent_id(),
						"msgtype": "text",
						"text": params,
					});
					let reply = client.post_json(url, &body, RequestOptions::default()).await?;

					Ok(ApiPayload::Json(reply))
				}
			})
			.await
	})
}

#[tokio::test]
async fn registration_collisions_fail_at_build_time() {
	let server = MockServer::start_async().await;
	let (builder, _store) = test_client_builder(&server.base_url());
	let builder = builder
		.register("media.download", media_download)
		.expect("First registration should succeed.");
	let err = builder
		.register("media.download", media_download)
		.expect_err("Registering the same name twice should fail fast.");

	assert!(matches!(err, ConfigError::MethodCollision { name } if name == "media.download"));
}

#[tokio::test]
async fn unknown_method_invocation_is_a_config_error() {
	let server = MockServer::start_async().await;
	let (client, _store) = build_reqwest_test_client(&server.base_url());
	let err = client
		.invoke("media.download", Value::Null)
		.await
		.expect_err("Unregistered methods should not be callable.");

	assert!(matches!(
		err,
		Error::Config(ConfigError::UnknownMethod { name }) if name == "media.download",
	));
}

#[tokio::test]
async fn invoked_binary_download_routes_through_the_interceptor() {
	let server = MockServer::start_async().await;
	let (builder, _store) = test_client_builder(&server.base_url());
	let client = builder
		.register("media.download", media_download)
		.expect("Registration should succeed.")
		.build()
		.expect("Client should build.");
	let token_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/gettoken");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"errcode\":0,\"access_token\":\"tok1\",\"expires_in\":7200}");
		})
		.await;
	let media_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/media/get")
				.query_param("access_token", "tok1")
				.query_param("media_id", "m1");
			then.status(200).header("content-type", "image/jpeg").body("jpeg-bytes");
		})
		.await;
	let payload = client
		.invoke("media.download", json!({ "media_id": "m1" }))
		.await
		.expect("Binary downloads should succeed end to end.");

	assert_eq!(payload.as_bytes(), Some("jpeg-bytes".as_bytes()));

	token_mock.assert_async().await;
	media_mock.assert_async().await;
}

#[tokio::test]
async fn invoked_json_download_still_checks_the_error_code() {
	let server = MockServer::start_async().await;
	let (builder, store) = test_client_builder(&server.base_url());
	let client = builder
		.register("media.download", media_download)
		.expect("Registration should succeed.")
		.build()
		.expect("Client should build.");

	server
		.mock_async(|when, then| {
			when.method(GET).path("/media/get");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"errcode\":40007,\"errmsg\":\"invalid media id\"}");
		})
		.await;
	store
		.save(credential_valid_for("tok1", Duration::hours(1)))
		.await
		.expect("Seeding the store should succeed.");

	let err = client
		.invoke("media.download", json!({ "media_id": "gone" }))
		.await
		.expect_err("JSON replies carrying an errcode should fail the call.");

	match err {
		Error::Api(api) => assert_eq!(api.code, 40007),
		other => panic!("Expected an API error, got {other:?}."),
	}
}

#[tokio::test]
async fn invoked_message_send_attaches_the_configured_agent() {
	let server = MockServer::start_async().await;
	let (builder, store) = test_client_builder(&server.base_url());
	let client = builder
		.register("message.send", message_send)
		.expect("Registration should succeed.")
		.build()
		.expect("Client should build.");
	let token_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/gettoken");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"errcode\":0,\"access_token\":\"fresh\",\"expires_in\":7200}");
		})
		.await;
	let send_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/message/send")
				.query_param("access_token", "tok1")
				.json_body_includes("{\"agentid\":1000002,\"msgtype\":\"text\"}");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"errcode\":0,\"errmsg\":\"ok\",\"msgid\":\"m-1\"}");
		})
		.await;

	store
		.save(credential_valid_for("tok1", Duration::hours(1)))
		.await
		.expect("Seeding the store should succeed.");

	let payload = client
		.invoke("message.send", json!({ "content": "hi" }))
		.await
		.expect("Message send should succeed with the cached credential.");
	let reply = payload.as_json().expect("Message send should return a JSON payload.");

	assert_eq!(reply.get("msgid").and_then(Value::as_str), Some("m-1"));

	token_mock.assert_calls_async(0).await;
	send_mock.assert_async().await;

	assert!(client.method_names().eq(["message.send"]));
}
