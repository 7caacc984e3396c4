//! WeCom (WeChat Work) API client core—credential lifecycle, shared token stores, and a
//! transparent single-retry request path for server-side token revocation.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod error;
pub mod ext;
pub mod http;
pub mod obs;
pub mod store;
#[cfg(feature = "reqwest")]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::{Client, ClientBuilder, ReqwestApiClient},
		http::ReqwestTransport,
		store::{CredentialStore, MemoryStore},
	};

	/// Corp identifier shared by integration test fixtures.
	pub const TEST_CORP_ID: &str = "cid";
	/// Corp secret shared by integration test fixtures.
	pub const TEST_CORP_SECRET: &str = "csecret";
	/// Agent identifier shared by integration test fixtures.
	pub const TEST_AGENT_ID: u64 = 1_000_002;

	/// Builder preconfigured with the test corp identity, an in-memory store, and the
	/// provided mock base URL. The backing store is returned for direct inspection.
	pub fn test_client_builder(
		base_url: &str,
	) -> (ClientBuilder<ReqwestTransport>, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::single_process());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let builder = Client::builder(TEST_CORP_ID, TEST_CORP_SECRET, TEST_AGENT_ID)
			.base_url(Url::parse(base_url).expect("Test base URL should parse."))
			.store(store);

		(builder, store_backend)
	}

	/// Constructs a [`ReqwestApiClient`] backed by an in-memory store and the provided mock
	/// base URL.
	pub fn build_reqwest_test_client(base_url: &str) -> (ReqwestApiClient, Arc<MemoryStore>) {
		let (builder, store_backend) = test_client_builder(base_url);
		let client = builder.build().expect("Test client should build.");

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use serde_json;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
