//! Extension registry that installs endpoint modules onto the client.
//!
//! Endpoint modules (media, messaging, contacts, ...) plug into the client as named methods
//! instead of being hand-rolled by the core. The [`MethodTable`] is assembled on the client
//! builder before the client becomes usable, and registration fails fast on name collisions
//! so no module can shadow core behavior or another module. Endpoint implementations are
//! expected to route every remote call through
//! [`Client::pre_request`](crate::client::Client::pre_request) so credential handling stays
//! in one place.

// self
use crate::{
	_prelude::*,
	client::Client,
	error::ConfigError,
	http::{ApiPayload, HttpTransport},
};

/// Boxed future returned by extension endpoint methods.
pub type EndpointFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiPayload>> + 'a + Send>>;

/// Method names reserved by the client core; extensions cannot shadow them.
pub const CORE_METHODS: &[&str] =
	&["authenticate", "invoke", "latest_credential", "pre_request", "request", "set_default_options"];

/// One endpoint method callable through [`Client::invoke`](crate::client::Client::invoke).
///
/// Plain functions of the shape `fn(&Client<C>, Value) -> EndpointFuture<'_>` satisfy the
/// trait via the blanket implementation.
pub trait EndpointMethod<C>
where
	Self: Send + Sync,
	C: ?Sized + HttpTransport,
{
	/// Invokes the endpoint method with the provided parameters.
	fn call<'a>(&'a self, client: &'a Client<C>, params: Value) -> EndpointFuture<'a>;
}
impl<C, F> EndpointMethod<C> for F
where
	C: ?Sized + HttpTransport,
	F: Send + Sync + for<'a> Fn(&'a Client<C>, Value) -> EndpointFuture<'a>,
{
	fn call<'a>(&'a self, client: &'a Client<C>, params: Value) -> EndpointFuture<'a> {
		self(client, params)
	}
}

/// Name-keyed table of endpoint methods installed on a client.
pub struct MethodTable<C>
where
	C: ?Sized + HttpTransport,
{
	entries: BTreeMap<String, Arc<dyn EndpointMethod<C>>>,
}
impl<C> MethodTable<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates an empty table.
	pub fn new() -> Self {
		Self { entries: BTreeMap::new() }
	}

	/// Registers one endpoint method.
	///
	/// Fails fast when the name collides with a reserved core method or a previously
	/// registered extension; the existing entry is left untouched on failure.
	pub fn register(
		&mut self,
		name: impl Into<String>,
		method: impl EndpointMethod<C> + 'static,
	) -> Result<(), ConfigError> {
		let name = name.into();

		if CORE_METHODS.contains(&name.as_str()) || self.entries.contains_key(&name) {
			return Err(ConfigError::MethodCollision { name });
		}

		self.entries.insert(name, Arc::new(method));

		Ok(())
	}

	/// Bulk-registers a set of endpoint methods, stopping at the first collision.
	pub fn extend<I, N, M>(&mut self, methods: I) -> Result<(), ConfigError>
	where
		I: IntoIterator<Item = (N, M)>,
		N: Into<String>,
		M: EndpointMethod<C> + 'static,
	{
		for (name, method) in methods {
			self.register(name, method)?;
		}

		Ok(())
	}

	/// Looks up a method by name.
	pub fn get(&self, name: &str) -> Option<&Arc<dyn EndpointMethod<C>>> {
		self.entries.get(name)
	}

	/// Returns the registered method names in sorted order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	/// Number of registered methods.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` when no method has been registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
impl<C> Clone for MethodTable<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { entries: self.entries.clone() }
	}
}
impl<C> Default for MethodTable<C>
where
	C: ?Sized + HttpTransport,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<C> Debug for MethodTable<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MethodTable")
			.field("methods", &self.entries.keys().collect::<Vec<_>>())
			.finish()
	}
}
