//! Immutable access credential issued by the token exchange.

// self
use crate::{_prelude::*, auth::secret::TokenSecret};

/// Safety margin subtracted from the server-declared lifetime to absorb clock skew and
/// network latency around the expiry boundary.
pub const EXPIRY_SAFETY_MARGIN: Duration = Duration::seconds(10);

/// Immutable record pairing one issued access token with its absolute expiry instant.
///
/// Credentials are created by the token-manager path right after a successful exchange and
/// are superseded, never mutated, on refresh. The store currently holding a credential owns
/// it; call chains only receive a per-invocation copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCredential {
	/// Opaque access token; callers must avoid logging it.
	pub token: TokenSecret,
	/// Instant the exchange completed.
	pub issued_at: OffsetDateTime,
	/// Margin-adjusted expiry instant.
	pub expires_at: OffsetDateTime,
}
impl AccessCredential {
	/// Builds a credential from a token exchange reply, subtracting
	/// [`EXPIRY_SAFETY_MARGIN`] from the server-declared lifetime.
	pub fn from_exchange(
		token: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Self {
		Self {
			token: TokenSecret::new(token),
			issued_at,
			expires_at: issued_at + expires_in - EXPIRY_SAFETY_MARGIN,
		}
	}

	/// Returns `true` iff the token is non-empty and `instant` is before the expiry.
	/// Pure, no side effects, no I/O.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		!self.token.is_empty() && instant < self.expires_at
	}

	/// Convenience helper that checks validity against the current UTC instant.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn validity_requires_presence_and_unexpired_clock() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let credential = AccessCredential {
			token: TokenSecret::new("tok"),
			issued_at: issued,
			expires_at: macros::datetime!(2025-01-01 01:00 UTC),
		};

		assert!(credential.is_valid_at(macros::datetime!(2025-01-01 00:30 UTC)));
		assert!(!credential.is_valid_at(macros::datetime!(2025-01-01 01:00 UTC)));
		assert!(!credential.is_valid_at(macros::datetime!(2025-01-01 02:00 UTC)));

		let empty = AccessCredential { token: TokenSecret::new(""), ..credential };

		assert!(!empty.is_valid_at(macros::datetime!(2025-01-01 00:30 UTC)));
	}

	#[test]
	fn exchange_lifetime_is_margin_adjusted() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let credential = AccessCredential::from_exchange("tok", issued, Duration::seconds(7200));

		assert_eq!(credential.expires_at, macros::datetime!(2025-01-01 01:59:50 UTC));
		assert!(credential.is_valid_at(macros::datetime!(2025-01-01 01:59:49 UTC)));
		assert!(!credential.is_valid_at(macros::datetime!(2025-01-01 01:59:50 UTC)));
	}
}
