//! Strongly typed identifiers that partition persisted and locked state.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;
const SERVER_HASH_LEN: usize = 32;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (server, session).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (server, session).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (server, session).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ServerIdentity, "Stable hash of a remote server URL; namespaces every persisted record and lock.", "Server" }
def_id! { SessionId, "Identifier of one auth-bridge session.", "Session" }

impl ServerIdentity {
	/// Derives the identity from the remote server URL.
	///
	/// The value is the first 32 lower-case hex characters of the URL's SHA-256 digest, so it is
	/// stable across processes and safe to embed in file names.
	pub fn from_server_url(server_url: &str) -> Self {
		let digest = Sha256::digest(server_url.as_bytes());
		let mut hex = format!("{digest:x}");

		hex.truncate(SERVER_HASH_LEN);

		Self(hex)
	}
}

impl SessionId {
	/// Generates a random session identifier.
	pub fn random() -> Self {
		Self(oauth2::CsrfToken::new_random().secret().to_owned())
	}
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn server_identity_is_stable_hex() {
		let first = ServerIdentity::from_server_url("https://mcp.example.com/sse");
		let second = ServerIdentity::from_server_url("https://mcp.example.com/sse");
		let other = ServerIdentity::from_server_url("https://mcp.example.com/mcp");

		assert_eq!(first, second);
		assert_ne!(first, other);
		assert_eq!(first.len(), SERVER_HASH_LEN);
		assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
	}

	#[test]
	fn identifiers_validate() {
		assert!(SessionId::new("").is_err());
		assert!(SessionId::new(" session").is_err());
		assert!(SessionId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());

		let session = SessionId::new("session-123").expect("Session fixture should be valid.");

		assert_eq!(session.as_ref(), "session-123");
		assert_eq!(format!("{session:?}"), "Session(session-123)");
	}

	#[test]
	fn random_sessions_differ() {
		let a = SessionId::random();
		let b = SessionId::random();

		assert_ne!(a, b);
		assert!(SessionId::new(a.as_ref()).is_ok());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let identity: ServerIdentity =
			serde_json::from_str("\"abc123\"").expect("Identity should deserialize.");

		assert_eq!(identity.as_ref(), "abc123");
		assert!(serde_json::from_str::<ServerIdentity>("\"with space\"").is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let identity = ServerIdentity::from_server_url("https://mcp.example.com/sse");
		let key = identity.to_string();
		let map: HashMap<ServerIdentity, u8> = HashMap::from_iter([(identity, 7_u8)]);

		assert_eq!(map.get(key.as_str()), Some(&7));
	}
}
