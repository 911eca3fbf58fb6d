//! Token material persisted per server identity and its soft shape checks.

// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

/// Shape problem found in a token set's `expires_in` field.
///
/// Anomalies are reported, never enforced: the token set is still returned and saved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpiresInAnomaly {
	/// The field is present but not a JSON number.
	NotNumeric {
		/// Raw JSON text of the value.
		raw: String,
	},
	/// The field is a negative number.
	Negative {
		/// Raw JSON text of the value.
		raw: String,
	},
}
impl Display for ExpiresInAnomaly {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::NotNumeric { raw } => write!(f, "expires_in is not a number: {raw}"),
			Self::Negative { raw } => write!(f, "expires_in is negative: {raw}"),
		}
	}
}

/// Token string that never appears in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Raw token value; keep it out of logs.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Token set issued by the authorization server.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
	/// Access token secret.
	pub access_token: TokenSecret,
	/// Token type, usually `Bearer`.
	#[serde(default = "default_token_type")]
	pub token_type: String,
	/// Refresh token secret, if issued.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime in seconds as sent by the server; kept verbatim so odd shapes survive a round trip.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<Value>,
	/// Granted scope.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// OpenID Connect ID token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<TokenSecret>,
}
impl TokenSet {
	/// Creates a bearer token set with only an access token.
	pub fn bearer(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret(access_token.into()),
			token_type: default_token_type(),
			refresh_token: None,
			expires_in: None,
			scope: None,
			id_token: None,
		}
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret(refresh_token.into()));

		self
	}

	/// Sets `expires_in` from a number of seconds.
	pub fn with_expires_in(mut self, seconds: i64) -> Self {
		self.expires_in = Some(Value::from(seconds));

		self
	}

	/// Lifetime in whole seconds when `expires_in` is a non-negative number.
	pub fn expires_in_secs(&self) -> Option<u64> {
		match self.expires_in.as_ref()? {
			Value::Number(n) => n.as_u64().or_else(|| {
				n.as_f64().filter(|secs| secs.is_finite() && *secs >= 0.).map(|secs| secs as u64)
			}),
			_ => None,
		}
	}

	/// Checks the `expires_in` shape; an absent field is fine.
	pub fn expires_in_anomaly(&self) -> Option<ExpiresInAnomaly> {
		let value = self.expires_in.as_ref()?;
		let raw = value.to_string();

		match value {
			Value::Number(n) if n.as_f64().is_some_and(|secs| secs < 0.) =>
				Some(ExpiresInAnomaly::Negative { raw }),
			Value::Number(_) => None,
			_ => Some(ExpiresInAnomaly::NotNumeric { raw }),
		}
	}
}
impl Debug for TokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSet")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("scope", &self.scope)
			.finish()
	}
}

fn default_token_type() -> String {
	"Bearer".into()
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn well_formed_expires_in_has_no_anomaly() {
		let tokens = TokenSet::bearer("access").with_expires_in(3600);

		assert_eq!(tokens.expires_in_anomaly(), None);
		assert_eq!(tokens.expires_in_secs(), Some(3600));
		assert_eq!(TokenSet::bearer("access").expires_in_anomaly(), None);
	}

	#[test]
	fn negative_and_non_numeric_values_are_flagged_but_kept() {
		let negative = TokenSet::bearer("access").with_expires_in(-5);

		assert_eq!(negative.expires_in_anomaly(), Some(ExpiresInAnomaly::Negative { raw: "-5".into() }));
		assert_eq!(negative.expires_in_secs(), None);

		let text: TokenSet = serde_json::from_value(json!({
			"access_token": "access",
			"token_type": "bearer",
			"expires_in": "soon"
		}))
		.expect("Non-numeric expires_in should still deserialize.");

		assert!(matches!(text.expires_in_anomaly(), Some(ExpiresInAnomaly::NotNumeric { .. })));
		assert_eq!(text.expires_in, Some(json!("soon")));
	}

	#[test]
	fn token_type_defaults_to_bearer() {
		let tokens: TokenSet = serde_json::from_value(json!({ "access_token": "a" }))
			.expect("Minimal token set should deserialize.");

		assert_eq!(tokens.token_type, "Bearer");
		assert!(!format!("{tokens:?}").contains("\"a\""));
	}

	#[test]
	fn secrets_redact_but_serialize_raw() {
		let secret = TokenSecret::from("super-secret");

		assert_eq!(format!("{secret:?} {secret}"), "<redacted> <redacted>");
		assert_eq!(serde_json::to_string(&secret).expect("Secret should serialize."), "\"super-secret\"");
	}
}
