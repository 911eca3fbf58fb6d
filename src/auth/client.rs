//! Dynamic client registration payloads (RFC 7591).

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Client metadata sent to the registration endpoint.
///
/// Unknown fields from a static override are preserved in [`extra`](Self::extra).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
	/// Redirect URIs the client will use.
	#[serde(default)]
	pub redirect_uris: Vec<String>,
	/// Token endpoint authentication method (`none` for public clients).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint_auth_method: Option<String>,
	/// Grant types the client will use.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub grant_types: Vec<String>,
	/// Response types the client will use.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub response_types: Vec<String>,
	/// Human-readable client name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_name: Option<String>,
	/// Client home page.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_uri: Option<String>,
	/// Stable software identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub software_id: Option<String>,
	/// Software version.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub software_version: Option<String>,
	/// Requested scope.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Additional metadata fields not modelled above.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl ClientMetadata {
	/// Shallow-merges `overrides` on top of `self`; override keys win.
	pub fn merged_with(self, overrides: &Map<String, Value>) -> Result<Self, serde_json::Error> {
		let mut base = match serde_json::to_value(self)? {
			Value::Object(map) => map,
			_ => Map::new(),
		};

		for (key, value) in overrides {
			base.insert(key.clone(), value.clone());
		}

		serde_json::from_value(Value::Object(base))
	}
}

/// Registration record returned by the authorization server and persisted per server identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
	/// Issued client identifier.
	pub client_id: String,
	/// Issued client secret for confidential clients.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<String>,
	/// Registered redirect URIs.
	#[serde(default)]
	pub redirect_uris: Vec<String>,
	/// Scope granted at registration time.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Issue instant in epoch seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_id_issued_at: Option<i64>,
	/// Secret expiry in epoch seconds (`0` means never).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret_expires_at: Option<i64>,
	/// Remaining registration fields echoed by the server.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl ClientRegistration {
	/// Creates a public-client registration with only a client identifier.
	pub fn new(client_id: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			redirect_uris: Vec::new(),
			scope: None,
			client_id_issued_at: None,
			client_secret_expires_at: None,
			extra: Map::new(),
		}
	}

	/// Sets the scope echoed by the authorization server.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}
}
impl Debug for ClientRegistration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientRegistration")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
			.field("redirect_uris", &self.redirect_uris)
			.field("scope", &self.scope)
			.finish()
	}
}
