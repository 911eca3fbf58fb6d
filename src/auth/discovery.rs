//! Discovery documents whose advertised scopes feed scope negotiation.
//!
//! Fetching these documents belongs to the OAuth protocol library; this crate only records what
//! was discovered so the resolver can consult it.

// self
use crate::_prelude::*;

/// Protected Resource Metadata (RFC 9728).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
	/// Identifier of the protected resource.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub resource: Option<String>,
	/// Issuers of authorization servers protecting the resource.
	#[serde(default)]
	pub authorization_servers: Vec<String>,
	/// Scopes the resource advertises.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scopes_supported: Option<Vec<String>>,
	/// Additional metadata fields not modelled above.
	#[serde(flatten)]
	pub extra: HashMap<String, serde_json::Value>,
}

/// Authorization Server Metadata (RFC 8414 / OpenID Connect Discovery).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
	/// Issuer identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issuer: Option<String>,
	/// Authorization endpoint URL.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authorization_endpoint: Option<String>,
	/// Token endpoint URL.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint: Option<String>,
	/// Dynamic client registration endpoint (RFC 7591).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub registration_endpoint: Option<String>,
	/// Scopes the authorization server advertises.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scopes_supported: Option<Vec<String>>,
	/// Additional metadata fields not modelled above.
	#[serde(flatten)]
	pub extra: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn protected_resource_metadata_deserializes() {
		let metadata: ProtectedResourceMetadata = serde_json::from_str(
			r#"{
				"resource": "https://mcp.example.com",
				"authorization_servers": ["https://auth.example.com"],
				"scopes_supported": ["mcp:read", "mcp:write"],
				"bearer_methods_supported": ["header"]
			}"#,
		)
		.expect("Metadata fixture should deserialize.");

		assert_eq!(metadata.authorization_servers, vec!["https://auth.example.com".to_owned()]);
		assert_eq!(
			metadata.scopes_supported,
			Some(vec!["mcp:read".to_owned(), "mcp:write".to_owned()])
		);
		assert!(metadata.extra.contains_key("bearer_methods_supported"));
	}

	#[test]
	fn authorization_server_metadata_tolerates_minimal_documents() {
		let metadata: AuthorizationServerMetadata =
			serde_json::from_str(r#"{"issuer":"https://auth.example.com"}"#)
				.expect("Minimal metadata should deserialize.");

		assert_eq!(metadata.issuer.as_deref(), Some("https://auth.example.com"));
		assert!(metadata.scopes_supported.is_none());
	}
}
