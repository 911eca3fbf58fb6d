//! Six-tier scope negotiation.
//!
//! The effective scope is never persisted. It is recomputed from [`ScopeSources`] on every
//! metadata read so that late-arriving inputs (a registration response, a discovery document)
//! take effect without invalidating anything.

// self
use crate::_prelude::*;

/// Scope requested when no other source supplies one.
pub const DEFAULT_SCOPE: &str = "openid email profile";

/// Ordered resolver table; the first tier producing a value wins.
const RESOLVERS: [(ScopeTier, fn(&ScopeSources) -> Option<String>); 5] = [
	(ScopeTier::Configured, configured),
	(ScopeTier::Challenge, challenge),
	(ScopeTier::ProtectedResource, protected_resource),
	(ScopeTier::Registration, registration),
	(ScopeTier::AuthorizationServer, authorization_server),
];

/// Origin of the effective scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeTier {
	/// Static scope from local configuration.
	Configured,
	/// `scope` parameter of a `WWW-Authenticate` challenge seen during discovery.
	Challenge,
	/// `scopes_supported` from protected-resource metadata.
	ProtectedResource,
	/// `scope` echoed by the authorization server in the registration response.
	Registration,
	/// `scopes_supported` from authorization-server metadata.
	AuthorizationServer,
	/// [`DEFAULT_SCOPE`].
	Default,
}
impl ScopeTier {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ScopeTier::Configured => "configured",
			ScopeTier::Challenge => "challenge",
			ScopeTier::ProtectedResource => "protected_resource",
			ScopeTier::Registration => "registration",
			ScopeTier::AuthorizationServer => "authorization_server",
			ScopeTier::Default => "default",
		}
	}
}
impl Display for ScopeTier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Every input the resolver considers. Absent and blank values are equivalent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopeSources {
	/// Explicitly configured static scope override.
	pub configured: Option<String>,
	/// Scope derived from a discovery challenge.
	pub challenge: Option<String>,
	/// Scopes advertised by protected-resource metadata.
	pub protected_resource: Option<Vec<String>>,
	/// Scope returned in the client-registration response.
	pub registration: Option<String>,
	/// Scopes advertised by authorization-server metadata.
	pub authorization_server: Option<Vec<String>>,
}

/// Resolved scope together with the tier that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectiveScope {
	/// Space-delimited scope string.
	pub value: String,
	/// Winning tier.
	pub tier: ScopeTier,
}

/// Resolves the effective scope string.
pub fn resolve_scope(sources: &ScopeSources) -> String {
	resolve_scope_with_tier(sources).value
}

/// Resolves the effective scope and reports which tier won.
pub fn resolve_scope_with_tier(sources: &ScopeSources) -> EffectiveScope {
	RESOLVERS
		.iter()
		.find_map(|(tier, resolver)| resolver(sources).map(|value| EffectiveScope { value, tier: *tier }))
		.unwrap_or_else(|| EffectiveScope { value: DEFAULT_SCOPE.into(), tier: ScopeTier::Default })
}

fn configured(sources: &ScopeSources) -> Option<String> {
	non_blank(sources.configured.as_deref())
}

fn challenge(sources: &ScopeSources) -> Option<String> {
	non_blank(sources.challenge.as_deref())
}

fn protected_resource(sources: &ScopeSources) -> Option<String> {
	joined(sources.protected_resource.as_deref())
}

fn registration(sources: &ScopeSources) -> Option<String> {
	non_blank(sources.registration.as_deref())
}

fn authorization_server(sources: &ScopeSources) -> Option<String> {
	joined(sources.authorization_server.as_deref())
}

fn non_blank(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|trimmed| !trimmed.is_empty()).map(str::to_owned)
}

fn joined(scopes: Option<&[String]>) -> Option<String> {
	non_blank(scopes.map(|scopes| scopes.join(" ")).as_deref())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn full_sources() -> ScopeSources {
		ScopeSources {
			configured: Some("configured".into()),
			challenge: Some("challenge".into()),
			protected_resource: Some(vec!["prm.read".into(), "prm.write".into()]),
			registration: Some("registered".into()),
			authorization_server: Some(vec!["as.read".into(), "as.write".into()]),
		}
	}

	fn clear(sources: &mut ScopeSources, tier: usize, blank: bool) {
		match (tier, blank) {
			(0, false) => sources.configured = None,
			(0, true) => sources.configured = Some("   ".into()),
			(1, false) => sources.challenge = None,
			(1, true) => sources.challenge = Some(String::new()),
			(2, false) => sources.protected_resource = None,
			(2, true) => sources.protected_resource = Some(Vec::new()),
			(3, false) => sources.registration = None,
			(3, true) => sources.registration = Some(" \t".into()),
			(4, false) => sources.authorization_server = None,
			(4, true) => sources.authorization_server = Some(vec![String::new()]),
			_ => unreachable!(),
		}
	}

	fn expected(tier: usize) -> (&'static str, ScopeTier) {
		match tier {
			0 => ("configured", ScopeTier::Configured),
			1 => ("challenge", ScopeTier::Challenge),
			2 => ("prm.read prm.write", ScopeTier::ProtectedResource),
			3 => ("registered", ScopeTier::Registration),
			4 => ("as.read as.write", ScopeTier::AuthorizationServer),
			_ => (DEFAULT_SCOPE, ScopeTier::Default),
		}
	}

	#[test]
	fn first_present_source_wins_for_every_combination() {
		for mask in 0_u32..(1 << 5) {
			for blank in [false, true] {
				let mut sources = full_sources();

				for tier in 0..5 {
					if mask & (1 << tier) == 0 {
						clear(&mut sources, tier, blank);
					}
				}

				let winner = (0..5).find(|tier| mask & (1 << tier) != 0).unwrap_or(5);
				let (value, tier) = expected(winner);
				let resolved = resolve_scope_with_tier(&sources);

				assert_eq!(resolved.value, value, "mask {mask:05b}, blank {blank}");
				assert_eq!(resolved.tier, tier, "mask {mask:05b}, blank {blank}");
			}
		}
	}

	#[test]
	fn empty_configured_scope_falls_through() {
		let sources = ScopeSources {
			configured: Some(String::new()),
			registration: Some("files:read".into()),
			..Default::default()
		};

		assert_eq!(resolve_scope(&sources), "files:read");
	}

	#[test]
	fn values_are_trimmed() {
		let sources =
			ScopeSources { challenge: Some("  read write \n".into()), ..Default::default() };

		assert_eq!(resolve_scope(&sources), "read write");
	}

	#[test]
	fn defaults_when_nothing_is_known() {
		assert_eq!(resolve_scope(&ScopeSources::default()), DEFAULT_SCOPE);
		assert_eq!(ScopeTier::Default.to_string(), "default");
	}
}
