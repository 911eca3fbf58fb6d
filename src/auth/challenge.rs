//! `WWW-Authenticate` challenge parsing used to seed scope negotiation.

// self
use crate::_prelude::*;

/// Parameters of a `Bearer` challenge returned by the protected resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BearerChallenge {
	/// Space-delimited scope requested by the resource.
	pub scope: Option<String>,
	/// URL of the protected-resource metadata document (RFC 9728).
	pub resource_metadata: Option<String>,
	/// OAuth error code, such as `insufficient_scope`.
	pub error: Option<String>,
}
impl BearerChallenge {
	/// Parses a `WWW-Authenticate` header value.
	///
	/// Returns `None` when the header carries no `Bearer` challenge. Quoted and bare parameter
	/// values are both accepted; unknown parameters are ignored.
	pub fn parse(header: &str) -> Option<Self> {
		let start = find_scheme(header, "bearer")?;
		let mut rest = header[start + "bearer".len()..].trim_start();
		let mut challenge = Self::default();

		while let Some((name, value, tail)) = next_param(rest) {
			match name.to_ascii_lowercase().as_str() {
				"scope" => challenge.scope = Some(value),
				"resource_metadata" => challenge.resource_metadata = Some(value),
				"error" => challenge.error = Some(value),
				_ => {},
			}

			rest = tail;
		}

		Some(challenge)
	}
}

fn find_scheme(header: &str, scheme: &str) -> Option<usize> {
	let lower = header.to_ascii_lowercase();

	lower.match_indices(scheme).map(|(idx, _)| idx).find(|&idx| {
		let boundary_before = idx == 0 || matches!(lower.as_bytes()[idx - 1], b' ' | b',');
		let after = lower.as_bytes().get(idx + scheme.len());

		boundary_before && matches!(after, None | Some(b' '))
	})
}

fn next_param(input: &str) -> Option<(&str, String, &str)> {
	let input = input.trim_start_matches([' ', ',']);
	let eq = input.find('=')?;
	let name = input[..eq].trim();

	// A bare token without `=` before the next space starts another challenge.
	if name.is_empty() || name.contains(' ') {
		return None;
	}

	let after = &input[eq + 1..];

	if let Some(quoted) = after.strip_prefix('"') {
		let mut value = String::new();
		let mut chars = quoted.char_indices();

		while let Some((idx, c)) = chars.next() {
			match c {
				'\\' =>
					if let Some((_, escaped)) = chars.next() {
						value.push(escaped);
					},
				'"' => return Some((name, value, &quoted[idx + 1..])),
				_ => value.push(c),
			}
		}

		Some((name, value, ""))
	} else {
		let end = after.find([',', ' ']).unwrap_or(after.len());

		Some((name, after[..end].to_owned(), &after[end..]))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_quoted_parameters() {
		let challenge = BearerChallenge::parse(
			r#"Bearer error="insufficient_scope", scope="files:read files:write", resource_metadata="https://mcp.example.com/.well-known/oauth-protected-resource""#,
		)
		.expect("Bearer challenge should parse.");

		assert_eq!(challenge.error.as_deref(), Some("insufficient_scope"));
		assert_eq!(challenge.scope.as_deref(), Some("files:read files:write"));
		assert_eq!(
			challenge.resource_metadata.as_deref(),
			Some("https://mcp.example.com/.well-known/oauth-protected-resource")
		);
	}

	#[test]
	fn parses_bare_values_and_escapes() {
		let challenge = BearerChallenge::parse(r#"bearer scope=read,error="a\"b""#)
			.expect("Lower-case scheme should parse.");

		assert_eq!(challenge.scope.as_deref(), Some("read"));
		assert_eq!(challenge.error.as_deref(), Some("a\"b"));
	}

	#[test]
	fn ignores_other_schemes() {
		assert!(BearerChallenge::parse(r#"Basic realm="x""#).is_none());

		let challenge = BearerChallenge::parse(r#"Basic realm="x", Bearer scope="mcp""#)
			.expect("Bearer challenge after Basic should be found.");

		assert_eq!(challenge.scope.as_deref(), Some("mcp"));
	}

	#[test]
	fn bare_bearer_has_no_parameters() {
		assert_eq!(BearerChallenge::parse("Bearer"), Some(BearerChallenge::default()));
	}
}
