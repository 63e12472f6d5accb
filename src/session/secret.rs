//! Redaction for the values a login leaves behind in the session.
//!
//! The `state`, `nonce`, and PKCE `code_verifier` of a pending login, as well as the client
//! secret, travel as [`Secret`]. They are persisted as plain JSON strings so the session record
//! keeps its wire shape, but they print as `<redacted>` in every log line and debug dump.

// self
use crate::_prelude::*;

/// Login secret or client credential that only [`Secret::expose`] reveals.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
	/// Wraps a value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw value, for comparisons against the callback and for provider requests.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for Secret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Secret(<redacted>)")
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn pending_login_values_never_print() {
		let state = Secret::new("fake-state");

		assert_eq!(format!("{state:?}"), "Secret(<redacted>)");
		assert_eq!(state.to_string(), "<redacted>");
		assert_eq!(state.expose(), "fake-state");
	}

	#[test]
	fn session_json_keeps_plain_strings() {
		let verifier: Secret = serde_json::from_str("\"fake-code-verifier\"")
			.expect("A stored verifier should deserialize.");

		assert_eq!(verifier.expose(), "fake-code-verifier");
		assert_eq!(
			serde_json::to_string(&verifier).expect("Secrets should serialize to JSON."),
			"\"fake-code-verifier\""
		);
	}
}
