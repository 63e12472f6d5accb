//! Unguessable per-login secrets: state, nonce, and the PKCE verifier/challenge pair.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	provider::{CodeChallenge, CodeChallengeMethod},
	session::Secret,
};

/// Length of generated `state` values.
pub const STATE_LEN: usize = 32;
/// Length of generated `nonce` values.
pub const NONCE_LEN: usize = 32;
/// Length of generated PKCE verifiers (RFC 7636 allows 43..=128).
pub const PKCE_VERIFIER_LEN: usize = 64;

/// PKCE verifier and the challenge derived from it.
#[derive(Clone, Debug)]
pub struct PkcePair {
	/// Secret kept in the session.
	pub verifier: Secret,
	/// Challenge sent with the authorization request.
	pub challenge: CodeChallenge,
}
impl PkcePair {
	/// Generates a fresh S256 pair.
	pub fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self {
			verifier: Secret::new(verifier),
			challenge: CodeChallenge { challenge, method: CodeChallengeMethod::S256 },
		}
	}
}

/// Generates a random `state` value.
pub fn generate_state() -> Secret {
	Secret::new(random_string(STATE_LEN))
}

/// Generates a random `nonce` value.
pub fn generate_nonce() -> Secret {
	Secret::new(random_string(NONCE_LEN))
}

/// Derives the S256 challenge: `BASE64URL(SHA256(verifier))` without padding.
pub fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
