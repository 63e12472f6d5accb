//! Identity provider capability consumed by the login flows.
//!
//! [`IdentityProvider`] is the only seam between the flows and the wire: it builds
//! authorization URLs, exchanges callback codes for tokens, fetches userinfo claims, and
//! exposes the discovered end-session endpoint. `http` holds the production client backed by
//! discovery metadata, `memory` an in-process double that records every call.

#[cfg(feature = "reqwest")] pub mod http;
pub mod memory;

#[cfg(feature = "reqwest")] pub use http::HttpIdentityProvider;
pub use memory::{MemoryIdentityProvider, RecordedExchange};

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::ExchangeError, session::Secret};

/// Future returned by provider calls that may reach the network.
pub type ProviderFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ExchangeError>> + 'a + Send>>;

/// Capability interface over an OpenID Connect provider client.
///
/// One handle lives for the whole process. Calls are single attempts: implementations never
/// retry and surface failures verbatim as [`ExchangeError`].
pub trait IdentityProvider
where
	Self: Send + Sync,
{
	/// Issuer the client was initialized against.
	fn issuer(&self) -> &Url;

	/// Builds the authorization URL the browser is redirected to.
	fn authorization_url(&self, params: &AuthorizationParams) -> Url;

	/// Exchanges the callback's authorization code, enforcing `checks`.
	fn exchange_code<'a>(
		&'a self,
		callback_url: &'a Url,
		params: &'a CallbackParams,
		checks: &'a CallbackChecks,
	) -> ProviderFuture<'a, TokenSet>;

	/// Retrieves identity claims for the authenticated subject.
	fn fetch_user_info<'a>(&'a self, tokens: &'a TokenSet) -> ProviderFuture<'a, IdentityClaims>;

	/// End-session endpoint advertised by the issuer metadata, if any.
	fn end_session_endpoint(&self) -> Option<&Url>;

	/// Builds the provider logout URL that returns to `post_logout_redirect`.
	fn end_session_url(&self, post_logout_redirect: &Url) -> Option<Url>;
}

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl CodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			CodeChallengeMethod::S256 => "S256",
		}
	}
}

/// PKCE challenge sent with the authorization request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeChallenge {
	/// Challenge derived from the secret verifier.
	pub challenge: String,
	/// Transform used to derive the challenge.
	pub method: CodeChallengeMethod,
}

/// Parameters of one authorization request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationParams {
	/// Space-delimited scopes.
	pub scope: String,
	/// Requested authentication context classes; reserved and currently always `None`.
	pub acr_values: Option<String>,
	/// PKCE challenge, when PKCE is enabled.
	pub code_challenge: Option<CodeChallenge>,
	/// CSRF token, when STATE is enabled.
	pub state: Option<Secret>,
	/// Replay token, when NONCE is enabled.
	pub nonce: Option<Secret>,
}

/// Parameters the provider appended to the callback URL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
	/// Authorization code.
	pub code: Option<Secret>,
	/// Returned CSRF token.
	pub state: Option<String>,
	/// OAuth error code.
	pub error: Option<String>,
	/// OAuth error description.
	pub error_description: Option<String>,
	/// Issuer identifier (RFC 9207).
	pub iss: Option<String>,
}
impl CallbackParams {
	/// Extracts the callback parameters from the request URL's query string.
	pub fn from_url(url: &Url) -> Self {
		let mut params = Self::default();

		for (key, value) in url.query_pairs() {
			let value = value.into_owned();

			match key.as_ref() {
				"code" => params.code = Some(Secret::new(value)),
				"state" => params.state = Some(value),
				"error" => params.error = Some(value),
				"error_description" => params.error_description = Some(value),
				"iss" => params.iss = Some(value),
				_ => {},
			}
		}

		params
	}
}

/// Values the provider client must verify during the exchange.
///
/// A field is populated only when its protection is enabled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackChecks {
	/// Expected `state`.
	pub state: Option<Secret>,
	/// PKCE verifier sent to the token endpoint.
	pub code_verifier: Option<Secret>,
	/// Expected ID token `nonce`.
	pub nonce: Option<Secret>,
}

/// Tokens returned by a successful code exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenSet {
	/// Access token used for the userinfo call.
	pub access_token: Secret,
	/// Validated ID token claims, when the provider returned an ID token.
	pub id_token_claims: Option<IdentityClaims>,
}

/// Claims describing the authenticated subject.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityClaims(Map<String, Value>);
impl IdentityClaims {
	/// Wraps a claim map.
	pub fn new(claims: Map<String, Value>) -> Self {
		Self(claims)
	}

	/// Raw claim value.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	/// String claim value; non-string claims are ignored.
	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.0.get(name).and_then(Value::as_str)
	}

	/// `email_verified` claim, when present as a boolean.
	pub fn email_verified(&self) -> Option<bool> {
		self.0.get("email_verified").and_then(Value::as_bool)
	}

	/// Subject identifier.
	pub fn subject(&self) -> Option<&str> {
		self.get_str("sub")
	}

	/// Underlying claim map.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}
}
impl From<Map<String, Value>> for IdentityClaims {
	fn from(value: Map<String, Value>) -> Self {
		Self(value)
	}
}
impl TryFrom<Value> for IdentityClaims {
	type Error = Value;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Object(map) => Ok(Self(map)),
			other => Err(other),
		}
	}
}

/// Builds an authorization-code request URL against `endpoint`.
pub fn build_authorization_url(
	endpoint: &Url,
	client_id: &str,
	redirect_uri: &Url,
	params: &AuthorizationParams,
) -> Url {
	let mut url = endpoint.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());
	pairs.append_pair("scope", &params.scope);

	if let Some(state) = &params.state {
		pairs.append_pair("state", state.expose());
	}
	if let Some(nonce) = &params.nonce {
		pairs.append_pair("nonce", nonce.expose());
	}
	if let Some(challenge) = &params.code_challenge {
		pairs.append_pair("code_challenge", &challenge.challenge);
		pairs.append_pair("code_challenge_method", challenge.method.as_str());
	}
	if let Some(acr_values) = &params.acr_values {
		pairs.append_pair("acr_values", acr_values);
	}

	drop(pairs);

	url
}

/// Builds an RP-initiated logout URL against `endpoint`.
pub fn build_end_session_url(endpoint: &Url, client_id: &str, post_logout_redirect: &Url) -> Url {
	let mut url = endpoint.clone();

	url.query_pairs_mut()
		.append_pair("client_id", client_id)
		.append_pair("post_logout_redirect_uri", post_logout_redirect.as_str());

	url
}
