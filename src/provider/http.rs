//! Production [`IdentityProvider`] backed by OpenID Connect discovery metadata.
//!
//! [`HttpIdentityProvider::discover`] fetches `/.well-known/openid-configuration` once and
//! keeps the resulting endpoints for the process lifetime. Code exchanges run through the
//! `oauth2` crate with client-secret authentication; the returned ID token is decoded and its
//! `iss`, `aud`, `exp` and `nonce` claims are checked. The signature is not verified because
//! the token comes straight from the token endpoint over TLS.

// std
use std::{
	borrow::Cow,
	time::{SystemTime, UNIX_EPOCH},
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use oauth2::{
	AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl, RequestTokenError,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
use reqwest::header::ACCEPT;
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	config::ClientParams,
	error::{ClientInitError, ExchangeError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{
		AuthorizationParams, CallbackChecks, CallbackParams, IdentityClaims, IdentityProvider,
		ProviderFuture, TokenSet, build_authorization_url, build_end_session_url,
	},
	session::Secret,
};

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
const CLOCK_SKEW_SECS: u64 = 60;

type IdTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	IdTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type TokenRequestError = RequestTokenError<HttpClientError<ReqwestError>, BasicErrorResponse>;

#[derive(Clone, Debug, Deserialize, Serialize)]
struct IdTokenFields {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Subset of the issuer's discovery document used by the relying party.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	/// Issuer identifier advertised by the provider.
	pub issuer: String,
	/// Authorization endpoint.
	pub authorization_endpoint: Url,
	/// Token endpoint.
	pub token_endpoint: Url,
	/// Userinfo endpoint.
	#[serde(default)]
	pub userinfo_endpoint: Option<Url>,
	/// RP-initiated logout endpoint.
	#[serde(default)]
	pub end_session_endpoint: Option<Url>,
}

/// Identity provider client initialized from discovery metadata.
pub struct HttpIdentityProvider {
	issuer: Url,
	client_id: String,
	redirect_uri: Url,
	metadata: ProviderMetadata,
	oauth_client: ConfiguredClient,
	http_client: ReqwestHttpClient,
}
impl HttpIdentityProvider {
	/// Fetches the issuer's discovery document and builds the client.
	pub async fn discover(
		params: ClientParams,
		http_client: ReqwestHttpClient,
	) -> Result<Self, ClientInitError> {
		let issuer = params.issuer_url.clone();
		let discovery_url = discovery_url(&issuer)?;
		let response = http_client
			.get(discovery_url)
			.header(ACCEPT, "application/json")
			.send()
			.await
			.map_err(|e| ClientInitError::discovery(&issuer, e))?;
		let status = response.status();

		if !status.is_success() {
			return Err(ClientInitError::DiscoveryStatus {
				issuer: issuer.to_string(),
				status: status.as_u16(),
			});
		}

		let bytes = response.bytes().await.map_err(|e| ClientInitError::discovery(&issuer, e))?;
		let metadata: ProviderMetadata =
			serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(&bytes))
				.map_err(|e| ClientInitError::invalid_metadata(&issuer, e))?;

		Self::from_metadata(params, metadata, http_client)
	}

	/// Builds the client from already-fetched metadata.
	pub fn from_metadata(
		params: ClientParams,
		metadata: ProviderMetadata,
		http_client: ReqwestHttpClient,
	) -> Result<Self, ClientInitError> {
		if !same_issuer(params.issuer_url.as_str(), &metadata.issuer) {
			return Err(ClientInitError::IssuerMismatch {
				expected: params.issuer_url.to_string(),
				actual: metadata.issuer,
			});
		}

		let oauth_client: ConfiguredClient = Client::new(ClientId::new(params.client_id.clone()))
			.set_client_secret(ClientSecret::new(params.client_secret.expose().to_owned()))
			.set_auth_uri(AuthUrl::from_url(metadata.authorization_endpoint.clone()))
			.set_token_uri(TokenUrl::from_url(metadata.token_endpoint.clone()));

		Ok(Self {
			issuer: params.issuer_url,
			client_id: params.client_id,
			redirect_uri: params.redirect_uri,
			metadata,
			oauth_client,
			http_client,
		})
	}

	/// Discovery metadata in use.
	pub fn metadata(&self) -> &ProviderMetadata {
		&self.metadata
	}

	fn validate_id_token(
		&self,
		raw: &str,
		checks: &CallbackChecks,
	) -> Result<IdentityClaims, ExchangeError> {
		let claims = decode_jwt_payload(raw)?;
		let issuer = claims.get_str("iss").unwrap_or_default();

		if !same_issuer(&self.metadata.issuer, issuer) {
			return Err(invalid_id_token(format!("unexpected issuer `{issuer}`")));
		}
		if !audience_contains(claims.get("aud"), &self.client_id) {
			return Err(invalid_id_token("audience does not include this client"));
		}
		if let Some(exp) = claims.get("exp").and_then(Value::as_u64) {
			let now = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());

			if exp.saturating_add(CLOCK_SKEW_SECS) < now {
				return Err(invalid_id_token("token has expired"));
			}
		}
		if let Some(expected) = &checks.nonce {
			if claims.get_str("nonce") != Some(expected.expose()) {
				return Err(ExchangeError::NonceMismatch);
			}
		}

		Ok(claims)
	}
}
impl IdentityProvider for HttpIdentityProvider {
	fn issuer(&self) -> &Url {
		&self.issuer
	}

	fn authorization_url(&self, params: &AuthorizationParams) -> Url {
		build_authorization_url(
			&self.metadata.authorization_endpoint,
			&self.client_id,
			&self.redirect_uri,
			params,
		)
	}

	fn exchange_code<'a>(
		&'a self,
		callback_url: &'a Url,
		params: &'a CallbackParams,
		checks: &'a CallbackChecks,
	) -> ProviderFuture<'a, TokenSet> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			if let Some(error) = &params.error {
				return Err(ExchangeError::Provider {
					error: error.clone(),
					description: params.error_description.clone(),
				});
			}
			if let Some(expected) = &checks.state {
				if params.state.as_deref() != Some(expected.expose()) {
					return Err(ExchangeError::StateMismatch);
				}
			}

			let code = params.code.as_ref().ok_or(ExchangeError::MissingCode)?;
			let instrumented = self.http_client.instrumented(meta.clone());
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.expose().to_owned()))
				.set_redirect_uri(Cow::Owned(RedirectUrl::from_url(callback_url.clone())));

			if let Some(verifier) = &checks.code_verifier {
				request =
					request.set_pkce_verifier(PkceCodeVerifier::new(verifier.expose().to_owned()));
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err))?;
			let id_token_claims = response
				.extra_fields()
				.id_token
				.as_deref()
				.map(|raw| self.validate_id_token(raw, checks))
				.transpose()?;

			if checks.nonce.is_some() && id_token_claims.is_none() {
				return Err(invalid_id_token("nonce was requested but no ID token was returned"));
			}

			Ok(TokenSet {
				access_token: Secret::new(response.access_token().secret().to_owned()),
				id_token_claims,
			})
		})
	}

	fn fetch_user_info<'a>(&'a self, tokens: &'a TokenSet) -> ProviderFuture<'a, IdentityClaims> {
		Box::pin(async move {
			let Some(endpoint) = &self.metadata.userinfo_endpoint else {
				return tokens
					.id_token_claims
					.clone()
					.ok_or_else(|| invalid_id_token("no userinfo endpoint and no ID token"));
			};
			let response = self
				.http_client
				.get(endpoint.clone())
				.bearer_auth(tokens.access_token.expose())
				.header(ACCEPT, "application/json")
				.send()
				.await?;
			let status = response.status();

			if !status.is_success() {
				return Err(ExchangeError::Http { endpoint: "userinfo", status: status.as_u16() });
			}

			let bytes = response.bytes().await?;
			let map: Map<String, Value> =
				serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(&bytes))
					.map_err(|e| ExchangeError::parse("userinfo", e))?;
			let claims = IdentityClaims::new(map);

			if let Some(id_claims) = &tokens.id_token_claims {
				if id_claims.subject() != claims.subject() {
					return Err(invalid_id_token(
						"userinfo subject differs from the ID token subject",
					));
				}
			}

			Ok(claims)
		})
	}

	fn end_session_endpoint(&self) -> Option<&Url> {
		self.metadata.end_session_endpoint.as_ref()
	}

	fn end_session_url(&self, post_logout_redirect: &Url) -> Option<Url> {
		self.metadata
			.end_session_endpoint
			.as_ref()
			.map(|endpoint| build_end_session_url(endpoint, &self.client_id, post_logout_redirect))
	}
}
impl Debug for HttpIdentityProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpIdentityProvider")
			.field("issuer", &self.issuer.as_str())
			.field("client_id", &self.client_id)
			.field("metadata", &self.metadata)
			.finish()
	}
}

fn discovery_url(issuer: &Url) -> Result<Url, ClientInitError> {
	let raw = format!("{}{DISCOVERY_PATH}", issuer.as_str().trim_end_matches('/'));

	Url::parse(&raw).map_err(|e| ClientInitError::invalid_metadata(issuer, e))
}

fn same_issuer(lhs: &str, rhs: &str) -> bool {
	lhs.trim_end_matches('/') == rhs.trim_end_matches('/')
}

fn audience_contains(aud: Option<&Value>, client_id: &str) -> bool {
	match aud {
		Some(Value::String(value)) => value == client_id,
		Some(Value::Array(values)) => values.iter().any(|value| value.as_str() == Some(client_id)),
		_ => false,
	}
}

fn decode_jwt_payload(raw: &str) -> Result<IdentityClaims, ExchangeError> {
	let mut segments = raw.split('.');
	let (Some(_header), Some(payload), Some(_signature), None) =
		(segments.next(), segments.next(), segments.next(), segments.next())
	else {
		return Err(invalid_id_token("expected three dot-separated segments"));
	};
	let bytes = URL_SAFE_NO_PAD
		.decode(payload.trim_end_matches('='))
		.map_err(|e| ExchangeError::parse("id_token", e))?;
	let map: Map<String, Value> =
		serde_json::from_slice(&bytes).map_err(|e| ExchangeError::parse("id_token", e))?;

	Ok(IdentityClaims::new(map))
}

fn invalid_id_token(reason: impl Into<String>) -> ExchangeError {
	ExchangeError::InvalidIdToken { reason: reason.into() }
}

fn map_request_error(meta: Option<ResponseMetadata>, err: TokenRequestError) -> ExchangeError {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => ExchangeError::Provider {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
		},
		RequestTokenError::Request(error) => map_transport_error(error),
		RequestTokenError::Parse(error, _body) => ExchangeError::parse("token", error),
		RequestTokenError::Other(message) => match status {
			Some(status) if !(200..300).contains(&status) =>
				ExchangeError::Http { endpoint: "token", status },
			_ => ExchangeError::Unexpected { endpoint: "token", message },
		},
	}
}

fn map_transport_error(err: HttpClientError<ReqwestError>) -> ExchangeError {
	match err {
		HttpClientError::Reqwest(inner) => ExchangeError::transport(*inner),
		HttpClientError::Http(inner) => ExchangeError::transport(inner),
		HttpClientError::Io(inner) => ExchangeError::transport(inner),
		HttpClientError::Other(message) => ExchangeError::transport(std::io::Error::other(message)),
		_ => ExchangeError::transport(std::io::Error::other("unknown HTTP client error")),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn encode_token(claims: Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
		let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

		format!("{header}.{payload}.sig")
	}

	fn provider() -> HttpIdentityProvider {
		let params = ClientParams {
			issuer_url: Url::parse("https://idp.example.com/").expect("Issuer should parse."),
			client_id: "client-1".into(),
			client_secret: Secret::new("secret"),
			redirect_uri: Url::parse("https://app.example.com/oauth2/callback")
				.expect("Redirect should parse."),
		};
		let metadata = ProviderMetadata {
			issuer: "https://idp.example.com".into(),
			authorization_endpoint: Url::parse("https://idp.example.com/authorize")
				.expect("Authorize endpoint should parse."),
			token_endpoint: Url::parse("https://idp.example.com/token")
				.expect("Token endpoint should parse."),
			userinfo_endpoint: None,
			end_session_endpoint: None,
		};

		HttpIdentityProvider::from_metadata(params, metadata, ReqwestHttpClient::default())
			.expect("Matching issuers should build a provider.")
	}

	#[test]
	fn id_token_claims_are_validated() {
		let provider = provider();
		let checks = CallbackChecks { nonce: Some(Secret::new("n-1")), ..Default::default() };
		let good = encode_token(serde_json::json!({
			"iss": "https://idp.example.com",
			"aud": ["other", "client-1"],
			"nonce": "n-1",
			"sub": "user-1",
		}));
		let claims =
			provider.validate_id_token(&good, &checks).expect("Valid ID token should pass.");

		assert_eq!(claims.subject(), Some("user-1"));

		let wrong_nonce = encode_token(serde_json::json!({
			"iss": "https://idp.example.com",
			"aud": "client-1",
			"nonce": "n-2",
		}));

		assert!(matches!(
			provider.validate_id_token(&wrong_nonce, &checks),
			Err(ExchangeError::NonceMismatch)
		));

		let wrong_audience = encode_token(serde_json::json!({
			"iss": "https://idp.example.com",
			"aud": "someone-else",
		}));

		assert!(matches!(
			provider.validate_id_token(&wrong_audience, &CallbackChecks::default()),
			Err(ExchangeError::InvalidIdToken { .. })
		));

		let expired = encode_token(serde_json::json!({
			"iss": "https://idp.example.com",
			"aud": "client-1",
			"exp": 1,
		}));

		assert!(matches!(
			provider.validate_id_token(&expired, &CallbackChecks::default()),
			Err(ExchangeError::InvalidIdToken { .. })
		));
	}

	#[test]
	fn malformed_id_tokens_are_rejected() {
		assert!(decode_jwt_payload("only.two").is_err());
		assert!(decode_jwt_payload("a.!!!.c").is_err());
	}

	#[test]
	fn issuer_mismatch_fails_initialization() {
		let params = ClientParams {
			issuer_url: Url::parse("https://idp.example.com").expect("Issuer should parse."),
			client_id: "client-1".into(),
			client_secret: Secret::new("secret"),
			redirect_uri: Url::parse("https://app.example.com/oauth2/callback")
				.expect("Redirect should parse."),
		};
		let metadata = ProviderMetadata {
			issuer: "https://evil.example.com".into(),
			authorization_endpoint: Url::parse("https://idp.example.com/authorize")
				.expect("Authorize endpoint should parse."),
			token_endpoint: Url::parse("https://idp.example.com/token")
				.expect("Token endpoint should parse."),
			userinfo_endpoint: None,
			end_session_endpoint: None,
		};
		let err = HttpIdentityProvider::from_metadata(params, metadata, ReqwestHttpClient::default())
			.expect_err("Mismatched issuers must be rejected.");

		assert!(matches!(err, ClientInitError::IssuerMismatch { .. }));
	}
}
