//! In-process [`IdentityProvider`] that records calls, for tests and demos.

// self
use crate::{
	_prelude::*,
	error::ExchangeError,
	provider::{
		AuthorizationParams, CallbackChecks, CallbackParams, IdentityClaims, IdentityProvider,
		ProviderFuture, TokenSet, build_end_session_url,
	},
	session::Secret,
};

/// One recorded [`IdentityProvider::exchange_code`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedExchange {
	/// Callback URL passed to the exchange.
	pub callback_url: Url,
	/// Parsed callback parameters.
	pub params: CallbackParams,
	/// Checks requested by the caller.
	pub checks: CallbackChecks,
}

/// Identity provider double that answers from memory.
///
/// Authorization URLs are fixed, exchanges succeed with a static access token unless a
/// failure has been injected, and userinfo returns the configured claims.
#[derive(Debug)]
pub struct MemoryIdentityProvider {
	issuer: Url,
	client_id: String,
	authorization_url: Url,
	end_session_endpoint: Option<Url>,
	user_info: RwLock<IdentityClaims>,
	exchange_failure: Mutex<Option<(String, Option<String>)>>,
	authorization_requests: Mutex<Vec<AuthorizationParams>>,
	exchanges: Mutex<Vec<RecordedExchange>>,
}
impl MemoryIdentityProvider {
	/// Access token handed out by every successful exchange.
	pub const ACCESS_TOKEN: &'static str = "memory-access-token";

	/// Creates a provider for `issuer` that redirects logins to `authorization_url`.
	pub fn new(issuer: Url, client_id: impl Into<String>, authorization_url: Url) -> Self {
		Self {
			issuer,
			client_id: client_id.into(),
			authorization_url,
			end_session_endpoint: None,
			user_info: Default::default(),
			exchange_failure: Default::default(),
			authorization_requests: Default::default(),
			exchanges: Default::default(),
		}
	}

	/// Sets or clears the end-session endpoint reported as discovered.
	pub fn with_end_session_endpoint(mut self, endpoint: Option<Url>) -> Self {
		self.end_session_endpoint = endpoint;

		self
	}

	/// Sets the claims returned by userinfo.
	pub fn with_user_info(self, claims: IdentityClaims) -> Self {
		*self.user_info.write() = claims;

		self
	}

	/// Makes every later exchange fail with the given OAuth error.
	pub fn fail_exchanges_with(&self, error: impl Into<String>, description: Option<String>) {
		*self.exchange_failure.lock() = Some((error.into(), description));
	}

	/// Authorization requests received so far.
	pub fn authorization_requests(&self) -> Vec<AuthorizationParams> {
		self.authorization_requests.lock().clone()
	}

	/// Exchanges received so far.
	pub fn exchanges(&self) -> Vec<RecordedExchange> {
		self.exchanges.lock().clone()
	}
}
impl IdentityProvider for MemoryIdentityProvider {
	fn issuer(&self) -> &Url {
		&self.issuer
	}

	fn authorization_url(&self, params: &AuthorizationParams) -> Url {
		self.authorization_requests.lock().push(params.clone());

		self.authorization_url.clone()
	}

	fn exchange_code<'a>(
		&'a self,
		callback_url: &'a Url,
		params: &'a CallbackParams,
		checks: &'a CallbackChecks,
	) -> ProviderFuture<'a, TokenSet> {
		self.exchanges.lock().push(RecordedExchange {
			callback_url: callback_url.clone(),
			params: params.clone(),
			checks: checks.clone(),
		});

		let failure = self.exchange_failure.lock().clone();

		Box::pin(async move {
			if let Some((error, description)) = failure {
				return Err(ExchangeError::Provider { error, description });
			}

			Ok(TokenSet { access_token: Secret::new(Self::ACCESS_TOKEN), id_token_claims: None })
		})
	}

	fn fetch_user_info<'a>(&'a self, tokens: &'a TokenSet) -> ProviderFuture<'a, IdentityClaims> {
		let claims = self.user_info.read().clone();
		let authorized = tokens.access_token.expose() == Self::ACCESS_TOKEN;

		Box::pin(async move {
			if authorized {
				Ok(claims)
			} else {
				Err(ExchangeError::Http { endpoint: "userinfo", status: 401 })
			}
		})
	}

	fn end_session_endpoint(&self) -> Option<&Url> {
		self.end_session_endpoint.as_ref()
	}

	fn end_session_url(&self, post_logout_redirect: &Url) -> Option<Url> {
		self.end_session_endpoint
			.as_ref()
			.map(|endpoint| build_end_session_url(endpoint, &self.client_id, post_logout_redirect))
	}
}
