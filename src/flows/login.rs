//! Login initiation: secrets generation, authorization URL, pending-login persistence.

// self
use crate::{
	_prelude::*,
	flows::{
		RelyingParty,
		secrets::{self, PkcePair},
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	protection::Protection,
	provider::{AuthorizationParams, IdentityProvider},
	session::{PendingLoginRecord, SessionId},
};

impl<P> RelyingParty<P>
where
	P: ?Sized + IdentityProvider,
{
	/// Builds the authorization URL for a new login and stores its secrets in `session`.
	///
	/// Only the secrets of enabled protections are generated and sent. Any pending login
	/// already stored in the session is replaced.
	pub async fn login_redirect_url(
		&self,
		session: &SessionId,
		target_url: Option<&Url>,
	) -> Result<Url> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login_redirect_url");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let protections = self.config.enabled_protections;
				let state = protections.supports(Protection::State).then(secrets::generate_state);
				let pkce = protections.supports(Protection::Pkce).then(PkcePair::generate);
				let nonce = protections.supports(Protection::Nonce).then(secrets::generate_nonce);
				let params = AuthorizationParams {
					scope: self.config.scopes.clone(),
					acr_values: None,
					code_challenge: pkce.as_ref().map(|pair| pair.challenge.clone()),
					state: state.clone(),
					nonce: nonce.clone(),
				};
				let authorization_url = self.provider.authorization_url(&params);
				let record = PendingLoginRecord {
					state,
					nonce,
					code_verifier: pkce.map(|pair| pair.verifier),
					target_url: target_url.map(|url| url.to_string()),
				};

				self.store.save_pending_login(session, record).await?;

				Ok(authorization_url)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, flows::secrets::compute_pkce_challenge};

	#[tokio::test]
	async fn default_protections_store_state_and_verifier() {
		let (party, provider, store) = build_memory_test_party(&[], memory_provider());
		let session = session_id("sid-login");
		let target = Url::parse("http://localhost:8484/some/path").expect("Target should parse.");
		let url = party
			.login_redirect_url(&session, Some(&target))
			.await
			.expect("Login redirect should be built.");

		assert_eq!(url.as_str(), TEST_AUTHORIZATION_URL);

		let requests = provider.authorization_requests();
		let request = requests.first().expect("Provider should receive one request.");
		let record = store
			.snapshot(&session)
			.and_then(|state| state.oidc)
			.expect("Pending login should be stored.");

		assert_eq!(request.scope, "openid email profile");
		assert_eq!(request.acr_values, None);
		assert_eq!(request.nonce, None);
		assert_eq!(record.nonce, None);
		assert_eq!(request.state, record.state);
		assert_eq!(
			request.code_challenge.as_ref().map(|challenge| challenge.challenge.clone()),
			record.code_verifier.as_ref().map(|verifier| compute_pkce_challenge(verifier.expose()))
		);
		assert_eq!(record.target_url.as_deref(), Some("http://localhost:8484/some/path"));
	}
}
