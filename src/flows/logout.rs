//! Logout redirect resolution.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	flows::RelyingParty,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::IdentityProvider,
};

impl<P> RelyingParty<P>
where
	P: ?Sized + IdentityProvider,
{
	/// Resolves where the browser goes to log out.
	///
	/// Resolution order: skip the provider and return `post_logout_redirect` unchanged, then
	/// the configured end-session override (returned as is), then the provider's logout URL
	/// built from the discovered endpoint.
	pub fn logout_redirect_url(&self, post_logout_redirect: &Url) -> Result<Url> {
		const KIND: FlowKind = FlowKind::Logout;

		let _span = FlowSpan::new(KIND, "logout_redirect_url").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<Url> = if self.config.skip_end_session_endpoint {
			Ok(post_logout_redirect.clone())
		} else if let Some(endpoint) = &self.config.end_session_endpoint_override {
			Ok(endpoint.clone())
		} else {
			self.provider
				.end_session_url(post_logout_redirect)
				.ok_or_else(|| ConfigError::EndSessionEndpointUnresolved.into())
		};

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
