//! Callback validation: pending-login checks, code exchange, profile commit.
//!
//! The pending login is taken out of the session before anything else runs, so its secrets
//! are single-use whether the callback succeeds or fails. Fail-closed checks happen before
//! the provider is contacted; every failure is logged with its full error chain and turned
//! into the generic [`CallbackResponse::Failure`] by [`RelyingParty::handle_callback`].

// self
use crate::{
	_prelude::*,
	error::CallbackError,
	flows::RelyingParty,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	protection::{Protection, ProtectionSet},
	provider::{CallbackChecks, CallbackParams, IdentityProvider},
	session::{PendingLogin, SessionId},
};

/// Status sent to the browser when the callback fails.
pub const CALLBACK_FAILURE_STATUS: u16 = 500;
/// Body sent to the browser when the callback fails.
pub const CALLBACK_FAILURE_BODY: &str = "OIDC callback failed.";
/// Redirect target used when the login did not record one.
pub const DEFAULT_REDIRECT: &str = "/";

/// Callback request as seen by the HTTP layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackRequest {
	/// Session the browser presented.
	pub session: SessionId,
	/// Full request URL, including the provider's query parameters.
	pub url: Url,
}

/// Response the HTTP layer should send for a callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackResponse {
	/// Redirect to the recorded target.
	Redirect(String),
	/// Generic failure; carries no protocol detail.
	Failure {
		/// HTTP status code.
		status: u16,
		/// Response body.
		body: &'static str,
	},
}
impl CallbackResponse {
	/// The single failure response handed to browsers.
	pub const fn failure() -> Self {
		Self::Failure { status: CALLBACK_FAILURE_STATUS, body: CALLBACK_FAILURE_BODY }
	}

	/// HTTP status code of the response.
	pub fn status(&self) -> u16 {
		match self {
			Self::Redirect(_) => 302,
			Self::Failure { status, .. } => *status,
		}
	}

	/// Response body, empty for redirects.
	pub fn body(&self) -> &str {
		match self {
			Self::Redirect(_) => "",
			Self::Failure { body, .. } => body,
		}
	}

	/// Redirect location, if any.
	pub fn location(&self) -> Option<&str> {
		match self {
			Self::Redirect(location) => Some(location),
			Self::Failure { .. } => None,
		}
	}
}

impl<P> RelyingParty<P>
where
	P: ?Sized + IdentityProvider,
{
	/// Processes the provider callback and never fails past this boundary.
	pub async fn handle_callback(&self, request: &CallbackRequest) -> CallbackResponse {
		match self.complete_login(request).await {
			Ok(location) => CallbackResponse::Redirect(location),
			Err(e) => {
				tracing::error!("{}", error_chain(&e));

				CallbackResponse::failure()
			},
		}
	}

	/// Validates the callback, commits the user profile, and returns the redirect target.
	pub async fn complete_login(&self, request: &CallbackRequest) -> Result<String> {
		const KIND: FlowKind = FlowKind::Callback;

		let span = FlowSpan::new(KIND, "complete_login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let pending = self.store.take_pending_login(&request.session).await?;
				let params = CallbackParams::from_url(&request.url);
				let checks =
					callback_checks(self.config.enabled_protections, &pending, &params)?;
				let callback_url = self.config.callback_url();
				let tokens = self.provider.exchange_code(&callback_url, &params, &checks).await?;
				let claims = self.provider.fetch_user_info(&tokens).await?;

				self.profile_mapper.verify_email(&claims)?;

				let profile = self.profile_mapper.map(&claims)?;
				let email = profile.email.clone();

				self.store
					.operate_on_user(
						&request.session,
						Box::new(move |user| user.profile = Some(profile)),
					)
					.await?;

				let target = pending
					.record()
					.and_then(|record| record.target_url.clone())
					.unwrap_or_else(|| DEFAULT_REDIRECT.to_owned());

				tracing::info!(%email, %target, "login completed");

				Ok(target)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

/// Builds the exchange checks from the pending login, failing closed on missing secrets.
///
/// A check is included only when its protection is enabled.
pub fn callback_checks(
	protections: ProtectionSet,
	pending: &PendingLogin,
	params: &CallbackParams,
) -> Result<CallbackChecks, CallbackError> {
	let record = pending.record();
	let mut checks = CallbackChecks::default();

	if protections.supports(Protection::State) {
		let state = record.and_then(|record| record.state.clone());

		match &state {
			Some(expected) if params.state.as_deref() == Some(expected.expose()) => {},
			_ => return Err(CallbackError::StateMismatch),
		}

		checks.state = state;
	}
	if protections.supports(Protection::Pkce) {
		checks.code_verifier = Some(
			record.and_then(|record| record.code_verifier.clone()).ok_or(CallbackError::Stale)?,
		);
	}
	if protections.supports(Protection::Nonce) {
		checks.nonce =
			Some(record.and_then(|record| record.nonce.clone()).ok_or(CallbackError::Stale)?);
	}

	Ok(checks)
}

fn error_chain(err: &Error) -> String {
	let mut message = err.to_string();
	let mut source = StdError::source(err);

	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());

		source = cause.source();
	}

	message
}
