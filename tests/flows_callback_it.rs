// crates.io
use serde_json::json;
// self
use oidc_relying_party::{
	_preludet::*,
	error::{CallbackError, ExchangeError},
	flows::{CallbackRequest, CallbackResponse},
	provider::{CallbackChecks, IdentityClaims, MemoryIdentityProvider},
	session::{MemorySessionStore, PendingLoginRecord, Secret, UserProfile, memory::SessionState},
};

const FAKE_STATE: &str = "fake-state";
const FAKE_NONCE: &str = "fake-nonce";
const FAKE_CODE_VERIFIER: &str = "fake-code-verifier";
const CALLBACK_URL: &str = "http://localhost:8484/oauth2/callback?code=fake-code&state=fake-state";

fn fake_user_info() -> serde_json::Value {
	json!({ "email": "fake-email", "name": "fake-name", "email_verified": true })
}

fn provider_with(user_info: serde_json::Value) -> MemoryIdentityProvider {
	memory_provider()
		.with_user_info(IdentityClaims::try_from(user_info).expect("User info should be an object."))
}

fn record(state: Option<&str>, verifier: Option<&str>, nonce: Option<&str>) -> PendingLoginRecord {
	PendingLoginRecord {
		state: state.map(Secret::new),
		nonce: nonce.map(Secret::new),
		code_verifier: verifier.map(Secret::new),
		target_url: None,
	}
}

fn default_record() -> PendingLoginRecord {
	record(Some(FAKE_STATE), Some(FAKE_CODE_VERIFIER), None)
}

fn default_checks() -> CallbackChecks {
	CallbackChecks {
		state: Some(Secret::new(FAKE_STATE)),
		code_verifier: Some(Secret::new(FAKE_CODE_VERIFIER)),
		nonce: None,
	}
}

fn seed(store: &MemorySessionStore, session: &str, pending: Option<PendingLoginRecord>) {
	store.insert(session_id(session), SessionState { oidc: pending, ..Default::default() });
}

fn request(session: &str) -> CallbackRequest {
	CallbackRequest {
		session: session_id(session),
		url: Url::parse(CALLBACK_URL).expect("Callback URL fixture should parse."),
	}
}

struct Outcome {
	result: Result<String>,
	provider: Arc<MemoryIdentityProvider>,
	state: SessionState,
}

async fn run(
	overrides: &[(&str, &str)],
	provider: MemoryIdentityProvider,
	pending: Option<PendingLoginRecord>,
) -> Outcome {
	let (party, provider, store) = build_memory_test_party(overrides, provider);

	seed(&store, "sid-callback", pending);

	let result = party.complete_login(&request("sid-callback")).await;
	let state = store
		.snapshot(&session_id("sid-callback"))
		.expect("Session should survive the callback.");

	Outcome { result, provider, state }
}

fn assert_succeeded(outcome: &Outcome, expected_checks: CallbackChecks) {
	assert!(outcome.result.is_ok(), "Callback should succeed, got {:?}.", outcome.result);

	let exchanges = outcome.provider.exchanges();

	assert_eq!(exchanges.len(), 1, "Exactly one exchange should happen.");
	assert_eq!(exchanges[0].callback_url.as_str(), "http://localhost:8484/oauth2/callback");
	assert_eq!(exchanges[0].params.state.as_deref(), Some(FAKE_STATE));
	assert_eq!(exchanges[0].checks, expected_checks);
	assert!(outcome.state.oidc.is_none(), "Pending login should be removed from the session.");
}

fn assert_failed_with(outcome: &Outcome, expected: CallbackError) {
	match &outcome.result {
		Err(Error::Callback(actual)) => assert_eq!(actual, &expected),
		other => panic!("Expected {expected:?}, got {other:?}."),
	}

	assert!(outcome.state.oidc.is_none(), "Pending login should be removed on failure too.");
	assert!(outcome.state.user.profile.is_none(), "No profile should be committed on failure.");
}

#[tokio::test]
async fn resolves_when_state_and_code_verifier_are_in_session() {
	let outcome = run(&[], provider_with(fake_user_info()), Some(default_record())).await;

	assert_succeeded(&outcome, default_checks());
}

#[tokio::test]
async fn rejects_when_state_is_missing_from_session() {
	let outcome = run(&[], provider_with(fake_user_info()), None).await;

	assert_failed_with(&outcome, CallbackError::StateMismatch);
	assert!(outcome.provider.exchanges().is_empty(), "The provider must not be contacted.");

	let message = outcome.result.expect_err("Callback should fail.").to_string();

	assert!(message.contains("Login or logout failed to complete"));
}

#[tokio::test]
async fn rejects_when_returned_state_differs() {
	let outcome = run(
		&[],
		provider_with(fake_user_info()),
		Some(record(Some("other-state"), Some(FAKE_CODE_VERIFIER), None)),
	)
	.await;

	assert_failed_with(&outcome, CallbackError::StateMismatch);
}

#[tokio::test]
async fn resolves_without_checks_when_protections_are_disabled() {
	let outcome = run(
		&[("IDP_ENABLED_PROTECTIONS", "")],
		provider_with(fake_user_info()),
		Some(default_record()),
	)
	.await;

	assert_succeeded(&outcome, CallbackChecks::default());
}

#[tokio::test]
async fn rejects_when_code_verifier_is_missing() {
	let outcome =
		run(&[], provider_with(fake_user_info()), Some(record(Some(FAKE_STATE), None, None)))
			.await;

	assert_failed_with(&outcome, CallbackError::Stale);
	assert!(outcome.result.expect_err("Callback should fail.").to_string().contains("Login is stale"));
}

#[tokio::test]
async fn resolves_without_code_verifier_when_pkce_is_disabled() {
	let outcome = run(
		&[("IDP_ENABLED_PROTECTIONS", "STATE,NONCE")],
		provider_with(fake_user_info()),
		Some(record(Some(FAKE_STATE), None, Some(FAKE_NONCE))),
	)
	.await;

	assert_succeeded(
		&outcome,
		CallbackChecks {
			state: Some(Secret::new(FAKE_STATE)),
			code_verifier: None,
			nonce: Some(Secret::new(FAKE_NONCE)),
		},
	);
}

#[tokio::test]
async fn rejects_when_nonce_is_missing_despite_its_check() {
	let outcome = run(
		&[("IDP_ENABLED_PROTECTIONS", "STATE,NONCE,PKCE")],
		provider_with(fake_user_info()),
		Some(default_record()),
	)
	.await;

	assert_failed_with(&outcome, CallbackError::Stale);
}

#[tokio::test]
async fn rejects_unverified_email() {
	let mut user_info = fake_user_info();

	user_info["email_verified"] = json!(false);

	let outcome = run(&[], provider_with(user_info), Some(default_record())).await;

	assert_failed_with(&outcome, CallbackError::EmailNotVerified { email: "fake-email".into() });
	assert!(
		outcome
			.result
			.expect_err("Callback should fail.")
			.to_string()
			.contains("email not verified for fake-email")
	);
}

#[tokio::test]
async fn resolves_unverified_email_when_check_is_ignored() {
	let mut user_info = fake_user_info();

	user_info["email_verified"] = json!(false);

	let outcome = run(
		&[("SP_IGNORE_EMAIL_VERIFIED", "true")],
		provider_with(user_info),
		Some(default_record()),
	)
	.await;

	assert_succeeded(&outcome, default_checks());
}

#[tokio::test]
async fn profile_is_filled_with_email_and_name() {
	let outcome = run(&[], provider_with(fake_user_info()), Some(default_record())).await;

	assert_eq!(
		outcome.state.user.profile,
		Some(UserProfile { email: "fake-email".into(), name: Some("fake-name".into()) })
	);
}

#[tokio::test]
async fn profile_name_is_built_from_given_and_family_names() {
	let outcome = run(
		&[],
		provider_with(json!({
			"email": "fake-email",
			"email_verified": true,
			"given_name": "given_name",
			"family_name": "family_name",
		})),
		Some(default_record()),
	)
	.await;

	assert_eq!(
		outcome.state.user.profile,
		Some(UserProfile {
			email: "fake-email".into(),
			name: Some("given_name family_name".into()),
		})
	);
}

#[tokio::test]
async fn profile_uses_configured_attributes() {
	let mut user_info = fake_user_info();

	user_info["fooMail"] = json!("fake-email2");
	user_info["fooName"] = json!("fake-name2");

	let outcome = run(
		&[("SP_PROFILE_NAME_ATTR", "fooName"), ("SP_PROFILE_EMAIL_ATTR", "fooMail")],
		provider_with(user_info),
		Some(default_record()),
	)
	.await;

	assert_eq!(
		outcome.state.user.profile,
		Some(UserProfile { email: "fake-email2".into(), name: Some("fake-name2".into()) })
	);
}

#[tokio::test]
async fn redirects_to_root_by_default() {
	let outcome = run(&[], provider_with(fake_user_info()), Some(default_record())).await;

	assert_eq!(outcome.result.expect("Callback should succeed."), "/");
}

#[tokio::test]
async fn redirects_to_stored_target_url() {
	let pending = PendingLoginRecord {
		target_url: Some("http://localhost:8484/some/path".into()),
		..default_record()
	};
	let outcome = run(&[], provider_with(fake_user_info()), Some(pending)).await;

	assert_eq!(outcome.result.expect("Callback should succeed."), "http://localhost:8484/some/path");
}

#[tokio::test]
async fn exchange_failures_are_fatal_and_clear_the_session() {
	let provider = provider_with(fake_user_info());

	provider.fail_exchanges_with("invalid_grant", Some("code expired".into()));

	let outcome = run(&[], provider, Some(default_record())).await;

	assert!(matches!(
		&outcome.result,
		Err(Error::Exchange(ExchangeError::Provider { error, .. })) if error == "invalid_grant"
	));
	assert!(outcome.state.oidc.is_none());
	assert!(outcome.state.user.profile.is_none());
}

#[tokio::test]
async fn handle_callback_hides_failures_behind_a_generic_response() {
	let (party, _provider, store) = build_memory_test_party(&[], provider_with(fake_user_info()));

	seed(&store, "sid-failure", None);

	let response = party.handle_callback(&request("sid-failure")).await;

	assert_eq!(response, CallbackResponse::failure());
	assert_eq!(response.status(), 500);
	assert_eq!(response.body(), "OIDC callback failed.");

	seed(&store, "sid-success", Some(default_record()));

	let response = party.handle_callback(&request("sid-success")).await;

	assert_eq!(response, CallbackResponse::Redirect("/".into()));
}

#[tokio::test]
async fn login_then_callback_round_trip() {
	let (party, provider, store) = build_memory_test_party(
		&[("IDP_ENABLED_PROTECTIONS", "STATE,NONCE,PKCE")],
		provider_with(fake_user_info()),
	);
	let session = session_id("sid-round-trip");
	let target = Url::parse("http://localhost:8484/docs").expect("Target should parse.");

	party.login_redirect_url(&session, Some(&target)).await.expect("Login should succeed.");

	let pending = store
		.snapshot(&session)
		.and_then(|state| state.oidc)
		.expect("Login should store a pending record.");
	let state = pending.state.clone().expect("STATE is enabled.");
	let mut url = Url::parse("http://localhost:8484/oauth2/callback")
		.expect("Callback URL fixture should parse.");

	url.query_pairs_mut().append_pair("code", "fake-code").append_pair("state", state.expose());

	let location = party
		.complete_login(&CallbackRequest { session: session.clone(), url })
		.await
		.expect("Callback should succeed.");

	assert_eq!(location, "http://localhost:8484/docs");

	let exchanges = provider.exchanges();

	assert_eq!(
		exchanges[0].checks,
		CallbackChecks {
			state: pending.state.clone(),
			code_verifier: pending.code_verifier.clone(),
			nonce: pending.nonce.clone(),
		}
	);
	assert!(store.snapshot(&session).and_then(|state| state.oidc).is_none());

	let replay = party
		.complete_login(&CallbackRequest {
			session,
			url: Url::parse(CALLBACK_URL).expect("Callback URL fixture should parse."),
		})
		.await
		.expect_err("Pending login secrets are single-use.");

	assert!(matches!(replay, Error::Callback(CallbackError::StateMismatch)));
}
