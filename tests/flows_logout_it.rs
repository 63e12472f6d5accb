// self
use oidc_relying_party::_preludet::*;

const REDIRECT_URL: &str = "http://localhost:8484/docs/signed-out";
const OVERRIDE_URL: &str = "http://localhost:8484/logout";

fn redirect() -> Url {
	Url::parse(REDIRECT_URL).expect("Redirect URL fixture should parse.")
}

#[test]
fn skip_returns_the_redirect_unchanged() {
	let (party, _provider, _store) =
		build_memory_test_party(&[("IDP_SKIP_END_SESSION_ENDPOINT", "true")], memory_provider());
	let url = party.logout_redirect_url(&redirect()).expect("Logout URL should resolve.");

	assert_eq!(url.as_str(), REDIRECT_URL);
}

#[test]
fn skip_wins_over_the_override() {
	let (party, _provider, _store) = build_memory_test_party(
		&[("IDP_SKIP_END_SESSION_ENDPOINT", "true"), ("IDP_END_SESSION_ENDPOINT", OVERRIDE_URL)],
		memory_provider(),
	);
	let url = party.logout_redirect_url(&redirect()).expect("Logout URL should resolve.");

	assert_eq!(url.as_str(), REDIRECT_URL);
}

#[test]
fn override_is_returned_when_set() {
	let (party, _provider, _store) = build_memory_test_party(
		&[("IDP_END_SESSION_ENDPOINT", OVERRIDE_URL)],
		memory_provider().with_end_session_endpoint(None),
	);
	let url = party.logout_redirect_url(&redirect()).expect("Logout URL should resolve.");

	assert_eq!(url.as_str(), OVERRIDE_URL);
}

#[test]
fn discovered_endpoint_is_used_by_default() {
	let (party, _provider, _store) = build_memory_test_party(&[], memory_provider());
	let url = party.logout_redirect_url(&redirect()).expect("Logout URL should resolve.");
	let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

	assert!(url.as_str().starts_with(TEST_END_SESSION_ENDPOINT));
	assert_eq!(pairs.get("client_id"), Some(&"client id".into()));
	assert_eq!(pairs.get("post_logout_redirect_uri"), Some(&REDIRECT_URL.into()));
}
