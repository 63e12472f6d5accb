//! Walks one browser session through login, callback, and logout against the in-memory
//! identity provider.

// std
use std::{collections::BTreeMap, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
use serde_json::json;
use url::Url;
// self
use oidc_relying_party::{
	config::OidcConfig,
	flows::{CallbackRequest, RelyingParty},
	provider::{IdentityClaims, MemoryIdentityProvider},
	session::{MemorySessionStore, SessionId, SessionStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let env = BTreeMap::from_iter(
		[
			("SP_HOST", "https://app.example.com"),
			("IDP_ISSUER", "https://idp.example.com"),
			("IDP_CLIENT_ID", "demo-client"),
			("IDP_CLIENT_SECRET", "demo-secret"),
			("IDP_ENABLED_PROTECTIONS", "STATE,NONCE,PKCE"),
		]
		.map(|(k, v)| (k.to_owned(), v.to_owned())),
	);
	let config = OidcConfig::from_source(&env)?;
	let provider = MemoryIdentityProvider::new(
		Url::parse("https://idp.example.com")?,
		"demo-client",
		Url::parse("https://idp.example.com/authorize")?,
	)
	.with_end_session_endpoint(Some(Url::parse("https://idp.example.com/logout")?))
	.with_user_info(IdentityClaims::try_from(json!({
		"sub": "user-123",
		"email": "ada@example.com",
		"email_verified": true,
		"given_name": "Ada",
		"family_name": "Lovelace",
	}))
	.map_err(|value| eyre!("claims must be an object, got {value}"))?);
	let backend = Arc::new(MemorySessionStore::default());
	let store: Arc<dyn SessionStore> = backend.clone();
	let party = RelyingParty::with_provider(config, Arc::new(provider), store)?;
	let session = SessionId::new("browser-session-1")?;
	let target = Url::parse("https://app.example.com/docs")?;
	let login_url = party.login_redirect_url(&session, Some(&target)).await?;

	println!("Send the browser to {login_url}.");

	let pending = backend
		.snapshot(&session)
		.and_then(|state| state.oidc)
		.ok_or_else(|| eyre!("login did not store a pending record"))?;
	let state = pending.state.ok_or_else(|| eyre!("STATE is enabled"))?;
	let mut callback_url = party.config().callback_url();

	// Simulate the provider redirecting back with a code and the echoed state.
	callback_url
		.query_pairs_mut()
		.append_pair("code", "demo-code")
		.append_pair("state", state.expose());

	let response = party
		.handle_callback(&CallbackRequest { session: session.clone(), url: callback_url })
		.await;

	println!("Callback answered HTTP {} -> {:?}.", response.status(), response.location());

	if let Some(profile) = backend.snapshot(&session).and_then(|state| state.user.profile) {
		println!("Signed in as {} ({:?}).", profile.email, profile.name);
	}

	let logout_url =
		party.logout_redirect_url(&Url::parse("https://app.example.com/signed-out")?)?;

	println!("Log out through {logout_url}.");

	Ok(())
}
