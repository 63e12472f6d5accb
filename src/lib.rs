//! OpenID Connect relying-party login: build authorization redirects with session-bound
//! state/nonce/PKCE secrets, validate the provider callback fail-closed, and resolve federated
//! logout redirects.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod flows;
#[cfg(feature = "reqwest")] pub mod http;
pub mod obs;
pub mod protection;
pub mod provider;
pub mod session;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::OidcConfig,
		flows::RelyingParty,
		provider::MemoryIdentityProvider,
		session::{MemorySessionStore, SessionId, SessionStore},
	};

	/// Relying party type alias used by the in-memory integration tests.
	pub type MemoryTestParty = RelyingParty<MemoryIdentityProvider>;

	/// Issuer used by the in-memory fixtures.
	pub const TEST_ISSUER: &str = "http://localhost:8000";
	/// Authorization URL returned by [`memory_provider`].
	pub const TEST_AUTHORIZATION_URL: &str = "http://localhost:8000/authorize";
	/// End-session endpoint advertised by [`memory_provider`].
	pub const TEST_END_SESSION_ENDPOINT: &str = "http://localhost:8000/session/end";

	/// Configuration map with the four mandatory parameters populated.
	pub fn base_config_map() -> BTreeMap<String, String> {
		BTreeMap::from_iter(
			[
				("SP_HOST", "http://localhost:8484"),
				("IDP_ISSUER", TEST_ISSUER),
				("IDP_CLIENT_ID", "client id"),
				("IDP_CLIENT_SECRET", "secret"),
			]
			.map(|(k, v)| (k.to_owned(), v.to_owned())),
		)
	}

	/// Builds a configuration from the base map extended with `overrides`.
	pub fn test_config(overrides: &[(&str, &str)]) -> OidcConfig {
		let mut map = base_config_map();

		for (key, value) in overrides {
			map.insert((*key).to_owned(), (*value).to_owned());
		}

		OidcConfig::from_source(&map).expect("Test configuration should resolve successfully.")
	}

	/// In-memory provider for [`TEST_ISSUER`] that advertises an end-session endpoint.
	pub fn memory_provider() -> MemoryIdentityProvider {
		MemoryIdentityProvider::new(
			Url::parse(TEST_ISSUER).expect("Test issuer should parse."),
			"client id",
			Url::parse(TEST_AUTHORIZATION_URL).expect("Test authorization URL should parse."),
		)
		.with_end_session_endpoint(Some(
			Url::parse(TEST_END_SESSION_ENDPOINT).expect("Test end-session endpoint should parse."),
		))
	}

	/// Validated session identifier fixture.
	pub fn session_id(value: &str) -> SessionId {
		SessionId::new(value).expect("Session identifier fixture should be valid.")
	}

	/// Constructs a [`RelyingParty`] backed by the in-memory provider and session store.
	pub fn build_memory_test_party(
		overrides: &[(&str, &str)],
		provider: MemoryIdentityProvider,
	) -> (MemoryTestParty, Arc<MemoryIdentityProvider>, Arc<MemorySessionStore>) {
		let provider = Arc::new(provider);
		let store_backend = Arc::new(MemorySessionStore::default());
		let store: Arc<dyn SessionStore> = store_backend.clone();
		let party = RelyingParty::with_provider(test_config(overrides), provider.clone(), store)
			.expect("Relying party should initialize against the in-memory provider.");

		(party, provider, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tracing_subscriber as _};
