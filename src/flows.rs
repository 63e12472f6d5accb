//! Login, callback, and logout flows orchestrated by [`RelyingParty`].

pub mod callback;
pub mod login;
pub mod logout;
pub mod secrets;

pub use callback::*;

// self
use crate::{
	_prelude::*,
	config::{ClientParams, OidcConfig},
	error::{ClientInitError, ConfigError},
	provider::IdentityProvider,
	session::{ProfileMapper, SessionStore},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, provider::HttpIdentityProvider};

#[cfg(feature = "reqwest")]
/// Relying party specialized for the production discovery-backed provider.
pub type ReqwestRelyingParty = RelyingParty<HttpIdentityProvider>;

/// Coordinates the OpenID Connect login flows for one identity provider.
///
/// The relying party owns the resolved configuration, the single long-lived provider
/// handle, and the session store. Construction fails unless a logout destination can be
/// resolved, so a built value is always able to serve every flow.
pub struct RelyingParty<P>
where
	P: ?Sized + IdentityProvider,
{
	config: Arc<OidcConfig>,
	provider: Arc<P>,
	store: Arc<dyn SessionStore>,
	profile_mapper: ProfileMapper,
}
impl<P> RelyingParty<P>
where
	P: ?Sized + IdentityProvider,
{
	/// Wraps an already initialized provider.
	pub fn with_provider(
		config: OidcConfig,
		provider: Arc<P>,
		store: Arc<dyn SessionStore>,
	) -> Result<Self> {
		let end_session_resolved = config.skip_end_session_endpoint
			|| config.end_session_endpoint_override.is_some()
			|| provider.end_session_endpoint().is_some();

		if !end_session_resolved {
			return Err(ConfigError::EndSessionEndpointUnresolved.into());
		}

		tracing::info!("initialized with issuer {}", provider.issuer());

		let profile_mapper = ProfileMapper::from_config(&config);

		Ok(Self { config: Arc::new(config), provider, store, profile_mapper })
	}

	/// Resolved configuration.
	pub fn config(&self) -> &OidcConfig {
		&self.config
	}

	/// Identity provider handle.
	pub fn provider(&self) -> &Arc<P> {
		&self.provider
	}

	/// Session store backing the flows.
	pub fn store(&self) -> &Arc<dyn SessionStore> {
		&self.store
	}
}
impl<P> RelyingParty<P>
where
	P: IdentityProvider,
{
	/// Initializes the provider through `init` and wraps it.
	pub async fn initialize<F, Fut>(
		config: OidcConfig,
		store: Arc<dyn SessionStore>,
		init: F,
	) -> Result<Self>
	where
		F: FnOnce(ClientParams) -> Fut,
		Fut: Future<Output = Result<P, ClientInitError>>,
	{
		let provider = init(config.client_params()).await?;

		Self::with_provider(config, Arc::new(provider), store)
	}
}
#[cfg(feature = "reqwest")]
impl RelyingParty<HttpIdentityProvider> {
	/// Runs issuer discovery with a fresh reqwest client.
	pub async fn discover(config: OidcConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
		let http_client = ReqwestHttpClient::build()?;

		Self::initialize(config, store, |params| HttpIdentityProvider::discover(params, http_client))
			.await
	}

	/// Resolves the configuration from the process environment, then runs discovery.
	pub async fn from_env(store: Arc<dyn SessionStore>) -> Result<Self> {
		Self::discover(OidcConfig::from_env()?, store).await
	}
}
impl<P> Clone for RelyingParty<P>
where
	P: ?Sized + IdentityProvider,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			provider: self.provider.clone(),
			store: self.store.clone(),
			profile_mapper: self.profile_mapper.clone(),
		}
	}
}
impl<P> Debug for RelyingParty<P>
where
	P: ?Sized + IdentityProvider,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RelyingParty")
			.field("issuer", &self.provider.issuer().as_str())
			.field("config", &self.config)
			.finish()
	}
}
