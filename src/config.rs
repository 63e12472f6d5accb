//! Relying-party configuration resolved once at startup.
//!
//! [`OidcConfig::from_source`] reads environment-style key/value pairs through a
//! [`ConfigSource`], fails closed on the first missing mandatory parameter, and parses the
//! optional feature flags into an immutable value that is passed down explicitly.

// self
use crate::{_prelude::*, error::ConfigError, protection::ProtectionSet, session::Secret};

/// Public host of this service; the callback lives at `{SP_HOST}/oauth2/callback`.
pub const SP_HOST: &str = "SP_HOST";
/// Identity provider issuer URL.
pub const IDP_ISSUER: &str = "IDP_ISSUER";
/// OAuth client identifier.
pub const IDP_CLIENT_ID: &str = "IDP_CLIENT_ID";
/// OAuth client secret.
pub const IDP_CLIENT_SECRET: &str = "IDP_CLIENT_SECRET";
/// Space-delimited scopes requested at login.
pub const IDP_SCOPES: &str = "IDP_SCOPES";
/// Comma list over `STATE`, `NONCE`, `PKCE`.
pub const IDP_ENABLED_PROTECTIONS: &str = "IDP_ENABLED_PROTECTIONS";
/// Skip the provider-side logout entirely.
pub const IDP_SKIP_END_SESSION_ENDPOINT: &str = "IDP_SKIP_END_SESSION_ENDPOINT";
/// End-session endpoint override.
pub const IDP_END_SESSION_ENDPOINT: &str = "IDP_END_SESSION_ENDPOINT";
/// Accept identities whose email is reported as unverified.
pub const SP_IGNORE_EMAIL_VERIFIED: &str = "SP_IGNORE_EMAIL_VERIFIED";
/// Claim used for the profile name.
pub const SP_PROFILE_NAME_ATTR: &str = "SP_PROFILE_NAME_ATTR";
/// Claim used for the profile email.
pub const SP_PROFILE_EMAIL_ATTR: &str = "SP_PROFILE_EMAIL_ATTR";

/// Fixed path of the callback endpoint, relative to `SP_HOST`.
pub const CALLBACK_PATH: &str = "/oauth2/callback";
/// Scopes requested when `IDP_SCOPES` is unset.
pub const DEFAULT_SCOPES: &str = "openid email profile";

const MANDATORY: [&str; 4] = [SP_HOST, IDP_ISSUER, IDP_CLIENT_ID, IDP_CLIENT_SECRET];

/// Named configuration values, typically the process environment.
pub trait ConfigSource {
	/// Returns the raw value stored under `name`, if any.
	fn get(&self, name: &str) -> Option<String>;
}
impl ConfigSource for BTreeMap<String, String> {
	fn get(&self, name: &str) -> Option<String> {
		BTreeMap::get(self, name).cloned()
	}
}
impl ConfigSource for HashMap<String, String> {
	fn get(&self, name: &str) -> Option<String> {
		HashMap::get(self, name).cloned()
	}
}

/// [`ConfigSource`] backed by the process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSource;
impl ConfigSource for EnvSource {
	fn get(&self, name: &str) -> Option<String> {
		std::env::var(name).ok()
	}
}

/// Credentials handed to the identity provider client at initialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientParams {
	/// Issuer URL used for discovery.
	pub issuer_url: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Secret,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Url,
}

/// Immutable, process-wide relying-party configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct OidcConfig {
	/// Identity provider issuer.
	pub issuer_url: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Secret,
	/// Public host of this service.
	pub sp_host: Url,
	/// Scopes requested at login.
	pub scopes: String,
	/// Protections applied to each login.
	pub enabled_protections: ProtectionSet,
	/// End-session endpoint that takes precedence over discovery.
	pub end_session_endpoint_override: Option<Url>,
	/// Redirect straight to the post-logout URL without calling the provider.
	pub skip_end_session_endpoint: bool,
	/// Accept identities whose `email_verified` claim is false.
	pub ignore_email_verified: bool,
	/// Claim used for the profile name.
	pub profile_name_attr: Option<String>,
	/// Claim used for the profile email.
	pub profile_email_attr: Option<String>,
}
impl OidcConfig {
	/// Resolves the configuration from `source`.
	pub fn from_source(source: &impl ConfigSource) -> Result<Self> {
		let read = |name: &'static str| source.get(name).filter(|value| !value.is_empty());

		for name in MANDATORY {
			if read(name).is_none() {
				return Err(ConfigError::MissingParameter { name }.into());
			}
		}

		let required =
			|name: &'static str| read(name).ok_or(ConfigError::MissingParameter { name });
		let sp_host = parse_url(SP_HOST, &required(SP_HOST)?)?;
		let issuer_url = parse_url(IDP_ISSUER, &required(IDP_ISSUER)?)?;
		let client_id = required(IDP_CLIENT_ID)?;
		let client_secret = Secret::new(required(IDP_CLIENT_SECRET)?);
		let scopes = read(IDP_SCOPES).unwrap_or_else(|| DEFAULT_SCOPES.to_owned());
		// An empty override is meaningful here: it disables every protection.
		let enabled_protections = match source.get(IDP_ENABLED_PROTECTIONS) {
			Some(raw) => raw.parse::<ProtectionSet>()?,
			None => ProtectionSet::default(),
		};
		let end_session_endpoint_override = read(IDP_END_SESSION_ENDPOINT)
			.map(|raw| parse_url(IDP_END_SESSION_ENDPOINT, &raw))
			.transpose()?;
		let skip_end_session_endpoint = parse_flag(source, IDP_SKIP_END_SESSION_ENDPOINT)?;
		let ignore_email_verified = parse_flag(source, SP_IGNORE_EMAIL_VERIFIED)?;

		Ok(Self {
			issuer_url,
			client_id,
			client_secret,
			sp_host,
			scopes,
			enabled_protections,
			end_session_endpoint_override,
			skip_end_session_endpoint,
			ignore_email_verified,
			profile_name_attr: read(SP_PROFILE_NAME_ATTR),
			profile_email_attr: read(SP_PROFILE_EMAIL_ATTR),
		})
	}

	/// Resolves the configuration from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::from_source(&EnvSource)
	}

	/// Absolute URL of the callback endpoint registered with the provider.
	pub fn callback_url(&self) -> Url {
		let mut url = self.sp_host.clone();
		let path = format!("{}{CALLBACK_PATH}", url.path().trim_end_matches('/'));

		url.set_path(&path);
		url.set_query(None);
		url.set_fragment(None);

		url
	}

	/// Credentials used to initialize the identity provider client.
	pub fn client_params(&self) -> ClientParams {
		ClientParams {
			issuer_url: self.issuer_url.clone(),
			client_id: self.client_id.clone(),
			client_secret: self.client_secret.clone(),
			redirect_uri: self.callback_url(),
		}
	}
}
impl Debug for OidcConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OidcConfig")
			.field("issuer_url", &self.issuer_url.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("sp_host", &self.sp_host.as_str())
			.field("scopes", &self.scopes)
			.field("enabled_protections", &self.enabled_protections)
			.field("end_session_endpoint_override", &self.end_session_endpoint_override)
			.field("skip_end_session_endpoint", &self.skip_end_session_endpoint)
			.field("ignore_email_verified", &self.ignore_email_verified)
			.field("profile_name_attr", &self.profile_name_attr)
			.field("profile_email_attr", &self.profile_email_attr)
			.finish()
	}
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { name, source })
}

fn parse_flag(source: &impl ConfigSource, name: &'static str) -> Result<bool, ConfigError> {
	let Some(raw) = source.get(name) else {
		return Ok(false);
	};

	match raw.trim().to_ascii_lowercase().as_str() {
		"" | "false" | "0" | "no" => Ok(false),
		"true" | "1" | "yes" => Ok(true),
		_ => Err(ConfigError::InvalidFlag { name, value: raw }),
	}
}
