//! Relying-party error types shared across configuration, providers, flows, and sessions.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Startup configuration problem; the process cannot serve OIDC.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identity provider client could not be initialized.
	#[error(transparent)]
	ClientInit(#[from] ClientInitError),
	/// Callback rejected by a fail-closed check.
	#[error(transparent)]
	Callback(#[from] CallbackError),
	/// Identity provider call failed during the callback.
	#[error(transparent)]
	Exchange(#[from] ExchangeError),
	/// Session-store failure.
	#[error(transparent)]
	Session(#[from] crate::session::SessionStoreError),
}

/// Configuration failures raised while resolving [`OidcConfig`](crate::config::OidcConfig).
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A mandatory parameter is absent or empty.
	#[error("Missing required configuration parameter: {name}.")]
	MissingParameter {
		/// Name of the missing parameter.
		name: &'static str,
	},
	/// The protections override names an unknown protection.
	#[error("Invalid protection in IDP_ENABLED_PROTECTIONS: {token}.")]
	InvalidProtection {
		/// Offending comma-separated entry.
		token: String,
	},
	/// A boolean option holds an unrecognized value.
	#[error("Configuration parameter {name} expects a boolean, got `{value}`.")]
	InvalidFlag {
		/// Name of the option.
		name: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
	/// A URL-valued option cannot be parsed.
	#[error("Configuration parameter {name} is not a valid URL.")]
	InvalidUrl {
		/// Name of the option.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Neither an override nor discovery yields an end-session endpoint.
	#[error(
		"The identity provider does not advertise an end_session_endpoint. If that is expected, please set IDP_SKIP_END_SESSION_ENDPOINT=true or provide IDP_END_SESSION_ENDPOINT."
	)]
	EndSessionEndpointUnresolved,
}

/// Failures raised while initializing the identity provider client.
#[derive(Debug, ThisError)]
pub enum ClientInitError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Discovery document could not be fetched.
	#[error("Failed to fetch discovery metadata for issuer {issuer}.")]
	Discovery {
		/// Configured issuer.
		issuer: String,
		/// Underlying transport failure.
		#[source]
		source: BoxError,
	},
	/// Discovery endpoint replied with a non-success status.
	#[error("Discovery endpoint for issuer {issuer} returned HTTP {status}.")]
	DiscoveryStatus {
		/// Configured issuer.
		issuer: String,
		/// HTTP status code.
		status: u16,
	},
	/// Discovery document is malformed or misses mandatory fields.
	#[error("Discovery metadata for issuer {issuer} is invalid.")]
	InvalidMetadata {
		/// Configured issuer.
		issuer: String,
		/// Underlying parsing failure.
		#[source]
		source: BoxError,
	},
	/// Discovery document advertises a different issuer.
	#[error("Discovery metadata advertises issuer {actual}, expected {expected}.")]
	IssuerMismatch {
		/// Configured issuer.
		expected: String,
		/// Issuer found in the metadata.
		actual: String,
	},
}
impl ClientInitError {
	/// Wraps a transport failure raised while fetching discovery metadata.
	pub fn discovery(issuer: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Discovery { issuer: issuer.to_string(), source: Box::new(src) }
	}

	/// Wraps a metadata parsing failure.
	pub fn invalid_metadata(
		issuer: &Url,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::InvalidMetadata { issuer: issuer.to_string(), source: Box::new(src) }
	}
}

/// Fail-closed callback checks.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CallbackError {
	/// The session state is absent or does not match the returned `state`.
	#[error("Login or logout failed to complete.")]
	StateMismatch,
	/// A required PKCE verifier or nonce is absent from the session.
	#[error("Login is stale.")]
	Stale,
	/// The provider reports the email address as unverified.
	#[error("email not verified for {email}")]
	EmailNotVerified {
		/// Email claim of the rejected subject.
		email: String,
	},
	/// The configured email claim is missing from the identity claims.
	#[error("Identity claims are missing the `{attribute}` email attribute.")]
	MissingEmail {
		/// Claim name that was looked up.
		attribute: String,
	},
}

/// Identity provider failures surfaced during the callback.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// The provider returned an OAuth error, either on the redirect or from the token endpoint.
	#[error("Identity provider returned an error: {error}{}.", describe(.description))]
	Provider {
		/// OAuth `error` code.
		error: String,
		/// Optional `error_description`.
		description: Option<String>,
	},
	/// The callback carries no authorization code.
	#[error("Callback is missing the authorization code.")]
	MissingCode,
	/// The returned `state` differs from the checked value.
	#[error("Callback state does not match the expected value.")]
	StateMismatch,
	/// The ID token nonce differs from the checked value.
	#[error("ID token nonce does not match the expected value.")]
	NonceMismatch,
	/// The ID token failed validation.
	#[error("ID token is invalid: {reason}.")]
	InvalidIdToken {
		/// Validation failure summary.
		reason: String,
	},
	/// An endpoint replied with a non-success HTTP status.
	#[error("The {endpoint} endpoint returned HTTP {status}.")]
	Http {
		/// Endpoint label.
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
	},
	/// An endpoint replied in a shape the client could not classify.
	#[error("The {endpoint} endpoint returned an unexpected response: {message}.")]
	Unexpected {
		/// Endpoint label.
		endpoint: &'static str,
		/// Detail reported by the client library.
		message: String,
	},
	/// Network or I/O failure.
	#[error("Network error occurred while calling the identity provider.")]
	Transport {
		/// Transport-specific error.
		#[source]
		source: BoxError,
	},
	/// An endpoint replied with a malformed body.
	#[error("The {endpoint} endpoint returned a malformed response.")]
	Parse {
		/// Endpoint label.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: BoxError,
	},
}
impl ExchangeError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}

	/// Wraps a parsing failure for the named endpoint.
	pub fn parse(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Parse { endpoint, source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ExchangeError {
	fn from(e: ReqwestError) -> Self {
		Self::transport(e)
	}
}

fn describe(description: &Option<String>) -> String {
	description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
}
