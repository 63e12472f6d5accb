//! Session-store contract and the session-scoped records owned by the login flow.
//!
//! Two pieces of state live in a browser session: the pending-login secret bundle under the
//! `oidc` key, written at login initiation and consumed by the callback, and the
//! authenticated user's `profile`, written once per successful callback. The store is an
//! external collaborator; [`SessionStore`] only requires that each operation is atomic per
//! session.

pub mod id;
pub mod memory;
pub mod profile;
pub mod secret;

pub use id::*;
pub use memory::MemorySessionStore;
pub use profile::ProfileMapper;
pub use secret::*;

// self
use crate::_prelude::*;

/// Future returned by [`SessionStore`] operations.
pub type SessionFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, SessionStoreError>> + 'a + Send>>;

/// Scoped read-modify-write applied to the authenticated part of a session.
pub type UserOperation = Box<dyn FnOnce(&mut SessionUser) + Send>;

/// Per-browser-session storage used by the login flow.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Persists `record` as the session's pending login, replacing any previous one.
	fn save_pending_login<'a>(
		&'a self,
		session: &'a SessionId,
		record: PendingLoginRecord,
	) -> SessionFuture<'a, ()>;

	/// Atomically reads and deletes the session's pending login.
	fn take_pending_login<'a>(&'a self, session: &'a SessionId) -> SessionFuture<'a, PendingLogin>;

	/// Applies `operation` to the authenticated session as one read-modify-write.
	fn operate_on_user<'a>(
		&'a self,
		session: &'a SessionId,
		operation: UserOperation,
	) -> SessionFuture<'a, ()>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionStoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Pending-login slot of a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PendingLogin {
	/// No login is in flight for this session.
	#[default]
	Absent,
	/// Secrets generated by the most recent login initiation.
	Present(PendingLoginRecord),
}
impl PendingLogin {
	/// Returns the record, if present.
	pub fn record(&self) -> Option<&PendingLoginRecord> {
		match self {
			PendingLogin::Absent => None,
			PendingLogin::Present(record) => Some(record),
		}
	}
}
impl From<Option<PendingLoginRecord>> for PendingLogin {
	fn from(value: Option<PendingLoginRecord>) -> Self {
		value.map_or(PendingLogin::Absent, PendingLogin::Present)
	}
}

/// Ephemeral, single-use secrets stored under the session's `oidc` key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLoginRecord {
	/// CSRF token, when `STATE` is enabled.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<Secret>,
	/// Replay token, when `NONCE` is enabled.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<Secret>,
	/// PKCE verifier, when `PKCE` is enabled.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code_verifier: Option<Secret>,
	/// Where to send the browser after a successful login.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_url: Option<String>,
}

/// Profile of the authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Email address.
	pub email: String,
	/// Display name, when the claims provide one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

/// Authenticated part of a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
	/// Profile committed by the last successful callback.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub profile: Option<UserProfile>,
}
