//! Thread-safe in-memory [`SessionStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	session::{
		PendingLogin, PendingLoginRecord, SessionFuture, SessionId, SessionStore, SessionUser,
		UserOperation,
	},
};

type SessionMap = Arc<RwLock<HashMap<SessionId, SessionState>>>;

/// Everything the login flow keeps in one browser session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
	/// Pending-login secrets.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub oidc: Option<PendingLoginRecord>,
	/// Authenticated user.
	#[serde(flatten)]
	pub user: SessionUser,
}

/// Storage backend that keeps sessions in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore(SessionMap);
impl MemorySessionStore {
	/// Returns a copy of the stored session, if any.
	pub fn snapshot(&self, session: &SessionId) -> Option<SessionState> {
		self.0.read().get(session).cloned()
	}

	/// Seeds a session with an explicit state, replacing what was stored.
	pub fn insert(&self, session: SessionId, state: SessionState) {
		self.0.write().insert(session, state);
	}

	fn save_now(map: SessionMap, session: SessionId, record: PendingLoginRecord) {
		map.write().entry(session).or_default().oidc = Some(record);
	}

	fn take_now(map: SessionMap, session: &SessionId) -> PendingLogin {
		let mut guard = map.write();

		guard.get_mut(session).and_then(|state| state.oidc.take()).into()
	}

	fn operate_now(map: SessionMap, session: SessionId, operation: UserOperation) {
		let mut guard = map.write();

		operation(&mut guard.entry(session).or_default().user);
	}
}
impl SessionStore for MemorySessionStore {
	fn save_pending_login<'a>(
		&'a self,
		session: &'a SessionId,
		record: PendingLoginRecord,
	) -> SessionFuture<'a, ()> {
		let map = self.0.clone();
		let session = session.to_owned();

		Box::pin(async move {
			Self::save_now(map, session, record);

			Ok(())
		})
	}

	fn take_pending_login<'a>(&'a self, session: &'a SessionId) -> SessionFuture<'a, PendingLogin> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::take_now(map, session)) })
	}

	fn operate_on_user<'a>(
		&'a self,
		session: &'a SessionId,
		operation: UserOperation,
	) -> SessionFuture<'a, ()> {
		let map = self.0.clone();
		let session = session.to_owned();

		Box::pin(async move {
			Self::operate_now(map, session, operation);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::session::{Secret, UserProfile};

	fn sid(value: &str) -> SessionId {
		SessionId::new(value).expect("Session fixture should be valid.")
	}

	#[tokio::test]
	async fn save_overwrites_and_take_is_single_use() {
		let store = MemorySessionStore::default();
		let session = sid("sid-1");
		let first = PendingLoginRecord { state: Some(Secret::new("one")), ..Default::default() };
		let second = PendingLoginRecord { state: Some(Secret::new("two")), ..Default::default() };

		store.save_pending_login(&session, first).await.expect("Saving should succeed.");
		store.save_pending_login(&session, second.clone()).await.expect("Saving should succeed.");

		let taken = store.take_pending_login(&session).await.expect("Taking should succeed.");

		assert_eq!(taken, PendingLogin::Present(second));

		let again = store.take_pending_login(&session).await.expect("Taking should succeed.");

		assert_eq!(again, PendingLogin::Absent);
	}

	#[tokio::test]
	async fn sessions_are_isolated() {
		let store = MemorySessionStore::default();

		store
			.save_pending_login(&sid("sid-a"), PendingLoginRecord::default())
			.await
			.expect("Saving should succeed.");

		let other = store.take_pending_login(&sid("sid-b")).await.expect("Taking should succeed.");

		assert_eq!(other, PendingLogin::Absent);
		assert!(store.snapshot(&sid("sid-a")).and_then(|state| state.oidc).is_some());
	}

	#[tokio::test]
	async fn operate_on_user_mutates_in_place() {
		let store = MemorySessionStore::default();
		let session = sid("sid-user");
		let profile = UserProfile { email: "ada@example.com".into(), name: Some("Ada".into()) };
		let expected = profile.clone();

		store
			.operate_on_user(&session, Box::new(move |user| user.profile = Some(profile)))
			.await
			.expect("Scoped mutation should succeed.");

		let state = store.snapshot(&session).expect("Session should exist after mutation.");

		assert_eq!(state.user.profile, Some(expected));

		let payload = serde_json::to_value(&state).expect("Session state should serialize.");

		assert_eq!(payload["profile"]["email"], "ada@example.com");
		assert!(payload.get("oidc").is_none());
	}
}
