//! Optional login protections (`STATE`, `NONCE`, `PKCE`) and the set enabled for a deployment.

// self
use crate::{_prelude::*, error::ConfigError};

/// One optional protection applied to the authorization-code round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protection {
	/// CSRF token round-tripped through the identity provider.
	State,
	/// Replay token bound to the issued ID token.
	Nonce,
	/// Proof Key for Code Exchange.
	Pkce,
}
impl Protection {
	/// Every protection, in canonical order.
	pub const ALL: [Protection; 3] = [Protection::State, Protection::Nonce, Protection::Pkce];

	/// Returns the configuration token naming the protection.
	pub const fn as_str(self) -> &'static str {
		match self {
			Protection::State => "STATE",
			Protection::Nonce => "NONCE",
			Protection::Pkce => "PKCE",
		}
	}

	const fn bit(self) -> u8 {
		match self {
			Protection::State => 0b001,
			Protection::Nonce => 0b010,
			Protection::Pkce => 0b100,
		}
	}
}
impl Display for Protection {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Protection {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Protection::ALL
			.into_iter()
			.find(|protection| protection.as_str() == s)
			.ok_or_else(|| ConfigError::InvalidProtection { token: s.to_owned() })
	}
}

/// Set of enabled protections.
///
/// Defaults to `{STATE, PKCE}`. Parsing an empty string yields the empty set, which disables
/// every optional protection.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtectionSet(u8);
impl ProtectionSet {
	/// Set with no protection enabled.
	pub const fn empty() -> Self {
		Self(0)
	}

	/// Builds a set from the provided protections.
	pub fn new(protections: impl IntoIterator<Item = Protection>) -> Self {
		protections.into_iter().fold(Self::empty(), |set, protection| set.with(protection))
	}

	/// Returns a copy of the set with `protection` enabled.
	pub const fn with(self, protection: Protection) -> Self {
		Self(self.0 | protection.bit())
	}

	/// Checks whether `protection` is enabled.
	pub const fn supports(&self, protection: Protection) -> bool {
		self.0 & protection.bit() != 0
	}

	/// Returns true if no protection is enabled.
	pub const fn is_empty(&self) -> bool {
		self.0 == 0
	}

	/// Iterator over enabled protections in canonical order.
	pub fn iter(&self) -> impl Iterator<Item = Protection> + '_ {
		Protection::ALL.into_iter().filter(|protection| self.supports(*protection))
	}
}
impl Default for ProtectionSet {
	fn default() -> Self {
		Self::empty().with(Protection::State).with(Protection::Pkce)
	}
}
impl FromIterator<Protection> for ProtectionSet {
	fn from_iter<I: IntoIterator<Item = Protection>>(iter: I) -> Self {
		Self::new(iter)
	}
}
impl Debug for ProtectionSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_set().entries(self.iter()).finish()
	}
}
impl Display for ProtectionSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		for (idx, protection) in self.iter().enumerate() {
			if idx > 0 {
				f.write_str(",")?;
			}

			f.write_str(protection.as_str())?;
		}

		Ok(())
	}
}
impl FromStr for ProtectionSet {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Ok(Self::empty());
		}

		s.split(',').map(str::parse::<Protection>).collect()
	}
}
