//! Claims-to-profile mapping applied by the callback before the session is committed.

// self
use crate::{
	_prelude::*, config::OidcConfig, error::CallbackError, provider::IdentityClaims,
	session::UserProfile,
};

const DEFAULT_EMAIL_ATTR: &str = "email";
const DEFAULT_NAME_ATTR: &str = "name";

/// Turns identity claims into a [`UserProfile`] following the configured attribute names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileMapper {
	/// Claim holding the display name; `name` then `given_name family_name` when unset.
	pub name_attr: Option<String>,
	/// Claim holding the email address; `email` when unset.
	pub email_attr: Option<String>,
	/// Accept subjects whose `email_verified` claim is `false`.
	pub ignore_email_verified: bool,
}
impl ProfileMapper {
	/// Builds the mapper from the resolved configuration.
	pub fn from_config(config: &OidcConfig) -> Self {
		Self {
			name_attr: config.profile_name_attr.clone(),
			email_attr: config.profile_email_attr.clone(),
			ignore_email_verified: config.ignore_email_verified,
		}
	}

	/// Rejects subjects the provider explicitly reports as unverified.
	///
	/// Only a boolean `false` fails; an absent claim is accepted.
	pub fn verify_email(&self, claims: &IdentityClaims) -> Result<(), CallbackError> {
		if self.ignore_email_verified || claims.email_verified() != Some(false) {
			return Ok(());
		}

		Err(CallbackError::EmailNotVerified {
			email: claims.get_str(DEFAULT_EMAIL_ATTR).unwrap_or_default().to_owned(),
		})
	}

	/// Maps `claims` into a profile.
	pub fn map(&self, claims: &IdentityClaims) -> Result<UserProfile, CallbackError> {
		let email_attr = self.email_attr.as_deref().unwrap_or(DEFAULT_EMAIL_ATTR);
		let email = claims
			.get_str(email_attr)
			.ok_or_else(|| CallbackError::MissingEmail { attribute: email_attr.to_owned() })?
			.to_owned();
		let name = match &self.name_attr {
			Some(attr) => claims.get_str(attr).map(str::to_owned),
			None => claims.get_str(DEFAULT_NAME_ATTR).map(str::to_owned).or_else(|| {
				match (claims.get_str("given_name"), claims.get_str("family_name")) {
					(Some(given), Some(family)) => Some(format!("{given} {family}")),
					_ => None,
				}
			}),
		};

		Ok(UserProfile { email, name })
	}
}
