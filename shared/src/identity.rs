//! Session identity announced to the realtime backend
//!
//! The `identify` handshake carries exactly this payload:
//! ```json
//! { "userType": "tiffin_partner", "userId": "u1" }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of actor on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Bike ride customer
    Rider,
    /// Bike or heavy-vehicle driver
    Driver,
    /// Tiffin / food vendor
    TiffinPartner,
    /// Food ordering customer
    Customer,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Rider => "rider",
            UserType::Driver => "driver",
            UserType::TiffinPartner => "tiffin_partner",
            UserType::Customer => "customer",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Unknown user type: {0}")]
    UnknownUserType(String),
}

impl FromStr for UserType {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rider" => Ok(UserType::Rider),
            "driver" => Ok(UserType::Driver),
            "tiffin_partner" => Ok(UserType::TiffinPartner),
            "customer" => Ok(UserType::Customer),
            other => Err(IdentityError::UnknownUserType(other.to_string())),
        }
    }
}

/// The `{userType, userId}` pair identifying the authenticated actor.
///
/// Construction does not validate `user_id`; the session manager refuses
/// identities without one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub user_type: UserType,
    pub user_id: String,
}

impl SessionIdentity {
    pub fn new(user_type: UserType, user_id: impl Into<String>) -> Self {
        Self {
            user_type,
            user_id: user_id.into(),
        }
    }

    /// True when the identity carries a usable (non-blank) user id
    pub fn has_user_id(&self) -> bool {
        !self.user_id.trim().is_empty()
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_type, self.user_id)
    }
}
