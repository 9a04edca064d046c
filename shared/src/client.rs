//! Client-related types shared between server and client
//!
//! DTOs of the REST endpoints the realtime client depends on.

use serde::{Deserialize, Serialize};

// Re-export ApiResponse from response module
pub use crate::response::ApiResponse;

use crate::identity::UserType;

/// `GET /profile` payload
///
/// Only `_id` is required; the rest depends on the actor type and is kept
/// for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        default,
        rename = "userType",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_type: Option<UserType>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            phone: None,
            email: None,
            user_type: None,
        }
    }
}

/// Full `GET /profile` response
pub type ProfileResponse = ApiResponse<Profile>;
