//! API Response types
//!
//! The platform's REST endpoints wrap their payload in a `data` envelope:
//! ```json
//! {
//!     "success": true,
//!     "message": "Profile fetched",
//!     "data": { ... }
//! }
//! ```
//! Only `data` is guaranteed; `success` and `message` are optional.

use serde::{Deserialize, Serialize};

/// Unified API response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response data (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn ok(data: T) -> Self {
        Self {
            success: Some(true),
            message: None,
            data: Some(data),
        }
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            message: Some(message.into()),
            data: None,
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether the server flagged the response as failed
    pub fn is_error(&self) -> bool {
        self.success == Some(false)
    }
}
