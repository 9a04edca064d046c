//! Shared types for the realtime delivery client
//!
//! Common types used by `realtime-client` and `realtime-mock`: session
//! identity, the realtime frame envelope, and REST response DTOs.

pub mod client;
pub mod identity;
pub mod realtime;
pub mod response;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use identity::{IdentityError, SessionIdentity, UserType};
pub use realtime::{DisconnectReason, Frame};
pub use response::ApiResponse;
