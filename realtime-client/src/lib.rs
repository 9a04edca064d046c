//! Realtime Client - session-bound realtime channel for the delivery apps
//!
//! Owns at most one realtime connection per process, bound to the user
//! identity resolved from the stored auth token, and keeps it alive across
//! transport drops.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use realtime_client::{ClientConfig, SessionIdentity, UserType};
//!
//! let config = ClientConfig::from_env();
//! let manager = config.build_session_manager();
//! let handle = manager.initialize(SessionIdentity::new(UserType::Rider, "u1"))?;
//! let mut events = handle.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod message;
pub mod profile;
pub mod session;

pub use auth::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use channel::{ChannelEvent, ConnectionHandle, ConnectionState};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, SessionError, SessionResult};
pub use http::HttpClient;
pub use message::{
    Backoff, Connection, Connector, MemoryConnector, ReconnectPolicy, TransportError,
    TransportOptions, WsConnector,
};
pub use profile::{HttpProfileService, ProfileService};
pub use session::{SessionBootstrap, SessionManager, SessionScope};

// Re-export shared types for convenience
pub use shared::client::{ApiResponse, Profile, ProfileResponse};
pub use shared::{DisconnectReason, Frame, SessionIdentity, UserType};
