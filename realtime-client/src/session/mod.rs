//! Session-bound realtime channel
//!
//! [`SessionManager`] owns at most one [`ConnectionHandle`](crate::ConnectionHandle),
//! bound to the identity it was initialized with. [`SessionBootstrap`] is the
//! login/resume/logout flow that resolves that identity from a stored token.

mod bootstrap;
mod manager;

pub use bootstrap::SessionBootstrap;
pub use manager::{SessionManager, SessionScope};

pub(crate) use manager::Slot;

use std::sync::OnceLock;

static GLOBAL: OnceLock<SessionManager> = OnceLock::new();

/// Install the process-wide manager.
///
/// Returns the manager back if one is already installed.
pub fn install_global(manager: SessionManager) -> Result<(), SessionManager> {
    GLOBAL.set(manager)
}

/// The process-wide manager, if [`install_global`] was called
pub fn global() -> Option<&'static SessionManager> {
    GLOBAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MemoryConnector, ReconnectPolicy};

    #[test]
    fn test_install_global_once() {
        let (connector, _server) = MemoryConnector::new();
        let manager = SessionManager::new(connector, ReconnectPolicy::default());
        let (other, _other_server) = MemoryConnector::new();
        let other = SessionManager::new(other, ReconnectPolicy::lan());

        assert!(install_global(manager).is_ok());
        let installed = global().unwrap();
        assert_eq!(installed.policy(), &ReconnectPolicy::default());

        let rejected = install_global(other).unwrap_err();
        assert_eq!(rejected.policy(), &ReconnectPolicy::lan());
        assert!(!global().unwrap().is_active());
    }
}
