use dashmap::DashMap;
use shared::client::Profile;
use shared::{Frame, SessionIdentity};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Instruction for one open socket
#[derive(Debug, Clone)]
pub enum SocketCommand {
    Push(Frame),
    Kick,
}

#[derive(Debug)]
struct SocketSession {
    identity: Option<SessionIdentity>,
    tx: mpsc::UnboundedSender<SocketCommand>,
}

/// Shared mock state: known tokens and open sockets
#[derive(Debug, Default)]
pub struct AppState {
    /// bearer token -> profile
    tokens: DashMap<String, Profile>,
    sockets: DashMap<Uuid, SocketSession>,
    identify_count: AtomicU64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` for the user `user_id`
    pub fn add_token(&self, token: impl Into<String>, user_id: impl Into<String>) {
        self.tokens.insert(token.into(), Profile::new(user_id));
    }

    pub fn add_profile(&self, token: impl Into<String>, profile: Profile) {
        self.tokens.insert(token.into(), profile);
    }

    pub fn revoke_token(&self, token: &str) {
        self.tokens.remove(token);
    }

    pub fn profile_for(&self, token: &str) -> Option<Profile> {
        self.tokens.get(token).map(|p| p.clone())
    }

    pub(crate) fn register(&self, tx: mpsc::UnboundedSender<SocketCommand>) -> Uuid {
        let id = Uuid::new_v4();
        self.sockets.insert(id, SocketSession { identity: None, tx });
        id
    }

    pub(crate) fn unregister(&self, id: Uuid) {
        self.sockets.remove(&id);
    }

    pub(crate) fn record_identify(&self, id: Uuid, identity: SessionIdentity) {
        self.identify_count.fetch_add(1, Ordering::SeqCst);
        if let Some(mut session) = self.sockets.get_mut(&id) {
            session.identity = Some(identity);
        }
    }

    /// Open sockets right now
    pub fn connection_count(&self) -> usize {
        self.sockets.len()
    }

    /// `identify` frames received over the server's lifetime
    pub fn identify_count(&self) -> u64 {
        self.identify_count.load(Ordering::SeqCst)
    }

    /// Identities of the currently open, identified sockets
    pub fn identified(&self) -> Vec<SessionIdentity> {
        self.sockets
            .iter()
            .filter_map(|s| s.identity.clone())
            .collect()
    }

    /// Push `frame` to every socket identified as `user_id`. Returns how many.
    pub fn push_to_user(&self, user_id: &str, frame: Frame) -> usize {
        self.sockets
            .iter()
            .filter(|s| s.identity.as_ref().is_some_and(|i| i.user_id == user_id))
            .filter(|s| s.tx.send(SocketCommand::Push(frame.clone())).is_ok())
            .count()
    }

    /// Close every open socket from the server side. Returns how many.
    pub fn kick_all(&self) -> usize {
        self.sockets
            .iter()
            .filter(|s| s.tx.send(SocketCommand::Kick).is_ok())
            .count()
    }
}
