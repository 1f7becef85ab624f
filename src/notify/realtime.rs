use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::user::UserRole;
use crate::notify::events::RealtimeEvent;

/// Per-user and per-role broadcast channels. Channels are created lazily
/// on first subscribe; sending to a user nobody is listening for is a
/// no-op.
pub struct RealtimeHub {
    users: DashMap<Uuid, broadcast::Sender<RealtimeEvent>>,
    roles: DashMap<UserRole, broadcast::Sender<RealtimeEvent>>,
    buffer_size: usize,
}

impl RealtimeHub {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            users: DashMap::new(),
            roles: DashMap::new(),
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn subscribe_user(&self, user_id: Uuid) -> broadcast::Receiver<RealtimeEvent> {
        self.users
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe()
    }

    pub fn subscribe_role(&self, role: UserRole) -> broadcast::Receiver<RealtimeEvent> {
        self.roles
            .entry(role)
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe()
    }

    /// Returns how many live subscribers received the event.
    pub fn send_to_user(&self, user_id: Uuid, event: RealtimeEvent) -> usize {
        self.users
            .get(&user_id)
            .and_then(|sender| sender.send(event).ok())
            .unwrap_or(0)
    }

    pub fn send_to_role(&self, role: UserRole, event: RealtimeEvent) -> usize {
        self.roles
            .get(&role)
            .and_then(|sender| sender.send(event).ok())
            .unwrap_or(0)
    }
}
