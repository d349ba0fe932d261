//! Per-game broadcast groups for realtime connections.

use std::collections::HashMap;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Identifier assigned to each accepted WebSocket connection.
pub type ConnectionId = Uuid;

struct Member {
    user_id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Default)]
struct Room {
    members: HashMap<ConnectionId, Member>,
    /// Highest snapshot version already delivered to this room.
    last_version: Option<u64>,
}

/// Registry of rooms keyed by game id.
///
/// Snapshots are tagged with the aggregate version they were read at; a room
/// never delivers a snapshot older than one it already delivered.
#[derive(Default)]
pub struct RoomHub {
    rooms: DashMap<Uuid, Room>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection`, owned by `user_id`, as a member of the room for `game_id`.
    pub fn join(
        &self,
        game_id: Uuid,
        connection: ConnectionId,
        user_id: Uuid,
        tx: mpsc::UnboundedSender<Message>,
    ) {
        self.rooms
            .entry(game_id)
            .or_default()
            .members
            .insert(connection, Member { user_id, tx });
    }

    /// Remove `connection` from the room, dropping the room once empty.
    pub fn leave(&self, game_id: Uuid, connection: ConnectionId) {
        self.remove_members(game_id, |id, _| *id == connection);
    }

    /// Remove every connection `user_id` holds in the room. Returns how many were removed.
    pub fn leave_user(&self, game_id: Uuid, user_id: Uuid) -> usize {
        self.remove_members(game_id, |_, member| member.user_id == user_id)
    }

    fn remove_members(
        &self,
        game_id: Uuid,
        matches: impl Fn(&ConnectionId, &Member) -> bool,
    ) -> usize {
        let (removed, now_empty) = match self.rooms.get_mut(&game_id) {
            Some(mut room) => {
                let before = room.members.len();
                room.members.retain(|id, member| !matches(id, member));
                (before - room.members.len(), room.members.is_empty())
            }
            None => (0, false),
        };
        if now_empty {
            self.rooms.remove_if(&game_id, |_, room| room.members.is_empty());
        }
        removed
    }

    /// Whether `connection` is still a member of the room for `game_id`.
    pub fn contains(&self, game_id: Uuid, connection: ConnectionId) -> bool {
        self.rooms
            .get(&game_id)
            .is_some_and(|room| room.members.contains_key(&connection))
    }

    /// Send `message` to every member of the room unless a newer snapshot was already sent.
    ///
    /// Returns the number of members the message was queued for.
    pub fn broadcast(&self, game_id: Uuid, version: u64, message: Message) -> usize {
        let Some(mut room) = self.rooms.get_mut(&game_id) else {
            return 0;
        };
        if room.last_version.is_some_and(|last| last > version) {
            debug!(%game_id, version, "dropping stale snapshot broadcast");
            return 0;
        }
        room.last_version = Some(version);

        let mut delivered = 0;
        room.members.retain(|_, member| {
            let alive = member.tx.send(message.clone()).is_ok();
            if alive {
                delivered += 1;
            }
            alive
        });
        delivered
    }

    /// Drop every member of the room for `game_id`.
    pub fn close_room(&self, game_id: Uuid) {
        self.rooms.remove(&game_id);
    }

    /// Number of live members registered for `game_id`.
    pub fn member_count(&self, game_id: Uuid) -> usize {
        self.rooms
            .get(&game_id)
            .map(|room| room.members.len())
            .unwrap_or(0)
    }
}
