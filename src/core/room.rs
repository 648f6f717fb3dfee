use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Deterministic identifier of the private room shared by two users.
/// Order of the arguments does not matter.
pub fn private_room_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}-{}", a, b)
    } else {
        format!("{}-{}", b, a)
    }
}

/// Tracks room membership by connection id
///
/// Both maps are always updated under both write locks, taken in the
/// order `rooms` then `client_rooms`.
#[derive(Default)]
pub struct RoomManager {
    /// room id -> member connection ids
    rooms: Arc<RwLock<HashMap<String, HashSet<String>>>>,
    /// connection id -> joined room ids
    client_rooms: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to a room, creating the room on first join.
    /// Returns false if it was already a member.
    pub async fn join_room(&self, connection_id: &str, room_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let mut client_rooms = self.client_rooms.write().await;

        let added = rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
        client_rooms
            .entry(connection_id.to_string())
            .or_default()
            .insert(room_id.to_string());

        added
    }

    /// Removes a connection from a room; empty rooms are dropped
    pub async fn leave_room(&self, connection_id: &str, room_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let mut client_rooms = self.client_rooms.write().await;

        let removed = match rooms.get_mut(room_id) {
            Some(members) => {
                let removed = members.remove(connection_id);
                if members.is_empty() {
                    rooms.remove(room_id);
                }
                removed
            }
            None => false,
        };

        if let Some(joined) = client_rooms.get_mut(connection_id) {
            joined.remove(room_id);
            if joined.is_empty() {
                client_rooms.remove(connection_id);
            }
        }

        removed
    }

    /// Removes a connection from every room it joined.
    /// Returns the rooms it left.
    pub async fn remove_client(&self, connection_id: &str) -> Vec<String> {
        let mut rooms = self.rooms.write().await;
        let mut client_rooms = self.client_rooms.write().await;

        let joined = client_rooms.remove(connection_id).unwrap_or_default();
        for room_id in &joined {
            if let Some(members) = rooms.get_mut(room_id) {
                members.remove(connection_id);
                if members.is_empty() {
                    rooms.remove(room_id);
                }
            }
        }

        joined.into_iter().collect()
    }

    pub async fn is_member(&self, connection_id: &str, room_id: &str) -> bool {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|members| members.contains(connection_id))
            .unwrap_or(false)
    }

    pub async fn get_room_members(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn get_client_rooms(&self, connection_id: &str) -> Vec<String> {
        self.client_rooms
            .read()
            .await
            .get(connection_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
