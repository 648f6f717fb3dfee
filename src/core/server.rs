//! Presence tracking, broadcast scope and private-room routing

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::core::connection::Connection;
use crate::core::events::ServerEvent;
use crate::core::room::{private_room_id, RoomManager};
use crate::error::{ChatError, Result};
use crate::storage::{with_deadline, PresenceStore, UserStorage};

/// Owns every live socket and the rooms they joined
pub struct ChatServer {
    connections: Arc<RwLock<HashMap<String, Connection>>>,
    rooms: RoomManager,
    presence: Arc<dyn PresenceStore>,
    users: Arc<dyn UserStorage>,
    storage_timeout: Duration,
}

impl ChatServer {
    pub fn new(
        presence: Arc<dyn PresenceStore>,
        users: Arc<dyn UserStorage>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: RoomManager::new(),
            presence,
            users,
            storage_timeout,
        }
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    /// Register a connection and announce its user to everyone
    pub async fn connect(&self, connection: Connection) -> Result<()> {
        let connection_id = connection.id.clone();
        let user_id = connection.user_id.clone();

        self.connections
            .write()
            .await
            .insert(connection_id.clone(), connection);

        let replaced = with_deadline(
            self.storage_timeout,
            self.presence.set_connection(&user_id, &connection_id),
        )
        .await?;
        if let Some(previous) = replaced {
            debug!(
                "Connection {} replaces {} for user {}",
                connection_id, previous, user_id
            );
        }

        self.mark_online(&user_id, true).await;
        info!("User {} connected on {}", user_id, connection_id);
        self.broadcast(&ServerEvent::UserConnected(user_id)).await;
        Ok(())
    }

    /// Drop a connection; presence is cleared only if it is still the user's current one
    pub async fn disconnect(&self, connection_id: &str) -> Result<()> {
        let connection = match self.connections.write().await.remove(connection_id) {
            Some(connection) => connection,
            None => return Ok(()),
        };
        self.rooms.remove_client(connection_id).await;

        let was_current = with_deadline(
            self.storage_timeout,
            self.presence
                .clear_connection(&connection.user_id, connection_id),
        )
        .await?;

        if was_current {
            self.mark_online(&connection.user_id, false).await;
            info!("User {} disconnected", connection.user_id);
            self.broadcast(&ServerEvent::UserDisconnected(connection.user_id))
                .await;
        } else {
            debug!(
                "Superseded connection {} of user {} closed",
                connection_id, connection.user_id
            );
        }
        Ok(())
    }

    async fn mark_online(&self, user_id: &str, online: bool) {
        match with_deadline(self.storage_timeout, self.users.set_online(user_id, online)).await {
            Ok(true) => {}
            Ok(false) => warn!("Cannot update online status of missing user {}", user_id),
            Err(e) => warn!("Failed to update online status of {}: {}", user_id, e),
        }
    }

    /// Send to every live connection; returns how many were reached
    pub async fn broadcast(&self, event: &ServerEvent) -> usize {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode broadcast: {}", e);
                return 0;
            }
        };

        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|connection| connection.send_text(&frame))
            .count()
    }

    /// Send to the members of one room
    pub async fn broadcast_to_room(&self, room_id: &str, event: &ServerEvent) -> usize {
        let members = self.rooms.get_room_members(room_id).await;
        if members.is_empty() {
            return 0;
        }

        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode room message: {}", e);
                return 0;
            }
        };

        let connections = self.connections.read().await;
        members
            .iter()
            .filter_map(|id| connections.get(id))
            .filter(|connection| connection.send_text(&frame))
            .count()
    }

    pub async fn send_to_connection(&self, connection_id: &str, event: &ServerEvent) -> bool {
        match self.connections.read().await.get(connection_id) {
            Some(connection) => connection.send_event(event),
            None => false,
        }
    }

    pub async fn join_room(&self, connection_id: &str, room_id: &str) -> Result<()> {
        if !self.connections.read().await.contains_key(connection_id) {
            return Err(ChatError::not_found("Connection not found"));
        }
        self.rooms.join_room(connection_id, room_id).await;
        Ok(())
    }

    /// Join the initiator and, if online, the target to their shared room.
    /// Both sides receive `join private chat` with the room id.
    pub async fn start_private_chat(
        &self,
        connection_id: &str,
        user_id: &str,
        target_user_id: &str,
    ) -> Result<String> {
        let target_user_id = target_user_id.trim();
        if target_user_id.is_empty() {
            return Err(ChatError::validation("Target user id is required"));
        }
        if target_user_id == user_id {
            return Err(ChatError::validation("Cannot start a private chat with yourself"));
        }

        let room_id = private_room_id(user_id, target_user_id);
        self.join_room(connection_id, &room_id).await?;

        let target_connection =
            with_deadline(self.storage_timeout, self.presence.connection_for(target_user_id))
                .await?;
        let target_joined = match target_connection {
            Some(target_connection) => {
                self.join_room(&target_connection, &room_id).await.is_ok()
                    && self
                        .send_to_connection(
                            &target_connection,
                            &ServerEvent::JoinPrivateChat(room_id.clone()),
                        )
                        .await
            }
            None => false,
        };
        if !target_joined {
            debug!(
                "User {} is offline; private room {} waits for them",
                target_user_id, room_id
            );
        }

        self.send_to_connection(connection_id, &ServerEvent::JoinPrivateChat(room_id.clone()))
            .await;
        info!("Private room {} opened by {}", room_id, user_id);
        Ok(room_id)
    }

    pub async fn ensure_member(&self, connection_id: &str, room_id: &str) -> Result<()> {
        if self.rooms.is_member(connection_id, room_id).await {
            Ok(())
        } else {
            Err(ChatError::forbidden("You are not a member of this room"))
        }
    }

    pub async fn online_users(&self) -> Result<Vec<String>> {
        with_deadline(self.storage_timeout, self.presence.online_users()).await
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryPresenceStore, MemoryUserStorage};
    use tokio::sync::mpsc;
    use warp::ws::Message;

    fn server() -> ChatServer {
        ChatServer::new(
            Arc::new(MemoryPresenceStore::new()),
            Arc::new(MemoryUserStorage::new()),
            Duration::from_secs(5),
        )
    }

    fn open(user: &str) -> (Connection, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(user.to_string(), tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str(frame.to_str().unwrap()).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_connect_announces_to_everyone() {
        let server = server();
        let (a, mut rx_a) = open("alice");
        server.connect(a).await.unwrap();
        let (b, mut rx_b) = open("bob");
        server.connect(b).await.unwrap();

        assert_eq!(
            drain(&mut rx_a),
            vec![
                ServerEvent::UserConnected("alice".to_string()),
                ServerEvent::UserConnected("bob".to_string())
            ]
        );
        assert_eq!(drain(&mut rx_b), vec![ServerEvent::UserConnected("bob".to_string())]);
        assert_eq!(server.connection_count().await, 2);
    }

    #[tokio::test]
    async fn test_superseded_connection_does_not_announce_disconnect() {
        let server = server();
        let (watcher, mut rx_w) = open("carol");
        server.connect(watcher).await.unwrap();

        let (old, _rx_old) = open("alice");
        let old_id = old.id.clone();
        server.connect(old).await.unwrap();
        let (new, _rx_new) = open("alice");
        let new_id = new.id.clone();
        server.connect(new).await.unwrap();
        drain(&mut rx_w);

        server.disconnect(&old_id).await.unwrap();
        assert!(drain(&mut rx_w).is_empty());
        assert!(server.online_users().await.unwrap().contains(&"alice".to_string()));

        server.disconnect(&new_id).await.unwrap();
        assert_eq!(
            drain(&mut rx_w),
            vec![ServerEvent::UserDisconnected("alice".to_string())]
        );
    }

    #[tokio::test]
    async fn test_private_chat_with_self_is_rejected() {
        let server = server();
        let (a, _rx) = open("alice");
        let id = a.id.clone();
        server.connect(a).await.unwrap();
        let err = server.start_private_chat(&id, "alice", "alice").await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }
}
