use log::info;
use parking_lot::Mutex;

use crate::{
    events::CollabEvent, Catalog, CollabContext, Database, PlaybackError, PlaybackManager,
    PrimaryKey, RoomData, RoomMemberData,
};

use super::{RoomConnection, RoomConnectionHandle, RoomConnectionId, RoomError};

pub type RoomId = PrimaryKey;

/// A boombox room, holding members and the live connections listening in it
pub struct Room<C, Db> {
    context: CollabContext<C, Db>,
    data: Mutex<RoomData>,
    /// The users currently connected to this room
    connections: Mutex<Vec<RoomConnection>>,
}

impl<C, Db> Room<C, Db>
where
    C: Catalog,
    Db: Database,
{
    pub fn new(context: &CollabContext<C, Db>, data: RoomData) -> Self {
        Self {
            context: context.clone(),
            data: data.into(),
            connections: Default::default(),
        }
    }

    pub fn id(&self) -> RoomId {
        self.data.lock().id
    }

    pub fn code(&self) -> String {
        self.data.lock().code.clone()
    }

    pub fn data(&self) -> RoomData {
        self.data.lock().clone()
    }

    pub fn is_active(&self) -> bool {
        self.data.lock().is_active
    }

    /// Returns the member if it exists in the room
    pub fn member_by_user_id(&self, user_id: PrimaryKey) -> Result<RoomMemberData, RoomError> {
        self.data
            .lock()
            .members
            .iter()
            .find(|member| member.user.id == user_id)
            .cloned()
            .ok_or(RoomError::UserNotInRoom)
    }

    /// Ensures the user hosts this room
    pub fn ensure_host(&self, user_id: PrimaryKey) -> Result<(), RoomError> {
        let member = self.member_by_user_id(user_id)?;

        if !member.host {
            return Err(RoomError::UserNotHost);
        }

        Ok(())
    }

    /// Registers an added member to the room
    pub fn add_member(&self, new_member: RoomMemberData) {
        self.data.lock().members.push(new_member);
    }

    /// Forgets a member that left the room
    pub fn remove_member(&self, user_id: PrimaryKey) {
        self.data
            .lock()
            .members
            .retain(|member| member.user.id != user_id);
    }

    pub fn set_inactive(&self) {
        self.data.lock().is_active = false;
    }

    /// Registers a live connection to the room.
    ///
    /// The new connection receives a full snapshot as its first messages: an
    /// acknowledgement, the current playback state with the position derived at send
    /// time, and the pending queue. Reconnecting clients rely on this instead of deltas.
    pub async fn connect(
        &self,
        user_id: PrimaryKey,
    ) -> Result<RoomConnectionHandle<C, Db>, RoomError> {
        if !self.is_active() {
            return Err(RoomError::RoomNotActive);
        }

        let member = self.member_by_user_id(user_id)?;

        let (connection, receiver) = RoomConnection::new(user_id, self.context.config.connection_buffer);
        let connection_id = connection.id;
        let room_id = self.id();

        let playback = PlaybackManager::new(&self.context);

        let state = playback
            .state(room_id)
            .map_err(|_| RoomError::RoomNotFound)?;

        let (queue, recently_played) = match playback.queue(room_id).await {
            Ok(pair) => pair,
            Err(PlaybackError::Database(e)) => return Err(RoomError::Database(e)),
            Err(_) => return Err(RoomError::RoomNotFound),
        };

        connection.send(CollabEvent::Connected {
            room_id,
            code: self.code(),
            user: member.user.clone(),
        });
        connection.send(CollabEvent::PlaybackUpdate {
            room_id,
            state,
        });
        connection.send(CollabEvent::QueueUpdate {
            room_id,
            queue,
            recently_played,
        });

        self.connections.lock().push(connection);

        info!(
            "{} connected to room {}",
            member.user.display_name,
            self.code()
        );

        self.broadcast(CollabEvent::MemberJoined {
            room_id,
            user: member.user,
            connection_count: self.connection_count(),
        });

        Ok(RoomConnectionHandle::new(
            &self.context,
            connection_id,
            room_id,
            receiver,
        ))
    }

    /// Called when a [RoomConnectionHandle] is dropped, or when delivery to the
    /// connection failed. Idempotent, since both can happen for the same connection.
    pub fn remove_connection(&self, connection_id: RoomConnectionId) {
        let removed = {
            let mut connections = self.connections.lock();

            let found = connections.iter().position(|c| c.id == connection_id);
            found.map(|index| connections.remove(index))
        };

        let Some(connection) = removed else {
            return;
        };

        info!(
            "User {} disconnected from room {}",
            connection.user_id,
            self.code()
        );

        self.broadcast(CollabEvent::MemberLeft {
            room_id: self.id(),
            user_id: connection.user_id,
            connection_count: self.connection_count(),
        });
    }

    /// Delivers an event to every connection in the room.
    ///
    /// Each connection has its own bounded buffer, so one stalled consumer never blocks
    /// the others. A connection that can't keep up is torn down like a disconnect.
    pub fn broadcast(&self, event: CollabEvent) {
        let dead: Vec<RoomConnectionId> = {
            let connections = self.connections.lock();

            connections
                .iter()
                .filter(|connection| !connection.send(event.clone()))
                .map(|connection| connection.id)
                .collect()
        };

        for connection_id in dead {
            self.remove_connection(connection_id);
        }
    }

    /// Returns the current connections. The same member can appear multiple times.
    pub fn current_connections(&self) -> Vec<RoomConnection> {
        self.connections.lock().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}
