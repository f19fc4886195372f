mod connection;
mod room;

use std::sync::Arc;

use log::info;
use thiserror::Error;

pub use connection::*;
pub use room::*;

use crate::{
    Catalog, CollabContext, Database, DatabaseError, NewRoom, NewRoomMember, PlaybackManager,
    PrimaryKey, RoomMemberData, util::random_room_code,
};

const ROOM_CODE_LENGTH: usize = 6;

pub struct RoomManager<C, Db> {
    context: CollabContext<C, Db>,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room was not found")]
    RoomNotFound,
    #[error("Room is not active")]
    RoomNotActive,
    #[error("User is not a member of this room")]
    UserNotInRoom,
    #[error("Only the host can do this")]
    UserNotHost,
    #[error("The host cannot leave their own room")]
    HostCannotLeave,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// What a new room should look like. The join code is generated.
#[derive(Debug)]
pub struct RoomParams {
    pub title: String,
    pub description: Option<String>,
    /// The host of the new room
    pub user_id: PrimaryKey,
}

impl<C, Db> RoomManager<C, Db>
where
    C: Catalog,
    Db: Database,
{
    pub fn new(context: &CollabContext<C, Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Restores the rooms from the database on init
    pub async fn restore(&self) -> Result<(), DatabaseError> {
        let rooms: Vec<_> = self
            .context
            .database
            .list_rooms()
            .await?
            .into_iter()
            .map(|data| (data.id, Room::new(&self.context, data)))
            .collect();

        let count = rooms.len();

        for (id, room) in rooms {
            self.context.rooms.insert(id, room.into());
        }

        info!("Restored {} room(s)", count);

        Ok(())
    }

    /// Creates a new room with a fresh join code
    pub async fn create_room(&self, params: RoomParams) -> Result<Arc<Room<C, Db>>, RoomError> {
        let room_data = self
            .context
            .database
            .create_room(NewRoom {
                code: random_room_code(ROOM_CODE_LENGTH),
                title: params.title,
                description: params.description,
                user_id: params.user_id,
            })
            .await?;

        let room = Arc::new(Room::new(&self.context, room_data));
        self.context.rooms.insert(room.id(), room.clone());

        info!("Room {} created", room.code());

        Ok(room)
    }

    pub fn room_by_id(&self, room_id: RoomId) -> Result<Arc<Room<C, Db>>, RoomError> {
        self.context.room(room_id)
    }

    pub fn room_by_code(&self, code: &str) -> Result<Arc<Room<C, Db>>, RoomError> {
        self.context
            .rooms
            .iter()
            .find(|room| room.code() == code)
            .map(|room| room.value().clone())
            .ok_or(RoomError::RoomNotFound)
    }

    /// Get all rooms in memory
    pub fn list_all(&self) -> Vec<Arc<Room<C, Db>>> {
        self.context
            .rooms
            .iter()
            .map(|room| room.value().clone())
            .collect()
    }

    /// Adds a user as a member of a room
    pub async fn join(
        &self,
        room_id: RoomId,
        user_id: PrimaryKey,
    ) -> Result<RoomMemberData, RoomError> {
        let room = self.context.room(room_id)?;

        if !room.is_active() {
            return Err(RoomError::RoomNotActive);
        }

        let member = self
            .context
            .database
            .create_room_member(NewRoomMember {
                room_id,
                user_id,
                host: false,
            })
            .await?;

        room.add_member(member.clone());

        Ok(member)
    }

    /// Removes a user from a room's membership
    pub async fn leave(&self, room_id: RoomId, user_id: PrimaryKey) -> Result<(), RoomError> {
        let room = self.context.room(room_id)?;

        // The host can't abandon their own room, they close it instead
        room.member_by_user_id(user_id)?;
        if room.ensure_host(user_id).is_ok() {
            return Err(RoomError::HostCannotLeave);
        }

        self.context
            .database
            .delete_room_member(room_id, user_id)
            .await?;

        room.remove_member(user_id);

        Ok(())
    }

    /// Closes a room for good. Host only.
    /// The active session ends and its timer is dropped with it.
    pub async fn close(&self, room_id: RoomId, user_id: PrimaryKey) -> Result<(), RoomError> {
        let room = self.context.room(room_id)?;
        room.ensure_host(user_id)?;

        self.context.database.deactivate_room(room_id).await?;

        if let Ok(session) = self.context.database.active_session_by_room(room_id).await {
            self.context.database.end_session(session.id).await?;

            let playback = PlaybackManager::new(&self.context);
            playback.forget_session(session.id);
        }

        room.set_inactive();

        info!("Room {} closed", room.code());

        Ok(())
    }
}
