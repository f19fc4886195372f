use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod pg;
pub use pg::*;

#[cfg(test)]
pub mod memory;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound { .. } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// Represents a type that can store and fetch boombox data
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;

    async fn auth_session_by_token(&self, token: &str) -> Result<AuthSessionData>;
    async fn create_auth_session(&self, new_session: NewAuthSession) -> Result<AuthSessionData>;
    async fn delete_auth_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_auth_sessions(&self) -> Result<()>;

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData>;
    async fn room_by_code(&self, code: &str) -> Result<RoomData>;
    async fn list_rooms(&self) -> Result<Vec<RoomData>>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    async fn create_room_member(&self, new_member: NewRoomMember) -> Result<RoomMemberData>;
    async fn delete_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<()>;
    async fn deactivate_room(&self, room_id: PrimaryKey) -> Result<()>;

    async fn song_by_external_id(&self, external_id: &str) -> Result<SongData>;
    /// Stores a song, or returns the existing row for its external id
    async fn create_song(&self, new_song: NewSong) -> Result<SongData>;

    async fn session_by_id(&self, session_id: PrimaryKey) -> Result<SessionData>;
    async fn active_session_by_room(&self, room_id: PrimaryKey) -> Result<SessionData>;
    async fn list_active_sessions(&self) -> Result<Vec<SessionData>>;
    /// Creates the active session for a room.
    /// Fails with a conflict if the room already has one.
    async fn create_session(&self, room_id: PrimaryKey) -> Result<SessionData>;
    /// The single write every playback transition goes through
    async fn update_session_playback(&self, update: SessionPlaybackUpdate) -> Result<SessionData>;
    async fn end_session(&self, session_id: PrimaryKey) -> Result<()>;

    async fn queue_entry_by_id(&self, entry_id: PrimaryKey) -> Result<QueueEntryData>;
    /// All pending entries of a session, ordered by position
    async fn queue_entries(&self, session_id: PrimaryKey) -> Result<Vec<QueueEntryData>>;
    async fn next_pending_entry(&self, session_id: PrimaryKey)
        -> Result<Option<QueueEntryData>>;
    async fn recently_played(
        &self,
        session_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<QueueEntryData>>;
    /// Appends an entry at the next free position of the session
    async fn add_queue_entry(&self, new_entry: NewQueueEntry) -> Result<QueueEntryData>;
    async fn mark_entry_played(&self, entry_id: PrimaryKey, at: DateTime<Utc>) -> Result<()>;
    /// Deletes an entry and renumbers the session's remaining positions to keep them dense
    async fn remove_queue_entry(&self, entry_id: PrimaryKey) -> Result<()>;
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug)]
pub struct NewAuthSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewRoom {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    /// The host of the new room
    pub user_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewRoomMember {
    pub room_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub host: bool,
}

#[derive(Debug)]
pub struct NewSong {
    pub external_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_ms: i32,
    pub artwork_url: Option<String>,
    pub uri: String,
}

#[derive(Debug)]
pub struct NewQueueEntry {
    pub session_id: PrimaryKey,
    pub song_id: PrimaryKey,
    pub added_by_user_id: PrimaryKey,
}

#[derive(Debug)]
pub struct SessionPlaybackUpdate {
    pub session_id: PrimaryKey,
    pub current_song_id: Option<PrimaryKey>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_offset_ms: i32,
}
