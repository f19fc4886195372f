use chrono::{DateTime, Utc};

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// A boombox account
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    pub password: String,
    pub display_name: String,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct AuthSessionData {
    pub id: PrimaryKey,
    /// The opaque token presented by the client
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// A listening room
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: PrimaryKey,
    /// The short code used to identify and join the room
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub members: Vec<RoomMemberData>,
}

/// A member of a room
#[derive(Debug, Clone)]
pub struct RoomMemberData {
    pub id: PrimaryKey,
    /// If this is true, the member controls playback in the room
    pub host: bool,
    pub user: UserData,
}

/// A song known to boombox.
/// Deduplicated by the provider track id and immutable once stored.
#[derive(Debug, Clone)]
pub struct SongData {
    pub id: PrimaryKey,
    /// The track id at the external provider
    pub external_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_ms: i32,
    pub artwork_url: Option<String>,
    /// The playable URI clients hand to their local player
    pub uri: String,
}

/// The playback session of a room. At most one is active per room at a time.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    pub room_id: PrimaryKey,
    pub current_song_id: Option<PrimaryKey>,
    /// The instant the current song's position counter was zero.
    /// Null means playback is paused.
    pub started_at: Option<DateTime<Utc>>,
    /// The position frozen at pause time. Authoritative only while `started_at` is null.
    pub paused_offset_ms: i32,
    pub is_active: bool,
    pub ended_at: Option<DateTime<Utc>>,
}

/// One song's placement in a session's queue
#[derive(Debug, Clone)]
pub struct QueueEntryData {
    pub id: PrimaryKey,
    pub session_id: PrimaryKey,
    pub song: SongData,
    /// Position within the session, unique and dense
    pub position: i32,
    pub played: bool,
    pub played_at: Option<DateTime<Utc>>,
    pub added_by: UserData,
}

impl RoomData {
    /// Returns the member hosting this room
    pub fn host(&self) -> Option<&RoomMemberData> {
        self.members.iter().find(|member| member.host)
    }
}
