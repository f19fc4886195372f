//! All schemas that are exposed from endpoints are defined here
//! along with the conversions from collab types

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use boombox_collab::{
    AuthSessionData, PgDatabase, PlaybackSnapshot, QueueEntryData, Room as CollabRoom,
    RoomConnection as CollabRoomConnection, RoomMemberData, SongData, SpotifyCatalog, UserData,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    id: i32,
    username: String,
    display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Room {
    id: i32,
    code: String,
    title: String,
    description: Option<String>,
    is_active: bool,
    members: Vec<RoomMember>,
    connections: Vec<RoomConnection>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomMember {
    id: i32,
    host: bool,
    user: User,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomConnection {
    user_id: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Song {
    id: i32,
    external_id: String,
    title: String,
    artist: String,
    album: Option<String>,
    duration_ms: i32,
    artwork_url: Option<String>,
    uri: String,
}

/// One song in a session's queue
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueItem {
    id: i32,
    position: i32,
    played: bool,
    played_at: Option<DateTime<Utc>>,
    song: Song,
    added_by: User,
}

/// A full view of a room's playback at one instant.
/// Clients extrapolate between events using `timestamp`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlaybackState {
    playing: bool,
    current_song: Option<Song>,
    position_ms: u64,
    started_at: Option<DateTime<Utc>>,
    timestamp: DateTime<Utc>,
}

/// The pending queue and play history of a room
#[derive(Debug, Serialize, ToSchema)]
pub struct Queue {
    pub queue: Vec<QueueItem>,
    pub recently_played: Vec<QueueItem>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for AuthSessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Room> for Arc<CollabRoom<SpotifyCatalog, PgDatabase>> {
    fn to_serialized(&self) -> Room {
        let data = self.data();

        Room {
            id: data.id,
            code: data.code,
            title: data.title,
            description: data.description,
            is_active: data.is_active,
            members: data.members.to_serialized(),
            connections: self.current_connections().to_serialized(),
        }
    }
}

impl ToSerialized<RoomMember> for RoomMemberData {
    fn to_serialized(&self) -> RoomMember {
        RoomMember {
            id: self.id,
            host: self.host,
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<RoomConnection> for CollabRoomConnection {
    fn to_serialized(&self) -> RoomConnection {
        RoomConnection {
            user_id: self.user_id,
        }
    }
}

impl ToSerialized<Song> for SongData {
    fn to_serialized(&self) -> Song {
        Song {
            id: self.id,
            external_id: self.external_id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            duration_ms: self.duration_ms,
            artwork_url: self.artwork_url.clone(),
            uri: self.uri.clone(),
        }
    }
}

impl ToSerialized<QueueItem> for QueueEntryData {
    fn to_serialized(&self) -> QueueItem {
        QueueItem {
            id: self.id,
            position: self.position,
            played: self.played,
            played_at: self.played_at,
            song: self.song.to_serialized(),
            added_by: self.added_by.to_serialized(),
        }
    }
}

impl ToSerialized<PlaybackState> for PlaybackSnapshot {
    fn to_serialized(&self) -> PlaybackState {
        PlaybackState {
            playing: self.playing,
            current_song: self.current_song.to_serialized(),
            position_ms: self.position_ms,
            started_at: self.started_at,
            timestamp: self.timestamp,
        }
    }
}
