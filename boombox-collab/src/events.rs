use chrono::{DateTime, Utc};

use crate::{PrimaryKey, QueueEntryData, SongData, UserData};

/// Events fanned out to the connections of a room.
///
/// Payloads are full snapshots rather than deltas, so a client that reconnects or joins
/// mid-session never depends on having seen earlier events.
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// The first message a new connection receives
    Connected {
        room_id: PrimaryKey,
        code: String,
        user: UserData,
    },
    /// The playback state of a room changed
    PlaybackUpdate {
        room_id: PrimaryKey,
        state: PlaybackSnapshot,
    },
    /// The queue of a room changed
    QueueUpdate {
        room_id: PrimaryKey,
        queue: Vec<QueueEntryData>,
        recently_played: Vec<QueueEntryData>,
    },
    /// A user connected to a room
    MemberJoined {
        room_id: PrimaryKey,
        user: UserData,
        connection_count: usize,
    },
    /// A user disconnected from a room
    MemberLeft {
        room_id: PrimaryKey,
        user_id: PrimaryKey,
        connection_count: usize,
    },
    /// A free-form message shown to everyone in a room
    Notification {
        room_id: PrimaryKey,
        message: String,
        level: NotificationLevel,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
}

/// A full view of a session's playback at a single instant
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub playing: bool,
    pub current_song: Option<SongData>,
    /// The derived position at the instant of emission
    pub position_ms: u64,
    /// The anchor instant, present while playing
    pub started_at: Option<DateTime<Utc>>,
    /// Server time at emission, used by clients to extrapolate between events
    pub timestamp: DateTime<Utc>,
}

impl PlaybackSnapshot {
    /// The snapshot of a session with nothing to play
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            playing: false,
            current_song: None,
            position_ms: 0,
            started_at: None,
            timestamp: now,
        }
    }
}

impl CollabEvent {
    /// The room this event belongs to
    pub fn room_id(&self) -> PrimaryKey {
        match self {
            Self::Connected { room_id, .. }
            | Self::PlaybackUpdate { room_id, .. }
            | Self::QueueUpdate { room_id, .. }
            | Self::MemberJoined { room_id, .. }
            | Self::MemberLeft { room_id, .. }
            | Self::Notification { room_id, .. } => *room_id,
        }
    }
}
