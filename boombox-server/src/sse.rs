use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use futures_util::Stream;
use serde::Serialize;
use utoipa::ToSchema;

use boombox_collab::{CollabEvent, NotificationLevel, PgDatabase, RoomConnectionHandle, SpotifyCatalog};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{PlaybackState, QueueItem, ToSerialized, User},
    Router,
};

/// Events pushed to connected clients.
/// Every payload is a full snapshot, so clients never need to replay missed deltas.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum ServerEvent {
    /// Acknowledges a new connection
    Connected {
        room_id: i32,
        code: String,
        user: User,
    },
    /// The playback state of the room changed
    PlaybackState {
        room_id: i32,
        state: PlaybackState,
    },
    /// The queue of the room changed
    QueueUpdate {
        room_id: i32,
        queue: Vec<QueueItem>,
        recently_played: Vec<QueueItem>,
    },
    /// A user connected to the room
    MemberJoined {
        room_id: i32,
        user: User,
        connection_count: usize,
    },
    /// A user disconnected from the room
    MemberLeft {
        room_id: i32,
        user_id: i32,
        connection_count: usize,
    },
    /// A free-form message shown to everyone in the room
    Notification {
        room_id: i32,
        message: String,
        level: NotificationKind,
    },
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Warning,
}

impl From<CollabEvent> for ServerEvent {
    fn from(value: CollabEvent) -> Self {
        match value {
            CollabEvent::Connected {
                room_id,
                code,
                user,
            } => Self::Connected {
                room_id,
                code,
                user: user.to_serialized(),
            },
            CollabEvent::PlaybackUpdate { room_id, state } => Self::PlaybackState {
                room_id,
                state: state.to_serialized(),
            },
            CollabEvent::QueueUpdate {
                room_id,
                queue,
                recently_played,
            } => Self::QueueUpdate {
                room_id,
                queue: queue.to_serialized(),
                recently_played: recently_played.to_serialized(),
            },
            CollabEvent::MemberJoined {
                room_id,
                user,
                connection_count,
            } => Self::MemberJoined {
                room_id,
                user: user.to_serialized(),
                connection_count,
            },
            CollabEvent::MemberLeft {
                room_id,
                user_id,
                connection_count,
            } => Self::MemberLeft {
                room_id,
                user_id,
                connection_count,
            },
            CollabEvent::Notification {
                room_id,
                message,
                level,
            } => Self::Notification {
                room_id,
                message,
                level: level.into(),
            },
        }
    }
}

impl From<NotificationLevel> for NotificationKind {
    fn from(value: NotificationLevel) -> Self {
        match value {
            NotificationLevel::Info => Self::Info,
            NotificationLevel::Warning => Self::Warning,
        }
    }
}

/// Adapts a room connection into a server-sent event stream.
/// Dropping it (the client going away) tears the connection down in the room.
pub struct EventStream {
    inner: RoomConnectionHandle<SpotifyCatalog, PgDatabase>,
}

impl Stream for EventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let inner = Pin::new(&mut self.get_mut().inner);

        match inner.poll_next(cx) {
            Poll::Ready(Some(event)) => {
                let serialized = serde_json::to_string(&ServerEvent::from(event))
                    .expect("serializes properly");

                Poll::Ready(Some(Ok(Event::default().data(serialized))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/events",
    tag = "events",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events from the room, starting with a full snapshot",
            body = ServerEvent
        )
    )
)]
pub(crate) async fn events(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Sse<EventStream>> {
    let room = context.collab.rooms.room_by_code(&code)?;
    let handle = room.connect(session.user().id).await?;

    Ok(Sse::new(EventStream { inner: handle }).keep_alive(KeepAlive::default()))
}

pub fn router() -> Router {
    Router::new().route("/:code/events", get(events))
}
