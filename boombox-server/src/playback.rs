use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{AddToQueueSchema, PlaybackActionSchema, ValidatedJson},
    serialized::{PlaybackState, Queue, QueueItem, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/playback",
    tag = "playback",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PlaybackState)
    )
)]
pub(crate) async fn playback_state(
    _session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<PlaybackState>> {
    let room = context.collab.rooms.room_by_code(&code)?;
    let snapshot = context.collab.playback.state(room.id())?;

    Ok(Json(snapshot.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/playback/actions",
    tag = "playback",
    request_body = PlaybackActionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PlaybackState)
    )
)]
pub(crate) async fn perform_playback_action(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    Json(body): Json<PlaybackActionSchema>,
) -> ServerResult<Json<PlaybackState>> {
    let room = context.collab.rooms.room_by_code(&code)?;
    let room_id = room.id();
    let user_id = session.user().id;

    let playback = &context.collab.playback;

    let snapshot = match body {
        PlaybackActionSchema::Play => playback.play(room_id, user_id).await?,
        PlaybackActionSchema::Pause => playback.pause(room_id, user_id).await?,
        PlaybackActionSchema::Resume => playback.resume(room_id, user_id).await?,
        PlaybackActionSchema::Skip => playback.skip(room_id, user_id).await?,
    };

    Ok(Json(snapshot.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/queue",
    tag = "playback",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Queue)
    )
)]
pub(crate) async fn queue(
    _session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Queue>> {
    let room = context.collab.rooms.room_by_code(&code)?;
    let (queue, recently_played) = context.collab.playback.queue(room.id()).await?;

    Ok(Json(Queue {
        queue: queue.to_serialized(),
        recently_played: recently_played.to_serialized(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/queue",
    tag = "playback",
    request_body = AddToQueueSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = QueueItem)
    )
)]
pub(crate) async fn add_to_queue(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<AddToQueueSchema>,
) -> ServerResult<Json<QueueItem>> {
    let room = context.collab.rooms.room_by_code(&code)?;

    let entry = context
        .collab
        .playback
        .add_to_queue(room.id(), &body.query, session.user().id)
        .await?;

    Ok(Json(entry.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{code}/queue/{entry_id}",
    tag = "playback",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Entry was removed from the queue")
    )
)]
pub(crate) async fn remove_from_queue(
    session: Session,
    State(context): State<ServerContext>,
    Path((code, entry_id)): Path<(String, i32)>,
) -> ServerResult<()> {
    let room = context.collab.rooms.room_by_code(&code)?;

    context
        .collab
        .playback
        .remove_from_queue(room.id(), entry_id, session.user().id)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/:code/playback", get(playback_state))
        .route("/:code/playback/actions", post(perform_playback_action))
        .route("/:code/queue", get(queue))
        .route("/:code/queue", post(add_to_queue))
        .route("/:code/queue/:entry_id", delete(remove_from_queue))
}
