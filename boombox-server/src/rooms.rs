use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};
use boombox_collab::RoomParams;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewRoomSchema, ValidatedJson},
    serialized::{Room, RoomMember, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Room>)
    )
)]
pub(crate) async fn list_rooms(
    _session: Session,
    State(context): State<ServerContext>,
) -> Json<Vec<Room>> {
    let rooms: Vec<_> = context
        .collab
        .rooms
        .list_all()
        .into_iter()
        .map(|room| room.to_serialized())
        .collect();

    Json(rooms)
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
pub(crate) async fn room(
    _session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Room>> {
    let room = context.collab.rooms.room_by_code(&code)?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
pub(crate) async fn create_room(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .create_room(RoomParams {
            title: body.title,
            description: body.description,
            user_id: session.user().id,
        })
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/members",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = RoomMember)
    )
)]
pub(crate) async fn join_room(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<RoomMember>> {
    let room = context.collab.rooms.room_by_code(&code)?;

    let member = context
        .collab
        .rooms
        .join(room.id(), session.user().id)
        .await?;

    Ok(Json(member.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{code}/members",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "User left the room")
    )
)]
pub(crate) async fn leave_room(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<()> {
    let room = context.collab.rooms.room_by_code(&code)?;

    context
        .collab
        .rooms
        .leave(room.id(), session.user().id)
        .await?;

    Ok(())
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{code}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Room was closed and its session ended")
    )
)]
pub(crate) async fn close_room(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<()> {
    let room = context.collab.rooms.room_by_code(&code)?;

    context
        .collab
        .rooms
        .close(room.id(), session.user().id)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms))
        .route("/", post(create_room))
        .route("/:code", get(room))
        .route("/:code", delete(close_room))
        .route("/:code/members", post(join_room))
        .route("/:code/members", delete(leave_room))
}
