use utoipa::OpenApi;

use crate::{auth, playback, rooms, schemas, serialized, sse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "boombox API",
        description = "Exposes endpoints to interact with a boombox server"
    ),
    paths(
        auth::register,
        auth::login,
        auth::logout,
        auth::user,
        rooms::list_rooms,
        rooms::room,
        rooms::create_room,
        rooms::join_room,
        rooms::leave_room,
        rooms::close_room,
        playback::playback_state,
        playback::perform_playback_action,
        playback::queue,
        playback::add_to_queue,
        playback::remove_from_queue,
        sse::events,
    ),
    components(schemas(
        serialized::User,
        serialized::LoginResult,
        serialized::Room,
        serialized::RoomMember,
        serialized::RoomConnection,
        serialized::Song,
        serialized::QueueItem,
        serialized::PlaybackState,
        serialized::Queue,
        schemas::LoginSchema,
        schemas::RegisterSchema,
        schemas::NewRoomSchema,
        schemas::AddToQueueSchema,
        schemas::PlaybackActionSchema,
        sse::ServerEvent,
        sse::NotificationKind,
    ))
)]
pub struct ApiDoc;
