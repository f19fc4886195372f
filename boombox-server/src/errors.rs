use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use boombox_collab::{AuthError, CatalogError, DatabaseError, PlaybackError, RoomError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    UpstreamUnavailable(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::RoomNotFound => Self::NotFound {
                resource: "room",
                identifier: "code",
            },
            RoomError::UserNotInRoom => Self::Forbidden(value.to_string()),
            RoomError::UserNotHost => Self::Unauthorized(value.to_string()),
            RoomError::RoomNotActive | RoomError::HostCannotLeave => {
                Self::InvalidState(value.to_string())
            }
            RoomError::Database(e) => e.into(),
        }
    }
}

impl From<CatalogError> for ServerError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::TrackNotFound(_) => Self::NotFound {
                resource: "track",
                identifier: "external_id",
            },
            e => Self::UpstreamUnavailable(e.to_string()),
        }
    }
}

impl From<PlaybackError> for ServerError {
    fn from(value: PlaybackError) -> Self {
        match value {
            PlaybackError::Unauthorized => Self::Unauthorized(value.to_string()),
            PlaybackError::Forbidden => Self::Forbidden(value.to_string()),
            PlaybackError::InvalidState { .. } => Self::InvalidState(value.to_string()),
            PlaybackError::EntryNotFound => Self::NotFound {
                resource: "queue entry",
                identifier: "id",
            },
            PlaybackError::UnknownTrack => Self::NotFound {
                resource: "track",
                identifier: "query",
            },
            PlaybackError::Catalog(e) => e.into(),
            PlaybackError::Room(e) => e.into(),
            PlaybackError::Database(e) => e.into(),
        }
    }
}
