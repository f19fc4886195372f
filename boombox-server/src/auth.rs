use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    routing::{get, post},
    Json,
};
use boombox_collab::{AuthSessionData, Credentials, NewPlainUser, UserData};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{LoginSchema, RegisterSchema, ValidatedJson},
    serialized::{LoginResult, ToSerialized, User},
    Router,
};

/// Wraps [AuthSessionData] so [FromRequestParts] can be implemented for it
pub struct Session(AuthSessionData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.user.clone()
    }

    /// Returns the token the session was authenticated with
    pub fn token(&self) -> String {
        self.0.token.clone()
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = token.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().cloned().unwrap_or_default();

        let session = state
            .collab
            .auth
            .session(token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        Ok(Self(session))
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "auth",
    request_body = RegisterSchema,
    responses(
        (status = 200, body = User)
    )
)]
pub(crate) async fn register(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .collab
        .auth
        .register(NewPlainUser {
            username: body.username,
            password: body.password,
            display_name: body.display_name,
        })
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult)
    )
)]
pub(crate) async fn login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<LoginResult>> {
    let session = context
        .collab
        .auth
        .login(Credentials {
            username: body.username,
            password: body.password,
        })
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Session was deleted")
    )
)]
pub(crate) async fn logout(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<()> {
    context.collab.auth.logout(&session.token()).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
pub(crate) async fn user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(user))
}
