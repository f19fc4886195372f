mod auth;
mod context;
mod docs;
mod errors;
mod playback;
mod rooms;
mod schemas;
mod serialized;
mod sse;

use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::{routing::get, Json};
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

pub use context::*;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 8090;

pub type Router = axum::Router<ServerContext>;

/// Starts the boombox server
pub async fn run_server(collab: Arc<BoomboxCollab>) {
    let port = env::var("BOOMBOX_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest(
            "/rooms",
            rooms::router()
                .merge(playback::router())
                .merge(sse::router()),
        );

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(serve_api))
        .layer(cors)
        .with_state(ServerContext { collab });

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {}", port);

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}

async fn serve_api() -> Json<utoipa::openapi::OpenApi> {
    Json(docs::ApiDoc::openapi())
}
