mod logging;

use std::{env, sync::Arc};

use boombox_collab::{Collab, PgDatabase, SpotifyCatalog};
use boombox_core::Config;
use boombox_server::run_server;
use log::info;

#[tokio::main]
async fn main() {
    logging::init_logger();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let client_id = env::var("SPOTIFY_CLIENT_ID").expect("SPOTIFY_CLIENT_ID must be set");
    let client_secret =
        env::var("SPOTIFY_CLIENT_SECRET").expect("SPOTIFY_CLIENT_SECRET must be set");

    let database = PgDatabase::new(&database_url)
        .await
        .expect("database connects");
    let catalog = SpotifyCatalog::new(client_id, client_secret);

    let collab = Arc::new(Collab::new(catalog, database, Config::default()));

    collab.init().await.expect("state is restored");
    info!("Rooms and playback state restored");

    run_server(collab).await
}
