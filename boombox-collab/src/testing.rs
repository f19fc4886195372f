//! Shared fixtures for tests. Builds an isolated collab instance backed by the
//! in-memory database and a canned catalog.

use boombox_core::Config;

use crate::{
    memory::MemoryDatabase, CatalogTrack, Collab, Database, FixedCatalog, NewPlainUser, PrimaryKey,
    QueueEntryData, RoomParams, SessionData, UserData,
};

pub struct Fixture {
    pub collab: Collab<FixedCatalog, MemoryDatabase>,
    pub room_id: PrimaryKey,
    pub host_id: PrimaryKey,
}

pub async fn fixture() -> Fixture {
    fixture_with_config(Config::default()).await
}

/// A fixture whose sessions stay idle when songs are added, which lets tests
/// position the timeline themselves
pub async fn fixture_without_autoplay() -> Fixture {
    fixture_with_config(Config {
        auto_play_on_add: false,
        ..Config::default()
    })
    .await
}

pub async fn fixture_with_config(config: Config) -> Fixture {
    let collab = Collab::new(FixedCatalog::default(), MemoryDatabase::new(), config);

    let host = collab
        .auth
        .register(NewPlainUser {
            username: "host".to_string(),
            password: "correct horse battery staple".to_string(),
            display_name: "Host".to_string(),
        })
        .await
        .unwrap();

    let room = collab
        .rooms
        .create_room(RoomParams {
            title: "Listening party".to_string(),
            description: None,
            user_id: host.id,
        })
        .await
        .unwrap();

    Fixture {
        room_id: room.id(),
        host_id: host.id,
        collab,
    }
}

impl Fixture {
    /// Creates an account that is not a member of the room
    pub async fn create_user(&self, username: &str) -> UserData {
        self.collab
            .auth
            .register(NewPlainUser {
                username: username.to_string(),
                password: "correct horse battery staple".to_string(),
                display_name: username.to_string(),
            })
            .await
            .unwrap()
    }

    /// Creates an account and joins it to the room
    pub async fn join_listener(&self, username: &str) -> UserData {
        let user = self.create_user(username).await;

        self.collab
            .rooms
            .join(self.room_id, user.id)
            .await
            .unwrap();

        user
    }

    /// Registers a track with the catalog and queues it as the given user
    pub async fn queue_track(
        &self,
        user_id: PrimaryKey,
        external_id: &str,
        duration_ms: i32,
    ) -> QueueEntryData {
        self.collab.context.catalog.add(CatalogTrack {
            external_id: external_id.to_string(),
            title: format!("Track {}", external_id),
            artist: "Fixture Artist".to_string(),
            album: Some("Fixture Album".to_string()),
            duration_ms,
            artwork_url: None,
            uri: format!("spotify:track:{}", external_id),
        });

        self.collab
            .playback
            .add_to_queue(self.room_id, external_id, user_id)
            .await
            .unwrap()
    }

    /// The active session of the fixture room, fresh from the database
    pub async fn active_session(&self) -> SessionData {
        self.collab
            .context
            .database
            .active_session_by_room(self.room_id)
            .await
            .unwrap()
    }
}
