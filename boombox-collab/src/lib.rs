mod auth;
mod catalog;
mod db;
mod events;
mod playback;
mod rooms;
mod util;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use boombox_core::{AdvanceScheduler, ArcedStore, Config};

pub use auth::*;
pub use catalog::*;
pub use db::*;
pub use events::*;
pub use playback::*;
pub use rooms::*;
pub use util::*;

/// The boombox collab system: rooms, queues, and the shared playback timeline.
pub struct Collab<C, Db> {
    context: CollabContext<C, Db>,

    pub auth: Auth<Db>,
    pub rooms: RoomManager<C, Db>,
    pub playback: PlaybackManager<C, Db>,
}

/// A type passed to the components of the collab system, to access state, reach the
/// stores, and fan out events. Everything in here is constructed at process start and
/// torn down with the [Collab] that owns it, so tests can build isolated instances.
pub struct CollabContext<C, Db> {
    pub config: Config,

    pub catalog: Arc<C>,
    pub database: Arc<Db>,

    pub rooms: ArcedStore<RoomId, Room<C, Db>>,
    pub sessions: ArcedStore<SessionId, SessionRuntime>,
    pub scheduler: Arc<AdvanceScheduler<SessionId>>,
}

impl<C, Db> Collab<C, Db>
where
    C: Catalog,
    Db: Database,
{
    pub fn new(catalog: C, database: Db, config: Config) -> Self {
        let (scheduler, fires) = AdvanceScheduler::new();

        let context = CollabContext {
            config,

            catalog: Arc::new(catalog),
            database: Arc::new(database),

            rooms: Default::default(),
            sessions: Default::default(),
            scheduler: Arc::new(scheduler),
        };

        PlaybackManager::spawn_fire_loop(&context, fires);

        Self {
            auth: Auth::new(&context.database),
            rooms: RoomManager::new(&context),
            playback: PlaybackManager::new(&context),
            context,
        }
    }

    /// Restores rooms and playback state from the database. Called once at startup.
    pub async fn init(&self) -> std::result::Result<(), PlaybackError> {
        self.rooms.restore().await?;
        self.playback.restore().await?;

        Ok(())
    }
}

impl<C, Db> CollabContext<C, Db>
where
    C: Catalog,
    Db: Database,
{
    /// Returns the in-memory room of the given id
    pub fn room(&self, room_id: RoomId) -> std::result::Result<Arc<Room<C, Db>>, RoomError> {
        self.rooms
            .get(&room_id)
            .map(|room| room.value().clone())
            .ok_or(RoomError::RoomNotFound)
    }

    /// Returns the runtime of a session, registering one if this is the first
    /// time the session is touched since process start
    pub(crate) fn ensure_runtime(&self, session: &SessionData) -> Arc<SessionRuntime> {
        self.sessions
            .entry(session.id)
            .or_insert_with(|| Arc::new(SessionRuntime::new(session.id, session.room_id)))
            .value()
            .clone()
    }
}

impl<C, Db> Clone for CollabContext<C, Db> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            catalog: self.catalog.clone(),
            database: self.database.clone(),
            rooms: self.rooms.clone(),
            sessions: self.sessions.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}
