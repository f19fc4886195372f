mod bootstrap;
mod session;

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{Duration, Utc};
use log::{debug, info, warn};
use thiserror::Error;

use boombox_core::{ExhaustedPolicy, FireReceiver, PlaybackState};

pub use session::*;

use crate::{
    extract_track_id, Catalog, CatalogError, CollabContext, CollabEvent, Database, DatabaseError,
    NotificationLevel, PlaybackSnapshot, PrimaryKey, QueueEntryData, RoomError,
    SessionPlaybackUpdate, SongData,
};

/// Drives the playback state machine of every session.
///
/// All transitions write to the database before anything is broadcast, so a client that
/// fetches fresh state right after being notified always observes the new state.
pub struct PlaybackManager<C, Db> {
    context: CollabContext<C, Db>,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Only the room host can control playback")]
    Unauthorized,
    #[error("Only the host or the user who added a song can remove it")]
    Forbidden,
    #[error("Cannot {action} while playback is {state}")]
    InvalidState {
        action: &'static str,
        state: PlaybackState,
    },
    #[error("Queue entry was not found")]
    EntryNotFound,
    #[error("No track matched the query")]
    UnknownTrack,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl<C, Db> PlaybackManager<C, Db>
where
    C: Catalog,
    Db: Database,
{
    pub fn new(context: &CollabContext<C, Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Spawns the task that applies scheduler fires to the state machine.
    /// Called once when the collab system is constructed.
    pub(crate) fn spawn_fire_loop(
        context: &CollabContext<C, Db>,
        mut fires: FireReceiver<SessionId>,
    ) {
        let context = context.clone();

        tokio::spawn(async move {
            while let Some(fire) = fires.recv().await {
                let manager = PlaybackManager::new(&context);

                if let Err(err) = manager.advance(fire.key, fire.revision).await {
                    warn!("Auto-advance of session {} failed: {}", fire.key, err);
                }
            }
        });
    }

    /// Starts or resumes playback in a room. Host only.
    pub async fn play(
        &self,
        room_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<PlaybackSnapshot, PlaybackError> {
        let room = self.context.room(room_id)?;
        room.ensure_host(user_id)
            .map_err(|_| PlaybackError::Unauthorized)?;

        let runtime = self.runtime_for_room(room_id).await?;
        let _guard = runtime.lock().await;

        match runtime.timeline.state() {
            PlaybackState::Playing => Ok(self.snapshot(&runtime)),
            PlaybackState::Paused => self.resume_locked(&runtime).await,
            PlaybackState::Empty | PlaybackState::Ended => {
                match self.context.database.next_pending_entry(runtime.id).await? {
                    Some(entry) => self.start_locked(&runtime, entry.id, entry.song, 0).await,
                    None => Ok(self.snapshot(&runtime)),
                }
            }
        }
    }

    /// Pauses playback in a room. Host only, valid only while playing.
    pub async fn pause(
        &self,
        room_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<PlaybackSnapshot, PlaybackError> {
        let room = self.context.room(room_id)?;
        room.ensure_host(user_id)
            .map_err(|_| PlaybackError::Unauthorized)?;

        let runtime = self.existing_runtime_for_room(room_id).await?;
        let _guard = runtime.lock().await;

        let state = runtime.timeline.state();

        if state != PlaybackState::Playing {
            return Err(PlaybackError::InvalidState {
                action: "pause",
                state,
            });
        }

        let now = Utc::now();
        let position = runtime.timeline.position_ms(now);

        self.context
            .database
            .update_session_playback(SessionPlaybackUpdate {
                session_id: runtime.id,
                current_song_id: runtime.current().map(|c| c.song.id),
                started_at: None,
                paused_offset_ms: position as i32,
            })
            .await?;

        runtime.timeline.pause(now);
        runtime.bump_revision();
        self.context.scheduler.cancel(&runtime.id);

        let snapshot = self.snapshot(&runtime);
        self.broadcast_playback(runtime.room_id, snapshot.clone());

        info!("Session {} paused at {}ms", runtime.id, position);

        Ok(snapshot)
    }

    /// Resumes paused playback in a room. Host only, valid only while paused.
    pub async fn resume(
        &self,
        room_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<PlaybackSnapshot, PlaybackError> {
        let room = self.context.room(room_id)?;
        room.ensure_host(user_id)
            .map_err(|_| PlaybackError::Unauthorized)?;

        let runtime = self.existing_runtime_for_room(room_id).await?;
        let _guard = runtime.lock().await;

        let state = runtime.timeline.state();

        if state != PlaybackState::Paused {
            return Err(PlaybackError::InvalidState {
                action: "resume",
                state,
            });
        }

        self.resume_locked(&runtime).await
    }

    /// Skips to the next song in a room's queue. Host only.
    pub async fn skip(
        &self,
        room_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<PlaybackSnapshot, PlaybackError> {
        let room = self.context.room(room_id)?;
        room.ensure_host(user_id)
            .map_err(|_| PlaybackError::Unauthorized)?;

        let runtime = self.existing_runtime_for_room(room_id).await?;
        let _guard = runtime.lock().await;

        let state = runtime.timeline.state();

        if runtime.current().is_none() {
            return Err(PlaybackError::InvalidState {
                action: "skip",
                state,
            });
        }

        self.mark_current_played(&runtime).await?;
        let snapshot = self.advance_locked(&runtime).await?;
        self.broadcast_queue(&runtime).await?;

        Ok(snapshot)
    }

    /// Applies a scheduler fire to a session.
    ///
    /// A fire whose revision was superseded by a manual transition is an expected
    /// outcome of the race between timers and requests, and is silently dropped.
    pub async fn advance(
        &self,
        session_id: SessionId,
        expected_revision: u64,
    ) -> Result<(), PlaybackError> {
        let Some(runtime) = self
            .context
            .sessions
            .get(&session_id)
            .map(|runtime| runtime.value().clone())
        else {
            return Ok(());
        };

        let _guard = runtime.lock().await;

        if runtime.revision() != expected_revision {
            debug!(
                "Dropping stale advance of session {} (armed at revision {}, now {})",
                session_id,
                expected_revision,
                runtime.revision()
            );

            return Ok(());
        }

        self.mark_current_played(&runtime).await?;
        self.advance_locked(&runtime).await?;
        self.broadcast_queue(&runtime).await?;

        Ok(())
    }

    /// Adds a song to a room's queue. Members only.
    ///
    /// The catalog is consulted only when the track was never added before.
    pub async fn add_to_queue(
        &self,
        room_id: PrimaryKey,
        query: &str,
        user_id: PrimaryKey,
    ) -> Result<QueueEntryData, PlaybackError> {
        let room = self.context.room(room_id)?;
        room.member_by_user_id(user_id)?;

        let external_id = extract_track_id(query).ok_or(PlaybackError::UnknownTrack)?;

        let song = match self.context.database.song_by_external_id(&external_id).await {
            Ok(song) => song,
            Err(DatabaseError::NotFound { .. }) => {
                let track = self.context.catalog.track_by_id(&external_id).await?;
                self.context.database.create_song(track.into()).await?
            }
            Err(e) => return Err(e.into()),
        };

        let runtime = self.runtime_for_room(room_id).await?;
        let _guard = runtime.lock().await;

        let entry = self
            .context
            .database
            .add_queue_entry(crate::NewQueueEntry {
                session_id: runtime.id,
                song_id: song.id,
                added_by_user_id: user_id,
            })
            .await?;

        info!(
            "{} queued in session {} at position {}",
            entry.song.title, runtime.id, entry.position
        );

        self.broadcast_queue(&runtime).await?;

        match runtime.timeline.state() {
            PlaybackState::Empty | PlaybackState::Ended
                if self.context.config.auto_play_on_add =>
            {
                self.start_locked(&runtime, entry.id, entry.song.clone(), 0)
                    .await?;
            }
            PlaybackState::Ended => runtime.timeline.reopen(),
            _ => {}
        }

        Ok(entry)
    }

    /// Removes a pending entry from a room's queue.
    /// Allowed for the user who added it and for the host.
    pub async fn remove_from_queue(
        &self,
        room_id: PrimaryKey,
        entry_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<(), PlaybackError> {
        let room = self.context.room(room_id)?;
        room.member_by_user_id(user_id)?;

        let runtime = self.runtime_for_room(room_id).await?;
        let _guard = runtime.lock().await;

        let entry = match self.context.database.queue_entry_by_id(entry_id).await {
            Ok(entry) => entry,
            Err(DatabaseError::NotFound { .. }) => return Err(PlaybackError::EntryNotFound),
            Err(e) => return Err(e.into()),
        };

        // Entries of other sessions and already played ones are not removable
        if entry.session_id != runtime.id || entry.played {
            return Err(PlaybackError::EntryNotFound);
        }

        let is_host = room.ensure_host(user_id).is_ok();

        if entry.added_by.id != user_id && !is_host {
            return Err(PlaybackError::Forbidden);
        }

        self.context.database.remove_queue_entry(entry_id).await?;
        self.broadcast_queue(&runtime).await?;

        Ok(())
    }

    /// The current playback snapshot of a room
    pub fn state(&self, room_id: PrimaryKey) -> Result<PlaybackSnapshot, PlaybackError> {
        // Ensure the room exists
        self.context.room(room_id)?;

        let snapshot = self
            .runtime_by_room(room_id)
            .map(|runtime| self.snapshot(&runtime))
            .unwrap_or_else(|| PlaybackSnapshot::empty(Utc::now()));

        Ok(snapshot)
    }

    /// The pending queue and recently played history of a room
    pub async fn queue(
        &self,
        room_id: PrimaryKey,
    ) -> Result<(Vec<QueueEntryData>, Vec<QueueEntryData>), PlaybackError> {
        self.context.room(room_id)?;

        let Some(runtime) = self.runtime_by_room(room_id) else {
            return Ok((vec![], vec![]));
        };

        let queue = self.context.database.queue_entries(runtime.id).await?;
        let recently_played = self
            .context
            .database
            .recently_played(runtime.id, self.context.config.recently_played_limit)
            .await?;

        Ok((queue, recently_played))
    }

    /// Cancels the timer of a session and forgets its runtime.
    /// Used when a room closes.
    pub(crate) fn forget_session(&self, session_id: SessionId) {
        self.context.scheduler.cancel(&session_id);
        self.context.sessions.remove(&session_id);
    }

    pub(crate) fn runtime_by_room(&self, room_id: PrimaryKey) -> Option<Arc<SessionRuntime>> {
        self.context
            .sessions
            .iter()
            .find(|runtime| runtime.room_id == room_id)
            .map(|runtime| runtime.value().clone())
    }

    /// Returns the runtime of the room's active session, or fails when there is none.
    /// Used by transitions that make no sense without one.
    async fn existing_runtime_for_room(
        &self,
        room_id: PrimaryKey,
    ) -> Result<Arc<SessionRuntime>, PlaybackError> {
        let session = self.context.database.active_session_by_room(room_id).await?;

        Ok(self.context.ensure_runtime(&session))
    }

    /// Returns the runtime of the room's active session, creating the session
    /// if the room doesn't have one yet.
    async fn runtime_for_room(
        &self,
        room_id: PrimaryKey,
    ) -> Result<Arc<SessionRuntime>, PlaybackError> {
        let session = match self.context.database.active_session_by_room(room_id).await {
            Ok(session) => session,
            Err(DatabaseError::NotFound { .. }) => {
                match self.context.database.create_session(room_id).await {
                    Ok(session) => session,
                    // Another request created it in the meantime
                    Err(DatabaseError::Conflict { .. }) => {
                        self.context.database.active_session_by_room(room_id).await?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        Ok(self.context.ensure_runtime(&session))
    }

    /// Resumes from the frozen offset by reconstructing the anchor.
    /// Caller holds the transition lock.
    async fn resume_locked(
        &self,
        runtime: &Arc<SessionRuntime>,
    ) -> Result<PlaybackSnapshot, PlaybackError> {
        let current = runtime.current().ok_or(PlaybackError::InvalidState {
            action: "resume",
            state: runtime.timeline.state(),
        })?;

        let offset = runtime.timeline.position_ms(Utc::now());

        self.start_locked(runtime, current.entry_id, current.song, offset)
            .await
    }

    /// Starts a song at the given offset, persisting the new anchor, re-arming the
    /// timer with the recomputed remaining duration, and broadcasting the snapshot.
    /// Caller holds the transition lock.
    async fn start_locked(
        &self,
        runtime: &Arc<SessionRuntime>,
        entry_id: PrimaryKey,
        song: SongData,
        position_ms: u64,
    ) -> Result<PlaybackSnapshot, PlaybackError> {
        let now = Utc::now();
        let duration = song.duration_ms.max(0) as u64;
        let anchor = now - Duration::milliseconds(position_ms as i64);

        self.context
            .database
            .update_session_playback(SessionPlaybackUpdate {
                session_id: runtime.id,
                current_song_id: Some(song.id),
                started_at: Some(anchor),
                paused_offset_ms: 0,
            })
            .await?;

        runtime.timeline.start(duration, anchor);
        runtime.set_current(Some(CurrentEntry {
            entry_id,
            song: song.clone(),
        }));

        let revision = runtime.bump_revision();
        let remaining = duration.saturating_sub(position_ms);

        self.context
            .scheduler
            .arm(runtime.id, revision, StdDuration::from_millis(remaining));

        info!(
            "Session {} playing {} ({}ms remaining)",
            runtime.id, song.title, remaining
        );

        let snapshot = self.snapshot(runtime);
        self.broadcast_playback(runtime.room_id, snapshot.clone());

        Ok(snapshot)
    }

    /// Moves to the next pending entry, or winds the session down when there is none.
    /// Caller holds the transition lock.
    async fn advance_locked(
        &self,
        runtime: &Arc<SessionRuntime>,
    ) -> Result<PlaybackSnapshot, PlaybackError> {
        match self.context.database.next_pending_entry(runtime.id).await? {
            Some(entry) => self.start_locked(runtime, entry.id, entry.song, 0).await,
            None => self.exhaust_locked(runtime).await,
        }
    }

    /// Applies the exhausted-queue policy. Caller holds the transition lock.
    async fn exhaust_locked(
        &self,
        runtime: &Arc<SessionRuntime>,
    ) -> Result<PlaybackSnapshot, PlaybackError> {
        self.context
            .database
            .update_session_playback(SessionPlaybackUpdate {
                session_id: runtime.id,
                current_song_id: None,
                started_at: None,
                paused_offset_ms: 0,
            })
            .await?;

        runtime.timeline.finish();
        runtime.set_current(None);
        runtime.bump_revision();
        self.context.scheduler.cancel(&runtime.id);

        info!("Session {} ran out of songs", runtime.id);

        let snapshot = self.snapshot(runtime);
        self.broadcast_playback(runtime.room_id, snapshot.clone());

        match self.context.config.when_exhausted {
            ExhaustedPolicy::WaitForSongs => {
                self.notify(
                    runtime.room_id,
                    "Queue is empty! Add more songs to continue.",
                    NotificationLevel::Info,
                );
            }
            ExhaustedPolicy::EndSession => {
                self.context.database.end_session(runtime.id).await?;
                self.forget_session(runtime.id);

                self.notify(
                    runtime.room_id,
                    "The queue ran out and the session ended.",
                    NotificationLevel::Info,
                );
            }
        }

        Ok(snapshot)
    }

    /// Marks the entry being advanced away from as played.
    /// An entry that was removed in the meantime is simply gone, which is fine.
    async fn mark_current_played(
        &self,
        runtime: &Arc<SessionRuntime>,
    ) -> Result<(), PlaybackError> {
        let Some(current) = runtime.current() else {
            return Ok(());
        };

        match self
            .context
            .database
            .mark_entry_played(current.entry_id, Utc::now())
            .await
        {
            Ok(()) => Ok(()),
            Err(DatabaseError::NotFound { .. }) => {
                debug!(
                    "Entry {} was removed before it finished playing",
                    current.entry_id
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn snapshot(&self, runtime: &SessionRuntime) -> PlaybackSnapshot {
        let now = Utc::now();
        let view = runtime.timeline.snapshot(now);

        PlaybackSnapshot {
            playing: view.state == PlaybackState::Playing,
            current_song: runtime.current().map(|current| current.song),
            position_ms: view.position_ms,
            started_at: view.started_at,
            timestamp: now,
        }
    }

    fn broadcast_playback(&self, room_id: PrimaryKey, snapshot: PlaybackSnapshot) {
        if let Ok(room) = self.context.room(room_id) {
            room.broadcast(CollabEvent::PlaybackUpdate {
                room_id,
                state: snapshot,
            });
        }
    }

    pub(crate) async fn broadcast_queue(
        &self,
        runtime: &SessionRuntime,
    ) -> Result<(), PlaybackError> {
        let queue = self.context.database.queue_entries(runtime.id).await?;
        let recently_played = self
            .context
            .database
            .recently_played(runtime.id, self.context.config.recently_played_limit)
            .await?;

        if let Ok(room) = self.context.room(runtime.room_id) {
            room.broadcast(CollabEvent::QueueUpdate {
                room_id: runtime.room_id,
                queue,
                recently_played,
            });
        }

        Ok(())
    }

    fn notify(&self, room_id: PrimaryKey, message: &str, level: NotificationLevel) {
        if let Ok(room) = self.context.room(room_id) {
            room.broadcast(CollabEvent::Notification {
                room_id,
                message: message.to_string(),
                level,
            });
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn playing_starts_the_first_pending_song() {
        let fixture = testing::fixture().await;
        let (room_id, host_id) = (fixture.room_id, fixture.host_id);

        fixture.queue_track(host_id, "track0000000000000000a", 180_000).await;

        let snapshot = fixture.collab.playback.play(room_id, host_id).await.unwrap();

        assert!(snapshot.playing);
        assert_eq!(
            snapshot.current_song.unwrap().external_id,
            "track0000000000000000a"
        );
        assert!(snapshot.position_ms < 1000);
    }

    #[tokio::test]
    async fn only_the_host_controls_playback() {
        let fixture = testing::fixture().await;
        let listener = fixture.join_listener("listener").await;

        fixture
            .queue_track(fixture.host_id, "track0000000000000000a", 180_000)
            .await;

        let result = fixture.collab.playback.play(fixture.room_id, listener.id).await;
        assert!(matches!(result, Err(PlaybackError::Unauthorized)));
    }

    #[tokio::test]
    async fn pausing_freezes_the_position_and_resuming_restores_it() {
        let fixture = testing::fixture().await;
        let (room_id, host_id) = (fixture.room_id, fixture.host_id);

        fixture.queue_track(host_id, "track0000000000000000a", 180_000).await;
        fixture.collab.playback.play(room_id, host_id).await.unwrap();

        let paused = fixture.collab.playback.pause(room_id, host_id).await.unwrap();
        assert!(!paused.playing);

        let session = fixture.active_session().await;
        assert!(session.started_at.is_none());
        assert_eq!(session.paused_offset_ms, paused.position_ms as i32);

        // The timer is no longer armed while paused
        let session_id = session.id;
        assert!(!fixture.collab.context.scheduler.is_armed(&session_id));

        let resumed = fixture.collab.playback.resume(room_id, host_id).await.unwrap();
        assert!(resumed.playing);
        assert!(resumed.position_ms >= paused.position_ms);
        assert!(resumed.position_ms - paused.position_ms < 1000);

        let session = fixture.active_session().await;
        assert!(session.started_at.is_some());
    }

    #[tokio::test]
    async fn transitions_reject_invalid_states() {
        let fixture = testing::fixture().await;
        let (room_id, host_id) = (fixture.room_id, fixture.host_id);

        fixture.queue_track(host_id, "track0000000000000000a", 180_000).await;
        fixture.collab.playback.play(room_id, host_id).await.unwrap();

        // Resume while playing
        let result = fixture.collab.playback.resume(room_id, host_id).await;
        assert!(matches!(
            result,
            Err(PlaybackError::InvalidState { action: "resume", .. })
        ));

        fixture.collab.playback.pause(room_id, host_id).await.unwrap();

        // Pause while paused
        let result = fixture.collab.playback.pause(room_id, host_id).await;
        assert!(matches!(
            result,
            Err(PlaybackError::InvalidState { action: "pause", .. })
        ));
    }

    #[tokio::test]
    async fn skipping_advances_exactly_once_and_stale_timers_are_dropped() {
        let fixture = testing::fixture().await;
        let (room_id, host_id) = (fixture.room_id, fixture.host_id);

        fixture.queue_track(host_id, "track0000000000000000a", 180_000).await;
        fixture.queue_track(host_id, "track0000000000000000b", 200_000).await;
        fixture.queue_track(host_id, "track0000000000000000c", 240_000).await;

        fixture.collab.playback.play(room_id, host_id).await.unwrap();

        let runtime = fixture.collab.playback.runtime_by_room(room_id).unwrap();
        let timer_revision = runtime.revision();

        // The manual skip wins the race against the timer armed for the first song
        let snapshot = fixture.collab.playback.skip(room_id, host_id).await.unwrap();
        assert_eq!(
            snapshot.current_song.unwrap().external_id,
            "track0000000000000000b"
        );

        // The superseded fire arrives afterwards and must be a no-op
        fixture
            .collab
            .playback
            .advance(runtime.id, timer_revision)
            .await
            .unwrap();

        let current = runtime.current().unwrap();
        assert_eq!(current.song.external_id, "track0000000000000000b");

        let pending = fixture.collab.context.database.queue_entries(runtime.id).await.unwrap();
        let externals: Vec<_> = pending
            .iter()
            .map(|e| e.song.external_id.as_str())
            .collect();

        assert_eq!(
            externals,
            vec!["track0000000000000000b", "track0000000000000000c"]
        );
    }

    #[tokio::test]
    async fn advances_automatically_at_the_song_boundary() {
        let fixture = testing::fixture().await;
        let (room_id, host_id) = (fixture.room_id, fixture.host_id);

        // A very short first song so the real timer fires during the test
        fixture.queue_track(host_id, "track0000000000000000a", 80).await;
        fixture.queue_track(host_id, "track0000000000000000b", 200_000).await;

        fixture.collab.playback.play(room_id, host_id).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(400)).await;

        let runtime = fixture.collab.playback.runtime_by_room(room_id).unwrap();
        let current = runtime.current().unwrap();

        assert_eq!(current.song.external_id, "track0000000000000000b");

        let played = fixture
            .collab
            .context
            .database
            .recently_played(runtime.id, 10)
            .await
            .unwrap();

        assert_eq!(played.len(), 1);
        assert_eq!(played[0].song.external_id, "track0000000000000000a");
    }

    #[tokio::test]
    async fn adding_to_an_idle_session_auto_starts_playback() {
        let fixture = testing::fixture().await;

        let entry = fixture
            .queue_track(fixture.host_id, "track0000000000000000a", 180_000)
            .await;

        let runtime = fixture.collab.playback.runtime_by_room(fixture.room_id).unwrap();
        let current = runtime.current().unwrap();

        assert_eq!(current.entry_id, entry.id);
        assert_eq!(runtime.timeline.state(), PlaybackState::Playing);
        assert!(fixture.collab.context.scheduler.is_armed(&runtime.id));
    }

    #[tokio::test]
    async fn removal_is_limited_to_the_adder_and_the_host() {
        let fixture = testing::fixture().await;
        let listener = fixture.join_listener("listener").await;
        let other = fixture.join_listener("other").await;

        fixture
            .queue_track(fixture.host_id, "track0000000000000000a", 180_000)
            .await;
        let entry = fixture
            .queue_track(listener.id, "track0000000000000000b", 200_000)
            .await;

        // A third member may not remove someone else's entry
        let result = fixture
            .collab
            .playback
            .remove_from_queue(fixture.room_id, entry.id, other.id)
            .await;
        assert!(matches!(result, Err(PlaybackError::Forbidden)));

        // The adder may
        fixture
            .collab
            .playback
            .remove_from_queue(fixture.room_id, entry.id, listener.id)
            .await
            .unwrap();

        // Removing it again reports it missing
        let result = fixture
            .collab
            .playback
            .remove_from_queue(fixture.room_id, entry.id, fixture.host_id)
            .await;
        assert!(matches!(result, Err(PlaybackError::EntryNotFound)));
    }

    #[tokio::test]
    async fn exhausting_the_queue_ends_in_the_configured_state() {
        let fixture = testing::fixture().await;
        let (room_id, host_id) = (fixture.room_id, fixture.host_id);

        fixture.queue_track(host_id, "track0000000000000000a", 180_000).await;
        fixture.collab.playback.play(room_id, host_id).await.unwrap();

        let snapshot = fixture.collab.playback.skip(room_id, host_id).await.unwrap();

        assert!(!snapshot.playing);
        assert!(snapshot.current_song.is_none());

        let runtime = fixture.collab.playback.runtime_by_room(room_id).unwrap();
        assert_eq!(runtime.timeline.state(), PlaybackState::Ended);
        assert!(!fixture.collab.context.scheduler.is_armed(&runtime.id));

        // The session stays active under the default policy
        let session = fixture.active_session().await;
        assert!(session.is_active);
        assert!(session.current_song_id.is_none());
    }
}
