//! Startup recovery of playback state.
//!
//! Timers and runtimes only exist in memory, so after a restart every active session is
//! rebuilt from its persisted row. A session that kept "playing" while the process was
//! down is deterministically fast-forwarded: the result is the same as if every missed
//! timer had fired on schedule.

use chrono::Utc;
use log::{info, warn};

use crate::{
    Catalog, Database, PlaybackError, PlaybackManager, QueueEntryData, SessionData,
    SessionPlaybackUpdate,
};

impl<C, Db> PlaybackManager<C, Db>
where
    C: Catalog,
    Db: Database,
{
    /// Rebuilds runtimes and re-arms timers for every active session.
    /// Called once at process start.
    pub async fn restore(&self) -> Result<(), PlaybackError> {
        let sessions = self.context.database.list_active_sessions().await?;
        let count = sessions.len();

        for session in sessions {
            if let Err(err) = self.restore_session(&session).await {
                warn!("Failed to restore session {}: {}", session.id, err);
            }
        }

        info!("Restored {} active session(s)", count);

        Ok(())
    }

    async fn restore_session(&self, session: &SessionData) -> Result<(), PlaybackError> {
        let runtime = self.context.ensure_runtime(session);
        let _guard = runtime.lock().await;

        let Some(song_id) = session.current_song_id else {
            // Idle session, nothing to rebuild beyond the runtime itself
            return Ok(());
        };

        let entries = self.context.database.queue_entries(session.id).await?;
        let current = entries.iter().position(|entry| entry.song.id == song_id);

        match session.started_at {
            // Paused: freeze the stored offset again
            None => match current {
                Some(index) => {
                    let entry = &entries[index];

                    runtime.timeline.start_paused(
                        entry.song.duration_ms.max(0) as u64,
                        session.paused_offset_ms.max(0) as u64,
                    );
                    runtime.set_current(Some(crate::CurrentEntry {
                        entry_id: entry.id,
                        song: entry.song.clone(),
                    }));

                    info!(
                        "Restored session {} paused at {}ms",
                        session.id, session.paused_offset_ms
                    );

                    Ok(())
                }
                // The paused entry is gone, leave the session idle
                None => self.clear_locked(&runtime).await,
            },
            // Playing: fast-forward through everything that finished while we were down
            Some(started_at) => {
                let now = Utc::now();
                let elapsed = (now - started_at).num_milliseconds().max(0) as u64;
                let onward: Vec<_> = entries.into_iter().skip(current.unwrap_or(0)).collect();

                self.fast_forward(&runtime, onward, elapsed).await
            }
        }
    }

    /// Walks the pending queue, deducting each song's duration from the elapsed
    /// remainder and marking songs played, until the remainder lands inside a song
    /// or the queue runs out.
    async fn fast_forward(
        &self,
        runtime: &std::sync::Arc<crate::SessionRuntime>,
        entries: Vec<QueueEntryData>,
        elapsed: u64,
    ) -> Result<(), PlaybackError> {
        let now = Utc::now();
        let mut remainder = elapsed;
        let mut caught_up = 0;

        for entry in entries {
            let duration = entry.song.duration_ms.max(0) as u64;

            if remainder < duration {
                if caught_up > 0 {
                    info!(
                        "Session {} caught up {} song(s) missed while down",
                        runtime.id, caught_up
                    );
                }

                self.start_locked(runtime, entry.id, entry.song, remainder)
                    .await?;

                return Ok(());
            }

            remainder -= duration;
            caught_up += 1;

            self.context
                .database
                .mark_entry_played(entry.id, now)
                .await?;
        }

        // Every song the process missed has finished
        self.exhaust_locked(runtime).await?;

        Ok(())
    }

    /// Resets a session whose current entry disappeared while the process was down
    async fn clear_locked(
        &self,
        runtime: &std::sync::Arc<crate::SessionRuntime>,
    ) -> Result<(), PlaybackError> {
        self.context
            .database
            .update_session_playback(SessionPlaybackUpdate {
                session_id: runtime.id,
                current_song_id: None,
                started_at: None,
                paused_offset_ms: 0,
            })
            .await?;

        runtime.set_current(None);
        runtime.bump_revision();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{testing, Database, SessionPlaybackUpdate};
    use boombox_core::PlaybackState;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn catches_up_songs_that_finished_while_the_process_was_down() {
        let fixture = testing::fixture_without_autoplay().await;
        let host_id = fixture.host_id;

        let first = fixture.queue_track(host_id, "track0000000000000000a", 180_000).await;
        fixture.queue_track(host_id, "track0000000000000000b", 200_000).await;
        fixture.queue_track(host_id, "track0000000000000000c", 240_000).await;

        // The session started the first song 500s ago and the process was down since
        let session = fixture.active_session().await;
        fixture
            .collab
            .context
            .database
            .update_session_playback(SessionPlaybackUpdate {
                session_id: session.id,
                current_song_id: Some(first.song.id),
                started_at: Some(Utc::now() - Duration::milliseconds(500_000)),
                paused_offset_ms: 0,
            })
            .await
            .unwrap();

        fixture.collab.playback.restore().await.unwrap();

        // The first two songs are in the past, the third is 120s in
        let runtime = fixture.collab.playback.runtime_by_room(fixture.room_id).unwrap();
        let current = runtime.current().unwrap();
        assert_eq!(current.song.external_id, "track0000000000000000c");

        let position = runtime.timeline.position_ms(Utc::now());
        assert!((119_500..=120_500).contains(&position), "position was {}", position);

        let played = fixture
            .collab
            .context
            .database
            .recently_played(session.id, 10)
            .await
            .unwrap();

        let mut externals: Vec<_> = played.iter().map(|e| e.song.external_id.clone()).collect();
        externals.sort();
        assert_eq!(
            externals,
            vec!["track0000000000000000a", "track0000000000000000b"]
        );

        // The timer is re-armed against the restored revision
        assert_eq!(
            fixture.collab.context.scheduler.armed_revision(&session.id),
            Some(runtime.revision())
        );
    }

    #[tokio::test]
    async fn keeps_the_original_anchor_when_the_song_is_still_playing() {
        let fixture = testing::fixture_without_autoplay().await;
        let host_id = fixture.host_id;

        let entry = fixture.queue_track(host_id, "track0000000000000000a", 180_000).await;

        let session = fixture.active_session().await;
        let anchor = Utc::now() - Duration::milliseconds(50_000);

        fixture
            .collab
            .context
            .database
            .update_session_playback(SessionPlaybackUpdate {
                session_id: session.id,
                current_song_id: Some(entry.song.id),
                started_at: Some(anchor),
                paused_offset_ms: 0,
            })
            .await
            .unwrap();

        fixture.collab.playback.restore().await.unwrap();

        let runtime = fixture.collab.playback.runtime_by_room(fixture.room_id).unwrap();
        let position = runtime.timeline.position_ms(Utc::now());

        assert!((49_500..=50_500).contains(&position), "position was {}", position);

        // The persisted anchor still matches the original start instant
        let restored = fixture.active_session().await;
        let drift = (restored.started_at.unwrap() - anchor).num_milliseconds().abs();
        assert!(drift < 1000, "anchor drifted by {}ms", drift);
    }

    #[tokio::test]
    async fn restores_paused_sessions_with_their_frozen_offset() {
        let fixture = testing::fixture_without_autoplay().await;
        let host_id = fixture.host_id;

        let entry = fixture.queue_track(host_id, "track0000000000000000a", 180_000).await;

        let session = fixture.active_session().await;
        fixture
            .collab
            .context
            .database
            .update_session_playback(SessionPlaybackUpdate {
                session_id: session.id,
                current_song_id: Some(entry.song.id),
                started_at: None,
                paused_offset_ms: 50_000,
            })
            .await
            .unwrap();

        fixture.collab.playback.restore().await.unwrap();

        let runtime = fixture.collab.playback.runtime_by_room(fixture.room_id).unwrap();

        assert_eq!(runtime.timeline.state(), PlaybackState::Paused);
        assert_eq!(runtime.timeline.position_ms(Utc::now()), 50_000);

        // No timer may be armed while paused
        assert!(!fixture.collab.context.scheduler.is_armed(&session.id));
    }

    #[tokio::test]
    async fn lands_in_ended_when_the_whole_queue_is_in_the_past() {
        let fixture = testing::fixture_without_autoplay().await;
        let host_id = fixture.host_id;

        let first = fixture.queue_track(host_id, "track0000000000000000a", 100_000).await;
        fixture.queue_track(host_id, "track0000000000000000b", 100_000).await;

        let session = fixture.active_session().await;
        fixture
            .collab
            .context
            .database
            .update_session_playback(SessionPlaybackUpdate {
                session_id: session.id,
                current_song_id: Some(first.song.id),
                started_at: Some(Utc::now() - Duration::milliseconds(500_000)),
                paused_offset_ms: 0,
            })
            .await
            .unwrap();

        fixture.collab.playback.restore().await.unwrap();

        let runtime = fixture.collab.playback.runtime_by_room(fixture.room_id).unwrap();
        assert_eq!(runtime.timeline.state(), PlaybackState::Ended);

        let pending = fixture
            .collab
            .context
            .database
            .queue_entries(session.id)
            .await
            .unwrap();
        assert!(pending.is_empty());
    }
}
