use std::fmt::{self, Display};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// The timeline keeps track of where a session's current song is in wall-clock time.
///
/// Position is never stored as a ticking counter. While playing, only the instant at which
/// the song's position counter was zero is kept, and the position is derived from it on demand.
/// While paused, the frozen offset is kept instead.
#[derive(Debug, Default)]
pub struct Timeline {
    inner: Mutex<TimelineInner>,
}

#[derive(Debug, Default)]
struct TimelineInner {
    /// Length of the current song
    duration_ms: u64,
    /// The anchor instant. None means playback is paused or nothing is loaded.
    started_at: Option<DateTime<Utc>>,
    /// The position frozen at pause time. Authoritative only while the anchor is unset.
    paused_offset_ms: u64,
    /// Whether a current song is loaded
    loaded: bool,
    /// Whether the queue was exhausted
    ended: bool,
}

/// The named state of a timeline.
///
/// This is the only place the "anchor unset means paused" encoding is interpreted.
/// Everything else matches on this enum instead of inspecting the fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No current song
    Empty,
    Playing,
    Paused,
    /// The queue was exhausted. Stays this way until new songs arrive.
    Ended,
}

/// A point-in-time view of a timeline
#[derive(Debug, Clone, Copy)]
pub struct TimelineView {
    pub state: PlaybackState,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts playing a song of the given length, anchored at the given instant.
    ///
    /// The anchor is the instant the song's position counter was zero, which may be in
    /// the past when resuming or when restoring a session that kept playing while the
    /// process was down.
    pub fn start(&self, duration_ms: u64, anchor: DateTime<Utc>) {
        let mut inner = self.inner.lock();

        inner.duration_ms = duration_ms;
        inner.started_at = Some(anchor);
        inner.paused_offset_ms = 0;
        inner.loaded = true;
        inner.ended = false;
    }

    /// Loads a song of the given length in the paused state, frozen at the given offset.
    /// Used when restoring a session that was paused.
    pub fn start_paused(&self, duration_ms: u64, offset_ms: u64) {
        let mut inner = self.inner.lock();

        inner.duration_ms = duration_ms;
        inner.started_at = None;
        inner.paused_offset_ms = offset_ms.min(duration_ms);
        inner.loaded = true;
        inner.ended = false;
    }

    /// Freezes the derived position and clears the anchor. Returns the frozen position.
    pub fn pause(&self, now: DateTime<Utc>) -> u64 {
        let mut inner = self.inner.lock();

        let position = inner.position_ms(now);
        inner.paused_offset_ms = position;
        inner.started_at = None;

        position
    }

    /// Reconstructs the anchor from the frozen offset, so the derived position picks up
    /// exactly where it was paused. Returns the reconstructed anchor.
    pub fn resume(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut inner = self.inner.lock();

        let anchor = match inner.started_at {
            Some(anchor) => anchor,
            None => now - Duration::milliseconds(inner.paused_offset_ms as i64),
        };

        inner.started_at = Some(anchor);
        inner.paused_offset_ms = 0;

        anchor
    }

    /// Clears the current song and marks the timeline as ended.
    pub fn finish(&self) {
        let mut inner = self.inner.lock();

        *inner = TimelineInner {
            ended: true,
            ..Default::default()
        };
    }

    /// Returns an ended timeline to the empty state, once new songs are available.
    pub fn reopen(&self) {
        self.inner.lock().ended = false;
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state()
    }

    pub fn position_ms(&self, now: DateTime<Utc>) -> u64 {
        self.inner.lock().position_ms(now)
    }

    /// How much of the current song is left at the given instant
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        let inner = self.inner.lock();
        inner.duration_ms.saturating_sub(inner.position_ms(now))
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimelineView {
        let inner = self.inner.lock();

        TimelineView {
            state: inner.state(),
            position_ms: inner.position_ms(now),
            duration_ms: inner.duration_ms,
            started_at: inner.started_at,
        }
    }
}

impl TimelineInner {
    fn state(&self) -> PlaybackState {
        if !self.loaded {
            if self.ended {
                PlaybackState::Ended
            } else {
                PlaybackState::Empty
            }
        } else if self.started_at.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }

    fn position_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.started_at {
            Some(anchor) => {
                let elapsed = (now - anchor).num_milliseconds();
                elapsed.clamp(0, self.duration_ms as i64) as u64
            }
            None => self.paused_offset_ms,
        }
    }
}

impl Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Ended => "ended",
        };

        write!(f, "{}", name)
    }
}
