use boombox_core::Timeline;
use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;
use tokio::sync::{Mutex as TransitionMutex, MutexGuard};

use crate::{PrimaryKey, SongData};

pub type SessionId = PrimaryKey;

/// The in-memory counterpart of an active session row.
///
/// Transitions serialize on `transition`, giving every session single-writer discipline.
/// The revision is bumped on every transition and invalidates timers armed before it,
/// which keeps a manual skip and a concurrently firing timer from advancing twice.
/// Snapshot reads only touch the timeline and current entry, and take no transition lock.
pub struct SessionRuntime {
    pub id: SessionId,
    pub room_id: PrimaryKey,
    pub timeline: Timeline,
    current: Mutex<Option<CurrentEntry>>,
    revision: AtomicCell<u64>,
    transition: TransitionMutex<()>,
}

/// The queue entry a session is currently playing
#[derive(Debug, Clone)]
pub struct CurrentEntry {
    pub entry_id: PrimaryKey,
    pub song: SongData,
}

impl SessionRuntime {
    pub fn new(id: SessionId, room_id: PrimaryKey) -> Self {
        Self {
            id,
            room_id,
            timeline: Timeline::new(),
            current: Default::default(),
            revision: AtomicCell::new(0),
            transition: TransitionMutex::new(()),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision.load()
    }

    /// Invalidates all previously scheduled work for this session.
    /// Returns the new revision.
    pub fn bump_revision(&self) -> u64 {
        self.revision.fetch_add(1) + 1
    }

    pub fn current(&self) -> Option<CurrentEntry> {
        self.current.lock().clone()
    }

    pub fn set_current(&self, entry: Option<CurrentEntry>) {
        *self.current.lock() = entry;
    }

    /// Takes the transition lock. Held for the duration of a state transition.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().await
    }
}
