use std::{hash::Hash, time::Duration};

use dashmap::DashMap;
use tokio::{sync::mpsc, task::JoinHandle, time};

/// Emitted when an armed timer elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFire<K> {
    pub key: K,
    /// The revision the timer was armed against
    pub revision: u64,
}

pub type FireReceiver<K> = mpsc::UnboundedReceiver<TimerFire<K>>;

/// Schedules the automatic advancement of sessions.
///
/// At most one timer is live per key. Every armed timer carries the revision that was
/// current when it was armed, so the consumer can recognize and drop a fire that a manual
/// transition has already superseded. Re-arming always cancels the previous timer first.
pub struct AdvanceScheduler<K> {
    timers: DashMap<K, ArmedTimer>,
    sender: mpsc::UnboundedSender<TimerFire<K>>,
}

struct ArmedTimer {
    revision: u64,
    handle: JoinHandle<()>,
}

impl<K> AdvanceScheduler<K>
where
    K: Eq + Hash + Copy + Send + Sync + 'static,
{
    /// Creates a scheduler along with the receiving end of its fires.
    pub fn new() -> (Self, FireReceiver<K>) {
        let (sender, receiver) = mpsc::unbounded_channel();

        let scheduler = Self {
            timers: Default::default(),
            sender,
        };

        (scheduler, receiver)
    }

    /// Arms the timer for a key, superseding any timer armed for it before.
    ///
    /// The remaining duration is expected to be recomputed by the caller at arm time,
    /// never assumed constant across pauses and resumes.
    pub fn arm(&self, key: K, revision: u64, remaining: Duration) {
        let sender = self.sender.clone();

        let handle = tokio::spawn(async move {
            time::sleep(remaining).await;

            // The receiver only goes away when the engine shuts down
            let _ = sender.send(TimerFire { key, revision });
        });

        if let Some(previous) = self.timers.insert(key, ArmedTimer { revision, handle }) {
            previous.handle.abort();
        }
    }

    /// Cancels the timer for a key, if one is armed.
    pub fn cancel(&self, key: &K) {
        if let Some((_, timer)) = self.timers.remove(key) {
            timer.handle.abort();
        }
    }

    /// Returns the revision the live timer for a key was armed against, if any.
    pub fn armed_revision(&self, key: &K) -> Option<u64> {
        self.timers.get(key).map(|timer| timer.revision)
    }

    pub fn is_armed(&self, key: &K) -> bool {
        self.timers.contains_key(key)
    }
}
