/// The configuration of the playback engine
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether adding a song to an idle session starts playback immediately
    pub auto_play_on_add: bool,
    /// What happens to a session when the last pending song finishes
    pub when_exhausted: ExhaustedPolicy,
    /// How many undelivered events a connection may accumulate before it is presumed dead
    pub connection_buffer: usize,
    /// How many played songs are included in queue snapshots
    pub recently_played_limit: i64,
}

/// Policy for a session whose queue has run out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedPolicy {
    /// Keep the session active and wait for new songs to be added
    WaitForSongs,
    /// Deactivate the session
    EndSession,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_play_on_add: true,
            when_exhausted: ExhaustedPolicy::WaitForSongs,
            // A client that can't drain this many events is not coming back
            connection_buffer: 64,
            recently_played_limit: 25,
        }
    }
}
