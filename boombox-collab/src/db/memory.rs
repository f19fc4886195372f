//! An in-memory database used by tests, mirroring the semantics of the
//! postgres implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    AuthSessionData, Database, DatabaseError, NewAuthSession, NewQueueEntry, NewRoom,
    NewRoomMember, NewSong, NewUser, PrimaryKey, QueueEntryData, Result, RoomData, RoomMemberData,
    SessionData, SessionPlaybackUpdate, SongData, UserData,
};

#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_id: PrimaryKey,
    users: Vec<UserData>,
    auth_sessions: Vec<AuthSessionRow>,
    rooms: Vec<RoomRow>,
    members: Vec<MemberRow>,
    songs: Vec<SongData>,
    sessions: Vec<SessionData>,
    entries: Vec<EntryRow>,
}

struct AuthSessionRow {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
struct RoomRow {
    id: PrimaryKey,
    code: String,
    title: String,
    description: Option<String>,
    is_active: bool,
}

#[derive(Clone)]
struct MemberRow {
    id: PrimaryKey,
    room_id: PrimaryKey,
    user_id: PrimaryKey,
    host: bool,
}

#[derive(Clone)]
struct EntryRow {
    id: PrimaryKey,
    session_id: PrimaryKey,
    song_id: PrimaryKey,
    added_by_user_id: PrimaryKey,
    position: i32,
    played: bool,
    played_at: Option<DateTime<Utc>>,
}

fn not_found(resource: &'static str, identifier: &'static str) -> DatabaseError {
    DatabaseError::NotFound {
        resource,
        identifier,
    }
}

fn conflict(resource: &'static str, field: &'static str, value: String) -> DatabaseError {
    DatabaseError::Conflict {
        resource,
        field,
        value,
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn next_id(&mut self) -> PrimaryKey {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| not_found("user", "id"))
    }

    fn room_members(&self, room_id: PrimaryKey) -> Vec<RoomMemberData> {
        self.members
            .iter()
            .filter(|m| m.room_id == room_id)
            .filter_map(|m| {
                Some(RoomMemberData {
                    id: m.id,
                    host: m.host,
                    user: self.user(m.user_id).ok()?,
                })
            })
            .collect()
    }

    fn room_data(&self, row: &RoomRow) -> RoomData {
        RoomData {
            id: row.id,
            code: row.code.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            is_active: row.is_active,
            members: self.room_members(row.id),
        }
    }

    fn entry_data(&self, row: &EntryRow) -> Result<QueueEntryData> {
        let song = self
            .songs
            .iter()
            .find(|s| s.id == row.song_id)
            .cloned()
            .ok_or_else(|| not_found("song", "id"))?;

        Ok(QueueEntryData {
            id: row.id,
            session_id: row.session_id,
            song,
            position: row.position,
            played: row.played,
            played_at: row.played_at,
            added_by: self.user(row.added_by_user_id)?,
        })
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.state.lock().user(user_id)
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| not_found("user", "username"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut state = self.state.lock();

        if state.users.iter().any(|u| u.username == new_user.username) {
            return Err(conflict("user", "username", new_user.username));
        }

        let user = UserData {
            id: state.next_id(),
            username: new_user.username,
            password: new_user.password,
            display_name: new_user.display_name,
        };

        state.users.push(user.clone());
        Ok(user)
    }

    async fn auth_session_by_token(&self, token: &str) -> Result<AuthSessionData> {
        let state = self.state.lock();

        let row = state
            .auth_sessions
            .iter()
            .find(|s| s.token == token)
            .ok_or_else(|| not_found("auth session", "token"))?;

        Ok(AuthSessionData {
            id: row.id,
            token: row.token.clone(),
            expires_at: row.expires_at,
            user: state.user(row.user_id)?,
        })
    }

    async fn create_auth_session(&self, new_session: NewAuthSession) -> Result<AuthSessionData> {
        let mut state = self.state.lock();

        if state
            .auth_sessions
            .iter()
            .any(|s| s.token == new_session.token)
        {
            return Err(conflict("auth session", "token", new_session.token));
        }

        let user = state.user(new_session.user_id)?;
        let id = state.next_id();

        state.auth_sessions.push(AuthSessionRow {
            id,
            token: new_session.token.clone(),
            user_id: new_session.user_id,
            expires_at: new_session.expires_at,
        });

        Ok(AuthSessionData {
            id,
            token: new_session.token,
            expires_at: new_session.expires_at,
            user,
        })
    }

    async fn delete_auth_session_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock();

        if !state.auth_sessions.iter().any(|s| s.token == token) {
            return Err(not_found("auth session", "token"));
        }

        state.auth_sessions.retain(|s| s.token != token);
        Ok(())
    }

    async fn clear_expired_auth_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.state.lock().auth_sessions.retain(|s| s.expires_at > now);
        Ok(())
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        let state = self.state.lock();

        state
            .rooms
            .iter()
            .find(|r| r.id == room_id)
            .map(|r| state.room_data(r))
            .ok_or_else(|| not_found("room", "id"))
    }

    async fn room_by_code(&self, code: &str) -> Result<RoomData> {
        let state = self.state.lock();

        state
            .rooms
            .iter()
            .find(|r| r.code == code)
            .map(|r| state.room_data(r))
            .ok_or_else(|| not_found("room", "code"))
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        let state = self.state.lock();
        Ok(state.rooms.iter().map(|r| state.room_data(r)).collect())
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let mut state = self.state.lock();

        if state.rooms.iter().any(|r| r.code == new_room.code) {
            return Err(conflict("room", "code", new_room.code));
        }

        state.user(new_room.user_id)?;

        let room = RoomRow {
            id: state.next_id(),
            code: new_room.code,
            title: new_room.title,
            description: new_room.description,
            is_active: true,
        };

        let member = MemberRow {
            id: state.next_id(),
            room_id: room.id,
            user_id: new_room.user_id,
            host: true,
        };

        state.rooms.push(room.clone());
        state.members.push(member);

        Ok(state.room_data(&room))
    }

    async fn create_room_member(&self, new_member: NewRoomMember) -> Result<RoomMemberData> {
        let mut state = self.state.lock();

        if state
            .members
            .iter()
            .any(|m| m.room_id == new_member.room_id && m.user_id == new_member.user_id)
        {
            return Err(conflict(
                "room member",
                "user:room",
                format!("{}:{}", new_member.user_id, new_member.room_id),
            ));
        }

        let user = state.user(new_member.user_id)?;

        let member = MemberRow {
            id: state.next_id(),
            room_id: new_member.room_id,
            user_id: new_member.user_id,
            host: new_member.host,
        };

        state.members.push(member.clone());

        Ok(RoomMemberData {
            id: member.id,
            host: member.host,
            user,
        })
    }

    async fn delete_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();

        if !state
            .members
            .iter()
            .any(|m| m.room_id == room_id && m.user_id == user_id)
        {
            return Err(not_found("room member", "room_id:user_id"));
        }

        state
            .members
            .retain(|m| !(m.room_id == room_id && m.user_id == user_id));

        Ok(())
    }

    async fn deactivate_room(&self, room_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();

        let room = state
            .rooms
            .iter_mut()
            .find(|r| r.id == room_id)
            .ok_or_else(|| not_found("room", "id"))?;

        room.is_active = false;
        Ok(())
    }

    async fn song_by_external_id(&self, external_id: &str) -> Result<SongData> {
        self.state
            .lock()
            .songs
            .iter()
            .find(|s| s.external_id == external_id)
            .cloned()
            .ok_or_else(|| not_found("song", "external_id"))
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        let mut state = self.state.lock();

        if let Some(existing) = state
            .songs
            .iter()
            .find(|s| s.external_id == new_song.external_id)
        {
            return Ok(existing.clone());
        }

        let song = SongData {
            id: state.next_id(),
            external_id: new_song.external_id,
            title: new_song.title,
            artist: new_song.artist,
            album: new_song.album,
            duration_ms: new_song.duration_ms,
            artwork_url: new_song.artwork_url,
            uri: new_song.uri,
        };

        state.songs.push(song.clone());
        Ok(song)
    }

    async fn session_by_id(&self, session_id: PrimaryKey) -> Result<SessionData> {
        self.state
            .lock()
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| not_found("session", "id"))
    }

    async fn active_session_by_room(&self, room_id: PrimaryKey) -> Result<SessionData> {
        self.state
            .lock()
            .sessions
            .iter()
            .find(|s| s.room_id == room_id && s.is_active)
            .cloned()
            .ok_or_else(|| not_found("session", "room_id"))
    }

    async fn list_active_sessions(&self) -> Result<Vec<SessionData>> {
        Ok(self
            .state
            .lock()
            .sessions
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn create_session(&self, room_id: PrimaryKey) -> Result<SessionData> {
        let mut state = self.state.lock();

        if state
            .sessions
            .iter()
            .any(|s| s.room_id == room_id && s.is_active)
        {
            return Err(conflict("session", "room_id", room_id.to_string()));
        }

        let session = SessionData {
            id: state.next_id(),
            room_id,
            current_song_id: None,
            started_at: None,
            paused_offset_ms: 0,
            is_active: true,
            ended_at: None,
        };

        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn update_session_playback(&self, update: SessionPlaybackUpdate) -> Result<SessionData> {
        let mut state = self.state.lock();

        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == update.session_id)
            .ok_or_else(|| not_found("session", "id"))?;

        session.current_song_id = update.current_song_id;
        session.started_at = update.started_at;
        session.paused_offset_ms = update.paused_offset_ms;

        Ok(session.clone())
    }

    async fn end_session(&self, session_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();

        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| not_found("session", "id"))?;

        session.is_active = false;
        session.ended_at = Some(Utc::now());
        session.current_song_id = None;
        session.started_at = None;
        session.paused_offset_ms = 0;

        Ok(())
    }

    async fn queue_entry_by_id(&self, entry_id: PrimaryKey) -> Result<QueueEntryData> {
        let state = self.state.lock();

        let row = state
            .entries
            .iter()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| not_found("queue entry", "id"))?;

        state.entry_data(row)
    }

    async fn queue_entries(&self, session_id: PrimaryKey) -> Result<Vec<QueueEntryData>> {
        let state = self.state.lock();

        let mut rows: Vec<_> = state
            .entries
            .iter()
            .filter(|e| e.session_id == session_id && !e.played)
            .cloned()
            .collect();

        rows.sort_by_key(|e| e.position);
        rows.iter().map(|e| state.entry_data(e)).collect()
    }

    async fn next_pending_entry(
        &self,
        session_id: PrimaryKey,
    ) -> Result<Option<QueueEntryData>> {
        Ok(self.queue_entries(session_id).await?.into_iter().next())
    }

    async fn recently_played(
        &self,
        session_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<QueueEntryData>> {
        let state = self.state.lock();

        let mut rows: Vec<_> = state
            .entries
            .iter()
            .filter(|e| e.session_id == session_id && e.played)
            .cloned()
            .collect();

        rows.sort_by_key(|e| std::cmp::Reverse(e.played_at));

        rows.iter()
            .take(limit as usize)
            .map(|e| state.entry_data(e))
            .collect()
    }

    async fn add_queue_entry(&self, new_entry: NewQueueEntry) -> Result<QueueEntryData> {
        let mut state = self.state.lock();

        if !state.sessions.iter().any(|s| s.id == new_entry.session_id) {
            return Err(not_found("session", "id"));
        }

        let position = state
            .entries
            .iter()
            .filter(|e| e.session_id == new_entry.session_id)
            .map(|e| e.position + 1)
            .max()
            .unwrap_or(0);

        let row = EntryRow {
            id: state.next_id(),
            session_id: new_entry.session_id,
            song_id: new_entry.song_id,
            added_by_user_id: new_entry.added_by_user_id,
            position,
            played: false,
            played_at: None,
        };

        state.entries.push(row.clone());
        state.entry_data(&row)
    }

    async fn mark_entry_played(&self, entry_id: PrimaryKey, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock();

        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| not_found("queue entry", "id"))?;

        entry.played = true;
        entry.played_at = Some(at);

        Ok(())
    }

    async fn remove_queue_entry(&self, entry_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();

        let session_id = state
            .entries
            .iter()
            .find(|e| e.id == entry_id)
            .map(|e| e.session_id)
            .ok_or_else(|| not_found("queue entry", "id"))?;

        state.entries.retain(|e| e.id != entry_id);

        // Renumber so positions stay dense and unique
        let mut remaining: Vec<_> = state
            .entries
            .iter_mut()
            .filter(|e| e.session_id == session_id)
            .collect();

        remaining.sort_by_key(|e| e.position);

        for (index, entry) in remaining.into_iter().enumerate() {
            entry.position = index as i32;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn seeded() -> (MemoryDatabase, PrimaryKey, PrimaryKey) {
        let db = MemoryDatabase::new();

        let user = db
            .create_user(NewUser {
                username: "host".to_string(),
                password: "hash".to_string(),
                display_name: "Host".to_string(),
            })
            .await
            .unwrap();

        let room = db
            .create_room(NewRoom {
                code: "ABCD".to_string(),
                title: "Test room".to_string(),
                description: None,
                user_id: user.id,
            })
            .await
            .unwrap();

        let session = db.create_session(room.id).await.unwrap();

        (db, session.id, user.id)
    }

    async fn add_song(
        db: &MemoryDatabase,
        session_id: PrimaryKey,
        user_id: PrimaryKey,
        external_id: &str,
    ) -> QueueEntryData {
        let song = db
            .create_song(NewSong {
                external_id: external_id.to_string(),
                title: external_id.to_string(),
                artist: "Artist".to_string(),
                album: None,
                duration_ms: 180_000,
                artwork_url: None,
                uri: format!("spotify:track:{}", external_id),
            })
            .await
            .unwrap();

        db.add_queue_entry(NewQueueEntry {
            session_id,
            song_id: song.id,
            added_by_user_id: user_id,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn rejects_a_second_active_session_per_room() {
        let (db, session_id, _) = seeded().await;
        let session = db.session_by_id(session_id).await.unwrap();

        let result = db.create_session(session.room_id).await;
        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));

        // Ending the session frees the room up again
        db.end_session(session_id).await.unwrap();
        db.create_session(session.room_id).await.unwrap();
    }

    #[tokio::test]
    async fn keeps_positions_dense_across_adds_and_removals() {
        let (db, session_id, user_id) = seeded().await;

        let mut entries = vec![];
        for external_id in ["a", "b", "c", "d", "e"] {
            entries.push(add_song(&db, session_id, user_id, external_id).await);
        }

        db.remove_queue_entry(entries[1].id).await.unwrap();
        db.remove_queue_entry(entries[3].id).await.unwrap();
        add_song(&db, session_id, user_id, "f").await;

        let pending = db.queue_entries(session_id).await.unwrap();
        let positions: Vec<_> = pending.iter().map(|e| e.position).collect();

        assert_eq!(positions, vec![0, 1, 2, 3]);
        let titles: Vec<_> = pending.iter().map(|e| e.song.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c", "e", "f"]);
    }

    #[tokio::test]
    async fn excludes_played_entries_from_the_pending_view() {
        let (db, session_id, user_id) = seeded().await;

        let first = add_song(&db, session_id, user_id, "a").await;
        add_song(&db, session_id, user_id, "b").await;

        db.mark_entry_played(first.id, Utc::now()).await.unwrap();

        let pending = db.queue_entries(session_id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].song.title, "b");

        let played = db.recently_played(session_id, 10).await.unwrap();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].song.title, "a");
    }

    #[tokio::test]
    async fn deduplicates_songs_by_external_id() {
        let (db, ..) = seeded().await;

        let first = db
            .create_song(NewSong {
                external_id: "x".to_string(),
                title: "X".to_string(),
                artist: "Artist".to_string(),
                album: None,
                duration_ms: 1000,
                artwork_url: None,
                uri: "spotify:track:x".to_string(),
            })
            .await
            .unwrap();

        let second = db
            .create_song(NewSong {
                external_id: "x".to_string(),
                title: "X again".to_string(),
                artist: "Artist".to_string(),
                album: None,
                duration_ms: 1000,
                artwork_url: None,
                uri: "spotify:track:x".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.title, "X");
    }
}
