use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Error as SqlxError, FromRow, PgPool};

use crate::{
    AuthSessionData, Database, DatabaseError, DatabaseResult, IntoDatabaseError, NewAuthSession,
    NewQueueEntry, NewRoom, NewRoomMember, NewSong, NewUser, PrimaryKey, QueueEntryData, Result,
    RoomData, RoomMemberData, SessionData, SessionPlaybackUpdate, SongData, UserData,
};

/// A postgres database implementation for boombox
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: PrimaryKey,
    username: String,
    password: String,
    display_name: String,
}

#[derive(Debug, FromRow)]
struct AuthSessionRow {
    id: PrimaryKey,
    token: String,
    expires_at: DateTime<Utc>,
    user_id: PrimaryKey,
    username: String,
    password: String,
    display_name: String,
}

#[derive(Debug, FromRow)]
struct RoomRow {
    id: PrimaryKey,
    code: String,
    title: String,
    description: Option<String>,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct RoomMemberRow {
    id: PrimaryKey,
    host: bool,
    user_id: PrimaryKey,
    username: String,
    password: String,
    display_name: String,
}

#[derive(Debug, FromRow)]
struct SongRow {
    id: PrimaryKey,
    external_id: String,
    title: String,
    artist: String,
    album: Option<String>,
    duration_ms: i32,
    artwork_url: Option<String>,
    uri: String,
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: PrimaryKey,
    room_id: PrimaryKey,
    current_song_id: Option<PrimaryKey>,
    started_at: Option<DateTime<Utc>>,
    paused_offset_ms: i32,
    is_active: bool,
    ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct QueueEntryRow {
    id: PrimaryKey,
    session_id: PrimaryKey,
    position: i32,
    played: bool,
    played_at: Option<DateTime<Utc>>,
    song_id: PrimaryKey,
    external_id: String,
    title: String,
    artist: String,
    album: Option<String>,
    duration_ms: i32,
    artwork_url: Option<String>,
    uri: String,
    user_id: PrimaryKey,
    username: String,
    password: String,
    display_name: String,
}

/// The join used by every queue entry query
const QUEUE_ENTRY_SELECT: &str = "
    SELECT
        queue_entries.id,
        queue_entries.session_id,
        queue_entries.position,
        queue_entries.played,
        queue_entries.played_at,
        songs.id AS song_id,
        songs.external_id,
        songs.title,
        songs.artist,
        songs.album,
        songs.duration_ms,
        songs.artwork_url,
        songs.uri,
        users.id AS user_id,
        users.username,
        users.password,
        users.display_name
    FROM queue_entries
        INNER JOIN songs ON queue_entries.song_id = songs.id
        INNER JOIN users ON queue_entries.added_by_user_id = users.id
";

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    async fn room_members(&self, room_id: PrimaryKey) -> Result<Vec<RoomMemberData>> {
        let rows: Vec<RoomMemberRow> = sqlx::query_as(
            "
            SELECT
                room_members.id,
                room_members.host,
                users.id AS user_id,
                users.username,
                users.password,
                users.display_name
            FROM room_members
                INNER JOIN users ON room_members.user_id = users.id
            WHERE room_id = $1",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, password, display_name) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&new_user.username)
        .bind(&new_user.password)
        .bind(&new_user.display_name)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn auth_session_by_token(&self, token: &str) -> Result<AuthSessionData> {
        sqlx::query_as::<_, AuthSessionRow>(
            "
            SELECT
                auth_sessions.id,
                auth_sessions.token,
                auth_sessions.expires_at,
                users.id AS user_id,
                users.username,
                users.password,
                users.display_name
            FROM auth_sessions
                INNER JOIN users ON auth_sessions.user_id = users.id
            WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("auth session", "token"))
    }

    async fn create_auth_session(&self, new_session: NewAuthSession) -> Result<AuthSessionData> {
        self.auth_session_by_token(&new_session.token)
            .await
            .conflict_or_ok("auth session", "token", &new_session.token)?;

        sqlx::query(
            "INSERT INTO auth_sessions (token, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&new_session.token)
        .bind(new_session.user_id)
        .bind(new_session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.auth_session_by_token(&new_session.token).await
    }

    async fn delete_auth_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure the session exists
        let _ = self.auth_session_by_token(token).await?;

        sqlx::query("DELETE FROM auth_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_auth_sessions(&self) -> Result<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE timezone('UTC', now()) > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        let row: RoomRow = sqlx::query_as("SELECT * FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))?;

        let members = self.room_members(room_id).await?;

        Ok(row.into_data(members))
    }

    async fn room_by_code(&self, code: &str) -> Result<RoomData> {
        let row: RoomRow = sqlx::query_as("SELECT * FROM rooms WHERE code = $1")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "code"))?;

        let members = self.room_members(row.id).await?;

        Ok(row.into_data(members))
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        let rows: Vec<RoomRow> = sqlx::query_as("SELECT * FROM rooms")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        let mut rooms = Vec::with_capacity(rows.len());

        for row in rows {
            let members = self.room_members(row.id).await?;
            rooms.push(row.into_data(members));
        }

        Ok(rooms)
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        self.room_by_code(&new_room.code)
            .await
            .conflict_or_ok("room", "code", &new_room.code)?;

        let user = self.user_by_id(new_room.user_id).await?;

        let row: RoomRow = sqlx::query_as(
            "
            INSERT INTO rooms (code, title, description, is_active)
            VALUES ($1, $2, $3, true)
            RETURNING *",
        )
        .bind(&new_room.code)
        .bind(&new_room.title)
        .bind(&new_room.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        // The creator becomes the host member of the room
        self.create_room_member(NewRoomMember {
            user_id: user.id,
            room_id: row.id,
            host: true,
        })
        .await?;

        self.room_by_id(row.id).await
    }

    async fn create_room_member(&self, new_member: NewRoomMember) -> Result<RoomMemberData> {
        // Ensure the user isn't a member of this room already
        let existing = sqlx::query(
            "SELECT id FROM room_members WHERE user_id = $1 AND room_id = $2",
        )
        .bind(new_member.user_id)
        .bind(new_member.room_id)
        .fetch_one(&self.pool)
        .await;

        existing
            .map_err(|e| e.not_found_or("", ""))
            .conflict_or_ok(
                "room member",
                "user:room",
                format!("{}:{}", new_member.user_id, new_member.room_id).as_str(),
            )?;

        let user = self.user_by_id(new_member.user_id).await?;

        let row: (PrimaryKey,) = sqlx::query_as(
            "
            INSERT INTO room_members (user_id, room_id, host)
            VALUES ($1, $2, $3)
            RETURNING id",
        )
        .bind(new_member.user_id)
        .bind(new_member.room_id)
        .bind(new_member.host)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(RoomMemberData {
            id: row.0,
            host: new_member.host,
            user,
        })
    }

    async fn delete_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let row: (PrimaryKey,) = sqlx::query_as(
            "SELECT id FROM room_members WHERE room_id = $1 AND user_id = $2",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("room member", "room_id:user_id"))?;

        sqlx::query("DELETE FROM room_members WHERE id = $1")
            .bind(row.0)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn deactivate_room(&self, room_id: PrimaryKey) -> Result<()> {
        // Ensure the room exists
        let _ = self.room_by_id(room_id).await?;

        sqlx::query("UPDATE rooms SET is_active = false WHERE id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn song_by_external_id(&self, external_id: &str) -> Result<SongData> {
        sqlx::query_as::<_, SongRow>("SELECT * FROM songs WHERE external_id = $1")
            .bind(external_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("song", "external_id"))
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        // Songs are deduplicated by their provider id
        if let Ok(existing) = self.song_by_external_id(&new_song.external_id).await {
            return Ok(existing);
        }

        sqlx::query_as::<_, SongRow>(
            "
            INSERT INTO songs (external_id, title, artist, album, duration_ms, artwork_url, uri)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (external_id) DO UPDATE SET external_id = EXCLUDED.external_id
            RETURNING *",
        )
        .bind(&new_song.external_id)
        .bind(&new_song.title)
        .bind(&new_song.artist)
        .bind(&new_song.album)
        .bind(new_song.duration_ms)
        .bind(&new_song.artwork_url)
        .bind(&new_song.uri)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn session_by_id(&self, session_id: PrimaryKey) -> Result<SessionData> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("session", "id"))
    }

    async fn active_session_by_room(&self, room_id: PrimaryKey) -> Result<SessionData> {
        sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE room_id = $1 AND is_active = true",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("session", "room_id"))
    }

    async fn list_active_sessions(&self) -> Result<Vec<SessionData>> {
        let rows: Vec<SessionRow> =
            sqlx::query_as("SELECT * FROM sessions WHERE is_active = true")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_session(&self, room_id: PrimaryKey) -> Result<SessionData> {
        // Exactly one session may be active per room
        self.active_session_by_room(room_id)
            .await
            .conflict_or_ok("session", "room_id", &room_id.to_string())?;

        sqlx::query_as::<_, SessionRow>(
            "
            INSERT INTO sessions (room_id, is_active, paused_offset_ms)
            VALUES ($1, true, 0)
            RETURNING *",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn update_session_playback(&self, update: SessionPlaybackUpdate) -> Result<SessionData> {
        sqlx::query_as::<_, SessionRow>(
            "
            UPDATE sessions SET
                current_song_id = $2,
                started_at = $3,
                paused_offset_ms = $4
            WHERE id = $1
            RETURNING *",
        )
        .bind(update.session_id)
        .bind(update.current_song_id)
        .bind(update.started_at)
        .bind(update.paused_offset_ms)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("session", "id"))
    }

    async fn end_session(&self, session_id: PrimaryKey) -> Result<()> {
        // Ensure the session exists
        let _ = self.session_by_id(session_id).await?;

        sqlx::query(
            "
            UPDATE sessions SET
                is_active = false,
                ended_at = timezone('UTC', now()),
                current_song_id = NULL,
                started_at = NULL,
                paused_offset_ms = 0
            WHERE id = $1",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn queue_entry_by_id(&self, entry_id: PrimaryKey) -> Result<QueueEntryData> {
        let query = format!("{} WHERE queue_entries.id = $1", QUEUE_ENTRY_SELECT);

        sqlx::query_as::<_, QueueEntryRow>(&query)
            .bind(entry_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("queue entry", "id"))
    }

    async fn queue_entries(&self, session_id: PrimaryKey) -> Result<Vec<QueueEntryData>> {
        let query = format!(
            "{} WHERE session_id = $1 AND played = false ORDER BY position",
            QUEUE_ENTRY_SELECT
        );

        let rows: Vec<QueueEntryRow> = sqlx::query_as(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn next_pending_entry(
        &self,
        session_id: PrimaryKey,
    ) -> Result<Option<QueueEntryData>> {
        let query = format!(
            "{} WHERE session_id = $1 AND played = false ORDER BY position LIMIT 1",
            QUEUE_ENTRY_SELECT
        );

        sqlx::query_as::<_, QueueEntryRow>(&query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Into::into))
            .map_err(|e| e.any())
    }

    async fn recently_played(
        &self,
        session_id: PrimaryKey,
        limit: i64,
    ) -> Result<Vec<QueueEntryData>> {
        let query = format!(
            "{} WHERE session_id = $1 AND played = true ORDER BY played_at DESC LIMIT $2",
            QUEUE_ENTRY_SELECT
        );

        let rows: Vec<QueueEntryRow> = sqlx::query_as(&query)
            .bind(session_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_queue_entry(&self, new_entry: NewQueueEntry) -> Result<QueueEntryData> {
        // Ensure the session exists
        let _ = self.session_by_id(new_entry.session_id).await?;

        // Claim the next free position in the same statement so concurrent
        // adds cannot interleave into a duplicate
        let row: (PrimaryKey,) = sqlx::query_as(
            "
            INSERT INTO queue_entries (session_id, song_id, added_by_user_id, position)
            SELECT $1, $2, $3, COALESCE(MAX(position) + 1, 0)
            FROM queue_entries WHERE session_id = $1
            RETURNING id",
        )
        .bind(new_entry.session_id)
        .bind(new_entry.song_id)
        .bind(new_entry.added_by_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.queue_entry_by_id(row.0).await
    }

    async fn mark_entry_played(&self, entry_id: PrimaryKey, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE queue_entries SET played = true, played_at = $2 WHERE id = $1",
        )
        .bind(entry_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "queue entry",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn remove_queue_entry(&self, entry_id: PrimaryKey) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let session: (PrimaryKey,) =
            sqlx::query_as("SELECT session_id FROM queue_entries WHERE id = $1")
                .bind(entry_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| e.not_found_or("queue entry", "id"))?;

        sqlx::query("DELETE FROM queue_entries WHERE id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        // Renumber the session's entries so positions stay dense and unique.
        // The unique constraint is deferred, so the shuffle settles at commit.
        sqlx::query(
            "
            WITH renumbered AS (
                SELECT id, ROW_NUMBER() OVER (ORDER BY position) - 1 AS new_position
                FROM queue_entries WHERE session_id = $1
            )
            UPDATE queue_entries SET position = renumbered.new_position
            FROM renumbered WHERE queue_entries.id = renumbered.id",
        )
        .bind(session.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())
    }
}

impl From<UserRow> for UserData {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password: row.password,
            display_name: row.display_name,
        }
    }
}

impl From<AuthSessionRow> for AuthSessionData {
    fn from(row: AuthSessionRow) -> Self {
        Self {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: UserData {
                id: row.user_id,
                username: row.username,
                password: row.password,
                display_name: row.display_name,
            },
        }
    }
}

impl RoomRow {
    fn into_data(self, members: Vec<RoomMemberData>) -> RoomData {
        RoomData {
            id: self.id,
            code: self.code,
            title: self.title,
            description: self.description,
            is_active: self.is_active,
            members,
        }
    }
}

impl From<RoomMemberRow> for RoomMemberData {
    fn from(row: RoomMemberRow) -> Self {
        Self {
            id: row.id,
            host: row.host,
            user: UserData {
                id: row.user_id,
                username: row.username,
                password: row.password,
                display_name: row.display_name,
            },
        }
    }
}

impl From<SongRow> for SongData {
    fn from(row: SongRow) -> Self {
        Self {
            id: row.id,
            external_id: row.external_id,
            title: row.title,
            artist: row.artist,
            album: row.album,
            duration_ms: row.duration_ms,
            artwork_url: row.artwork_url,
            uri: row.uri,
        }
    }
}

impl From<SessionRow> for SessionData {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            room_id: row.room_id,
            current_song_id: row.current_song_id,
            started_at: row.started_at,
            paused_offset_ms: row.paused_offset_ms,
            is_active: row.is_active,
            ended_at: row.ended_at,
        }
    }
}

impl From<QueueEntryRow> for QueueEntryData {
    fn from(row: QueueEntryRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            position: row.position,
            played: row.played,
            played_at: row.played_at,
            song: SongData {
                id: row.song_id,
                external_id: row.external_id,
                title: row.title,
                artist: row.artist,
                album: row.album,
                duration_ms: row.duration_ms,
                artwork_url: row.artwork_url,
                uri: row.uri,
            },
            added_by: UserData {
                id: row.user_id,
                username: row.username,
                password: row.password,
                display_name: row.display_name,
            },
        }
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
