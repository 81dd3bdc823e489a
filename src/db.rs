//! Database module for mediashelf
//!
//! Translates [`MediaItem`]s to and from rows of the `media_items` table and
//! stores accounts and sessions.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::auth::generate_token;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    BookStatus, MediaDetails, MediaItem, MediaStatus, MediaType, MediaUpdate, NewMediaItem, User,
    WatchStatus,
};

const ITEM_COLUMNS: &str = "id, title, creator, type, status, cover_url, progress, \
     total_pages, runtime, current_season, current_episode, total_seasons, total_episodes, \
     genre, release_year, rating, notes, date_added, date_started, date_completed, \
     is_bookmarked, is_public, share_token";

/// Prefix of public share tokens
pub const SHARE_TOKEN_PREFIX: &str = "shr";

/// Thread-safe database wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::connection(format!("failed to create database directory: {e}"))
            })?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open a private database that lives as long as the handle
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::connection("database lock poisoned"))
    }

    /// Initialize the database schema
    fn init(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                token_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS media_items (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                creator TEXT NOT NULL,
                type TEXT NOT NULL,
                status TEXT NOT NULL,
                cover_url TEXT,
                progress INTEGER,
                total_pages INTEGER,
                runtime INTEGER,
                current_season INTEGER,
                current_episode INTEGER,
                total_seasons INTEGER,
                total_episodes INTEGER,
                genre TEXT,
                release_year INTEGER,
                rating INTEGER,
                notes TEXT,
                date_added TEXT NOT NULL,
                date_started TEXT,
                date_completed TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                is_bookmarked INTEGER NOT NULL DEFAULT 0,
                is_public INTEGER NOT NULL DEFAULT 0,
                share_token TEXT UNIQUE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_media_user ON media_items(user_id, date_added);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            "#,
        )?;

        Ok(())
    }

    /// All items of a user, newest first
    pub fn fetch_all(&self, user_id: &str) -> StoreResult<Vec<MediaItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM media_items WHERE user_id = ?1 \
             ORDER BY date_added DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![user_id], item_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Fetch a single item owned by `user_id`
    pub fn fetch_one(&self, id: &str, user_id: &str) -> StoreResult<MediaItem> {
        let conn = self.conn()?;
        Self::load_item(&conn, id, user_id)
    }

    fn load_item(conn: &Connection, id: &str, user_id: &str) -> StoreResult<MediaItem> {
        conn.query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM media_items WHERE id = ?1 AND user_id = ?2"),
            params![id, user_id],
            item_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found(format!("media item {id}")))
    }

    /// Validate and insert a new item
    pub fn create(&self, user_id: &str, new: NewMediaItem) -> StoreResult<MediaItem> {
        let now = Utc::now();
        let item = new.into_item(uuid::Uuid::new_v4().to_string(), now)?;
        warn_if_completed_before_added(&item);
        let (current_season, current_episode, total_seasons, total_episodes) =
            episode_counters(&item);

        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO media_items ({ITEM_COLUMNS}, user_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                         ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)"
            ),
            params![
                &item.id,
                &item.title,
                item.creator_name(),
                item.media_type(),
                item.status(),
                &item.cover_url,
                book_progress(&item),
                total_pages(&item),
                runtime(&item),
                current_season,
                current_episode,
                total_seasons,
                total_episodes,
                &item.genre,
                item.release_year,
                item.rating,
                &item.notes,
                timestamp(&item.date_added),
                item.date_started.as_ref().map(timestamp),
                item.date_completed.as_ref().map(timestamp),
                item.is_bookmarked,
                item.is_public,
                &item.share_token,
                user_id,
                timestamp(&now),
                timestamp(&now),
            ],
        )?;

        tracing::info!(
            user_id,
            item_id = %item.id,
            media_type = %item.media_type(),
            "Media item created"
        );

        Ok(item)
    }

    /// Apply a partial update to an item
    pub fn update(&self, id: &str, user_id: &str, update: MediaUpdate) -> StoreResult<()> {
        let conn = self.conn()?;
        let mut item = Self::load_item(&conn, id, user_id)?;

        let now = Utc::now();
        item.apply(update, now, || generate_token(SHARE_TOKEN_PREFIX))?;
        warn_if_completed_before_added(&item);

        Self::write_item(&conn, &item, user_id, &now)?;

        tracing::debug!(user_id, item_id = id, "Media item updated");
        Ok(())
    }

    /// Write every mutable column of `item` back to its row
    fn write_item(
        conn: &Connection,
        item: &MediaItem,
        user_id: &str,
        now: &DateTime<Utc>,
    ) -> StoreResult<()> {
        let (season, episode, _, _) = episode_counters(item);
        let changed = conn.execute(
            r#"UPDATE media_items SET title = ?3, creator = ?4, status = ?5, progress = ?6,
               current_season = ?7, current_episode = ?8, rating = ?9, notes = ?10,
               date_started = ?11, date_completed = ?12, is_bookmarked = ?13, is_public = ?14,
               share_token = ?15, updated_at = ?16
               WHERE id = ?1 AND user_id = ?2"#,
            params![
                &item.id,
                user_id,
                &item.title,
                item.creator_name(),
                item.status(),
                book_progress(item),
                season,
                episode,
                item.rating,
                &item.notes,
                item.date_started.as_ref().map(timestamp),
                item.date_completed.as_ref().map(timestamp),
                item.is_bookmarked,
                item.is_public,
                &item.share_token,
                timestamp(now),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::not_found(format!("media item {}", item.id)));
        }
        Ok(())
    }

    /// Delete an item outright
    pub fn delete(&self, id: &str, user_id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM media_items WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;

        if deleted == 0 {
            return Err(StoreError::not_found(format!("media item {id}")));
        }

        tracing::info!(user_id, item_id = id, "Media item deleted");
        Ok(())
    }

    /// Flip the bookmark flag, returning the new value
    pub fn toggle_bookmark(&self, id: &str, user_id: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        conn.query_row(
            r#"UPDATE media_items SET is_bookmarked = NOT is_bookmarked, updated_at = ?3
               WHERE id = ?1 AND user_id = ?2 RETURNING is_bookmarked"#,
            params![id, user_id, timestamp(&Utc::now())],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found(format!("media item {id}")))
    }

    /// Make an item public and return its share token.
    ///
    /// An item that is already public keeps its token.
    pub fn generate_share_link(&self, id: &str, user_id: &str) -> StoreResult<String> {
        let conn = self.conn()?;
        let mut item = Self::load_item(&conn, id, user_id)?;

        if item.is_public
            && let Some(token) = &item.share_token
        {
            return Ok(token.clone());
        }

        let token = item
            .share(|| generate_token(SHARE_TOKEN_PREFIX))
            .to_string();
        Self::write_item(&conn, &item, user_id, &Utc::now())?;

        tracing::info!(user_id, item_id = id, "Share link generated");
        Ok(token)
    }

    /// Stop sharing an item
    pub fn revoke_share_link(&self, id: &str, user_id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"UPDATE media_items SET is_public = 0, share_token = NULL, updated_at = ?3
               WHERE id = ?1 AND user_id = ?2"#,
            params![id, user_id, timestamp(&Utc::now())],
        )?;

        if changed == 0 {
            return Err(StoreError::not_found(format!("media item {id}")));
        }

        tracing::info!(user_id, item_id = id, "Share link revoked");
        Ok(())
    }

    /// Look up a public item by its share token. Bookmark state is not
    /// exposed to anonymous viewers.
    pub fn fetch_by_share_token(&self, token: &str) -> StoreResult<MediaItem> {
        let conn = self.conn()?;
        let mut item = conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM media_items \
                     WHERE share_token = ?1 AND is_public = 1"
                ),
                params![token],
                item_from_row,
            )
            .optional()?
            .ok_or_else(|| {
                StoreError::not_found("This item is no longer shared or does not exist")
            })?;

        item.is_bookmarked = false;
        Ok(item)
    }

    /// Register an account. Fails with an auth error if the email is taken.
    pub fn create_user(&self, email: &str, password_hash: &str) -> StoreResult<User> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };

        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![&user.id, &user.email, password_hash, timestamp(&user.created_at)],
        );

        match result {
            Ok(_) => Ok(user),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::auth("User already registered"))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Account and password hash for an email address
    pub fn user_credentials(&self, email: &str) -> StoreResult<Option<(User, String)>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, email, created_at, password_hash FROM users WHERE email = ?1",
            params![email],
            |row| Ok((user_from_row(row)?, row.get(3)?)),
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.user_credentials(email)?.map(|(user, _)| user))
    }

    /// All accounts with the number of items each one tracks
    pub fn list_users(&self) -> StoreResult<Vec<(User, usize)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT u.id, u.email, u.created_at, COUNT(m.id)
               FROM users u LEFT JOIN media_items m ON m.user_id = u.id
               GROUP BY u.id ORDER BY u.created_at, u.rowid"#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((user_from_row(row)?, row.get::<_, i64>(3)? as usize))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn create_session(
        &self,
        session_id: &str,
        user_id: &str,
        token_hash: &str,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (id, user_id, token_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, user_id, token_hash, timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    /// Session owner and stored secret hash
    pub fn session(&self, session_id: &str) -> StoreResult<Option<(User, String)>> {
        let conn = self.conn()?;
        conn.query_row(
            r#"SELECT u.id, u.email, u.created_at, s.token_hash
               FROM sessions s JOIN users u ON u.id = s.user_id WHERE s.id = ?1"#,
            params![session_id],
            |row| Ok((user_from_row(row)?, row.get(3)?)),
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
        Ok(())
    }
}

fn warn_if_completed_before_added(item: &MediaItem) {
    if let Some(completed) = item.date_completed
        && completed < item.date_added
    {
        tracing::warn!(
            item_id = %item.id,
            date_added = %item.date_added,
            date_completed = %completed,
            "Completion date precedes date added"
        );
    }
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_timestamp(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|value| parse_timestamp(idx, &value))
        .transpose()
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let created_at: String = row.get(2)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        created_at: parse_timestamp(2, &created_at)?,
    })
}

/// Build a domain item from a row selected with [`ITEM_COLUMNS`]
fn item_from_row(row: &Row) -> rusqlite::Result<MediaItem> {
    let creator: String = row.get(2)?;
    let media_type: MediaType = row.get(3)?;
    let status: MediaStatus = row.get(4)?;
    let status_error = |e: crate::models::UnknownValue| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
    };

    let details = match media_type {
        MediaType::Book => MediaDetails::Book {
            author: creator,
            status: BookStatus::try_from(status).map_err(status_error)?,
            progress: row.get(6)?,
            total_pages: row.get(7)?,
        },
        MediaType::Movie => MediaDetails::Movie {
            director: creator,
            status: WatchStatus::try_from(status).map_err(status_error)?,
            runtime: row.get(8)?,
        },
        MediaType::TvShow => MediaDetails::TvShow {
            creator,
            status: WatchStatus::try_from(status).map_err(status_error)?,
            current_season: row.get(9)?,
            current_episode: row.get(10)?,
            total_seasons: row.get(11)?,
            total_episodes: row.get(12)?,
        },
    };

    let date_added: String = row.get(17)?;

    Ok(MediaItem {
        id: row.get(0)?,
        title: row.get(1)?,
        details,
        cover_url: row.get(5)?,
        date_added: parse_timestamp(17, &date_added)?,
        date_started: optional_timestamp(row, 18)?,
        date_completed: optional_timestamp(row, 19)?,
        rating: row.get(15)?,
        notes: row.get(16)?,
        genre: row.get(13)?,
        release_year: row.get(14)?,
        is_bookmarked: row.get(20)?,
        is_public: row.get(21)?,
        share_token: row.get(22)?,
    })
}

fn book_progress(item: &MediaItem) -> Option<u8> {
    match item.details {
        MediaDetails::Book { progress, .. } => progress,
        _ => None,
    }
}

fn total_pages(item: &MediaItem) -> Option<u32> {
    match item.details {
        MediaDetails::Book { total_pages, .. } => total_pages,
        _ => None,
    }
}

fn runtime(item: &MediaItem) -> Option<u32> {
    match item.details {
        MediaDetails::Movie { runtime, .. } => runtime,
        _ => None,
    }
}

/// (current season, current episode, total seasons, total episodes)
fn episode_counters(item: &MediaItem) -> (Option<u32>, Option<u32>, Option<u32>, Option<u32>) {
    match item.details {
        MediaDetails::TvShow {
            current_season,
            current_episode,
            total_seasons,
            total_episodes,
            ..
        } => (current_season, current_episode, total_seasons, total_episodes),
        _ => (None, None, None, None),
    }
}

impl ToSql for MediaType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MediaType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for MediaStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MediaStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, User) {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("reader@example.com", "hash").unwrap();
        (db, user)
    }

    fn new_item(media_type: MediaType, title: &str, creator: &str) -> NewMediaItem {
        NewMediaItem {
            media_type,
            title: title.to_string(),
            creator: creator.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_then_fetch_all() {
        let (db, user) = setup();
        let created = db
            .create(
                &user.id,
                NewMediaItem {
                    total_episodes: Some(10),
                    total_seasons: Some(2),
                    genre: Some("Drama".to_string()),
                    ..new_item(MediaType::TvShow, "Dark", "Baran bo Odar")
                },
            )
            .unwrap();

        let items = db.fetch_all(&user.id).unwrap();
        assert_eq!(items, vec![created.clone()]);
        assert_eq!(items[0].status(), MediaStatus::ToWatch);
        assert_eq!(items[0].creator_name(), "Baran bo Odar");
    }

    #[test]
    fn test_fetch_all_newest_first() {
        let (db, user) = setup();
        let first = db.create(&user.id, new_item(MediaType::Book, "One", "A")).unwrap();
        let second = db.create(&user.id, new_item(MediaType::Movie, "Two", "B")).unwrap();

        let ids: Vec<String> = db.fetch_all(&user.id).unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let (db, user) = setup();
        let err = db.create(&user.id, new_item(MediaType::Book, " ", "A")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(db.fetch_all(&user.id).unwrap().is_empty());
    }

    #[test]
    fn test_items_are_scoped_to_owner() {
        let (db, user) = setup();
        let other = db.create_user("other@example.com", "hash").unwrap();
        let item = db.create(&user.id, new_item(MediaType::Book, "Dune", "Herbert")).unwrap();

        assert!(db.fetch_all(&other.id).unwrap().is_empty());
        assert!(matches!(
            db.update(&item.id, &other.id, MediaUpdate::default()),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(db.delete(&item.id, &other.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_update_status_and_progress() {
        let (db, user) = setup();
        let item = db.create(&user.id, new_item(MediaType::Book, "Dune", "Herbert")).unwrap();

        let update = MediaUpdate {
            status: Some(MediaStatus::Reading),
            progress: Some(40),
            rating: Some(4),
            ..Default::default()
        };
        db.update(&item.id, &user.id, update).unwrap();

        let stored = db.fetch_one(&item.id, &user.id).unwrap();
        assert_eq!(stored.status(), MediaStatus::Reading);
        assert_eq!(stored.computed_progress(), 40);
        assert_eq!(stored.rating, Some(4));
        assert!(stored.date_started.is_some());
        assert!(stored.date_completed.is_none());
        assert_eq!(stored.date_added, item.date_added);
    }

    #[test]
    fn test_update_rejects_status_of_other_type_and_leaves_row() {
        let (db, user) = setup();
        let item = db.create(&user.id, new_item(MediaType::Movie, "Heat", "Mann")).unwrap();

        let update = MediaUpdate {
            title: Some("Heat 2".to_string()),
            status: Some(MediaStatus::Reading),
            ..Default::default()
        };
        let err = db.update(&item.id, &user.id, update).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(db.fetch_one(&item.id, &user.id).unwrap(), item);
    }

    #[test]
    fn test_update_missing_item() {
        let (db, user) = setup();
        let err = db.update("missing", &user.id, MediaUpdate::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_unsharing_through_update_clears_token() {
        let (db, user) = setup();
        let item = db.create(&user.id, new_item(MediaType::Book, "Dune", "Herbert")).unwrap();
        let token = db.generate_share_link(&item.id, &user.id).unwrap();
        assert!(token.starts_with("shr_"));

        let update = MediaUpdate {
            is_public: Some(false),
            ..Default::default()
        };
        db.update(&item.id, &user.id, update).unwrap();

        let stored = db.fetch_one(&item.id, &user.id).unwrap();
        assert!(!stored.is_public);
        assert!(stored.share_token.is_none());
        assert!(matches!(db.fetch_by_share_token(&token), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_sharing_through_update_issues_token() {
        let (db, user) = setup();
        let item = db.create(&user.id, new_item(MediaType::Movie, "Heat", "Mann")).unwrap();
        let update = MediaUpdate {
            is_public: Some(true),
            ..Default::default()
        };
        db.update(&item.id, &user.id, update).unwrap();

        let stored = db.fetch_one(&item.id, &user.id).unwrap();
        assert!(stored.is_public);
        let token = stored.share_token.unwrap();
        assert_eq!(db.fetch_by_share_token(&token).unwrap().id, item.id);
    }

    #[test]
    fn test_share_link_is_stable_until_revoked() {
        let (db, user) = setup();
        let item = db.create(&user.id, new_item(MediaType::Book, "Dune", "Herbert")).unwrap();

        let first = db.generate_share_link(&item.id, &user.id).unwrap();
        let second = db.generate_share_link(&item.id, &user.id).unwrap();
        assert_eq!(first, second);

        db.revoke_share_link(&item.id, &user.id).unwrap();
        let third = db.generate_share_link(&item.id, &user.id).unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn test_shared_item_hides_bookmark() {
        let (db, user) = setup();
        let item = db.create(&user.id, new_item(MediaType::Book, "Dune", "Herbert")).unwrap();
        assert!(db.toggle_bookmark(&item.id, &user.id).unwrap());
        let token = db.generate_share_link(&item.id, &user.id).unwrap();

        let shared = db.fetch_by_share_token(&token).unwrap();
        assert_eq!(shared.title, "Dune");
        assert!(!shared.is_bookmarked);
        assert!(shared.is_public);
    }

    #[test]
    fn test_unknown_share_token() {
        let (db, _) = setup();
        assert!(matches!(db.fetch_by_share_token("shr_nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_toggle_bookmark() {
        let (db, user) = setup();
        let item = db.create(&user.id, new_item(MediaType::Movie, "Heat", "Mann")).unwrap();

        assert!(db.toggle_bookmark(&item.id, &user.id).unwrap());
        assert!(!db.toggle_bookmark(&item.id, &user.id).unwrap());
        assert!(matches!(
            db.toggle_bookmark("missing", &user.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete() {
        let (db, user) = setup();
        let item = db.create(&user.id, new_item(MediaType::Movie, "Heat", "Mann")).unwrap();

        db.delete(&item.id, &user.id).unwrap();
        assert!(db.fetch_all(&user.id).unwrap().is_empty());
        assert!(matches!(db.delete(&item.id, &user.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_email() {
        let (db, _) = setup();
        let err = db.create_user("reader@example.com", "other").unwrap_err();
        assert!(matches!(err, StoreError::Auth(ref msg) if msg == "User already registered"));
    }

    #[test]
    fn test_list_users_counts_items() {
        let (db, user) = setup();
        db.create_user("other@example.com", "hash").unwrap();
        db.create(&user.id, new_item(MediaType::Book, "Dune", "Herbert")).unwrap();

        let users = db.list_users().unwrap();
        let counts: Vec<(String, usize)> = users.into_iter().map(|(u, n)| (u.email, n)).collect();
        assert_eq!(
            counts,
            vec![
                ("reader@example.com".to_string(), 1),
                ("other@example.com".to_string(), 0)
            ]
        );
    }

    #[test]
    fn test_sessions() {
        let (db, user) = setup();
        db.create_session("s1", &user.id, "secret-hash").unwrap();

        let (owner, hash) = db.session("s1").unwrap().unwrap();
        assert_eq!(owner, user);
        assert_eq!(hash, "secret-hash");

        db.delete_session("s1").unwrap();
        assert!(db.session("s1").unwrap().is_none());
    }
}
