//! Media item data models (shared types between client and server)
//!
//! Books, movies and TV shows share a common set of fields. Everything that
//! differs between them (creator label, status set, progress fields) lives in
//! [`MediaDetails`], so code that needs it has to match on the variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Error returned when a string does not name a known enum value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownValue {
    fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Kind of media being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaType {
    #[default]
    Book,
    Movie,
    TvShow,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Book => "book",
            MediaType::Movie => "movie",
            MediaType::TvShow => "tv-show",
        }
    }

    /// Status every new item of this type starts in
    pub fn initial_status(self) -> MediaStatus {
        match self {
            MediaType::Book => MediaStatus::ToRead,
            MediaType::Movie | MediaType::TvShow => MediaStatus::ToWatch,
        }
    }

    /// Name of the field holding the person responsible for the work
    pub fn creator_label(self) -> &'static str {
        match self {
            MediaType::Book => "author",
            MediaType::Movie => "director",
            MediaType::TvShow => "creator",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "book" => Ok(MediaType::Book),
            "movie" => Ok(MediaType::Movie),
            "tv-show" => Ok(MediaType::TvShow),
            other => Err(UnknownValue::new("media type", other)),
        }
    }
}

/// Every status value across all media types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaStatus {
    ToRead,
    Reading,
    ToWatch,
    Watching,
    Completed,
}

impl MediaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaStatus::ToRead => "to-read",
            MediaStatus::Reading => "reading",
            MediaStatus::ToWatch => "to-watch",
            MediaStatus::Watching => "watching",
            MediaStatus::Completed => "completed",
        }
    }

    pub fn is_in_progress(self) -> bool {
        matches!(self, MediaStatus::Reading | MediaStatus::Watching)
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to-read" => Ok(MediaStatus::ToRead),
            "reading" => Ok(MediaStatus::Reading),
            "to-watch" => Ok(MediaStatus::ToWatch),
            "watching" => Ok(MediaStatus::Watching),
            "completed" => Ok(MediaStatus::Completed),
            other => Err(UnknownValue::new("status", other)),
        }
    }
}

/// Reading status of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookStatus {
    #[default]
    ToRead,
    Reading,
    Completed,
}

impl From<BookStatus> for MediaStatus {
    fn from(status: BookStatus) -> Self {
        match status {
            BookStatus::ToRead => MediaStatus::ToRead,
            BookStatus::Reading => MediaStatus::Reading,
            BookStatus::Completed => MediaStatus::Completed,
        }
    }
}

impl TryFrom<MediaStatus> for BookStatus {
    type Error = UnknownValue;

    fn try_from(status: MediaStatus) -> Result<Self, Self::Error> {
        match status {
            MediaStatus::ToRead => Ok(BookStatus::ToRead),
            MediaStatus::Reading => Ok(BookStatus::Reading),
            MediaStatus::Completed => Ok(BookStatus::Completed),
            other => Err(UnknownValue::new("book status", other.as_str())),
        }
    }
}

/// Watching status of a movie or TV show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatchStatus {
    #[default]
    ToWatch,
    Watching,
    Completed,
}

impl From<WatchStatus> for MediaStatus {
    fn from(status: WatchStatus) -> Self {
        match status {
            WatchStatus::ToWatch => MediaStatus::ToWatch,
            WatchStatus::Watching => MediaStatus::Watching,
            WatchStatus::Completed => MediaStatus::Completed,
        }
    }
}

impl TryFrom<MediaStatus> for WatchStatus {
    type Error = UnknownValue;

    fn try_from(status: MediaStatus) -> Result<Self, Self::Error> {
        match status {
            MediaStatus::ToWatch => Ok(WatchStatus::ToWatch),
            MediaStatus::Watching => Ok(WatchStatus::Watching),
            MediaStatus::Completed => Ok(WatchStatus::Completed),
            other => Err(UnknownValue::new("watch status", other.as_str())),
        }
    }
}

/// Variant-specific part of a media item, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MediaDetails {
    Book {
        author: String,
        status: BookStatus,
        /// Percentage read, only meaningful while reading
        #[serde(default)]
        progress: Option<u8>,
        #[serde(default)]
        total_pages: Option<u32>,
    },
    Movie {
        director: String,
        status: WatchStatus,
        /// Runtime in minutes
        #[serde(default)]
        runtime: Option<u32>,
    },
    TvShow {
        creator: String,
        status: WatchStatus,
        #[serde(default)]
        current_season: Option<u32>,
        #[serde(default)]
        current_episode: Option<u32>,
        #[serde(default)]
        total_seasons: Option<u32>,
        #[serde(default)]
        total_episodes: Option<u32>,
    },
}

/// A tracked book, movie or TV show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub details: MediaDetails,
    #[serde(default)]
    pub cover_url: Option<String>,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub date_started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_completed: Option<DateTime<Utc>>,
    /// 1-5 stars
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub share_token: Option<String>,
}

impl MediaItem {
    pub fn media_type(&self) -> MediaType {
        match self.details {
            MediaDetails::Book { .. } => MediaType::Book,
            MediaDetails::Movie { .. } => MediaType::Movie,
            MediaDetails::TvShow { .. } => MediaType::TvShow,
        }
    }

    pub fn status(&self) -> MediaStatus {
        match self.details {
            MediaDetails::Book { status, .. } => status.into(),
            MediaDetails::Movie { status, .. } | MediaDetails::TvShow { status, .. } => {
                status.into()
            }
        }
    }

    /// Author, director or creator, depending on the variant
    pub fn creator_name(&self) -> &str {
        match &self.details {
            MediaDetails::Book { author, .. } => author,
            MediaDetails::Movie { director, .. } => director,
            MediaDetails::TvShow { creator, .. } => creator,
        }
    }

    /// Progress as shown in the list view, 0 when the item has none.
    ///
    /// Books report their stored percentage while being read. TV shows being
    /// watched derive it from the season/episode counters. Everything else
    /// is 0.
    pub fn computed_progress(&self) -> u32 {
        match &self.details {
            MediaDetails::Book {
                status: BookStatus::Reading,
                progress,
                ..
            } => progress.map(u32::from).unwrap_or(0),
            MediaDetails::TvShow {
                status: WatchStatus::Watching,
                current_season,
                current_episode,
                total_seasons,
                total_episodes,
                ..
            } => watch_progress(
                *current_season,
                *current_episode,
                *total_seasons,
                *total_episodes,
            )
            .unwrap_or(0),
            _ => 0,
        }
    }

    /// Move the item to `status`, stamping start/completion dates that are
    /// still empty.
    pub fn set_status(
        &mut self,
        status: MediaStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match &mut self.details {
            MediaDetails::Book { status: current, .. } => {
                *current = BookStatus::try_from(status).map_err(StoreError::from)?;
            }
            MediaDetails::Movie { status: current, .. }
            | MediaDetails::TvShow { status: current, .. } => {
                *current = WatchStatus::try_from(status).map_err(StoreError::from)?;
            }
        }

        if status.is_in_progress() && self.date_started.is_none() {
            self.date_started = Some(now);
        }
        if status == MediaStatus::Completed && self.date_completed.is_none() {
            self.date_completed = Some(now);
        }
        Ok(())
    }

    /// Make the item public, keeping an existing token if there is one
    pub fn share(&mut self, issue_token: impl FnOnce() -> String) -> &str {
        self.is_public = true;
        self.share_token.get_or_insert_with(issue_token)
    }

    pub fn unshare(&mut self) {
        self.is_public = false;
        self.share_token = None;
    }

    /// Apply a partial update. Fields that do not exist on this variant are
    /// ignored.
    pub fn apply(
        &mut self,
        update: MediaUpdate,
        now: DateTime<Utc>,
        issue_token: impl FnOnce() -> String,
    ) -> Result<(), StoreError> {
        if let Some(title) = update.title {
            self.title = required(&title, "title")?;
        }

        if let Some(creator) = update.creator {
            let label = self.media_type().creator_label();
            let creator = required(&creator, label)?;
            match &mut self.details {
                MediaDetails::Book { author, .. } => *author = creator,
                MediaDetails::Movie { director, .. } => *director = creator,
                MediaDetails::TvShow { creator: current, .. } => *current = creator,
            }
        }

        if let Some(status) = update.status {
            self.set_status(status, now)?;
        }

        match &mut self.details {
            MediaDetails::Book { progress, .. } => {
                if let Some(value) = update.progress {
                    *progress = Some(check_progress(value)?);
                }
            }
            MediaDetails::TvShow {
                current_season,
                current_episode,
                ..
            } => {
                if update.current_season.is_some() {
                    *current_season = update.current_season;
                }
                if update.current_episode.is_some() {
                    *current_episode = update.current_episode;
                }
            }
            MediaDetails::Movie { .. } => {}
        }

        if let Some(rating) = update.rating {
            self.rating = Some(check_rating(rating)?);
        }
        if let Some(notes) = update.notes {
            self.notes = optional(Some(notes));
        }
        if update.date_started.is_some() {
            self.date_started = update.date_started;
        }
        if update.date_completed.is_some() {
            self.date_completed = update.date_completed;
        }
        if let Some(bookmarked) = update.is_bookmarked {
            self.is_bookmarked = bookmarked;
        }
        match update.is_public {
            Some(true) => {
                self.share(issue_token);
            }
            Some(false) => self.unshare(),
            None => {}
        }

        Ok(())
    }
}

/// Watch progress of a TV show as a rounded percentage.
///
/// Returns `None` unless both the current episode and the total episode count
/// are known and non-zero. Missing season counters count as 1.
pub fn watch_progress(
    current_season: Option<u32>,
    current_episode: Option<u32>,
    total_seasons: Option<u32>,
    total_episodes: Option<u32>,
) -> Option<u32> {
    let episode = current_episode.filter(|&e| e != 0)?;
    let total = total_episodes.filter(|&t| t != 0)?;
    let season = current_season.filter(|&s| s != 0).unwrap_or(1);
    let seasons = total_seasons.filter(|&s| s != 0).unwrap_or(1);

    let per_season = f64::from(total) / f64::from(seasons);
    let watched = f64::from(season - 1) * per_season + f64::from(episode);
    Some((watched / f64::from(total) * 100.0).round() as u32)
}

/// Request to add an item to the collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMediaItem {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub title: String,
    /// Author, director or creator
    #[serde(alias = "author", alias = "director")]
    pub creator: String,
    /// Defaults to the type's initial status
    #[serde(default)]
    pub status: Option<MediaStatus>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub current_season: Option<u32>,
    #[serde(default)]
    pub current_episode: Option<u32>,
    #[serde(default)]
    pub total_seasons: Option<u32>,
    #[serde(default)]
    pub total_episodes: Option<u32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub release_year: Option<i32>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub date_started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_completed: Option<DateTime<Utc>>,
}

impl NewMediaItem {
    /// Validate required fields and build the stored item
    pub fn into_item(self, id: String, now: DateTime<Utc>) -> Result<MediaItem, StoreError> {
        let title = required(&self.title, "title")?;
        let creator = required(&self.creator, self.media_type.creator_label())?;
        let rating = self.rating.map(check_rating).transpose()?;
        let progress = self.progress.map(check_progress).transpose()?;

        let details = match self.media_type {
            MediaType::Book => MediaDetails::Book {
                author: creator,
                status: BookStatus::default(),
                progress,
                total_pages: self.total_pages,
            },
            MediaType::Movie => MediaDetails::Movie {
                director: creator,
                status: WatchStatus::default(),
                runtime: self.runtime,
            },
            MediaType::TvShow => MediaDetails::TvShow {
                creator,
                status: WatchStatus::default(),
                current_season: self.current_season,
                current_episode: self.current_episode,
                total_seasons: self.total_seasons,
                total_episodes: self.total_episodes,
            },
        };

        let mut item = MediaItem {
            id,
            title,
            details,
            cover_url: optional(self.cover_url),
            date_added: now,
            date_started: self.date_started,
            date_completed: self.date_completed,
            rating,
            notes: optional(self.notes),
            genre: optional(self.genre),
            release_year: self.release_year,
            is_bookmarked: false,
            is_public: false,
            share_token: None,
        };

        let status = self.status.unwrap_or(self.media_type.initial_status());
        item.set_status(status, now)?;

        Ok(item)
    }
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "author", alias = "director")]
    pub creator: Option<String>,
    #[serde(default)]
    pub status: Option<MediaStatus>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub current_season: Option<u32>,
    #[serde(default)]
    pub current_episode: Option<u32>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub date_started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_bookmarked: Option<bool>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

/// A registered account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A signed-in session, returned once at sign-in/sign-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

fn required(value: &str, field: &str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_rating(rating: u8) -> Result<u8, StoreError> {
    if (1..=5).contains(&rating) {
        Ok(rating)
    } else {
        Err(StoreError::validation(format!(
            "rating must be between 1 and 5, got {rating}"
        )))
    }
}

fn check_progress(progress: u8) -> Result<u8, StoreError> {
    if progress <= 100 {
        Ok(progress)
    } else {
        Err(StoreError::validation(format!(
            "progress must be between 0 and 100, got {progress}"
        )))
    }
}
