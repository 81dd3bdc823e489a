//! Filtering, searching and sorting of a user's collection
//!
//! Everything here is a pure function of the item slice and a [`QuerySpec`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::models::{MediaItem, MediaStatus, MediaType};

/// Which items of the selected type pass the status tab
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Bookmarked,
    Status(MediaStatus),
    /// A filter value that names no known status. Matches nothing.
    Unrecognized(String),
}

impl StatusFilter {
    /// Parse a filter tab name. Never fails; unknown names match nothing.
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "all" => StatusFilter::All,
            "bookmarked" => StatusFilter::Bookmarked,
            other => match other.parse::<MediaStatus>() {
                Ok(status) => StatusFilter::Status(status),
                Err(_) => StatusFilter::Unrecognized(other.to_string()),
            },
        }
    }

    pub fn matches(&self, item: &MediaItem) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Bookmarked => item.is_bookmarked,
            StatusFilter::Status(status) => item.status() == *status,
            StatusFilter::Unrecognized(_) => false,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Bookmarked => f.write_str("bookmarked"),
            StatusFilter::Status(status) => f.write_str(status.as_str()),
            StatusFilter::Unrecognized(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    DateAdded,
    Title,
    Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Type tab, status tab, search box and sort settings of the list view
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuerySpec {
    pub media_type: MediaType,
    pub status_filter: StatusFilter,
    pub search_text: String,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
}

/// Select and order the items to display.
///
/// Items are restricted to `spec.media_type`, then to the status filter,
/// then to the search text (title or creator, case-insensitive). The sort is
/// stable, so items with equal keys keep their input order.
pub fn run<'a>(items: &'a [MediaItem], spec: &QuerySpec) -> Vec<&'a MediaItem> {
    let needle = spec.search_text.to_lowercase();

    let mut selected: Vec<&MediaItem> = items
        .iter()
        .filter(|item| item.media_type() == spec.media_type)
        .filter(|item| spec.status_filter.matches(item))
        .filter(|item| needle.is_empty() || matches_search(item, &needle))
        .collect();

    selected.sort_by(|a, b| {
        let ordering = compare(a, b, spec.sort_key);
        match spec.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    selected
}

fn matches_search(item: &MediaItem, needle: &str) -> bool {
    item.title.to_lowercase().contains(needle)
        || item.creator_name().to_lowercase().contains(needle)
}

fn compare(a: &MediaItem, b: &MediaItem, key: SortKey) -> Ordering {
    match key {
        SortKey::Title => compare_titles(&a.title, &b.title),
        SortKey::DateAdded => a.date_added.cmp(&b.date_added),
        SortKey::Progress => a.computed_progress().cmp(&b.computed_progress()),
    }
}

/// Title order that ignores accents and case at the first level, then
/// accents, then case with lowercase first.
fn compare_titles(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| b.cmp(a))
}

/// Canonical decomposition with combining marks dropped, lowercased
fn collation_key(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookStatus, MediaDetails, WatchStatus};
    use chrono::{Duration, TimeZone, Utc};

    fn base(id: &str, title: &str, details: MediaDetails, day: i64) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            title: title.to_string(),
            details,
            cover_url: None,
            date_added: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day),
            date_started: None,
            date_completed: None,
            rating: None,
            notes: None,
            genre: None,
            release_year: None,
            is_bookmarked: false,
            is_public: false,
            share_token: None,
        }
    }

    fn book(
        id: &str,
        title: &str,
        author: &str,
        status: BookStatus,
        progress: Option<u8>,
        day: i64,
    ) -> MediaItem {
        base(
            id,
            title,
            MediaDetails::Book {
                author: author.to_string(),
                status,
                progress,
                total_pages: None,
            },
            day,
        )
    }

    fn movie(id: &str, title: &str, status: WatchStatus, day: i64) -> MediaItem {
        base(
            id,
            title,
            MediaDetails::Movie {
                director: "Director".to_string(),
                status,
                runtime: Some(100),
            },
            day,
        )
    }

    fn show(
        id: &str,
        title: &str,
        season: u32,
        episode: u32,
        seasons: u32,
        episodes: u32,
        day: i64,
    ) -> MediaItem {
        base(
            id,
            title,
            MediaDetails::TvShow {
                creator: "Creator".to_string(),
                status: WatchStatus::Watching,
                current_season: Some(season),
                current_episode: Some(episode),
                total_seasons: Some(seasons),
                total_episodes: Some(episodes),
            },
            day,
        )
    }

    fn library() -> Vec<MediaItem> {
        let mut hobbit = book("b1", "The Hobbit", "J.R.R. Tolkien", BookStatus::Completed, None, 0);
        hobbit.is_bookmarked = true;
        vec![
            hobbit,
            book("b2", "Dune", "Frank Herbert", BookStatus::Reading, Some(10), 1),
            book("b3", "Neuromancer", "William Gibson", BookStatus::Reading, Some(40), 2),
            book("b4", "Anathem", "Neal Stephenson", BookStatus::ToRead, None, 3),
            movie("m1", "Heat", WatchStatus::Completed, 4),
            movie("m2", "Alien", WatchStatus::ToWatch, 5),
            show("t1", "Dark", 2, 3, 2, 20, 6),
            show("t2", "Severance", 1, 2, 1, 9, 7),
        ]
    }

    fn for_type(media_type: MediaType) -> QuerySpec {
        QuerySpec {
            media_type,
            ..Default::default()
        }
    }

    fn ids(items: &[&MediaItem]) -> Vec<String> {
        items.iter().map(|item| item.id.clone()).collect()
    }

    #[test]
    fn test_restricts_to_media_type() {
        let items = library();
        for media_type in [MediaType::Book, MediaType::Movie, MediaType::TvShow] {
            let result = run(&items, &for_type(media_type));
            assert!(result.iter().all(|item| item.media_type() == media_type));
        }
    }

    #[test]
    fn test_all_returns_type_subset_sorted_by_date_desc() {
        let items = library();
        let result = run(&items, &for_type(MediaType::Book));
        assert_eq!(ids(&result), vec!["b4", "b3", "b2", "b1"]);
    }

    #[test]
    fn test_bookmarked_filter() {
        let items = library();
        let spec = QuerySpec {
            status_filter: StatusFilter::Bookmarked,
            ..for_type(MediaType::Book)
        };
        assert_eq!(ids(&run(&items, &spec)), vec!["b1"]);
    }

    #[test]
    fn test_status_filter_exact_match() {
        let items = library();
        let spec = QuerySpec {
            status_filter: StatusFilter::parse("reading"),
            sort_order: SortOrder::Asc,
            ..for_type(MediaType::Book)
        };
        assert_eq!(ids(&run(&items, &spec)), vec!["b2", "b3"]);
    }

    #[test]
    fn test_status_of_other_type_matches_nothing() {
        let items = library();
        let spec = QuerySpec {
            status_filter: StatusFilter::parse("watching"),
            ..for_type(MediaType::Book)
        };
        assert!(run(&items, &spec).is_empty());
    }

    #[test]
    fn test_unrecognized_filter_matches_nothing() {
        let items = library();
        let filter = StatusFilter::parse("abandoned");
        assert_eq!(filter, StatusFilter::Unrecognized("abandoned".to_string()));

        let spec = QuerySpec {
            status_filter: filter,
            ..for_type(MediaType::Movie)
        };
        assert!(run(&items, &spec).is_empty());
    }

    #[test]
    fn test_search_matches_creator_case_insensitively() {
        let items = library();
        let spec = QuerySpec {
            search_text: "tolk".to_string(),
            ..for_type(MediaType::Book)
        };
        assert_eq!(ids(&run(&items, &spec)), vec!["b1"]);
    }

    #[test]
    fn test_search_matches_title() {
        let items = library();
        let spec = QuerySpec {
            search_text: "DUNE".to_string(),
            ..for_type(MediaType::Book)
        };
        assert_eq!(ids(&run(&items, &spec)), vec!["b2"]);
    }

    #[test]
    fn test_search_applies_after_status_filter() {
        let items = library();
        let spec = QuerySpec {
            status_filter: StatusFilter::Status(MediaStatus::Reading),
            search_text: "tolk".to_string(),
            ..for_type(MediaType::Book)
        };
        assert!(run(&items, &spec).is_empty());
    }

    #[test]
    fn test_progress_desc_puts_further_book_first() {
        let items = library();
        let spec = QuerySpec {
            status_filter: StatusFilter::Status(MediaStatus::Reading),
            sort_key: SortKey::Progress,
            sort_order: SortOrder::Desc,
            ..for_type(MediaType::Book)
        };
        assert_eq!(ids(&run(&items, &spec)), vec!["b3", "b2"]);
    }

    #[test]
    fn test_progress_sort_for_tv_shows() {
        let items = library();
        let spec = QuerySpec {
            sort_key: SortKey::Progress,
            sort_order: SortOrder::Asc,
            ..for_type(MediaType::TvShow)
        };
        // Severance 2/9 = 22%, Dark = 65%
        assert_eq!(ids(&run(&items, &spec)), vec!["t2", "t1"]);
    }

    #[test]
    fn test_title_sort_reverses() {
        let items = library();
        let asc = QuerySpec {
            sort_key: SortKey::Title,
            sort_order: SortOrder::Asc,
            ..for_type(MediaType::Book)
        };
        let desc = QuerySpec {
            sort_order: SortOrder::Desc,
            ..asc.clone()
        };

        let mut forward = ids(&run(&items, &asc));
        assert_eq!(forward, vec!["b4", "b2", "b3", "b1"]);
        forward.reverse();
        assert_eq!(forward, ids(&run(&items, &desc)));
    }

    #[test]
    fn test_title_sort_ignores_case() {
        let items = vec![
            movie("m1", "zodiac", WatchStatus::ToWatch, 0),
            movie("m2", "Alien", WatchStatus::ToWatch, 1),
            movie("m3", "alien", WatchStatus::ToWatch, 2),
        ];
        let spec = QuerySpec {
            sort_key: SortKey::Title,
            sort_order: SortOrder::Asc,
            ..for_type(MediaType::Movie)
        };
        assert_eq!(ids(&run(&items, &spec)), vec!["m3", "m2", "m1"]);
    }

    #[test]
    fn test_title_sort_folds_accents() {
        let items = vec![
            movie("m1", "Zodiac", WatchStatus::ToWatch, 0),
            movie("m2", "Amélie", WatchStatus::ToWatch, 1),
            movie("m3", "Éclair", WatchStatus::ToWatch, 2),
            movie("m4", "Fargo", WatchStatus::ToWatch, 3),
        ];
        let spec = QuerySpec {
            sort_key: SortKey::Title,
            sort_order: SortOrder::Asc,
            ..for_type(MediaType::Movie)
        };
        let titles: Vec<&str> = run(&items, &spec)
            .iter()
            .map(|item| item.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Amélie", "Éclair", "Fargo", "Zodiac"]);
    }

    #[test]
    fn test_accented_title_follows_plain_spelling() {
        assert_eq!(compare_titles("resume", "résumé"), Ordering::Less);
        assert_eq!(compare_titles("Éclair", "eclair"), Ordering::Greater);
        assert_eq!(compare_titles("éclair", "Éclair"), Ordering::Less);
    }

    #[test]
    fn test_ties_keep_input_order() {
        // Movies all have progress 0
        let items = vec![
            movie("m1", "C", WatchStatus::ToWatch, 2),
            movie("m2", "A", WatchStatus::Watching, 0),
            movie("m3", "B", WatchStatus::Completed, 1),
        ];
        for order in [SortOrder::Asc, SortOrder::Desc] {
            let spec = QuerySpec {
                sort_key: SortKey::Progress,
                sort_order: order,
                ..for_type(MediaType::Movie)
            };
            assert_eq!(ids(&run(&items, &spec)), vec!["m1", "m2", "m3"]);
        }
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let items = library();
        let spec = QuerySpec {
            sort_key: SortKey::Title,
            search_text: "e".to_string(),
            ..for_type(MediaType::Book)
        };
        assert_eq!(run(&items, &spec), run(&items, &spec));
    }

    #[test]
    fn test_empty_collection() {
        assert!(run(&[], &QuerySpec::default()).is_empty());
    }
}
