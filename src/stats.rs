//! Aggregate statistics over a user's collection

use chrono::{DateTime, Datelike, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::models::{BookStatus, MediaDetails, MediaItem, WatchStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub books_read: usize,
    pub movies_watched: usize,
    pub tv_shows_completed: usize,
    pub currently_reading: usize,
    /// Movies and TV shows being watched
    pub currently_watching: usize,
    /// Completed movies only
    pub total_runtime_hours: u64,
    /// Mean over rated items, one decimal place
    pub average_rating: f64,
    pub completed_this_year: usize,
    pub completed_this_month: usize,
    pub total_items: usize,
    pub bookmarked_items: usize,
}

impl Statistics {
    /// Compute statistics relative to the local clock
    pub fn compute(items: &[MediaItem]) -> Self {
        Self::compute_at(items, &Local::now())
    }

    /// Compute statistics with `now` deciding the current year and month.
    /// Completion dates are compared in `now`'s time zone.
    pub fn compute_at<Tz: TimeZone>(items: &[MediaItem], now: &DateTime<Tz>) -> Self {
        let mut stats = Statistics {
            total_items: items.len(),
            ..Default::default()
        };
        let mut runtime_minutes: u64 = 0;
        let mut rating_sum: u64 = 0;
        let mut rated: u64 = 0;

        for item in items {
            match &item.details {
                MediaDetails::Book { status, .. } => match status {
                    BookStatus::Completed => stats.books_read += 1,
                    BookStatus::Reading => stats.currently_reading += 1,
                    BookStatus::ToRead => {}
                },
                MediaDetails::Movie {
                    status, runtime, ..
                } => match status {
                    WatchStatus::Completed => {
                        stats.movies_watched += 1;
                        runtime_minutes += runtime.map(u64::from).unwrap_or(0);
                    }
                    WatchStatus::Watching => stats.currently_watching += 1,
                    WatchStatus::ToWatch => {}
                },
                MediaDetails::TvShow { status, .. } => match status {
                    WatchStatus::Completed => stats.tv_shows_completed += 1,
                    WatchStatus::Watching => stats.currently_watching += 1,
                    WatchStatus::ToWatch => {}
                },
            }

            if let Some(rating) = item.rating {
                rating_sum += u64::from(rating);
                rated += 1;
            }

            if item.is_bookmarked {
                stats.bookmarked_items += 1;
            }

            if let Some(completed) = &item.date_completed {
                let completed = completed.with_timezone(&now.timezone());
                if completed.year() == now.year() {
                    stats.completed_this_year += 1;
                    if completed.month() == now.month() {
                        stats.completed_this_month += 1;
                    }
                }
            }
        }

        stats.total_runtime_hours = (runtime_minutes as f64 / 60.0).round() as u64;
        if rated > 0 {
            let mean = rating_sum as f64 / rated as f64;
            stats.average_rating = (mean * 10.0).round() / 10.0;
        }

        stats
    }
}
