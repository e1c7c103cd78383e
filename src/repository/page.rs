//! Keyset pagination shared by every backend

use crate::cursor::{self, Cursor};
use crate::model::{Record, SortField};

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 500;

/// One page worth of a listing.
///
/// `limit == 0` selects [`DEFAULT_PAGE_LIMIT`]; larger limits are capped at
/// [`MAX_PAGE_LIMIT`]. An absent or unreadable cursor starts at the newest row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub cursor: Option<String>,
    pub sort_by: SortField,
}

impl PageRequest {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn sorted_by(mut self, sort_by: SortField) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn effective_limit(&self) -> usize {
        match self.limit {
            0 => DEFAULT_PAGE_LIMIT,
            n => n.min(MAX_PAGE_LIMIT),
        }
    }

    /// Rows an adapter should read: one extra to learn whether more exist.
    pub fn fetch_limit(&self) -> usize {
        self.effective_limit() + 1
    }

    pub fn decoded_cursor(&self) -> Option<Cursor> {
        self.cursor.as_deref().and_then(cursor::decode)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Record> Page<T> {
    /// Build a page from rows already ordered newest first, of which at most
    /// `request.fetch_limit()` were read.
    pub fn from_overfetch(mut rows: Vec<T>, request: &PageRequest) -> Self {
        let limit = request.effective_limit();
        if rows.len() <= limit {
            return Self {
                items: rows,
                next_cursor: None,
            };
        }
        rows.truncate(limit);
        let next_cursor = rows
            .last()
            .map(|last| cursor::encode(last.sort_value(request.sort_by), last.id()));
        Self {
            items: rows,
            next_cursor,
        }
    }
}

/// Descending `(sort value, id)` order used by every listing.
pub fn newest_first<T: Record>(a: &T, b: &T, sort_by: SortField) -> std::cmp::Ordering {
    b.sort_value(sort_by)
        .cmp(&a.sort_value(sort_by))
        .then_with(|| b.id().cmp(a.id()))
}

/// Page through an unordered candidate set held in memory.
pub fn paginate<T: Record>(rows: impl IntoIterator<Item = T>, request: &PageRequest) -> Page<T> {
    let cursor = request.decoded_cursor();
    let mut rows: Vec<T> = rows
        .into_iter()
        .filter(|row| {
            cursor
                .as_ref()
                .map_or(true, |c| c.admits(row.sort_value(request.sort_by), row.id()))
        })
        .collect();
    rows.sort_by(|a, b| newest_first(a, b, request.sort_by));
    rows.truncate(request.fetch_limit());
    Page::from_overfetch(rows, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Project;
    use chrono::{TimeZone, Utc};

    fn project(id: &str, secs: i64) -> Project {
        Project {
            id: id.to_string(),
            canonical_git_url: format!("example.com/{}", id),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_limits() {
        assert_eq!(PageRequest::default().effective_limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(PageRequest::new(7).effective_limit(), 7);
        assert_eq!(PageRequest::new(10_000).effective_limit(), MAX_PAGE_LIMIT);
        assert_eq!(PageRequest::new(3).fetch_limit(), 4);
    }

    #[test]
    fn test_paginate_walks_every_row_once() {
        let rows = vec![
            project("a", 10),
            project("b", 10),
            project("c", 20),
            project("d", 5),
            project("e", 10),
        ];

        let mut seen = Vec::new();
        let mut request = PageRequest::new(2);
        loop {
            let page = paginate(rows.clone(), &request);
            assert!(page.len() <= 2);
            seen.extend(page.items.iter().map(|p| p.id.clone()));
            match page.next_cursor {
                Some(next) => request = PageRequest::new(2).after(next),
                None => break,
            }
        }
        assert_eq!(seen, vec!["c", "e", "b", "a", "d"]);
    }

    #[test]
    fn test_exact_fit_has_no_cursor() {
        let rows = vec![project("a", 1), project("b", 2)];
        let page = paginate(rows, &PageRequest::new(2));
        assert_eq!(page.len(), 2);
        assert!(page.is_last());
    }

    #[test]
    fn test_garbage_cursor_restarts() {
        let rows = vec![project("a", 1), project("b", 2)];
        let page = paginate(rows, &PageRequest::new(5).after("%%%"));
        assert_eq!(page.items[0].id, "b");
    }
}
