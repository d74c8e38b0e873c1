//! # List Queries
//!
//! Raw query string parameters become a [`BugQuery`]: a filter, a sort and
//! a page window. Building never fails; anything unusable falls back to a
//! default.
//!
//! ## Filter
//! - status, priority: exact match, unknown values are ignored
//! - assignee: case-insensitive substring, unassigned bugs never match
//! - search: case-insensitive substring of title or description
//!
//! ## Sort
//! - createdAt (default), updatedAt, title, priority by severity
//! - asc or desc (default), ties broken by id
//!
//! ## Page
//! - page >= 1, default 1
//! - 1 <= limit <= 100, default 10
//!
//! A repeated parameter (`?status=open&status=resolved`) keeps its first
//! value.
use std::cmp::Ordering;

use serde::Serialize;

use crate::models::{Bug, Priority, Status};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListParams {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl ListParams {
    /// Unknown keys are dropped.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();

        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "status" => &mut params.status,
                "priority" => &mut params.priority,
                "assignee" => &mut params.assignee,
                "search" => &mut params.search,
                "page" => &mut params.page,
                "limit" => &mut params.limit,
                "sortBy" => &mut params.sort_by,
                "order" => &mut params.order,
                _ => continue,
            };
            slot.get_or_insert_with(|| value.into());
        }

        params
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    /// Lowercased.
    pub assignee: Option<String>,
    /// Lowercased.
    pub search: Option<String>,
}

impl Filter {
    pub fn matches(&self, bug: &Bug) -> bool {
        self.status.is_none_or(|status| bug.status == status)
            && self.priority.is_none_or(|priority| bug.priority == priority)
            && self.assignee.as_deref().is_none_or(|needle| {
                bug.assignee
                    .as_deref()
                    .is_some_and(|assignee| contains_ignore_case(assignee, needle))
            })
            && self.search.as_deref().is_none_or(|needle| {
                contains_ignore_case(&bug.title, needle)
                    || contains_ignore_case(&bug.description, needle)
            })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Priority,
}

impl SortKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "createdAt" => Some(SortKey::CreatedAt),
            "updatedAt" => Some(SortKey::UpdatedAt),
            "title" => Some(SortKey::Title),
            "priority" => Some(SortKey::Priority),
            _ => None,
        }
    }

    fn compare(self, a: &Bug, b: &Bug) -> Ordering {
        match self {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortKey::Title => a.title.cmp(&b.title),
            SortKey::Priority => a.priority.cmp(&b.priority),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("asc") {
            Direction::Asc
        } else {
            Direction::Desc
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BugQuery {
    pub filter: Filter,
    pub sort: SortKey,
    pub direction: Direction,
    pub page: u64,
    pub limit: u64,
    pub skip: u64,
}

impl Default for BugQuery {
    fn default() -> Self {
        Self::build(&ListParams::default())
    }
}

impl BugQuery {
    pub fn build(params: &ListParams) -> Self {
        let filter = Filter {
            status: non_blank(&params.status).and_then(Status::parse),
            priority: non_blank(&params.priority).and_then(Priority::parse),
            assignee: non_blank(&params.assignee).map(str::to_lowercase),
            search: non_blank(&params.search).map(str::to_lowercase),
        };

        let page = positive(&params.page).unwrap_or(DEFAULT_PAGE);
        let limit = positive(&params.limit)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);

        Self {
            filter,
            sort: non_blank(&params.sort_by)
                .and_then(SortKey::parse)
                .unwrap_or_default(),
            direction: non_blank(&params.order)
                .map(Direction::parse)
                .unwrap_or_default(),
            page,
            limit,
            skip: (page - 1).saturating_mul(limit),
        }
    }

    /// Filters, sorts and windows `bugs`. Also returns how many matched the
    /// filter before windowing.
    pub fn select(&self, bugs: impl IntoIterator<Item = Bug>) -> (Vec<Bug>, u64) {
        let mut matched: Vec<Bug> = bugs
            .into_iter()
            .filter(|bug| self.filter.matches(bug))
            .collect();

        matched.sort_by(|a, b| {
            let ordering = self.sort.compare(a, b).then_with(|| a.id.cmp(&b.id));
            match self.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(usize::try_from(self.skip).unwrap_or(usize::MAX))
            .take(self.limit as usize)
            .collect();

        (page, total)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_bugs: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(query: &BugQuery, total: u64, returned: usize) -> Self {
        Self {
            current_page: query.page,
            total_pages: total.div_ceil(query.limit),
            total_bugs: total,
            has_next: query.skip + (returned as u64) < total,
            has_prev: query.page > 1,
        }
    }
}

fn non_blank(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn positive(raw: &Option<String>) -> Option<u64> {
    non_blank(raw)
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&n| n > 0)
}

fn contains_ignore_case(haystack: &str, lowercase_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowercase_needle)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::BugFields;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        ListParams::from_pairs(pairs.iter().copied())
    }

    fn bug(minutes: i64, title: &str, status: Status, priority: Priority, assignee: Option<&str>) -> Bug {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Bug::create(
            BugFields {
                title: title.to_string(),
                description: format!("{title} happens every time"),
                status,
                priority,
                assignee: assignee.map(str::to_string),
                reporter: "QA".to_string(),
            },
            start + Duration::minutes(minutes),
        )
    }

    fn sample() -> Vec<Bug> {
        vec![
            bug(0, "Crash on save", Status::Open, Priority::High, Some("Alice Smith")),
            bug(1, "Broken link", Status::Resolved, Priority::Low, None),
            bug(2, "Slow search", Status::InProgress, Priority::Critical, Some("bob")),
            bug(3, "Typo in footer", Status::Open, Priority::Medium, Some("ALICE")),
        ]
    }

    fn titles(bugs: &[Bug]) -> Vec<&str> {
        bugs.iter().map(|b| b.title.as_str()).collect()
    }

    #[test]
    fn test_defaults() {
        let query = BugQuery::build(&ListParams::default());

        assert_eq!(query.filter, Filter::default());
        assert_eq!(query.sort, SortKey::CreatedAt);
        assert_eq!(query.direction, Direction::Desc);
        assert_eq!((query.page, query.limit, query.skip), (1, 10, 0));
    }

    #[test]
    fn test_repeated_params_keep_first() {
        let params = params(&[
            ("status", "open"),
            ("sortBy", "title"),
            ("status", "resolved"),
            ("utm_source", "mail"),
        ]);

        assert_eq!(params.status.as_deref(), Some("open"));
        assert_eq!(params.sort_by.as_deref(), Some("title"));
        assert_eq!(
            params,
            ListParams {
                status: Some("open".to_string()),
                sort_by: Some("title".to_string()),
                ..ListParams::default()
            }
        );
    }

    #[test]
    fn test_page_and_limit_coercion() {
        let query = BugQuery::build(&params(&[("page", "-3"), ("limit", "abc")]));
        assert_eq!((query.page, query.limit), (1, 10));

        let query = BugQuery::build(&params(&[("page", "0"), ("limit", "0")]));
        assert_eq!((query.page, query.limit), (1, 10));

        let query = BugQuery::build(&params(&[("page", "3"), ("limit", "1000")]));
        assert_eq!((query.page, query.limit, query.skip), (3, 100, 200));
    }

    #[test]
    fn test_sort_whitelist() {
        let query = BugQuery::build(&params(&[("sortBy", "reporter"), ("order", "sideways")]));
        assert_eq!((query.sort, query.direction), (SortKey::CreatedAt, Direction::Desc));

        let query = BugQuery::build(&params(&[("sortBy", "title"), ("order", "ASC")]));
        assert_eq!((query.sort, query.direction), (SortKey::Title, Direction::Asc));
    }

    #[test]
    fn test_unknown_enum_filters_ignored() {
        let query = BugQuery::build(&params(&[("status", "closed"), ("priority", " ")]));
        assert_eq!(query.filter, Filter::default());
    }

    #[test]
    fn test_newest_first_by_default() {
        let (page, total) = BugQuery::default().select(sample());

        assert_eq!(total, 4);
        assert_eq!(
            titles(&page),
            vec!["Typo in footer", "Slow search", "Broken link", "Crash on save"]
        );
    }

    #[test]
    fn test_filter_by_status() {
        let query = BugQuery::build(&params(&[("status", "open")]));
        let (page, total) = query.select(sample());

        assert_eq!(total, 2);
        assert!(page.iter().all(|b| b.status == Status::Open));
    }

    #[test]
    fn test_assignee_substring() {
        let query = BugQuery::build(&params(&[("assignee", "alice")]));
        let (page, _) = query.select(sample());

        assert_eq!(titles(&page), vec!["Typo in footer", "Crash on save"]);
    }

    #[test]
    fn test_search_title_or_description() {
        let query = BugQuery::build(&params(&[("search", "SEARCH")]));
        assert_eq!(titles(&query.select(sample()).0), vec!["Slow search"]);

        let query = BugQuery::build(&params(&[("search", "every time")]));
        assert_eq!(query.select(sample()).1, 4);
    }

    #[test]
    fn test_sort_by_priority_rank() {
        let query = BugQuery::build(&params(&[("sortBy", "priority"), ("order", "asc")]));
        let (page, _) = query.select(sample());

        assert_eq!(
            titles(&page),
            vec!["Broken link", "Typo in footer", "Crash on save", "Slow search"]
        );
    }

    #[test]
    fn test_sort_by_title() {
        let query = BugQuery::build(&params(&[("sortBy", "title"), ("order", "asc")]));
        let (page, _) = query.select(sample());

        assert_eq!(
            titles(&page),
            vec!["Broken link", "Crash on save", "Slow search", "Typo in footer"]
        );
    }

    #[test]
    fn test_window_and_pagination() {
        let query = BugQuery::build(&params(&[("page", "2"), ("limit", "3")]));
        let (page, total) = query.select(sample());
        let pagination = Pagination::new(&query, total, page.len());

        assert_eq!(titles(&page), vec!["Crash on save"]);
        assert_eq!(
            pagination,
            Pagination {
                current_page: 2,
                total_pages: 2,
                total_bugs: 4,
                has_next: false,
                has_prev: true,
            }
        );
    }

    #[test]
    fn test_page_past_the_end() {
        let query = BugQuery::build(&params(&[("page", "9")]));
        let (page, total) = query.select(sample());
        let pagination = Pagination::new(&query, total, page.len());

        assert!(page.is_empty());
        assert_eq!(pagination.total_pages, 1);
        assert!(!pagination.has_next);
    }

    #[test]
    fn test_empty_collection() {
        let query = BugQuery::default();
        let (page, total) = query.select(Vec::new());
        let pagination = Pagination::new(&query, total, page.len());

        assert_eq!(pagination.total_pages, 0);
        assert!(!pagination.has_next && !pagination.has_prev);
    }
}
