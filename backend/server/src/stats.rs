use serde::Serialize;

use crate::models::{Bug, Priority, Status};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_bugs: u64,
    pub by_status: StatusCounts,
    pub by_priority: PriorityCounts,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub open: u64,
    #[serde(rename = "in-progress")]
    pub in_progress: u64,
    pub resolved: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

/// Every bucket is present, zero when nothing falls in it.
pub fn aggregate_stats<'a>(bugs: impl IntoIterator<Item = &'a Bug>) -> Stats {
    bugs.into_iter().fold(Stats::default(), |mut stats, bug| {
        stats.total_bugs += 1;

        *match bug.status {
            Status::Open => &mut stats.by_status.open,
            Status::InProgress => &mut stats.by_status.in_progress,
            Status::Resolved => &mut stats.by_status.resolved,
        } += 1;

        *match bug.priority {
            Priority::Low => &mut stats.by_priority.low,
            Priority::Medium => &mut stats.by_priority.medium,
            Priority::High => &mut stats.by_priority.high,
            Priority::Critical => &mut stats.by_priority.critical,
        } += 1;

        stats
    })
}
