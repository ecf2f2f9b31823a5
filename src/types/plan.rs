//! Plan output types

use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// Identifier of a crew within a plan. Crew numbers are 1-based and stable
/// across days; when clustering is active the id carries the cluster the
/// crew worked that day and renders as `C2-T1` (clusters display 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TeamId {
    pub number: u32,
    pub cluster: Option<u32>,
}

impl TeamId {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            cluster: None,
        }
    }

    pub fn in_cluster(number: u32, cluster: u32) -> Self {
        Self {
            number,
            cluster: Some(cluster),
        }
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cluster {
            Some(cluster) => write!(f, "C{}-T{}", cluster + 1, self.number),
            None => write!(f, "T{}", self.number),
        }
    }
}

impl Serialize for TeamId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One crew's route on one date.
#[derive(Debug, Clone, Serialize)]
pub struct TeamDay {
    pub team_id: TeamId,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<u32>,
    /// Visit order
    pub site_ids: Vec<String>,
    pub service_minutes: u32,
    pub travel_minutes: u32,
    /// service + travel
    pub route_minutes: u32,
}

/// The planner's output: per-team-per-day routes plus whatever could not be
/// placed. Every input site appears exactly once across `team_days` and
/// `unassigned_site_ids`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub team_days: Vec<TeamDay>,
    pub unassigned: usize,
    pub unassigned_site_ids: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub crews_used: u32,
    pub planning_days_used: u32,
}

impl PlanResult {
    /// Output ordering contract: by date ascending, then team id.
    pub fn sort_team_days(&mut self) {
        self.team_days
            .sort_by(|a, b| (a.date, a.team_id).cmp(&(b.date, b.team_id)));
    }
}
