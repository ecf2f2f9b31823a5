//! Planning request types

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::types::Site;

/// Working window of a single day. `end` must be after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Workday {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Workday {
    /// Length of the working window in minutes.
    pub fn minutes(&self) -> u32 {
        (self.end - self.start).num_minutes().max(0) as u32
    }
}

impl Default for Workday {
    fn default() -> Self {
        Self {
            start: defaults::default_work_start(),
            end: defaults::default_work_end(),
        }
    }
}

/// Crew configuration. In fixed-calendar mode `teams` is treated as a
/// starting point only — the planner computes the crew count itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    pub teams: u32,
    #[serde(default)]
    pub workday: Workday,
}

/// The aggregated planning input. Unknown fields are rejected at the
/// boundary; optional fields default as documented.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanRequest {
    pub sites: Vec<Site>,
    pub team_config: TeamConfig,
    /// Use per-site `cluster_id` and sequential/cluster planning
    #[serde(default)]
    pub use_clusters: bool,
    /// First candidate work day; defaults to today
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Presence selects fixed-calendar mode (inclusive bound)
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Dates excluded from the work calendar, in addition to weekends
    #[serde(default)]
    pub holidays: BTreeSet<NaiveDate>,
    /// Per-day per-crew cap on driving + service time
    #[serde(default = "default_max_route_minutes")]
    pub max_route_minutes: u32,
    /// Default used when a site omits its own service time
    #[serde(default = "default_service_minutes")]
    pub service_minutes_per_site: u32,
    /// Subtracted from the per-day budget
    #[serde(default)]
    pub break_minutes: u32,
    /// Greedy solver instead of full optimization
    #[serde(default)]
    pub fast_mode: bool,
    /// Hard upper bound on stops per route
    #[serde(default = "default_max_sites_per_crew")]
    pub max_sites_per_crew_per_day: usize,
    /// Attempt to use fewer than `teams` crews when sufficient
    #[serde(default)]
    pub minimize_crews: bool,
}

fn default_max_route_minutes() -> u32 {
    defaults::DEFAULT_MAX_ROUTE_MINUTES
}

fn default_service_minutes() -> u32 {
    defaults::DEFAULT_SERVICE_MINUTES
}

fn default_max_sites_per_crew() -> usize {
    defaults::DEFAULT_MAX_SITES_PER_CREW
}

impl PlanRequest {
    /// Minimal request for the given sites and crew count; everything else
    /// takes its default.
    pub fn new(sites: Vec<Site>, teams: u32) -> Self {
        Self {
            sites,
            team_config: TeamConfig {
                teams,
                workday: Workday::default(),
            },
            use_clusters: false,
            start_date: None,
            end_date: None,
            holidays: BTreeSet::new(),
            max_route_minutes: defaults::DEFAULT_MAX_ROUTE_MINUTES,
            service_minutes_per_site: defaults::DEFAULT_SERVICE_MINUTES,
            break_minutes: 0,
            fast_mode: false,
            max_sites_per_crew_per_day: defaults::DEFAULT_MAX_SITES_PER_CREW,
            minimize_crews: false,
        }
    }

    /// Per-day per-route time budget: route caps and the working window
    /// both bound a route, and break time comes off the top.
    pub fn effective_route_minutes(&self) -> u32 {
        self.max_route_minutes
            .min(self.team_config.workday.minutes())
            .saturating_sub(self.break_minutes)
    }

    /// Fixed-calendar mode is selected by the presence of `end_date`.
    pub fn is_calendar_mode(&self) -> bool {
        self.end_date.is_some()
    }

    /// Resolved service time for a site under this request.
    pub fn service_for(&self, site: &Site) -> u32 {
        site.service_or(self.service_minutes_per_site)
    }

    /// Copy of this request with a different crew count.
    pub fn with_teams(&self, teams: u32) -> Self {
        let mut copy = self.clone();
        copy.team_config.teams = teams;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn workday_minutes() {
        let wd = Workday {
            start: hm(8, 0),
            end: hm(16, 30),
        };
        assert_eq!(wd.minutes(), 510);
    }

    #[test]
    fn effective_budget_is_bounded_by_workday_and_break() {
        let mut request = PlanRequest::new(vec![], 2);
        // default workday is 9h = 540, route cap 480
        assert_eq!(request.effective_route_minutes(), 480);

        request.break_minutes = 30;
        assert_eq!(request.effective_route_minutes(), 450);

        request.team_config.workday = Workday {
            start: hm(8, 0),
            end: hm(12, 0),
        };
        assert_eq!(request.effective_route_minutes(), 210);
    }

    #[test]
    fn request_parses_with_defaults() {
        let request: PlanRequest = serde_json::from_str(
            r#"{
                "sites": [{"id": "a", "lat": 30.0, "lon": -91.0}],
                "team_config": {"teams": 2}
            }"#,
        )
        .unwrap();
        assert_eq!(request.max_route_minutes, 480);
        assert_eq!(request.service_minutes_per_site, 60);
        assert_eq!(request.max_sites_per_crew_per_day, 8);
        assert!(!request.fast_mode);
        assert!(request.start_date.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<PlanRequest, _> = serde_json::from_str(
            r#"{
                "sites": [],
                "team_config": {"teams": 1},
                "ramp_phase": "crawl"
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn dates_parse_iso() {
        let request: PlanRequest = serde_json::from_str(
            r#"{
                "sites": [],
                "team_config": {"teams": 1},
                "start_date": "2026-02-02",
                "end_date": "2026-03-02",
                "holidays": ["2026-02-16"]
            }"#,
        )
        .unwrap();
        assert!(request.is_calendar_mode());
        assert_eq!(
            request.start_date,
            NaiveDate::from_ymd_opt(2026, 2, 2)
        );
        assert!(request
            .holidays
            .contains(&NaiveDate::from_ymd_opt(2026, 2, 16).unwrap()));
    }
}
