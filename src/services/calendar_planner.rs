//! Fixed-calendar planner.
//!
//! Given a start and end date, find the smallest crew count that places
//! every site inside the range. An arithmetic estimate seeds the crew
//! count, a fast-mode probe weeds out hopeless counts cheaply, and the real
//! plan runs in the requested mode. Because the fast probe is looser than
//! full optimization, the actual plan can still fall short — those
//! failures, and any stall, bump the crew count and retry until the buffer
//! runs out.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{PlanError, PlanningResult};
use crate::services::routing::TravelTimeOracle;
use crate::services::scheduler::{self, ScheduleOutcome};
use crate::services::vrp::{GreedySolver, SingleDaySolver};
use crate::services::{calendar, cluster};
use crate::types::{PlanRequest, Site, TeamDay};

/// How many crew counts past the estimate to try before giving up.
const MAX_CREW_BUFFER: u32 = 5;

/// Average travel padding per site used by the crew estimate.
const ESTIMATE_TRAVEL_MINUTES: u32 = 15;

/// Outcome plus the crew count that achieved it.
#[derive(Debug, Clone)]
pub struct CalendarOutcome {
    pub outcome: ScheduleOutcome,
    pub crews_used: u32,
}

/// Least crews that could cover the workload if every day were perfectly
/// packed; the probe loop corrects optimism.
pub(crate) fn estimate_crews(
    sites: &[Site],
    request: &PlanRequest,
    working_days: u32,
) -> u32 {
    let total_minutes: u64 = sites
        .iter()
        .map(|s| (request.service_for(s) + ESTIMATE_TRAVEL_MINUTES) as u64)
        .sum();
    let capacity_per_crew = working_days as u64 * request.effective_route_minutes() as u64;
    if capacity_per_crew == 0 {
        return 1;
    }
    (total_minutes.div_ceil(capacity_per_crew)).max(1) as u32
}

/// Plan a fixed date range, clustered or not.
pub fn plan_calendar(
    request: &PlanRequest,
    oracle: &dyn TravelTimeOracle,
    solver: &dyn SingleDaySolver,
) -> PlanningResult<CalendarOutcome> {
    if request.use_clusters {
        plan_clusters_independently(request, oracle, solver)
    } else {
        plan_range(request, &request.sites, oracle, solver)
    }
}

fn plan_range(
    request: &PlanRequest,
    sites: &[Site],
    oracle: &dyn TravelTimeOracle,
    solver: &dyn SingleDaySolver,
) -> PlanningResult<CalendarOutcome> {
    let start = request
        .start_date
        .expect("validation guarantees start_date in calendar mode");
    let end = request
        .end_date
        .expect("validation guarantees end_date in calendar mode");

    let working_days = calendar::count_working_days(start, end, &request.holidays);
    if working_days == 0 {
        return Err(PlanError::InvalidRequest {
            message: "no working days between start_date and end_date".to_string(),
        });
    }

    let estimate = estimate_crews(sites, request, working_days);
    info!(
        sites = sites.len(),
        working_days,
        estimate,
        "fixed-calendar planning started"
    );

    let mut last_failure: Option<PlanError> = None;

    for crews in estimate..=estimate + MAX_CREW_BUFFER {
        // Cheap feasibility probe in fast mode, bounded to the range
        let probe_request = request.with_teams(crews);
        match scheduler::schedule(&probe_request, sites, crews, oracle, &GreedySolver, Some(end)) {
            Ok(probe) if probe.unassigned_site_ids.is_empty() => {}
            Ok(probe) => {
                debug!(crews, short = probe.unassigned_site_ids.len(), "probe infeasible");
                last_failure = Some(PlanError::NoProgress {
                    sites_remaining: probe.unassigned_site_ids.len(),
                    sites_scheduled_today: 0,
                    unassigned: probe.unassigned_site_ids.len(),
                    consecutive_days: 0,
                    crews,
                });
                continue;
            }
            Err(failure @ PlanError::NoProgress { .. }) => {
                debug!(crews, %failure, "probe failed");
                last_failure = Some(failure);
                continue;
            }
            Err(other) => return Err(other),
        }

        // Real plan in the requested mode, open-ended; post-validate the
        // range because full optimization is stricter than the probe.
        match scheduler::schedule(&probe_request, sites, crews, oracle, solver, None) {
            Ok(outcome) if outcome.unassigned_site_ids.is_empty() && outcome.end_date <= end => {
                info!(crews, end = %outcome.end_date, "fixed-calendar planning committed");
                return Ok(CalendarOutcome {
                    outcome,
                    crews_used: crews,
                });
            }
            Ok(outcome) => {
                debug!(
                    crews,
                    unassigned = outcome.unassigned_site_ids.len(),
                    end = %outcome.end_date,
                    "plan missed the calendar, retrying with another crew"
                );
                last_failure = Some(PlanError::NoProgress {
                    sites_remaining: outcome.unassigned_site_ids.len(),
                    sites_scheduled_today: 0,
                    unassigned: outcome.unassigned_site_ids.len(),
                    consecutive_days: 0,
                    crews,
                });
            }
            Err(failure @ PlanError::NoProgress { .. }) => {
                debug!(crews, %failure, "plan stalled, retrying with another crew");
                last_failure = Some(failure);
            }
            Err(other) => return Err(other),
        }
    }

    warn!(
        from = estimate,
        to = estimate + MAX_CREW_BUFFER,
        "crew buffer exhausted"
    );
    Err(PlanError::CalendarInfeasible {
        crews_from: estimate,
        crews_to: estimate + MAX_CREW_BUFFER,
        cause: Box::new(last_failure.unwrap_or(PlanError::NoProgress {
            sites_remaining: sites.len(),
            sites_scheduled_today: 0,
            unassigned: sites.len(),
            consecutive_days: 0,
            crews: estimate + MAX_CREW_BUFFER,
        })),
    })
}

/// Calendar mode with clustering: every cluster gets the full date range
/// and its own independently-sized crew set; results merge with
/// cluster-scoped team ids. Clusters share no sites, so each failure or
/// success stands alone.
fn plan_clusters_independently(
    request: &PlanRequest,
    oracle: &dyn TravelTimeOracle,
    solver: &dyn SingleDaySolver,
) -> PlanningResult<CalendarOutcome> {
    let groups = cluster::group_by_cluster(&request.sites);
    info!(clusters = groups.len(), "calendar planning per cluster");

    let mut team_days: Vec<TeamDay> = Vec::new();
    let mut unassigned: Vec<String> = Vec::new();
    let mut crews_total = 0u32;
    let mut start_date: Option<NaiveDate> = None;
    let mut end_date: Option<NaiveDate> = None;
    let mut days_used = 0u32;

    for (cid, sites) in groups {
        let planned = plan_range(request, &sites, oracle, solver)?;

        for mut td in planned.outcome.team_days {
            td.cluster_id = Some(cid);
            td.team_id.cluster = Some(cid);
            team_days.push(td);
        }
        unassigned.extend(planned.outcome.unassigned_site_ids);
        crews_total += planned.crews_used;
        days_used = days_used.max(planned.outcome.planning_days_used);
        start_date = Some(match start_date {
            Some(s) => s.min(planned.outcome.start_date),
            None => planned.outcome.start_date,
        });
        end_date = Some(match end_date {
            Some(e) => e.max(planned.outcome.end_date),
            None => planned.outcome.end_date,
        });
    }

    let fallback = request
        .start_date
        .expect("validation guarantees start_date in calendar mode");
    Ok(CalendarOutcome {
        outcome: ScheduleOutcome {
            team_days,
            unassigned_site_ids: unassigned,
            start_date: start_date.unwrap_or(fallback),
            end_date: end_date.unwrap_or(fallback),
            planning_days_used: days_used,
        },
        crews_used: crews_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::routing::EstimatedTravel;
    use crate::services::vrp::{SearchSolver, SolverConfig};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn grid_sites(n: usize, base_lat: f64) -> Vec<Site> {
        (0..n)
            .map(|i| {
                Site::new(
                    format!("s{}", i),
                    base_lat + (i / 12) as f64 * 0.03,
                    -89.0 + (i % 12) as f64 * 0.03,
                )
            })
            .collect()
    }

    fn calendar_request(sites: Vec<Site>, start: NaiveDate, end: NaiveDate) -> PlanRequest {
        let mut request = PlanRequest::new(sites, 3);
        request.start_date = Some(start);
        request.end_date = Some(end);
        request
    }

    #[test]
    fn estimate_matches_capacity_arithmetic() {
        // 40 sites × (90 + 15) = 4200 minutes; 10 days × 480 = 4800 per crew
        let mut request = PlanRequest::new(grid_sites(40, 40.0), 3);
        request.service_minutes_per_site = 90;
        assert_eq!(estimate_crews(&request.sites, &request, 10), 1);
        // Half the days needs twice the crews
        assert_eq!(estimate_crews(&request.sites, &request, 5), 2);
    }

    #[test]
    fn plan_fits_inside_the_range() {
        // 60 IL sites, 90-minute service, one month
        let mut request =
            calendar_request(grid_sites(60, 40.0), d(2026, 2, 2), d(2026, 3, 2));
        request.service_minutes_per_site = 90;
        let oracle = EstimatedTravel::new();
        let solver = SearchSolver::new(SolverConfig {
            max_time: std::time::Duration::from_secs(5),
            max_iterations: 150,
            seed: 1,
        });

        let planned = plan_calendar(&request, &oracle, &solver).unwrap();
        assert!(planned.outcome.unassigned_site_ids.is_empty());
        assert!(planned.outcome.end_date <= d(2026, 3, 2));
        assert!(planned.crews_used >= 1);
        for td in &planned.outcome.team_days {
            assert!(td.date >= d(2026, 2, 2) && td.date <= d(2026, 3, 2));
            assert!(!calendar::is_weekend(td.date));
        }
    }

    #[test]
    fn tight_range_completes_with_enough_crews() {
        // Five working days, 50 sites with long service: the probe loop
        // climbs from the estimate until the range holds.
        let mut request =
            calendar_request(grid_sites(50, 40.0), d(2026, 2, 2), d(2026, 2, 6));
        request.service_minutes_per_site = 110;
        let oracle = EstimatedTravel::new();

        let estimate = estimate_crews(&request.sites, &request, 5);
        let planned = plan_calendar(&request, &oracle, &GreedySolver).unwrap();
        assert!(planned.outcome.unassigned_site_ids.is_empty());
        assert!(planned.outcome.end_date <= d(2026, 2, 6));
        assert!(
            planned.crews_used >= estimate,
            "crews {} below estimate {}",
            planned.crews_used,
            estimate
        );
    }

    #[test]
    fn impossible_range_surfaces_calendar_infeasible() {
        // Service time exceeds the route budget outright, so no crew count
        // can ever help and the buffer runs out.
        let mut request =
            calendar_request(grid_sites(10, 40.0), d(2026, 2, 2), d(2026, 2, 6));
        request.service_minutes_per_site = 500;
        let oracle = EstimatedTravel::new();

        match plan_calendar(&request, &oracle, &GreedySolver) {
            Err(PlanError::CalendarInfeasible { crews_from, crews_to, cause }) => {
                assert_eq!(crews_to, crews_from + MAX_CREW_BUFFER);
                assert!(matches!(*cause, PlanError::NoProgress { .. }));
            }
            other => panic!("expected CalendarInfeasible, got {:?}", other),
        }
    }

    #[test]
    fn empty_working_range_is_invalid() {
        // Saturday-to-Sunday range has no working days
        let request = calendar_request(grid_sites(5, 40.0), d(2026, 1, 3), d(2026, 1, 4));
        let oracle = EstimatedTravel::new();
        match plan_calendar(&request, &oracle, &GreedySolver) {
            Err(PlanError::InvalidRequest { message }) => {
                assert!(message.contains("working days"));
            }
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
    }

    #[test]
    fn clustered_calendar_plans_each_cluster() {
        let mut sites = grid_sites(20, 40.0);
        for site in &mut sites[..12] {
            site.cluster_id = Some(0);
        }
        for site in &mut sites[12..] {
            site.cluster_id = Some(1);
        }
        let mut request = calendar_request(sites, d(2026, 2, 2), d(2026, 2, 27));
        request.use_clusters = true;
        let oracle = EstimatedTravel::new();

        let planned = plan_calendar(&request, &oracle, &GreedySolver).unwrap();
        assert!(planned.outcome.unassigned_site_ids.is_empty());
        for td in &planned.outcome.team_days {
            let cid = td.cluster_id.expect("cluster id tagged");
            assert_eq!(td.team_id.cluster, Some(cid));
        }
        let clusters: std::collections::BTreeSet<u32> = planned
            .outcome
            .team_days
            .iter()
            .map(|td| td.cluster_id.unwrap())
            .collect();
        assert_eq!(clusters.len(), 2);
    }
}
