//! Multi-day scheduler.
//!
//! Drives the single-day solver across the work calendar until every site
//! is placed. Weekends and holidays are skipped. Each working day the whole
//! remaining set is offered to the solver, which assigns at most
//! `crews × stop cap` sites; leftovers roll into the next day. A stall
//! counter aborts the loop when several consecutive working days place
//! nothing — the constraints can never absorb the leftover sites.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{PlanError, PlanningResult};
use crate::services::routing::{TravelMatrix, TravelTimeOracle};
use crate::services::vrp::{self, DayProblem, DayRoute, DaySolution, SingleDaySolver};
use crate::services::{calendar, geo};
use crate::types::{Coordinates, PlanRequest, Site, TeamDay, TeamId};

/// Safety cap on the open-ended loop.
pub(crate) const MAX_PLANNING_DAYS: u32 = 365;

/// Consecutive zero-progress working days before the loop halts.
pub(crate) const MAX_CONSECUTIVE_NO_PROGRESS: u32 = 5;

/// What a scheduling run produced. `unassigned_site_ids` holds whatever
/// never made it onto a route.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    pub team_days: Vec<TeamDay>,
    pub unassigned_site_ids: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub planning_days_used: u32,
}

/// Travel matrix for one day's candidate sites: virtual hub (centroid)
/// first, then the sites in slice order. Oracle failures surface as solver
/// errors.
pub(crate) fn day_matrix(
    sites: &[Site],
    oracle: &dyn TravelTimeOracle,
) -> PlanningResult<TravelMatrix> {
    let coords: Vec<Coordinates> = sites.iter().map(|s| s.coordinates()).collect();
    let mut points = Vec::with_capacity(coords.len() + 1);
    points.push(geo::centroid(&coords));
    points.extend(coords);
    oracle.matrix(&points).map_err(|e| PlanError::Solver {
        message: format!("travel oracle '{}' failed: {:#}", oracle.name(), e),
    })
}

pub(crate) fn route_to_team_day(
    route: &DayRoute,
    sites: &[Site],
    date: NaiveDate,
    team_id: TeamId,
    cluster_id: Option<u32>,
) -> TeamDay {
    TeamDay {
        team_id,
        date,
        cluster_id,
        site_ids: route.stops.iter().map(|&s| sites[s].id.clone()).collect(),
        service_minutes: route.service_minutes,
        travel_minutes: route.travel_minutes,
        route_minutes: route.route_minutes(),
    }
}

/// Drop the day's scheduled sites from the remaining pool.
pub(crate) fn remove_scheduled(remaining: &mut Vec<Site>, solution: &DaySolution) {
    let scheduled: std::collections::HashSet<usize> = solution
        .routes
        .iter()
        .flat_map(|r| r.stops.iter().copied())
        .collect();
    let mut index = 0;
    remaining.retain(|_| {
        let keep = !scheduled.contains(&index);
        index += 1;
        keep
    });
}

/// Schedule `sites` with a fixed crew count over an open-ended calendar.
///
/// `end_bound` caps the calendar (used by the fixed-calendar feasibility
/// probe); without it the loop runs until the work is done, stalls out, or
/// hits the safety limit.
pub fn schedule(
    request: &PlanRequest,
    sites: &[Site],
    crews: u32,
    oracle: &dyn TravelTimeOracle,
    solver: &dyn SingleDaySolver,
    end_bound: Option<NaiveDate>,
) -> PlanningResult<ScheduleOutcome> {
    let start_date = request
        .start_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let budget = request.effective_route_minutes();

    let mut remaining: Vec<Site> = sites.to_vec();
    let mut team_days: Vec<TeamDay> = Vec::new();
    let mut current = start_date;
    let mut days_used = 0u32;
    let mut stall = 0u32;

    info!(
        sites = remaining.len(),
        crews,
        solver = solver.name(),
        start = %start_date,
        "multi-day scheduling started"
    );

    while !remaining.is_empty() && days_used < MAX_PLANNING_DAYS {
        if !calendar::is_working_day(current, &request.holidays) {
            current = calendar::next_day(current);
            continue;
        }
        if let Some(bound) = end_bound {
            if current > bound {
                break;
            }
        }

        let matrix = day_matrix(&remaining, oracle)?;
        let problem = DayProblem {
            sites: &remaining,
            matrix: &matrix,
            vehicles: crews,
            budget_minutes: budget,
            stop_cap: request.max_sites_per_crew_per_day,
            default_service_minutes: request.service_minutes_per_site,
        };
        let solution = if request.minimize_crews {
            vrp::solve_min_crews(&problem, solver)
        } else {
            solver.solve(&problem)
        };

        let scheduled_today = solution.scheduled();
        debug!(
            date = %current,
            scheduled_today,
            remaining = remaining.len(),
            "day solved"
        );

        if scheduled_today == 0 {
            stall += 1;
            if stall >= MAX_CONSECUTIVE_NO_PROGRESS {
                // Sites whose service time alone exceeds the budget can
                // never be placed. With minimize_crews the caller gets a
                // partial plan; otherwise this is a hard stop.
                let all_oversize = remaining
                    .iter()
                    .all(|s| request.service_for(s) > budget);
                if request.minimize_crews && all_oversize {
                    warn!(
                        unplaceable = remaining.len(),
                        "returning partial plan; remaining sites exceed the route budget"
                    );
                    break;
                }
                return Err(PlanError::NoProgress {
                    sites_remaining: remaining.len(),
                    sites_scheduled_today: 0,
                    unassigned: solution.unassigned.len(),
                    consecutive_days: stall,
                    crews,
                });
            }
        } else {
            stall = 0;
            for (slot, route) in solution.routes.iter().enumerate() {
                team_days.push(route_to_team_day(
                    route,
                    &remaining,
                    current,
                    TeamId::new(slot as u32 + 1),
                    None,
                ));
            }
            remove_scheduled(&mut remaining, &solution);
        }

        days_used += 1;
        current = calendar::next_day(current);
    }

    if days_used >= MAX_PLANNING_DAYS && !remaining.is_empty() {
        return Err(PlanError::Solver {
            message: format!(
                "planning exceeded the {}-day safety limit with {} sites remaining",
                MAX_PLANNING_DAYS,
                remaining.len()
            ),
        });
    }

    let end_date = team_days.iter().map(|td| td.date).max().unwrap_or(start_date);
    info!(
        team_days = team_days.len(),
        unassigned = remaining.len(),
        days_used,
        end = %end_date,
        "multi-day scheduling finished"
    );

    Ok(ScheduleOutcome {
        team_days,
        unassigned_site_ids: remaining.into_iter().map(|s| s.id).collect(),
        start_date,
        end_date,
        planning_days_used: days_used,
    })
}
