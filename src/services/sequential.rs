//! Sequential cluster planner.
//!
//! Fixed-crew planning over clustered sites: crews are dispatched to
//! clusters each day and move on to another cluster once their current one
//! runs dry, so every site gets covered even with fewer crews than
//! clusters. A crew never splits one day across two clusters; across days
//! it may switch freely.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{PlanError, PlanningResult};
use crate::services::routing::TravelTimeOracle;
use crate::services::scheduler::{
    day_matrix, remove_scheduled, route_to_team_day, ScheduleOutcome, MAX_CONSECUTIVE_NO_PROGRESS,
    MAX_PLANNING_DAYS,
};
use crate::services::vrp::{DayProblem, SingleDaySolver};
use crate::services::{calendar, cluster};
use crate::types::{PlanRequest, Site, TeamDay, TeamId};

/// Plan clustered sites with crews moving between clusters day by day.
pub fn plan_sequential(
    request: &PlanRequest,
    oracle: &dyn TravelTimeOracle,
    solver: &dyn SingleDaySolver,
) -> PlanningResult<ScheduleOutcome> {
    let crews = request.team_config.teams;
    let mut remaining = cluster::group_by_cluster(&request.sites);
    let cluster_count = remaining.len();

    let start_date = request
        .start_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let budget = request.effective_route_minutes();

    info!(
        crews,
        clusters = cluster_count,
        sites = request.sites.len(),
        start = %start_date,
        "sequential cluster planning started"
    );

    // crew number (1-based) → cluster currently assigned
    let mut assignment: BTreeMap<u32, Option<u32>> =
        (1..=crews).map(|k| (k, None)).collect();

    let mut team_days: Vec<TeamDay> = Vec::new();
    let mut current = start_date;
    let mut days_used = 0u32;
    let mut stall = 0u32;

    while remaining.values().any(|sites| !sites.is_empty()) && days_used < MAX_PLANNING_DAYS {
        if !calendar::is_working_day(current, &request.holidays) {
            current = calendar::next_day(current);
            continue;
        }

        assign_free_crews(&mut assignment, &remaining);

        // Today's roster per cluster
        let mut roster: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (&crew, &slot) in &assignment {
            if let Some(cid) = slot {
                roster.entry(cid).or_default().push(crew);
            }
        }

        let mut scheduled_today = 0usize;
        for (&cid, crew_list) in &roster {
            let sites = remaining.get_mut(&cid).expect("roster references live cluster");
            if sites.is_empty() {
                continue;
            }

            let matrix = day_matrix(sites, oracle)?;
            let problem = DayProblem {
                sites,
                matrix: &matrix,
                vehicles: crew_list.len() as u32,
                budget_minutes: budget,
                stop_cap: request.max_sites_per_crew_per_day,
                default_service_minutes: request.service_minutes_per_site,
            };
            let solution = solver.solve(&problem);

            // Route k goes to the k-th crew on this cluster; surplus crews
            // idle today and are reassigned by tomorrow's free-crew pass.
            for (slot, route) in solution.routes.iter().enumerate() {
                team_days.push(route_to_team_day(
                    route,
                    sites,
                    current,
                    TeamId::in_cluster(crew_list[slot], cid),
                    Some(cid),
                ));
            }
            scheduled_today += solution.scheduled();
            remove_scheduled(sites, &solution);

            if sites.is_empty() {
                debug!(cluster = cid, date = %current, "cluster complete");
            }
        }

        if scheduled_today == 0 {
            stall += 1;
            if stall >= MAX_CONSECUTIVE_NO_PROGRESS {
                let leftover: usize = remaining.values().map(|s| s.len()).sum();
                let all_oversize = remaining
                    .values()
                    .flatten()
                    .all(|s| request.service_for(s) > budget);
                if request.minimize_crews && all_oversize {
                    warn!(
                        unplaceable = leftover,
                        "returning partial plan; remaining sites exceed the route budget"
                    );
                    break;
                }
                return Err(PlanError::NoProgress {
                    sites_remaining: leftover,
                    sites_scheduled_today: 0,
                    unassigned: leftover,
                    consecutive_days: stall,
                    crews,
                });
            }
        } else {
            stall = 0;
        }

        days_used += 1;
        current = calendar::next_day(current);
    }

    let leftover: usize = remaining.values().map(|s| s.len()).sum();
    if days_used >= MAX_PLANNING_DAYS && leftover > 0 {
        return Err(PlanError::Solver {
            message: format!(
                "planning exceeded the {}-day safety limit with {} sites remaining",
                MAX_PLANNING_DAYS, leftover
            ),
        });
    }

    let end_date = team_days.iter().map(|td| td.date).max().unwrap_or(start_date);
    info!(
        team_days = team_days.len(),
        unassigned = leftover,
        days_used,
        end = %end_date,
        "sequential cluster planning finished"
    );

    Ok(ScheduleOutcome {
        team_days,
        unassigned_site_ids: remaining
            .into_values()
            .flatten()
            .map(|s| s.id)
            .collect(),
        start_date,
        end_date,
        planning_days_used: days_used,
    })
}

/// Free crews (idle, or their cluster drained) pick a new cluster: first
/// each crewless cluster by descending remaining size (ties to the smaller
/// cluster id), then surplus crews pile onto the cluster with the most work
/// left.
fn assign_free_crews(
    assignment: &mut BTreeMap<u32, Option<u32>>,
    remaining: &BTreeMap<u32, Vec<Site>>,
) {
    let live = |cid: u32| remaining.get(&cid).map_or(0, |s| s.len());

    // Release crews whose cluster drained
    for slot in assignment.values_mut() {
        if let Some(cid) = *slot {
            if live(cid) == 0 {
                *slot = None;
            }
        }
    }

    let free: Vec<u32> = assignment
        .iter()
        .filter(|(_, slot)| slot.is_none())
        .map(|(&crew, _)| crew)
        .collect();

    for crew in free {
        let taken: std::collections::BTreeSet<u32> =
            assignment.values().flatten().copied().collect();

        // Largest crewless cluster first
        let pick = remaining
            .iter()
            .filter(|(cid, sites)| !sites.is_empty() && !taken.contains(cid))
            .max_by(|(a_id, a), (b_id, b)| a.len().cmp(&b.len()).then(b_id.cmp(a_id)))
            .map(|(&cid, _)| cid)
            .or_else(|| {
                // Every live cluster already has a crew: share the biggest
                remaining
                    .iter()
                    .filter(|(_, sites)| !sites.is_empty())
                    .max_by(|(a_id, a), (b_id, b)| a.len().cmp(&b.len()).then(b_id.cmp(a_id)))
                    .map(|(&cid, _)| cid)
            });

        if let Some(cid) = pick {
            debug!(crew, cluster = cid, sites = live(cid), "crew assigned");
            assignment.insert(crew, Some(cid));
        }
    }
}
