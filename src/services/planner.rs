//! Planner entry point.
//!
//! Routes a validated request to the matching strategy: fixed-calendar
//! planning when an end date is present, sequential cluster dispatch for
//! clustered fixed-crew work, the multi-day scheduler when a start date is
//! given, and a plain one-day solve otherwise.

use tracing::info;

use crate::error::PlanningResult;
use crate::services::routing::{CachedOracle, EstimatedTravel, TravelTimeOracle};
use crate::services::scheduler::{self, ScheduleOutcome};
use crate::services::vrp::{self, DayProblem, SolverConfig};
use crate::services::{calendar_planner, sequential, validation};
use crate::types::{PlanRequest, PlanResult, TeamId};

pub struct Planner {
    oracle: Box<dyn TravelTimeOracle>,
    solver_config: SolverConfig,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    /// Planner with the built-in travel estimator behind the shared cache.
    pub fn new() -> Self {
        Self {
            oracle: Box::new(CachedOracle::new(EstimatedTravel::new())),
            solver_config: SolverConfig::default(),
        }
    }

    /// Planner over a caller-supplied oracle (external matrix service,
    /// test double, …).
    pub fn with_oracle(oracle: Box<dyn TravelTimeOracle>) -> Self {
        Self {
            oracle,
            solver_config: SolverConfig::default(),
        }
    }

    pub fn solver_config(mut self, config: SolverConfig) -> Self {
        self.solver_config = config;
        self
    }

    /// Plan a request end to end.
    pub fn plan(&self, request: &PlanRequest) -> PlanningResult<PlanResult> {
        validation::validate(request)?;
        let solver = vrp::build_solver(request.fast_mode, self.solver_config.clone());
        let oracle = self.oracle.as_ref();
        let teams = request.team_config.teams;

        info!(
            sites = request.sites.len(),
            teams,
            fast_mode = request.fast_mode,
            calendar = request.is_calendar_mode(),
            clusters = request.use_clusters,
            "planning request dispatched"
        );

        let (outcome, crews_used) = if request.is_calendar_mode() {
            let planned = calendar_planner::plan_calendar(request, oracle, solver.as_ref())?;
            (planned.outcome, planned.crews_used)
        } else if request.use_clusters {
            let outcome = sequential::plan_sequential(request, oracle, solver.as_ref())?;
            let used = crews_observed(&outcome, teams);
            (outcome, used)
        } else if request.start_date.is_some() {
            let outcome = scheduler::schedule(
                request,
                &request.sites,
                teams,
                oracle,
                solver.as_ref(),
                None,
            )?;
            let used = crews_observed(&outcome, teams);
            (outcome, used)
        } else {
            let outcome = self.plan_single_day(request, solver.as_ref())?;
            let used = crews_observed(&outcome, teams);
            (outcome, used)
        };

        let mut result = PlanResult {
            unassigned: outcome.unassigned_site_ids.len(),
            team_days: outcome.team_days,
            unassigned_site_ids: outcome.unassigned_site_ids,
            start_date: outcome.start_date,
            end_date: outcome.end_date,
            crews_used,
            planning_days_used: outcome.planning_days_used,
        };
        result.sort_team_days();
        Ok(result)
    }

    /// No dates at all: one solving pass dated today; whatever does not fit
    /// the day is reported unassigned.
    fn plan_single_day(
        &self,
        request: &PlanRequest,
        solver: &dyn vrp::SingleDaySolver,
    ) -> PlanningResult<ScheduleOutcome> {
        let date = chrono::Local::now().date_naive();
        let matrix = scheduler::day_matrix(&request.sites, self.oracle.as_ref())?;
        let problem = DayProblem {
            sites: &request.sites,
            matrix: &matrix,
            vehicles: request.team_config.teams,
            budget_minutes: request.effective_route_minutes(),
            stop_cap: request.max_sites_per_crew_per_day,
            default_service_minutes: request.service_minutes_per_site,
        };
        let solution = if request.minimize_crews {
            vrp::solve_min_crews(&problem, solver)
        } else {
            solver.solve(&problem)
        };

        let team_days = solution
            .routes
            .iter()
            .enumerate()
            .map(|(slot, route)| {
                scheduler::route_to_team_day(
                    route,
                    &request.sites,
                    date,
                    TeamId::new(slot as u32 + 1),
                    None,
                )
            })
            .collect();
        Ok(ScheduleOutcome {
            team_days,
            unassigned_site_ids: solution
                .unassigned
                .iter()
                .map(|&s| request.sites[s].id.clone())
                .collect(),
            start_date: date,
            end_date: date,
            planning_days_used: 1,
        })
    }
}

fn crews_observed(outcome: &ScheduleOutcome, requested: u32) -> u32 {
    outcome
        .team_days
        .iter()
        .map(|td| td.team_id.number)
        .max()
        .unwrap_or(requested)
}

/// Plan with the default planner.
pub fn plan(request: &PlanRequest) -> PlanningResult<PlanResult> {
    Planner::new().plan(request)
}
