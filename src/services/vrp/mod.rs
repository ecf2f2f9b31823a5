//! Single-day VRP solving.
//!
//! Builds tours for `K` vehicles over one day's sites under a shared time
//! budget and stop cap. Routes are open paths: crews stage from their first
//! stop and finish at their last, so no depot leg is ever counted. A
//! virtual hub at the day's centroid exists only to anchor the savings
//! computation.
//!
//! Two solvers share one contract: the savings-based greedy solver (fast
//! mode) and the local-search optimizer (full mode), which starts from the
//! greedy solution and only ever improves on it. Neither fails for
//! infeasibility — sites that cannot be placed are reported unassigned.

mod greedy;
mod search;

pub use greedy::GreedySolver;
pub use search::SearchSolver;

use std::time::Duration;

use crate::services::routing::TravelMatrix;
use crate::types::Site;

/// Matrix row 0 is the virtual hub (centroid); site `i` is row `i + 1`.
pub const HUB_INDEX: usize = 0;

/// One day's solving input.
#[derive(Clone, Copy)]
pub struct DayProblem<'a> {
    pub sites: &'a [Site],
    /// Travel matrix over hub + sites, `sites.len() + 1` square
    pub matrix: &'a TravelMatrix,
    pub vehicles: u32,
    /// Per-route cap on service + travel minutes
    pub budget_minutes: u32,
    /// Per-route cap on stop count
    pub stop_cap: usize,
    pub default_service_minutes: u32,
}

impl DayProblem<'_> {
    pub fn service(&self, site: usize) -> u32 {
        self.sites[site].service_or(self.default_service_minutes)
    }

    /// Travel minutes between two sites.
    pub fn travel(&self, from: usize, to: usize) -> u32 {
        self.matrix.minutes(from + 1, to + 1)
    }

    /// Travel minutes between the virtual hub and a site.
    pub fn hub_travel(&self, site: usize) -> u32 {
        self.matrix.minutes(HUB_INDEX, site + 1)
    }

    /// Sum of leg travel along an ordered stop sequence.
    pub fn path_travel(&self, stops: &[usize]) -> u32 {
        stops
            .windows(2)
            .map(|leg| self.travel(leg[0], leg[1]))
            .sum()
    }

    pub fn path_service(&self, stops: &[usize]) -> u32 {
        stops.iter().map(|&s| self.service(s)).sum()
    }

    /// Whether a stop sequence respects both the stop cap and the budget.
    pub fn fits(&self, stops: &[usize]) -> bool {
        stops.len() <= self.stop_cap
            && self.path_service(stops) + self.path_travel(stops) <= self.budget_minutes
    }
}

/// One vehicle's tour for the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRoute {
    /// Site indices in visit order
    pub stops: Vec<usize>,
    pub service_minutes: u32,
    pub travel_minutes: u32,
}

impl DayRoute {
    pub fn from_stops(problem: &DayProblem, stops: Vec<usize>) -> Self {
        let service_minutes = problem.path_service(&stops);
        let travel_minutes = problem.path_travel(&stops);
        Self {
            stops,
            service_minutes,
            travel_minutes,
        }
    }

    pub fn route_minutes(&self) -> u32 {
        self.service_minutes + self.travel_minutes
    }
}

/// The day's outcome: at most `vehicles` non-empty routes plus whatever
/// could not be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySolution {
    pub routes: Vec<DayRoute>,
    /// Site indices left off every route, ascending
    pub unassigned: Vec<usize>,
}

impl DaySolution {
    pub fn empty() -> Self {
        Self {
            routes: vec![],
            unassigned: vec![],
        }
    }

    pub fn scheduled(&self) -> usize {
        self.routes.iter().map(|r| r.stops.len()).sum()
    }

    pub fn total_travel(&self) -> u64 {
        self.routes.iter().map(|r| r.travel_minutes as u64).sum()
    }

    pub fn max_route_minutes(&self) -> u32 {
        self.routes
            .iter()
            .map(|r| r.route_minutes())
            .max()
            .unwrap_or(0)
    }
}

/// Single-day solver capability. Higher layers depend on this, not on a
/// concrete variant.
pub trait SingleDaySolver: Send + Sync {
    fn solve(&self, problem: &DayProblem) -> DaySolution;

    /// Solver name for logging
    fn name(&self) -> &str;
}

/// Tunables for the full-mode optimizer.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Wall-clock budget for one day's search
    pub max_time: Duration,
    /// Iteration cap; binds before the clock on small instances, which
    /// keeps results reproducible
    pub max_iterations: usize,
    /// Seed for the ruin-and-recreate step
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_time: Duration::from_secs(60),
            max_iterations: 20_000,
            seed: 0,
        }
    }
}

impl SolverConfig {
    /// Quick configuration for interactive use
    pub fn fast() -> Self {
        Self {
            max_time: Duration::from_secs(2),
            max_iterations: 2_000,
            seed: 0,
        }
    }

    /// Longer search for background planning
    pub fn quality() -> Self {
        Self {
            max_time: Duration::from_secs(60),
            max_iterations: 50_000,
            seed: 0,
        }
    }
}

/// Solver for the requested mode.
pub fn build_solver(fast_mode: bool, config: SolverConfig) -> Box<dyn SingleDaySolver> {
    if fast_mode {
        Box::new(GreedySolver)
    } else {
        Box::new(SearchSolver::new(config))
    }
}

/// Solve with the fewest vehicles that place every site: try K = 1, 2, …
/// up to the problem's vehicle count and return the first complete
/// solution, else the all-vehicles solution.
pub fn solve_min_crews(problem: &DayProblem, solver: &dyn SingleDaySolver) -> DaySolution {
    let teams = problem.vehicles.max(1);
    let mut last = DaySolution::empty();
    for k in 1..=teams {
        let trial = DayProblem {
            vehicles: k,
            ..*problem
        };
        last = solver.solve(&trial);
        if last.unassigned.is_empty() {
            return last;
        }
    }
    last
}

/// Preference order between solutions of the same problem: place more
/// sites, then travel less, then balance (smaller max route, then smaller
/// spread), then lexicographic route order.
pub(crate) fn is_better(candidate: &DaySolution, incumbent: &DaySolution) -> bool {
    let key = |s: &DaySolution| (s.unassigned.len(), s.total_travel(), s.max_route_minutes());
    match key(candidate).cmp(&key(incumbent)) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => {
            match spread(candidate).total_cmp(&spread(incumbent)) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Greater => false,
                std::cmp::Ordering::Equal => {
                    let stops = |s: &DaySolution| {
                        s.routes.iter().map(|r| r.stops.clone()).collect::<Vec<_>>()
                    };
                    stops(candidate) < stops(incumbent)
                }
            }
        }
    }
}

/// Sum of squared deviations of route minutes from their mean.
fn spread(solution: &DaySolution) -> f64 {
    if solution.routes.is_empty() {
        return 0.0;
    }
    let minutes: Vec<f64> = solution
        .routes
        .iter()
        .map(|r| r.route_minutes() as f64)
        .collect();
    let mean = minutes.iter().sum::<f64>() / minutes.len() as f64;
    minutes.iter().map(|m| (m - mean) * (m - mean)).sum()
}

/// Canonical form: orient each route so the smaller endpoint comes first
/// (legal because oracles are symmetric), then order routes largest first.
pub(crate) fn normalize(routes: &mut [DayRoute]) {
    for route in routes.iter_mut() {
        if route.stops.len() > 1 && route.stops[route.stops.len() - 1] < route.stops[0] {
            route.stops.reverse();
        }
    }
    routes.sort_by(|a, b| {
        b.stops
            .len()
            .cmp(&a.stops.len())
            .then_with(|| a.stops.cmp(&b.stops))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::routing::{TravelMatrix, TravelTimeOracle};

    pub(super) fn line_sites(n: usize, step_deg: f64) -> Vec<Site> {
        (0..n)
            .map(|i| Site::new(format!("s{}", i), 30.0 + i as f64 * step_deg, -91.0))
            .collect()
    }

    pub(super) fn matrix_for(sites: &[Site]) -> TravelMatrix {
        let mut points = vec![crate::services::geo::centroid(
            &sites.iter().map(|s| s.coordinates()).collect::<Vec<_>>(),
        )];
        points.extend(sites.iter().map(|s| s.coordinates()));
        crate::services::routing::EstimatedTravel::new()
            .matrix(&points)
            .unwrap()
    }

    #[test]
    fn day_problem_accessors() {
        let sites = line_sites(3, 0.05);
        let matrix = matrix_for(&sites);
        let problem = DayProblem {
            sites: &sites,
            matrix: &matrix,
            vehicles: 1,
            budget_minutes: 480,
            stop_cap: 8,
            default_service_minutes: 45,
        };

        assert_eq!(problem.service(0), 45);
        assert_eq!(problem.travel(0, 1), problem.travel(1, 0));
        assert!(problem.travel(0, 2) > problem.travel(0, 1));
        assert_eq!(
            problem.path_travel(&[0, 1, 2]),
            problem.travel(0, 1) + problem.travel(1, 2)
        );
        assert_eq!(problem.path_service(&[0, 1, 2]), 135);
    }

    #[test]
    fn fits_checks_cap_and_budget() {
        let sites = line_sites(3, 0.05);
        let matrix = matrix_for(&sites);
        let problem = DayProblem {
            sites: &sites,
            matrix: &matrix,
            vehicles: 1,
            budget_minutes: 100,
            stop_cap: 2,
            default_service_minutes: 45,
        };

        assert!(problem.fits(&[0, 1]));
        // three stops exceed the cap
        assert!(!problem.fits(&[0, 1, 2]));
        // two stops of 45 min service fit 100 only if travel ≤ 10
        let travel = problem.travel(0, 2);
        assert_eq!(problem.fits(&[0, 2]), 90 + travel <= 100);
    }

    #[test]
    fn normalize_is_canonical() {
        let sites = line_sites(4, 0.05);
        let matrix = matrix_for(&sites);
        let problem = DayProblem {
            sites: &sites,
            matrix: &matrix,
            vehicles: 2,
            budget_minutes: 480,
            stop_cap: 8,
            default_service_minutes: 30,
        };
        let mut routes = vec![
            DayRoute::from_stops(&problem, vec![3, 2]),
            DayRoute::from_stops(&problem, vec![1, 0]),
        ];
        normalize(&mut routes);
        assert_eq!(routes[0].stops, vec![0, 1]);
        assert_eq!(routes[1].stops, vec![2, 3]);
    }

    #[test]
    fn min_crews_uses_fewest_sufficient_vehicles() {
        // Six tight sites fit one route, so K = 1 wins even with 3 teams
        let sites = line_sites(6, 0.004);
        let matrix = matrix_for(&sites);
        let problem = DayProblem {
            sites: &sites,
            matrix: &matrix,
            vehicles: 3,
            budget_minutes: 480,
            stop_cap: 8,
            default_service_minutes: 60,
        };
        let solution = solve_min_crews(&problem, &GreedySolver);
        assert!(solution.unassigned.is_empty());
        assert_eq!(solution.routes.len(), 1);
    }

    #[test]
    fn min_crews_scales_up_until_complete() {
        // Twelve sites with a stop cap of 4 need three vehicles
        let sites = line_sites(12, 0.004);
        let matrix = matrix_for(&sites);
        let problem = DayProblem {
            sites: &sites,
            matrix: &matrix,
            vehicles: 3,
            budget_minutes: 480,
            stop_cap: 4,
            default_service_minutes: 60,
        };
        let solution = solve_min_crews(&problem, &GreedySolver);
        assert!(solution.unassigned.is_empty());
        assert_eq!(solution.routes.len(), 3);
    }

    #[test]
    fn min_crews_returns_best_effort_when_insufficient() {
        // Twenty sites, cap 4, two teams: eight sites can never fit
        let sites = line_sites(20, 0.004);
        let matrix = matrix_for(&sites);
        let problem = DayProblem {
            sites: &sites,
            matrix: &matrix,
            vehicles: 2,
            budget_minutes: 480,
            stop_cap: 4,
            default_service_minutes: 60,
        };
        let solution = solve_min_crews(&problem, &GreedySolver);
        assert_eq!(solution.routes.len(), 2);
        assert_eq!(solution.unassigned.len(), 12);
    }

    #[test]
    fn build_solver_picks_mode() {
        assert_eq!(build_solver(true, SolverConfig::fast()).name(), "savings");
        assert_eq!(build_solver(false, SolverConfig::fast()).name(), "search");
    }

    #[test]
    fn is_better_prefers_coverage_then_travel() {
        let route = |stops: Vec<usize>, travel: u32| DayRoute {
            stops,
            service_minutes: 60,
            travel_minutes: travel,
        };
        let complete = DaySolution {
            routes: vec![route(vec![0, 1], 50)],
            unassigned: vec![],
        };
        let partial = DaySolution {
            routes: vec![route(vec![0], 0)],
            unassigned: vec![1],
        };
        assert!(is_better(&complete, &partial));
        assert!(!is_better(&partial, &complete));

        let slower = DaySolution {
            routes: vec![route(vec![0, 1], 80)],
            unassigned: vec![],
        };
        assert!(is_better(&complete, &slower));
    }
}
