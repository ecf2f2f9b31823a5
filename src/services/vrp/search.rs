//! Full-mode solver: local search over the fast-mode solution.
//!
//! Starts from the savings construction and iterates three move families —
//! reinserting unassigned sites, relocating single stops, and a seeded
//! ruin-and-recreate — accepting only strict improvements. The result is
//! therefore never worse than fast mode. Search stops at the iteration cap,
//! a stretch without improvement, or the wall-clock budget, whichever comes
//! first.

use std::time::Instant;

use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::debug;

use super::greedy::{solve_greedy, two_opt};
use super::{
    is_better, normalize, DayProblem, DayRoute, DaySolution, SingleDaySolver, SolverConfig,
};

/// Consecutive non-improving iterations before the search gives up early.
const STALE_LIMIT: usize = 500;

pub struct SearchSolver {
    config: SolverConfig,
}

impl SearchSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl SingleDaySolver for SearchSolver {
    fn solve(&self, problem: &DayProblem) -> DaySolution {
        let started = Instant::now();
        let start = solve_greedy(problem);
        if problem.sites.len() < 3 {
            return start;
        }

        let deadline = started + self.config.max_time;
        let mut rng = SmallRng::seed_from_u64(self.config.seed);

        let mut best = Candidate::from_solution(&start);
        let mut best_solution = start;
        let mut stale = 0usize;
        let mut iterations = 0usize;

        while iterations < self.config.max_iterations
            && stale < STALE_LIMIT
            && Instant::now() < deadline
        {
            iterations += 1;
            let mut trial = best.clone();

            let changed = match iterations % 3 {
                0 => insert_unassigned(problem, &mut trial),
                1 => relocate_best(problem, &mut trial),
                _ => {
                    ruin_recreate(problem, &mut trial, &mut rng);
                    true
                }
            };
            if !changed {
                stale += 1;
                continue;
            }

            for route in &mut trial.routes {
                two_opt(problem, route);
            }
            trial.routes.retain(|r| !r.is_empty());

            let solution = trial.to_solution(problem);
            if is_better(&solution, &best_solution) {
                best = trial;
                best_solution = solution;
                stale = 0;
            } else {
                stale += 1;
            }
        }

        debug!(
            iterations,
            stale,
            elapsed_ms = started.elapsed().as_millis() as u64,
            travel = best_solution.total_travel(),
            unassigned = best_solution.unassigned.len(),
            "search finished"
        );
        best_solution
    }

    fn name(&self) -> &str {
        "search"
    }
}

/// Mutable working copy of a solution.
#[derive(Clone)]
struct Candidate {
    routes: Vec<Vec<usize>>,
    unassigned: Vec<usize>,
}

impl Candidate {
    fn from_solution(solution: &DaySolution) -> Self {
        Self {
            routes: solution.routes.iter().map(|r| r.stops.clone()).collect(),
            unassigned: solution.unassigned.clone(),
        }
    }

    fn to_solution(&self, problem: &DayProblem) -> DaySolution {
        let mut routes: Vec<DayRoute> = self
            .routes
            .iter()
            .map(|stops| DayRoute::from_stops(problem, stops.clone()))
            .collect();
        normalize(&mut routes);
        let mut unassigned = self.unassigned.clone();
        unassigned.sort_unstable();
        DaySolution { routes, unassigned }
    }
}

/// Added travel of inserting `site` into `route` at `pos`. Rounding can
/// nick the triangle inequality by a minute, so the delta clamps at zero.
fn insertion_delta(problem: &DayProblem, route: &[usize], pos: usize, site: usize) -> u32 {
    let before = if pos > 0 {
        Some(route[pos - 1])
    } else {
        None
    };
    let after = route.get(pos).copied();
    match (before, after) {
        (None, None) => 0,
        (Some(prev), None) => problem.travel(prev, site),
        (None, Some(next)) => problem.travel(site, next),
        (Some(prev), Some(next)) => {
            let added = problem.travel(prev, site) as i64 + problem.travel(site, next) as i64
                - problem.travel(prev, next) as i64;
            added.max(0) as u32
        }
    }
}

/// Cheapest feasible insertion of `site` across all routes, or a fresh
/// route when the fleet has room.
fn cheapest_insertion(
    problem: &DayProblem,
    routes: &[Vec<usize>],
    site: usize,
) -> Option<(usize, usize, u32)> {
    let service = problem.service(site);
    if service > problem.budget_minutes {
        return None;
    }

    let mut best: Option<(usize, usize, u32)> = None;
    for (r, route) in routes.iter().enumerate() {
        if route.len() + 1 > problem.stop_cap {
            continue;
        }
        let route_travel = problem.path_travel(route);
        let route_service = problem.path_service(route);
        for pos in 0..=route.len() {
            let delta = insertion_delta(problem, route, pos, site);
            if route_service + service + route_travel + delta > problem.budget_minutes {
                continue;
            }
            let wins = match best {
                None => true,
                Some((br, bp, bd)) => (delta, r, pos) < (bd, br, bp),
            };
            if wins {
                best = Some((r, pos, delta));
            }
        }
    }

    if best.is_none() && routes.len() < problem.vehicles.max(1) as usize {
        return Some((routes.len(), 0, 0));
    }
    best
}

/// Try to place unassigned sites; true when at least one landed.
fn insert_unassigned(problem: &DayProblem, candidate: &mut Candidate) -> bool {
    if candidate.unassigned.is_empty() {
        return false;
    }
    let mut placed_any = false;
    let mut still_out = Vec::new();
    let pending = std::mem::take(&mut candidate.unassigned);
    for site in pending {
        match cheapest_insertion(problem, &candidate.routes, site) {
            Some((r, pos, _)) => {
                if r == candidate.routes.len() {
                    candidate.routes.push(vec![site]);
                } else {
                    candidate.routes[r].insert(pos, site);
                }
                placed_any = true;
            }
            None => still_out.push(site),
        }
    }
    candidate.unassigned = still_out;
    placed_any
}

/// Best single-stop relocation across the whole solution; true on change.
fn relocate_best(problem: &DayProblem, candidate: &mut Candidate) -> bool {
    // (travel saved, source route, source pos, target route, target pos)
    let mut best: Option<(i64, usize, usize, usize, usize)> = None;

    for (r, route) in candidate.routes.iter().enumerate() {
        for pos in 0..route.len() {
            let site = route[pos];
            let mut shrunk = route.clone();
            shrunk.remove(pos);
            let removal_gain =
                problem.path_travel(route) as i64 - problem.path_travel(&shrunk) as i64;

            for (t, target) in candidate.routes.iter().enumerate() {
                let base: Vec<usize> = if t == r {
                    shrunk.clone()
                } else {
                    target.clone()
                };
                if base.len() + 1 > problem.stop_cap {
                    continue;
                }
                let base_travel = problem.path_travel(&base);
                let base_service = problem.path_service(&base);
                for ins in 0..=base.len() {
                    if t == r && ins == pos {
                        continue;
                    }
                    let delta = insertion_delta(problem, &base, ins, site) as i64;
                    if base_service + problem.service(site) + base_travel
                        + delta as u32
                        > problem.budget_minutes
                    {
                        continue;
                    }
                    let saved = removal_gain - delta;
                    if saved <= 0 {
                        continue;
                    }
                    if best.map_or(true, |(s, ..)| saved > s) {
                        best = Some((saved, r, pos, t, ins));
                    }
                }
            }
        }
    }

    match best {
        Some((_, r, pos, t, ins)) => {
            let site = candidate.routes[r].remove(pos);
            candidate.routes[t].insert(ins, site);
            candidate.routes.retain(|route| !route.is_empty());
            true
        }
        None => false,
    }
}

/// Remove a random slice of stops, then greedily rebuild, giving previously
/// unassigned sites another chance in the process.
fn ruin_recreate(problem: &DayProblem, candidate: &mut Candidate, rng: &mut SmallRng) {
    let assigned: usize = candidate.routes.iter().map(|r| r.len()).sum();
    if assigned == 0 {
        return;
    }

    let remove_count = 1 + rng.gen_range(0..(assigned / 4).max(1));
    let mut pool: Vec<usize> = Vec::with_capacity(remove_count + candidate.unassigned.len());

    for _ in 0..remove_count {
        let live: Vec<usize> = (0..candidate.routes.len())
            .filter(|&r| !candidate.routes[r].is_empty())
            .collect();
        if live.is_empty() {
            break;
        }
        let r = live[rng.gen_range(0..live.len())];
        let pos = rng.gen_range(0..candidate.routes[r].len());
        pool.push(candidate.routes[r].remove(pos));
    }
    candidate.routes.retain(|r| !r.is_empty());

    pool.append(&mut candidate.unassigned);
    pool.sort_unstable();

    for site in pool {
        match cheapest_insertion(problem, &candidate.routes, site) {
            Some((r, ins, _)) => {
                if r == candidate.routes.len() {
                    candidate.routes.push(vec![site]);
                } else {
                    candidate.routes[r].insert(ins, site);
                }
            }
            None => candidate.unassigned.push(site),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{line_sites, matrix_for};
    use super::*;
    use crate::types::Site;

    fn problem<'a>(
        sites: &'a [Site],
        matrix: &'a crate::services::routing::TravelMatrix,
        vehicles: u32,
        budget: u32,
        cap: usize,
    ) -> DayProblem<'a> {
        DayProblem {
            sites,
            matrix,
            vehicles,
            budget_minutes: budget,
            stop_cap: cap,
            default_service_minutes: 60,
        }
    }

    fn quick_config() -> SolverConfig {
        SolverConfig {
            max_time: std::time::Duration::from_secs(10),
            max_iterations: 600,
            seed: 7,
        }
    }

    #[test]
    fn search_never_worse_than_greedy() {
        let sites = line_sites(14, 0.02);
        let matrix = matrix_for(&sites);
        let p = problem(&sites, &matrix, 3, 420, 6);

        let fast = solve_greedy(&p);
        let full = SearchSolver::new(quick_config()).solve(&p);

        assert!(full.unassigned.len() <= fast.unassigned.len());
        if full.unassigned.len() == fast.unassigned.len() {
            assert!(full.total_travel() <= fast.total_travel());
        }
    }

    #[test]
    fn search_respects_constraints() {
        let sites = line_sites(12, 0.03);
        let matrix = matrix_for(&sites);
        let p = problem(&sites, &matrix, 3, 360, 5);
        let solution = SearchSolver::new(quick_config()).solve(&p);

        assert!(solution.routes.len() <= 3);
        for route in &solution.routes {
            assert!(route.stops.len() <= 5);
            assert!(route.route_minutes() <= 360);
        }
        // Coverage: every site exactly once
        let mut seen: Vec<usize> = solution
            .routes
            .iter()
            .flat_map(|r| r.stops.clone())
            .chain(solution.unassigned.iter().copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn search_is_deterministic_for_fixed_seed() {
        let sites = line_sites(10, 0.025);
        let matrix = matrix_for(&sites);
        let p = problem(&sites, &matrix, 2, 400, 6);

        let first = SearchSolver::new(quick_config()).solve(&p);
        let second = SearchSolver::new(quick_config()).solve(&p);
        assert_eq!(first, second);
    }

    #[test]
    fn search_recovers_droppable_sites() {
        // Greedy may strand a site when the fleet is tight; search should
        // place everything that fits.
        let sites = line_sites(6, 0.01);
        let matrix = matrix_for(&sites);
        let p = problem(&sites, &matrix, 2, 480, 4);
        let solution = SearchSolver::new(quick_config()).solve(&p);
        assert!(solution.unassigned.is_empty());
    }

    #[test]
    fn tiny_instances_fall_through_to_greedy() {
        let sites = line_sites(2, 0.01);
        let matrix = matrix_for(&sites);
        let p = problem(&sites, &matrix, 1, 480, 8);
        let fast = solve_greedy(&p);
        let full = SearchSolver::new(quick_config()).solve(&p);
        assert_eq!(fast, full);
    }
}
