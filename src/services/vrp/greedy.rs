//! Fast-mode solver: savings construction followed by 2-opt.
//!
//! Savings merging (Clarke & Wright): seed one route per site, compute
//! `s(i, j) = t(hub, i) + t(hub, j) − t(i, j)` for every pair, and merge
//! routes at their endpoints in decreasing savings order while the combined
//! route still fits the budget and stop cap. Because routes carry no depot
//! legs, positive savings alone can leave more routes than vehicles; a
//! second pass then keeps merging at minimum added travel until the fleet
//! fits. A 2-opt pass untangles each route. Deterministic given its inputs.

use tracing::debug;

use super::{normalize, DayProblem, DayRoute, DaySolution, SingleDaySolver};

pub struct GreedySolver;

impl SingleDaySolver for GreedySolver {
    fn solve(&self, problem: &DayProblem) -> DaySolution {
        solve_greedy(problem)
    }

    fn name(&self) -> &str {
        "savings"
    }
}

struct Saving {
    i: usize,
    j: usize,
    value: i64,
}

/// Route bookkeeping during merging. Emptied slots stay in place so route
/// ids remain stable.
struct Merge {
    members: Vec<Vec<usize>>,
    travel: Vec<u32>,
    service: Vec<u32>,
    route_of: Vec<usize>,
}

impl Merge {
    fn live_routes(&self) -> usize {
        self.members.iter().filter(|m| !m.is_empty()).count()
    }

    /// Join `from` onto `into`, optionally reversing either side first so
    /// the merge endpoints become adjacent.
    fn apply(
        &mut self,
        from: usize,
        into: usize,
        reverse_from: bool,
        reverse_into: bool,
        combined_travel: u32,
        combined_service: u32,
    ) {
        let mut moved = std::mem::take(&mut self.members[from]);
        if reverse_from {
            moved.reverse();
        }
        if reverse_into {
            self.members[into].reverse();
        }
        self.members[into].append(&mut moved);
        self.travel[into] = combined_travel;
        self.service[into] = combined_service;
        self.travel[from] = 0;
        self.service[from] = 0;
        for &s in &self.members[into] {
            self.route_of[s] = into;
        }
    }
}

pub(super) fn solve_greedy(problem: &DayProblem) -> DaySolution {
    let n = problem.sites.len();
    if n == 0 {
        return DaySolution::empty();
    }

    // Sites whose service time alone blows the budget can never ride
    let mut unassigned: Vec<usize> = Vec::new();
    let mut pool: Vec<usize> = Vec::new();
    for site in 0..n {
        if problem.service(site) > problem.budget_minutes {
            unassigned.push(site);
        } else {
            pool.push(site);
        }
    }
    if pool.is_empty() {
        return DaySolution {
            routes: vec![],
            unassigned,
        };
    }

    // Seed: route per site, zero travel
    let mut state = Merge {
        members: pool.iter().map(|&s| vec![s]).collect(),
        travel: vec![0; pool.len()],
        service: pool.iter().map(|&s| problem.service(s)).collect(),
        route_of: vec![usize::MAX; n],
    };
    for (r, &s) in pool.iter().enumerate() {
        state.route_of[s] = r;
    }

    let mut savings: Vec<Saving> = Vec::with_capacity(pool.len() * (pool.len() - 1) / 2);
    for a in 0..pool.len() {
        for b in (a + 1)..pool.len() {
            let (i, j) = (pool[a], pool[b]);
            let value = problem.hub_travel(i) as i64 + problem.hub_travel(j) as i64
                - problem.travel(i, j) as i64;
            if value > 0 {
                savings.push(Saving { i, j, value });
            }
        }
    }
    savings.sort_by(|a, b| {
        b.value
            .cmp(&a.value)
            .then_with(|| (a.i, a.j).cmp(&(b.i, b.j)))
    });

    for saving in &savings {
        let ri = state.route_of[saving.i];
        let rj = state.route_of[saving.j];
        if ri == rj {
            continue;
        }
        if state.members[ri].len() + state.members[rj].len() > problem.stop_cap {
            continue;
        }

        // Only endpoint-to-endpoint merges keep both sequences intact
        let i_at_start = state.members[ri].first() == Some(&saving.i);
        let i_at_end = state.members[ri].last() == Some(&saving.i);
        let j_at_start = state.members[rj].first() == Some(&saving.j);
        let j_at_end = state.members[rj].last() == Some(&saving.j);

        let (merge_from, merge_into, reverse_from, reverse_into) = if i_at_end && j_at_start {
            (rj, ri, false, false)
        } else if j_at_end && i_at_start {
            (ri, rj, false, false)
        } else if i_at_end && j_at_end {
            (rj, ri, true, false)
        } else if i_at_start && j_at_start {
            (rj, ri, false, true)
        } else {
            continue;
        };

        let combined_travel =
            state.travel[ri] + state.travel[rj] + problem.travel(saving.i, saving.j);
        let combined_service = state.service[ri] + state.service[rj];
        if combined_service + combined_travel > problem.budget_minutes {
            continue;
        }

        state.apply(
            merge_from,
            merge_into,
            reverse_from,
            reverse_into,
            combined_travel,
            combined_service,
        );
    }

    // With no depot legs every merge adds travel, so positive savings can
    // dry up while the fleet is still too small. Keep joining the cheapest
    // endpoint pair until the routes fit the vehicle count.
    let vehicles = problem.vehicles.max(1) as usize;
    while state.live_routes() > vehicles {
        if !merge_cheapest_pair(problem, &mut state) {
            break;
        }
    }

    let mut routes: Vec<Vec<usize>> = state
        .members
        .into_iter()
        .filter(|m| !m.is_empty())
        .collect();

    // Still over the fleet size: keep the biggest routes, push the rest
    // back as unassigned — the multi-day loop picks them up later.
    if routes.len() > vehicles {
        routes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
        for dropped in routes.split_off(vehicles) {
            unassigned.extend(dropped);
        }
    }

    for route in &mut routes {
        two_opt(problem, route);
    }

    let mut day_routes: Vec<DayRoute> = routes
        .into_iter()
        .map(|stops| DayRoute::from_stops(problem, stops))
        .collect();
    normalize(&mut day_routes);
    unassigned.sort_unstable();

    debug!(
        routes = day_routes.len(),
        scheduled = day_routes.iter().map(|r| r.stops.len()).sum::<usize>(),
        unassigned = unassigned.len(),
        "savings construction complete"
    );

    DaySolution {
        routes: day_routes,
        unassigned,
    }
}

/// Merge the pair of routes with the smallest joining leg that still fits
/// budget and cap. Returns false when no legal merge remains.
fn merge_cheapest_pair(problem: &DayProblem, state: &mut Merge) -> bool {
    // (added travel, from, into, reverse_from, reverse_into, travel, service)
    let mut best: Option<(u32, usize, usize, bool, bool, u32, u32)> = None;

    let live: Vec<usize> = (0..state.members.len())
        .filter(|&r| !state.members[r].is_empty())
        .collect();

    for (x, &ra) in live.iter().enumerate() {
        for &rb in &live[x + 1..] {
            if state.members[ra].len() + state.members[rb].len() > problem.stop_cap {
                continue;
            }
            let a_head = state.members[ra][0];
            let a_tail = *state.members[ra].last().expect("non-empty route");
            let b_head = state.members[rb][0];
            let b_tail = *state.members[rb].last().expect("non-empty route");

            // Four endpoint orientations, expressed as (from, into, rev_from, rev_into)
            let options = [
                (problem.travel(a_tail, b_head), rb, ra, false, false),
                (problem.travel(b_tail, a_head), ra, rb, false, false),
                (problem.travel(a_tail, b_tail), rb, ra, true, false),
                (problem.travel(a_head, b_head), rb, ra, false, true),
            ];
            for (added, from, into, rev_from, rev_into) in options {
                let combined_travel = state.travel[ra] + state.travel[rb] + added;
                let combined_service = state.service[ra] + state.service[rb];
                if combined_service + combined_travel > problem.budget_minutes {
                    continue;
                }
                let candidate = (
                    added,
                    from,
                    into,
                    rev_from,
                    rev_into,
                    combined_travel,
                    combined_service,
                );
                let wins = match &best {
                    None => true,
                    Some(current) => {
                        (added, into, from) < (current.0, current.2, current.1)
                    }
                };
                if wins {
                    best = Some(candidate);
                }
            }
        }
    }

    match best {
        Some((_, from, into, rev_from, rev_into, travel, service)) => {
            state.apply(from, into, rev_from, rev_into, travel, service);
            true
        }
        None => false,
    }
}

/// Open-path 2-opt: reverse interior segments while travel decreases. Only
/// the two boundary legs change, so the delta is cheap to evaluate.
pub(super) fn two_opt(problem: &DayProblem, route: &mut [usize]) {
    let len = route.len();
    if len < 3 {
        return;
    }

    let mut improved = true;
    let mut rounds = 0;
    while improved && rounds < 100 {
        improved = false;
        rounds += 1;
        for i in 0..len - 1 {
            for j in (i + 1)..len {
                if i == 0 && j == len - 1 {
                    continue; // full reversal changes nothing
                }
                let mut before = 0i64;
                let mut after = 0i64;
                if i > 0 {
                    before += problem.travel(route[i - 1], route[i]) as i64;
                    after += problem.travel(route[i - 1], route[j]) as i64;
                }
                if j + 1 < len {
                    before += problem.travel(route[j], route[j + 1]) as i64;
                    after += problem.travel(route[i], route[j + 1]) as i64;
                }
                if after < before {
                    route[i..=j].reverse();
                    improved = true;
                }
            }
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

    #[test]
    fn empty_input_yields_empty_solution() {
        let sites: Vec<Site> = vec![];
        let matrix = matrix_for(&sites);
        let solution = solve_greedy(&problem(&sites, &matrix, 2, 480, 8));
        assert!(solution.routes.is_empty());
        assert!(solution.unassigned.is_empty());
    }

    #[test]
    fn single_site_single_route() {
        let sites = line_sites(1, 0.01);
        let matrix = matrix_for(&sites);
        let solution = solve_greedy(&problem(&sites, &matrix, 2, 480, 8));
        assert_eq!(solution.routes.len(), 1);
        assert_eq!(solution.routes[0].stops, vec![0]);
        assert_eq!(solution.routes[0].travel_minutes, 0);
        assert_eq!(solution.routes[0].service_minutes, 60);
    }

    #[test]
    fn nearby_sites_merge_into_one_route() {
        let sites = line_sites(4, 0.01); // ~0.7 miles apart
        let matrix = matrix_for(&sites);
        let solution = solve_greedy(&problem(&sites, &matrix, 3, 480, 8));
        assert_eq!(solution.routes.len(), 1);
        assert_eq!(solution.routes[0].stops.len(), 4);
        assert!(solution.unassigned.is_empty());
    }

    #[test]
    fn line_merge_visits_in_line_order() {
        let sites = line_sites(5, 0.02);
        let matrix = matrix_for(&sites);
        let solution = solve_greedy(&problem(&sites, &matrix, 1, 480, 8));
        assert_eq!(solution.routes.len(), 1);
        // On a line the optimal open tour is one sweep end to end
        assert_eq!(solution.routes[0].stops, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stop_cap_splits_routes() {
        let sites = line_sites(10, 0.005);
        let matrix = matrix_for(&sites);
        let solution = solve_greedy(&problem(&sites, &matrix, 3, 480, 4));
        assert!(solution.unassigned.is_empty());
        assert_eq!(solution.routes.len(), 3);
        for route in &solution.routes {
            assert!(route.stops.len() <= 4);
        }
    }

    #[test]
    fn budget_respected_on_every_route() {
        let sites = line_sites(8, 0.05);
        let matrix = matrix_for(&sites);
        let budget = 200;
        let solution = solve_greedy(&problem(&sites, &matrix, 8, budget, 8));
        for route in &solution.routes {
            assert!(route.route_minutes() <= budget);
        }
        // Everything fits because single-site routes always do here
        assert!(solution.unassigned.is_empty());
    }

    #[test]
    fn oversized_service_is_reported_unassigned() {
        let mut sites = line_sites(3, 0.01);
        sites[1].service_minutes = Some(500);
        let matrix = matrix_for(&sites);
        let solution = solve_greedy(&problem(&sites, &matrix, 2, 480, 8));
        assert_eq!(solution.unassigned, vec![1]);
        assert_eq!(solution.scheduled(), 2);
    }

    #[test]
    fn vehicle_cap_drops_smallest_routes() {
        // Two tight pairs far apart plus one lone site even farther
        let sites = vec![
            Site::new("a1", 30.00, -91.0),
            Site::new("a2", 30.01, -91.0),
            Site::new("b1", 32.00, -91.0),
            Site::new("b2", 32.01, -91.0),
            Site::new("c1", 35.00, -91.0),
        ];
        let matrix = matrix_for(&sites);
        let solution = solve_greedy(&problem(&sites, &matrix, 2, 300, 8));
        assert_eq!(solution.routes.len(), 2);
        assert_eq!(solution.unassigned, vec![4]);
    }

    #[test]
    fn deterministic_across_runs() {
        let sites = line_sites(12, 0.013);
        let matrix = matrix_for(&sites);
        let p = problem(&sites, &matrix, 3, 400, 6);
        let first = solve_greedy(&p);
        let second = solve_greedy(&p);
        assert_eq!(first, second);
    }

    #[test]
    fn two_opt_untangles_a_crossing() {
        let sites = line_sites(4, 0.05);
        let matrix = matrix_for(&sites);
        let p = problem(&sites, &matrix, 1, 480, 8);
        let mut route = vec![0, 2, 1, 3];
        let before = p.path_travel(&route);
        two_opt(&p, &mut route);
        let after = p.path_travel(&route);
        assert!(after < before);
        assert_eq!(route, vec![0, 1, 2, 3]);
    }
}
