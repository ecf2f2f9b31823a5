//! Geographic clustering.
//!
//! Partitions sites into groups whose bounding diameter stays under a
//! configured cap, by agglomerative merging: start with one cluster per
//! site and repeatedly merge the pair whose combined diameter is smallest
//! and still legal. The one-site-per-cluster seed always satisfies the
//! bound, so partitioning cannot fail.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::services::geo;
use crate::types::{Coordinates, Site};

/// Recognized diameter presets, in miles. Arbitrary values are accepted by
/// [`partition`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiameterPreset {
    Tight,
    Medium,
    Normal,
    Loose,
}

impl DiameterPreset {
    pub fn miles(self) -> f64 {
        match self {
            DiameterPreset::Tight => 50.0,
            DiameterPreset::Medium => 75.0,
            DiameterPreset::Normal => 100.0,
            DiameterPreset::Loose => 150.0,
        }
    }
}

/// One geographic cluster over the input site slice.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Ids number clusters in decreasing size order, starting at 0
    pub id: u32,
    /// Indices into the input site slice
    pub members: Vec<usize>,
    pub centroid: Coordinates,
    pub diameter_miles: f64,
}

struct Merging {
    members: Vec<usize>,
    diameter: f64,
    lat_sum: f64,
    lon_sum: f64,
}

impl Merging {
    fn centroid(&self) -> Coordinates {
        let n = self.members.len() as f64;
        Coordinates {
            lat: self.lat_sum / n,
            lon: self.lon_sum / n,
        }
    }
}

/// Partition `sites` into clusters with bounding diameter ≤
/// `max_diameter_miles`.
pub fn partition(sites: &[Site], max_diameter_miles: f64) -> Vec<Cluster> {
    let n = sites.len();
    if n == 0 {
        return vec![];
    }

    let points: Vec<Coordinates> = sites.iter().map(|s| s.coordinates()).collect();
    let mut pairwise = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = geo::distance_miles(&points[i], &points[j]);
            pairwise[i][j] = d;
            pairwise[j][i] = d;
        }
    }

    let mut clusters: Vec<Merging> = (0..n)
        .map(|i| Merging {
            members: vec![i],
            diameter: 0.0,
            lat_sum: points[i].lat,
            lon_sum: points[i].lon,
        })
        .collect();

    loop {
        let mut best: Option<(usize, usize, f64, f64)> = None;
        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let merged = merged_diameter(&clusters[a], &clusters[b], &pairwise);
                if merged > max_diameter_miles {
                    continue;
                }
                let centroid_gap =
                    geo::distance_miles(&clusters[a].centroid(), &clusters[b].centroid());
                let candidate = (a, b, merged, centroid_gap);
                let wins = match best {
                    None => true,
                    Some((_, _, best_merged, best_gap)) => {
                        match merged.total_cmp(&best_merged) {
                            std::cmp::Ordering::Less => true,
                            std::cmp::Ordering::Greater => false,
                            std::cmp::Ordering::Equal => centroid_gap < best_gap,
                        }
                    }
                };
                if wins {
                    best = Some(candidate);
                }
            }
        }

        let Some((a, b, merged, _)) = best else { break };
        // a < b, so removing b leaves the keeper's slot untouched
        let absorbed = clusters.swap_remove(b);
        let keeper = &mut clusters[a];
        keeper.members.extend(absorbed.members);
        keeper.diameter = merged;
        keeper.lat_sum += absorbed.lat_sum;
        keeper.lon_sum += absorbed.lon_sum;
    }

    let mut ordered: Vec<Merging> = clusters;
    ordered.sort_by(|x, y| {
        y.members
            .len()
            .cmp(&x.members.len())
            .then_with(|| x.centroid().lat.total_cmp(&y.centroid().lat))
            .then_with(|| x.centroid().lon.total_cmp(&y.centroid().lon))
    });

    let result: Vec<Cluster> = ordered
        .into_iter()
        .enumerate()
        .map(|(id, c)| {
            let centroid = c.centroid();
            let mut members = c.members;
            members.sort_unstable();
            Cluster {
                id: id as u32,
                members,
                centroid,
                diameter_miles: c.diameter,
            }
        })
        .collect();

    debug!(
        clusters = result.len(),
        sites = n,
        max_diameter_miles, "clustering complete"
    );
    result
}

fn merged_diameter(a: &Merging, b: &Merging, pairwise: &[Vec<f64>]) -> f64 {
    let mut max = a.diameter.max(b.diameter);
    for &i in &a.members {
        for &j in &b.members {
            max = max.max(pairwise[i][j]);
        }
    }
    max
}

/// Copy of `sites` with `cluster_id` stamped from a fresh partition.
pub fn assign_cluster_ids(sites: &[Site], max_diameter_miles: f64) -> Vec<Site> {
    let clusters = partition(sites, max_diameter_miles);
    let mut assigned: Vec<Site> = sites.to_vec();
    for cluster in &clusters {
        for &member in &cluster.members {
            assigned[member].cluster_id = Some(cluster.id);
        }
    }
    assigned
}

/// Group already-clustered sites by their `cluster_id`. Sites without an id
/// are ignored; boundary validation rejects those before planning.
pub fn group_by_cluster(sites: &[Site]) -> BTreeMap<u32, Vec<Site>> {
    let mut groups: BTreeMap<u32, Vec<Site>> = BTreeMap::new();
    for site in sites {
        if let Some(cid) = site.cluster_id {
            groups.entry(cid).or_default().push(site.clone());
        }
    }
    groups
}

/// Crew-sufficiency summary for a clustered site set, for callers to show
/// before planning.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterCrewAdvice {
    pub cluster_count: usize,
    pub total_sites: usize,
    pub cluster_sizes: BTreeMap<u32, usize>,
    /// One crew per cluster keeps every cluster moving in parallel
    pub recommended_min_crews: usize,
    pub clusters_waiting: usize,
    /// Sites in the smallest clusters that would wait for a free crew
    pub waiting_sites_estimate: usize,
    pub warning: Option<String>,
}

pub fn crew_advice(sites: &[Site], requested_crews: u32) -> ClusterCrewAdvice {
    let groups = group_by_cluster(sites);
    let cluster_sizes: BTreeMap<u32, usize> =
        groups.iter().map(|(id, members)| (*id, members.len())).collect();
    let cluster_count = cluster_sizes.len();
    let total_sites: usize = cluster_sizes.values().sum();

    if requested_crews as usize >= cluster_count {
        return ClusterCrewAdvice {
            cluster_count,
            total_sites,
            cluster_sizes,
            recommended_min_crews: cluster_count,
            clusters_waiting: 0,
            waiting_sites_estimate: 0,
            warning: None,
        };
    }

    let clusters_waiting = cluster_count - requested_crews as usize;
    let mut sizes: Vec<usize> = cluster_sizes.values().copied().collect();
    sizes.sort_unstable();
    let waiting_sites_estimate: usize = sizes.iter().take(clusters_waiting).sum();

    let warning = Some(format!(
        "{} crews across {} clusters: about {} cluster(s) with ~{} site(s) \
         will wait for a crew to free up; planning covers them on later days",
        requested_crews, cluster_count, clusters_waiting, waiting_sites_estimate
    ));

    ClusterCrewAdvice {
        cluster_count,
        total_sites,
        cluster_sizes,
        recommended_min_crews: cluster_count,
        clusters_waiting,
        waiting_sites_estimate,
        warning,
    }
}
