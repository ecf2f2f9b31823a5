//! Travel-time oracle and matrices.
//!
//! The planner depends on a single oracle per invocation. The built-in
//! estimator derives minutes from straight-line distance; an external
//! routing matrix can be plugged in behind the same trait. Oracles must be
//! symmetric: `travel(a, b) == travel(b, a)`.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use crate::defaults::{AVERAGE_SPEED_MPH, ROAD_COEFFICIENT, TRAVEL_CACHE_CAPACITY};
use crate::services::geo;
use crate::types::Coordinates;

/// Travel-minute matrix between a day's locations.
/// Index 0 is the virtual hub (centroid); site `i` lives at index `i + 1`.
#[derive(Debug, Clone)]
pub struct TravelMatrix {
    minutes: Vec<Vec<u32>>,
    pub size: usize,
}

impl TravelMatrix {
    pub fn empty() -> Self {
        Self {
            minutes: vec![],
            size: 0,
        }
    }

    pub fn from_rows(minutes: Vec<Vec<u32>>) -> Self {
        let size = minutes.len();
        Self { minutes, size }
    }

    /// Travel minutes from location `from` to location `to`.
    pub fn minutes(&self, from: usize, to: usize) -> u32 {
        self.minutes[from][to]
    }
}

/// Travel-time oracle trait: one instance serves a whole planning call.
pub trait TravelTimeOracle: Send + Sync {
    /// Travel minutes between two points. Must be symmetric and return 0
    /// for identical coordinates.
    fn travel_minutes(&self, from: &Coordinates, to: &Coordinates) -> Result<u32>;

    /// Full travel matrix over `points`. The default builds it pairwise.
    fn matrix(&self, points: &[Coordinates]) -> Result<TravelMatrix> {
        let n = points.len();
        let mut rows = vec![vec![0u32; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let t = self.travel_minutes(&points[i], &points[j])?;
                rows[i][j] = t;
                rows[j][i] = t;
            }
        }
        Ok(TravelMatrix::from_rows(rows))
    }

    /// Oracle name for logging
    fn name(&self) -> &str;
}

/// Straight-line travel estimator: haversine miles × road coefficient at a
/// fixed average speed.
pub struct EstimatedTravel {
    road_coefficient: f64,
    average_speed_mph: f64,
}

impl Default for EstimatedTravel {
    fn default() -> Self {
        Self {
            road_coefficient: ROAD_COEFFICIENT,
            average_speed_mph: AVERAGE_SPEED_MPH,
        }
    }
}

impl EstimatedTravel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(road_coefficient: f64, average_speed_mph: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_mph,
        }
    }
}

impl TravelTimeOracle for EstimatedTravel {
    fn travel_minutes(&self, from: &Coordinates, to: &Coordinates) -> Result<u32> {
        let road = geo::distance_miles(from, to) * self.road_coefficient;
        Ok(((road / self.average_speed_mph) * 60.0).round() as u32)
    }

    fn name(&self) -> &str {
        "estimated"
    }
}

const CACHE_SHARDS: usize = 8;

/// Coordinates quantized to ~0.1 m so they can key a hash map. The pair is
/// stored unordered — valid because oracles are symmetric.
type PairKey = ((i64, i64), (i64, i64));

fn quantize(p: &Coordinates) -> (i64, i64) {
    ((p.lat * 1e6).round() as i64, (p.lon * 1e6).round() as i64)
}

fn pair_key(a: &Coordinates, b: &Coordinates) -> PairKey {
    let (qa, qb) = (quantize(a), quantize(b));
    if qa <= qb {
        (qa, qb)
    } else {
        (qb, qa)
    }
}

#[derive(Debug)]
struct CacheShard {
    entries: HashMap<PairKey, CacheEntry>,
    tick: u64,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    minutes: u32,
    last_used: u64,
}

/// Oracle wrapper with a process-wide bounded pair cache.
///
/// Reads and writes take a per-shard lock; when a shard overflows its share
/// of the capacity, the least-recently-used half of its entries is evicted.
pub struct CachedOracle<O> {
    inner: O,
    shards: Arc<Vec<Mutex<CacheShard>>>,
    capacity_per_shard: usize,
}

impl<O: TravelTimeOracle> CachedOracle<O> {
    pub fn new(inner: O) -> Self {
        Self::with_capacity(inner, TRAVEL_CACHE_CAPACITY)
    }

    pub fn with_capacity(inner: O, capacity: usize) -> Self {
        let shards = (0..CACHE_SHARDS)
            .map(|_| {
                Mutex::new(CacheShard {
                    entries: HashMap::new(),
                    tick: 0,
                })
            })
            .collect();
        Self {
            inner,
            shards: Arc::new(shards),
            capacity_per_shard: (capacity / CACHE_SHARDS).max(1),
        }
    }

    fn shard_for(&self, key: &PairKey) -> &Mutex<CacheShard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % CACHE_SHARDS]
    }

    /// Cached pair count across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<O: TravelTimeOracle> TravelTimeOracle for CachedOracle<O> {
    fn travel_minutes(&self, from: &Coordinates, to: &Coordinates) -> Result<u32> {
        let key = pair_key(from, to);
        let shard = self.shard_for(&key);

        {
            let mut guard = shard.lock();
            guard.tick += 1;
            let tick = guard.tick;
            if let Some(entry) = guard.entries.get_mut(&key) {
                entry.last_used = tick;
                return Ok(entry.minutes);
            }
        }

        // Compute outside the lock; the oracle may block on I/O.
        let minutes = self.inner.travel_minutes(from, to)?;

        let mut guard = shard.lock();
        guard.tick += 1;
        let tick = guard.tick;
        guard.entries.insert(
            key,
            CacheEntry {
                minutes,
                last_used: tick,
            },
        );

        if guard.entries.len() > self.capacity_per_shard {
            let mut ages: Vec<u64> = guard.entries.values().map(|e| e.last_used).collect();
            ages.sort_unstable();
            let cutoff = ages[ages.len() / 2];
            guard.entries.retain(|_, e| e.last_used > cutoff);
        }

        Ok(minutes)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
