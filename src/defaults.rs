use chrono::NaiveTime;

/// Per-crew per-day cap on driving + service time, in minutes.
pub const DEFAULT_MAX_ROUTE_MINUTES: u32 = 480;

/// Service time assumed for sites that do not carry their own value.
pub const DEFAULT_SERVICE_MINUTES: u32 = 60;

/// Hard upper bound on stops per route per day.
pub const DEFAULT_MAX_SITES_PER_CREW: usize = 8;

/// Earth radius in miles (mean radius).
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Road distance coefficient (straight line to road).
pub const ROAD_COEFFICIENT: f64 = 1.3;

/// Average speed in mph for travel time estimation.
pub const AVERAGE_SPEED_MPH: f64 = 40.0;

/// Upper bound on cached travel-minute pairs across all requests.
pub const TRAVEL_CACHE_CAPACITY: usize = 100_000;

pub fn default_work_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).expect("valid static default work start")
}

pub fn default_work_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).expect("valid static default work end")
}
