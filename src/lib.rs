//! fieldroute — route planning core for multi-site field service.
//!
//! Given geocoded service sites, a crew configuration, workday constraints
//! and a planning horizon, the planner assigns every site to a (crew, day)
//! pair while keeping per-day route time, service time and stop counts
//! inside their caps and travel between consecutive stops low.
//!
//! Two dual planning modes drive the per-day solver across the calendar:
//! fixed-crew (crew count given, compute the days needed) and
//! fixed-calendar (date range given, compute the crews needed). Clustered
//! sites additionally get sequential crew dispatch, where crews move to a
//! new cluster once their current one completes.
//!
//! The crate is a pure library: one [`Planner`] call is a pure function of
//! its request, the only shared state being the bounded travel-minute
//! cache behind the [`services::routing::TravelTimeOracle`] in use.

pub mod defaults;
pub mod error;
pub mod services;
pub mod types;

pub use error::{PlanError, PlanningResult};
pub use services::planner::{plan, Planner};
pub use types::{
    Coordinates, PlanRequest, PlanResult, Site, TeamConfig, TeamDay, TeamId, Workday,
};
