//! Planning error taxonomy.
//!
//! The single-day solver never fails for infeasibility — it reports
//! unassigned sites. Errors here are the failures that escape the planning
//! loops: bad input, a broken travel oracle, a stalled multi-day schedule,
//! or a calendar that cannot be met within the crew-retry buffer.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    /// The request failed boundary validation.
    InvalidRequest { message: String },
    /// Internal solver failure, e.g. the travel oracle errored. Retryable.
    Solver { message: String },
    /// The multi-day loop scheduled nothing for too many consecutive work
    /// days; the constraints are too tight for the leftover sites.
    NoProgress {
        sites_remaining: usize,
        sites_scheduled_today: usize,
        unassigned: usize,
        consecutive_days: u32,
        crews: u32,
    },
    /// The calendar planner exhausted its crew-retry buffer.
    CalendarInfeasible {
        crews_from: u32,
        crews_to: u32,
        cause: Box<PlanError>,
    },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::InvalidRequest { message } => {
                write!(f, "invalid plan request: {}", message)
            }
            PlanError::Solver { message } => {
                write!(f, "solver failure: {}", message)
            }
            PlanError::NoProgress {
                sites_remaining,
                sites_scheduled_today,
                unassigned,
                consecutive_days,
                crews,
            } => write!(
                f,
                "no progress possible with {} crews after {} consecutive days: \
                 {} sites remaining, {} scheduled today, {} unassigned",
                crews, consecutive_days, sites_remaining, sites_scheduled_today, unassigned
            ),
            PlanError::CalendarInfeasible {
                crews_from,
                crews_to,
                cause,
            } => write!(
                f,
                "unable to plan within the fixed date range; tried {} to {} crews: {}",
                crews_from, crews_to, cause
            ),
        }
    }
}

impl std::error::Error for PlanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlanError::CalendarInfeasible { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl PlanError {
    /// Suggested relaxations for the caller to surface. Display only — the
    /// planner itself never acts on these.
    pub fn recommendations(&self) -> Vec<String> {
        match self {
            PlanError::InvalidRequest { .. } => vec![],
            PlanError::Solver { .. } => {
                vec!["retry the request; the failure is internal and transient".to_string()]
            }
            PlanError::NoProgress { crews, .. } => vec![
                "increase max_route_minutes".to_string(),
                "decrease service_minutes_per_site".to_string(),
                "disable fast mode for better optimization".to_string(),
                format!("increase the number of crews (current: {})", crews),
                "enable clustering to keep routes geographically local".to_string(),
            ],
            PlanError::CalendarInfeasible { crews_to, .. } => vec![
                "extend the date range".to_string(),
                "decrease service_minutes_per_site".to_string(),
                "increase max_route_minutes".to_string(),
                format!("allow more than {} crews", crews_to),
            ],
        }
    }
}

pub type PlanningResult<T> = std::result::Result<T, PlanError>;
