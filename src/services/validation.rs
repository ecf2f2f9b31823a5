//! Boundary validation of plan requests.

use std::collections::HashSet;

use crate::error::{PlanError, PlanningResult};
use crate::types::PlanRequest;

fn invalid(message: impl Into<String>) -> PlanError {
    PlanError::InvalidRequest {
        message: message.into(),
    }
}

/// Validate a request before any planning work. Returns the first problem
/// found.
pub fn validate(request: &PlanRequest) -> PlanningResult<()> {
    if request.sites.is_empty() {
        return Err(invalid("no sites to plan"));
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(request.sites.len());
    for site in &request.sites {
        if site.id.is_empty() {
            return Err(invalid("site with empty id"));
        }
        if !seen.insert(site.id.as_str()) {
            return Err(invalid(format!("duplicate site id '{}'", site.id)));
        }
        if !(-90.0..=90.0).contains(&site.lat) {
            return Err(invalid(format!(
                "site '{}' latitude {} out of range",
                site.id, site.lat
            )));
        }
        if !(-180.0..=180.0).contains(&site.lon) {
            return Err(invalid(format!(
                "site '{}' longitude {} out of range",
                site.id, site.lon
            )));
        }
        if site.service_minutes == Some(0) {
            return Err(invalid(format!(
                "site '{}' has zero service minutes",
                site.id
            )));
        }
    }

    if request.team_config.teams == 0 {
        return Err(invalid("team count must be at least 1"));
    }
    if request.team_config.workday.end <= request.team_config.workday.start {
        return Err(invalid("workday end must be after workday start"));
    }
    if request.service_minutes_per_site == 0 {
        return Err(invalid("service_minutes_per_site must be positive"));
    }
    if request.max_route_minutes == 0 {
        return Err(invalid("max_route_minutes must be positive"));
    }
    if request.max_sites_per_crew_per_day == 0 {
        return Err(invalid("max_sites_per_crew_per_day must be positive"));
    }
    if request.effective_route_minutes() == 0 {
        return Err(invalid(
            "break time leaves no usable route budget within the workday",
        ));
    }

    if let Some(end) = request.end_date {
        let Some(start) = request.start_date else {
            return Err(invalid("end_date requires start_date"));
        };
        if end < start {
            return Err(invalid("end_date is before start_date"));
        }
    }

    if request.use_clusters {
        for site in &request.sites {
            if site.cluster_id.is_none() {
                return Err(invalid(format!(
                    "use_clusters is set but site '{}' has no cluster_id",
                    site.id
                )));
            }
        }
    }

    Ok(())
}
