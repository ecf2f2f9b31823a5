//! Site types

use serde::{Deserialize, Serialize};

/// Geographic coordinates (WGS-84 degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// A geocoded service location to visit exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Stable key, unique within a request
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// Per-site service time; falls back to the request-level default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_minutes: Option<u32>,
    /// Geographic cluster assignment, when clustering has run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

impl Site {
    /// Bare site with only the required fields set.
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lon,
            service_minutes: None,
            cluster_id: None,
            name: None,
            street: None,
            city: None,
            state: None,
            zip: None,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lon: self.lon,
        }
    }

    /// Service time for this site, falling back to the request default.
    pub fn service_or(&self, default_minutes: u32) -> u32 {
        self.service_minutes.unwrap_or(default_minutes)
    }
}
