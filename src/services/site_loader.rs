//! CSV site ingestion.
//!
//! Reads the upstream site file shapes: a plain file with at least
//! `site_id, lat, lon`, and a clustered variant that additionally requires
//! `cluster_id` on every row. Optional columns: `service_minutes`, `name`,
//! `street`, `city`, `state`, `zip`.

use std::io::Read;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::types::Site;

#[derive(Debug, Deserialize)]
struct SiteRow {
    site_id: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    service_minutes: Option<u32>,
    #[serde(default)]
    cluster_id: Option<u32>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    street: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    zip: Option<String>,
}

impl SiteRow {
    fn into_site(self) -> Site {
        Site {
            id: self.site_id,
            lat: self.lat,
            lon: self.lon,
            service_minutes: self.service_minutes,
            cluster_id: self.cluster_id,
            name: self.name,
            street: self.street,
            city: self.city,
            state: self.state,
            zip: self.zip,
        }
    }
}

/// Read a plain site CSV.
pub fn read_sites<R: Read>(reader: R) -> Result<Vec<Site>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut sites = Vec::new();
    for (index, row) in csv_reader.deserialize::<SiteRow>().enumerate() {
        // +2: one for the header, one for 1-based numbering
        let row = row.with_context(|| format!("site file row {}", index + 2))?;
        sites.push(row.into_site());
    }
    Ok(sites)
}

/// Read a clustered site CSV; every row must carry a `cluster_id`.
pub fn read_clustered_sites<R: Read>(reader: R) -> Result<Vec<Site>> {
    let sites = read_sites(reader)?;
    for site in &sites {
        if site.cluster_id.is_none() {
            bail!("clustered site file: site '{}' has no cluster_id", site.id);
        }
    }
    Ok(sites)
}
