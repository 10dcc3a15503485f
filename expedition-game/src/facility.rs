//! Read-only facility configuration.
use serde::{Deserialize, Serialize};

/// An expedition location on an island.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub facility_id: String,
    pub island_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cost: u64,
    #[serde(rename = "level_range", default = "Facility::default_level_range")]
    pub level_range: [u32; 2],
}

impl Facility {
    const fn default_level_range() -> [u32; 2] {
        [1, u32::MAX]
    }
}

/// Facilities known to the client, as supplied by external configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FacilityCatalog {
    pub facilities: Vec<Facility>,
}

impl FacilityCatalog {
    #[must_use]
    pub fn from_facilities(facilities: Vec<Facility>) -> Self {
        Self { facilities }
    }

    /// Load a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Look up a facility on a specific island.
    #[must_use]
    pub fn find(&self, island_id: &str, facility_id: &str) -> Option<&Facility> {
        self.facilities
            .iter()
            .find(|f| f.facility_id == facility_id && f.island_id == island_id)
    }
}
