//! Pollution hotspots

use serde::{Deserialize, Serialize};

use crate::aqi::AqiCategory;
use crate::types::GeoPoint;

/// Grid coordinates of a cell
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellIndex {
    pub row: u32,
    pub col: u32,
}

/// A contiguous cluster of grid cells at or above the severity threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hotspot {
    pub id: String,
    /// AQI-weighted mean position of the member cells
    pub centroid: GeoPoint,
    pub peak_aqi: f64,
    pub member_count: usize,
    pub category: AqiCategory,
    #[serde(skip)]
    pub members: Vec<CellIndex>,
}
