//! Interpolated AQI grid

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aqi::AqiCategory;
use crate::types::{BoundingBox, GeoPoint};

/// One cell of the dense grid, located at its center
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridCell {
    pub row: u32,
    pub col: u32,
    pub lat: f64,
    pub lon: f64,
    /// `None` when too few stations are within the search radius
    pub interpolated_aqi: Option<f64>,
    /// 0 when the value is undefined, 1 on top of a station
    pub confidence: f64,
    /// Stations that contributed to the value
    pub station_count: u32,
}

impl GridCell {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// A computed grid for one region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub region: BoundingBox,
    pub resolution_deg: f64,
    pub rows: u32,
    pub cols: u32,
    /// Increments every time the region is recomputed
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    pub cells: Vec<GridCell>,
}

impl GridSnapshot {
    pub fn cell(&self, row: u32, col: u32) -> Option<&GridCell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get((row * self.cols + col) as usize)
    }

    /// Cells that carry a value
    pub fn valued_cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.iter().filter(|c| c.interpolated_aqi.is_some())
    }

    pub fn center(&self) -> GeoPoint {
        self.region.center()
    }
}

/// Street-level AQI estimate at a single point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationAqi {
    pub location: GeoPoint,
    pub aqi: f64,
    pub category: AqiCategory,
    pub confidence: f64,
    pub station_count: u32,
    /// Reported by the nearest station that measures temperature
    pub temperature: Option<f64>,
    pub timestamp: DateTime<Utc>,
}
