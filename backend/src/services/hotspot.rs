//! Hotspot detection over an interpolated grid
//!
//! Cells at or above the threshold are grouped into 4-connected components.
//! Components smaller than `min_member_cells` are not reported.

use std::collections::{BTreeSet, HashMap, VecDeque};

use shared::{AqiCategory, CellIndex, GeoPoint, GridCell, Hotspot};

use crate::config::HotspotConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct HotspotDetector {
    config: HotspotConfig,
}

impl HotspotDetector {
    pub fn new(config: HotspotConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// Detect hotspots using the configured threshold
    pub fn detect(&self, cells: &[GridCell]) -> Vec<Hotspot> {
        detect_hotspots(cells, self.config.threshold, self.config.min_member_cells)
    }

    /// Detect hotspots with a caller-supplied threshold
    pub fn detect_with_threshold(&self, cells: &[GridCell], threshold: f64) -> AppResult<Vec<Hotspot>> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AppError::invalid(
                "threshold",
                "Threshold must be a non-negative number",
            ));
        }
        Ok(detect_hotspots(cells, threshold, self.config.min_member_cells))
    }
}

/// Group qualifying cells into hotspots, ordered by peak AQI descending,
/// then member count descending, then by centroid closer to the equator.
/// Ids are assigned after ordering. An empty result is not an error.
pub fn detect_hotspots(cells: &[GridCell], threshold: f64, min_member_cells: usize) -> Vec<Hotspot> {
    let qualifying: HashMap<CellIndex, &GridCell> = cells
        .iter()
        .filter(|c| c.interpolated_aqi.is_some_and(|aqi| aqi >= threshold))
        .map(|c| (CellIndex { row: c.row, col: c.col }, c))
        .collect();

    // Ordered seeds keep the traversal deterministic
    let mut unvisited: BTreeSet<CellIndex> = qualifying.keys().copied().collect();
    let mut components: Vec<Vec<CellIndex>> = Vec::new();

    while let Some(seed) = unvisited.pop_first() {
        let mut component = vec![seed];
        let mut queue = VecDeque::from([seed]);

        while let Some(current) = queue.pop_front() {
            for neighbor in neighbors(current) {
                if unvisited.remove(&neighbor) {
                    component.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }

        if component.len() >= min_member_cells.max(1) {
            component.sort();
            components.push(component);
        }
    }

    let mut hotspots: Vec<Hotspot> = components
        .into_iter()
        .map(|members| summarize(&members, &qualifying))
        .collect();

    hotspots.sort_by(|a, b| {
        b.peak_aqi
            .total_cmp(&a.peak_aqi)
            .then_with(|| b.member_count.cmp(&a.member_count))
            .then_with(|| a.centroid.lat.abs().total_cmp(&b.centroid.lat.abs()))
            .then_with(|| a.members.first().cmp(&b.members.first()))
    });

    assign_ids(&mut hotspots);
    hotspots
}

/// Number hotspots `hotspot_1..` in their current order
pub fn assign_ids(hotspots: &mut [Hotspot]) {
    for (i, hotspot) in hotspots.iter_mut().enumerate() {
        hotspot.id = format!("hotspot_{}", i + 1);
    }
}

fn neighbors(cell: CellIndex) -> impl Iterator<Item = CellIndex> {
    let CellIndex { row, col } = cell;
    [
        row.checked_sub(1).map(|r| CellIndex { row: r, col }),
        row.checked_add(1).map(|r| CellIndex { row: r, col }),
        col.checked_sub(1).map(|c| CellIndex { row, col: c }),
        col.checked_add(1).map(|c| CellIndex { row, col: c }),
    ]
    .into_iter()
    .flatten()
}

fn summarize(members: &[CellIndex], cells: &HashMap<CellIndex, &GridCell>) -> Hotspot {
    let mut peak = f64::NEG_INFINITY;
    let mut weight_sum = 0.0;
    let (mut lat_sum, mut lon_sum) = (0.0, 0.0);
    let (mut plain_lat, mut plain_lon) = (0.0, 0.0);

    for index in members {
        let cell = cells[index];
        let aqi = cell.interpolated_aqi.unwrap_or_default();
        peak = peak.max(aqi);
        weight_sum += aqi;
        lat_sum += aqi * cell.lat;
        lon_sum += aqi * cell.lon;
        plain_lat += cell.lat;
        plain_lon += cell.lon;
    }

    let n = members.len() as f64;
    let centroid = if weight_sum > 0.0 {
        GeoPoint::new(lat_sum / weight_sum, lon_sum / weight_sum)
    } else {
        GeoPoint::new(plain_lat / n, plain_lon / n)
    };

    Hotspot {
        id: String::new(),
        centroid,
        peak_aqi: peak,
        member_count: members.len(),
        category: AqiCategory::from_aqi(peak),
        members: members.to_vec(),
    }
}
