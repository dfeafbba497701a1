//! Temporal compositing of per-scene water masks.

use glof_core::error::{GlofError, Result};
use glof_core::models::{CompositeWindow, GridSpec, MaskCell, TemporalComposite, WaterMask};
use ndarray::Array2;
use std::collections::BTreeMap;

/// Median of a sample; `None` when empty
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// A mask viewed on the target grid by nearest pixel centre
struct AlignedMask<'a> {
    mask: &'a WaterMask,
    direct: bool,
}

impl<'a> AlignedMask<'a> {
    fn new(mask: &'a WaterMask, grid: &GridSpec, shape: (usize, usize)) -> Self {
        let direct = mask.grid.same_as(grid) && mask.cells.dim() == shape;
        Self { mask, direct }
    }

    fn cell(&self, grid: &GridSpec, row: usize, col: usize) -> MaskCell {
        if self.direct {
            return self.mask.cells[[row, col]];
        }
        let [lon, lat] = grid.pixel_center(row, col);
        match self.mask.grid.locate(lon, lat, self.mask.cells.dim()) {
            Some(index) => self.mask.cells[index],
            None => MaskCell::Masked,
        }
    }
}

/// Aggregate the masks falling inside `window` into one composite.
///
/// Masks from other years are ignored. The output grid is that of the first
/// in-window mask. Acquisitions of the same year are first reduced to one
/// yearly value per pixel (median of the unmasked ones); a pixel is water iff
/// the median of its yearly values is at least 0.5. Pixels masked in every
/// input stay masked.
pub fn composite(
    lake_id: &str,
    masks: &[WaterMask],
    window: &CompositeWindow,
) -> Result<TemporalComposite> {
    let selected: Vec<&WaterMask> = masks.iter().filter(|m| window.contains(m.year)).collect();

    let Some(first) = selected.first() else {
        return Err(GlofError::NoUsableAcquisitions {
            lake_id: lake_id.to_string(),
            year: window.reference_year,
        });
    };

    for mask in &selected {
        mask.grid.validate()?;
    }

    let grid = first.grid;
    let shape = first.cells.dim();
    let mut by_year: BTreeMap<i32, Vec<AlignedMask>> = BTreeMap::new();
    for mask in &selected {
        by_year.entry(mask.year).or_default().push(AlignedMask::new(mask, &grid, shape));
    }

    let mut acquisitions = Vec::new();
    let mut yearly = Vec::with_capacity(by_year.len());
    let cells = Array2::from_shape_fn(shape, |(row, col)| {
        yearly.clear();
        for masks in by_year.values() {
            acquisitions.clear();
            acquisitions.extend(masks.iter().filter_map(|m| m.cell(&grid, row, col).value()));
            yearly.extend(median(&mut acquisitions));
        }
        match median(&mut yearly) {
            None => MaskCell::Masked,
            Some(value) if value >= 0.5 => MaskCell::Water,
            Some(_) => MaskCell::Dry,
        }
    });

    let result = TemporalComposite {
        lake_id: lake_id.to_string(),
        reference_year: window.reference_year,
        window: *window,
        grid,
        cells,
        source_count: by_year.len(),
    };

    tracing::debug!(
        lake_id,
        year = window.reference_year,
        sources = result.source_count,
        water = result.water_count(),
        "Built temporal composite"
    );

    Ok(result)
}
