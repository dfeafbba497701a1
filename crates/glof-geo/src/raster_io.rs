//! Single-band TIFF reading.

use ndarray::Array2;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};

use glof_core::error::{GlofError, Result};

fn samples_to_f64(result: DecodingResult) -> Option<Vec<f64>> {
    let data = match result {
        DecodingResult::U8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F64(data) => data,
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(data)
}

/// Read the first image of a TIFF file as a `(rows, cols)` array
pub fn read_band<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let raster_err = |reason: String| GlofError::Raster { path: path.to_path_buf(), reason };

    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| raster_err(format!("failed to open decoder: {}", e)))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| raster_err(format!("failed to read dimensions: {}", e)))?;
    let image = decoder
        .read_image()
        .map_err(|e| raster_err(format!("failed to decode image: {}", e)))?;

    let data =
        samples_to_f64(image).ok_or_else(|| raster_err("unsupported sample format".to_string()))?;
    let (rows, cols) = (height as usize, width as usize);
    if data.len() != rows * cols {
        return Err(raster_err(format!(
            "expected a single band of {}x{} samples, got {}",
            rows,
            cols,
            data.len()
        )));
    }

    Array2::from_shape_vec((rows, cols), data).map_err(|e| raster_err(e.to_string()))
}
