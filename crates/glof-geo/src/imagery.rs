//! Scene preprocessing: QA masking, reflectance scaling, NDWI and thresholding.

use glof_core::error::{GlofError, Result};
use glof_core::models::{Band, MaskCell, RasterScene, WaterMask};
use ndarray::Zip;

/// Linear conversion from digital numbers to surface reflectance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectanceScale {
    pub gain: f64,
    pub offset: f64,
}

impl ReflectanceScale {
    /// Landsat Collection 2 Level-2 surface reflectance
    pub const LANDSAT_C2_L2: Self = Self { gain: 0.0000275, offset: -0.2 };

    pub fn new(gain: f64, offset: f64) -> Self {
        Self { gain, offset }
    }

    pub fn apply(&self, dn: f64) -> f64 {
        dn * self.gain + self.offset
    }
}

impl Default for ReflectanceScale {
    fn default() -> Self {
        Self::LANDSAT_C2_L2
    }
}

/// Bit mask over the QA band selecting contaminated pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QaMask {
    bits: u16,
}

impl QaMask {
    pub const FILL: u16 = 1 << 0;
    pub const DILATED_CLOUD: u16 = 1 << 1;
    pub const CLOUD: u16 = 1 << 3;
    pub const CLOUD_SHADOW: u16 = 1 << 4;
    pub const SNOW: u16 = 1 << 5;

    pub fn new(bits: u16) -> Self {
        Self { bits }
    }

    /// Landsat Collection 2 `QA_PIXEL`: fill, dilated cloud, cloud, shadow, snow/ice
    pub fn landsat_c2() -> Self {
        Self::new(Self::FILL | Self::DILATED_CLOUD | Self::CLOUD | Self::CLOUD_SHADOW | Self::SNOW)
    }

    /// Whether a QA value flags the pixel for exclusion.
    ///
    /// Values that are not valid 16-bit integers are treated as contaminated.
    pub fn is_contaminated(&self, qa: f64) -> bool {
        if !qa.is_finite() || qa < 0.0 || qa > u16::MAX as f64 || qa.fract() != 0.0 {
            return true;
        }
        (qa as u16) & self.bits != 0
    }
}

impl Default for QaMask {
    fn default() -> Self {
        Self::landsat_c2()
    }
}

/// Options for turning a scene into a water mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    pub scale: ReflectanceScale,
    pub qa_mask: QaMask,
    pub ndwi_threshold: f64,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            scale: ReflectanceScale::default(),
            qa_mask: QaMask::default(),
            ndwi_threshold: 0.30,
        }
    }
}

/// Normalized Difference Water Index on reflectance.
///
/// Undefined (`None`) when `green + nir == 0` or the ratio is not finite.
pub fn ndwi(green: f64, nir: f64) -> Option<f64> {
    let sum = green + nir;
    if sum == 0.0 {
        return None;
    }
    let value = (green - nir) / sum;
    value.is_finite().then_some(value)
}

/// Classify a single pixel from raw digital numbers
pub fn classify_pixel(green_dn: f64, nir_dn: f64, qa: f64, options: &PreprocessOptions) -> MaskCell {
    if options.qa_mask.is_contaminated(qa) {
        return MaskCell::Masked;
    }
    let green = options.scale.apply(green_dn);
    let nir = options.scale.apply(nir_dn);
    match ndwi(green, nir) {
        None => MaskCell::Masked,
        Some(index) if index >= options.ndwi_threshold => MaskCell::Water,
        Some(_) => MaskCell::Dry,
    }
}

/// Produce the water mask of one scene.
///
/// Fails with `MissingBand` when a required band is absent. A scene whose
/// pixels are all masked yields a mask without water, not an error.
pub fn preprocess(scene: &RasterScene, options: &PreprocessOptions) -> Result<WaterMask> {
    scene.grid.validate()?;
    let green = scene.band(Band::Green)?;
    let nir = scene.band(Band::Nir)?;
    let qa = scene.band(Band::Qa)?;

    for (band, data) in [(Band::Nir, nir), (Band::Qa, qa)] {
        if data.dim() != green.dim() {
            return Err(GlofError::ShapeMismatch {
                scene: scene.id.clone(),
                reason: format!(
                    "{} band is {:?} but green band is {:?}",
                    band.name(),
                    data.dim(),
                    green.dim()
                ),
            });
        }
    }

    let cells = Zip::from(green)
        .and(nir)
        .and(qa)
        .map_collect(|&g, &n, &q| classify_pixel(g, n, q, options));

    let mask = WaterMask {
        scene_id: scene.id.clone(),
        lake_id: scene.lake_id.clone(),
        year: scene.year(),
        grid: scene.grid,
        cells,
    };

    tracing::debug!(
        scene = %scene.id,
        water = mask.water_count(),
        masked = mask.masked_count(),
        total = mask.cells.len(),
        "Preprocessed scene"
    );

    Ok(mask)
}
