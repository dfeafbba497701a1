pub mod catalogue;
pub mod lake;
pub mod raster;
pub mod record;
pub mod training;

pub use catalogue::{Adjudication, CatalogueEntry, ReviewItem};
pub use lake::{CompositeWindow, GlacierPolygon, LakePolygon, LakeStatus, LakeType};
pub use raster::{Band, GridSpec, MaskCell, RasterScene, TemporalComposite, WaterMask};
pub use record::{LakeRecord, RecordKey, FEATURE_COLUMNS, IDENTITY_COLUMNS};
pub use training::{ModelKind, SelectionMetric};
