//! GLOF Geo - Imagery, geometry and feature extraction
//!
//! This crate turns raw scenes and reference layers into lake records:
//! water masks, temporal composites, lake polygons, glacier joins, DEM
//! sampling, expansion rates and catalogue labels.

pub mod composite;
pub mod dem;
pub mod features;
pub mod glaciers;
pub mod imagery;
pub mod labels;
pub mod manifest;
pub mod pipeline;
pub mod raster_io;
pub mod spatial;
pub mod vectorize;
