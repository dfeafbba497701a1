//! File names of pipeline outputs inside an output directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PipelineLayout {
    root: PathBuf,
}

impl PipelineLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Unlabelled feature table written by `extract`
    pub fn features(&self) -> PathBuf {
        self.root.join("features.csv")
    }

    pub fn lakes(&self) -> PathBuf {
        self.root.join("lakes.geojson")
    }

    pub fn labelled(&self) -> PathBuf {
        self.root.join("labelled.csv")
    }

    pub fn review(&self) -> PathBuf {
        self.root.join("review.csv")
    }

    pub fn positive(&self) -> PathBuf {
        self.root.join("positive.csv")
    }

    pub fn negative(&self) -> PathBuf {
        self.root.join("negative.csv")
    }

    pub fn positive_imputed(&self) -> PathBuf {
        self.root.join("positive_imputed.csv")
    }

    pub fn negative_imputed(&self) -> PathBuf {
        self.root.join("negative_imputed.csv")
    }

    /// Labelled table with every gap filled
    pub fn imputed(&self) -> PathBuf {
        self.root.join("imputed.csv")
    }

    pub fn model(&self) -> PathBuf {
        self.root.join("model.json")
    }

    pub fn risk_csv(&self) -> PathBuf {
        self.root.join("risk.csv")
    }

    pub fn risk_geojson(&self) -> PathBuf {
        self.root.join("risk.geojson")
    }
}
