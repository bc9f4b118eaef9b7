use serde::{ Deserialize, Serialize };
use std::fs;
use std::path::Path;

use crate::data::DatasetLayout;
use crate::error::{ SegError, SegResult };
use crate::labels::LabelEncoding;

/// Options for the paired augmentation pipeline.
///
/// Ranges are inclusive `(low, high)` pairs sampled uniformly. Crop and
/// translation are fractions of the raster dimension, rotation is in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub flip_prob: f32,
    pub crop_pct_range: (f32, f32),
    pub contrast_range: (f32, f32),
    pub scale_range: (f32, f32),
    pub translate_range: (f32, f32),
    pub rotation_range: (f32, f32),
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            flip_prob: 0.5,
            crop_pct_range: (0.0, 0.1),
            contrast_range: (0.75, 1.5),
            scale_range: (0.8, 1.2),
            translate_range: (-0.2, 0.2),
            rotation_range: (-15.0, 15.0),
        }
    }
}

impl AugmentConfig {
    pub fn validate(&self) -> SegResult<()> {
        if !(0.0..=1.0).contains(&self.flip_prob) {
            return Err(
                SegError::InvalidConfig(format!("flip_prob {} outside [0, 1]", self.flip_prob))
            );
        }
        check_range("crop_pct_range", self.crop_pct_range)?;
        check_range("contrast_range", self.contrast_range)?;
        check_range("scale_range", self.scale_range)?;
        check_range("translate_range", self.translate_range)?;
        check_range("rotation_range", self.rotation_range)?;
        if self.crop_pct_range.0 < 0.0 || self.crop_pct_range.1 >= 0.5 {
            return Err(
                SegError::InvalidConfig(
                    format!("crop_pct_range {:?} must lie in [0, 0.5)", self.crop_pct_range)
                )
            );
        }
        if self.contrast_range.0 <= 0.0 || self.scale_range.0 <= 0.0 {
            return Err(
                SegError::InvalidConfig("contrast and scale factors must be positive".to_string())
            );
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        format!(
            "flip_p={:.2} crop=[{:.2},{:.2}] contrast=[{:.2},{:.2}] scale=[{:.2},{:.2}] translate=[{:.2},{:.2}] rotate=[{:.1},{:.1}]",
            self.flip_prob,
            self.crop_pct_range.0,
            self.crop_pct_range.1,
            self.contrast_range.0,
            self.contrast_range.1,
            self.scale_range.0,
            self.scale_range.1,
            self.translate_range.0,
            self.translate_range.1,
            self.rotation_range.0,
            self.rotation_range.1
        )
    }
}

fn check_range(name: &str, (low, high): (f32, f32)) -> SegResult<()> {
    if !low.is_finite() || !high.is_finite() || low > high {
        return Err(SegError::InvalidConfig(format!("{} ({}, {}) is not ordered", name, low, high)));
    }
    Ok(())
}

/// Everything the batch generator needs besides the data folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Target raster shape as (height, width).
    pub image_shape: (u32, u32),
    pub layout: DatasetLayout,
    pub encoding: LabelEncoding,
    /// Augment samples; off for validation and inference.
    pub train: bool,
    pub augment: AugmentConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            image_shape: (160, 576),
            layout: DatasetLayout::KittiRoad,
            encoding: LabelEncoding::road(),
            train: true,
            augment: AugmentConfig::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn new(image_shape: (u32, u32), train: bool) -> Self {
        Self {
            image_shape,
            train,
            ..Self::default()
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SegResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| SegError::io(path, e))?;
        let cfg: GeneratorConfig = serde_json
            ::from_str(&raw)
            .map_err(|source| SegError::Config { path: path.to_path_buf(), source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SegResult<()> {
        let (h, w) = self.image_shape;
        if h == 0 || w == 0 {
            return Err(SegError::InvalidConfig(format!("image_shape {:?} has a zero side", (h, w))));
        }
        self.augment.validate()
    }
}
