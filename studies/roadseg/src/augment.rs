//! Paired image/label augmentation.
//!
//! [`AugmentPipeline::sample`] draws one [`Augmentation`]: a step order plus
//! every random parameter. Replaying it through [`Augmentation::apply_image`]
//! and [`Augmentation::apply_label`] gives both rasters the same geometry.

use image::{ imageops::{ self, FilterType }, Rgb, RgbImage };
use imageproc::geometric_transformations::{ warp, Interpolation, Projection };
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::AugmentConfig;
use crate::error::SegResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AugmentStep {
    Flip,
    Crop,
    Contrast,
    Affine,
}

impl AugmentStep {
    /// Steps that move pixels and therefore also apply to the label.
    pub fn is_geometric(&self) -> bool {
        !matches!(self, AugmentStep::Contrast)
    }
}

const DEFAULT_ORDER: [AugmentStep; 4] = [
    AugmentStep::Flip,
    AugmentStep::Crop,
    AugmentStep::Contrast,
    AugmentStep::Affine,
];

/// Fraction of each side to remove before resizing back.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CropPct {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineParams {
    pub scale: (f32, f32),
    /// Fraction of width/height.
    pub translate: (f32, f32),
    pub rotation_deg: f32,
}

impl Default for AffineParams {
    fn default() -> Self {
        Self { scale: (1.0, 1.0), translate: (0.0, 0.0), rotation_deg: 0.0 }
    }
}

/// One drawn realization of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Augmentation {
    pub order: [AugmentStep; 4],
    pub flip: bool,
    pub crop: CropPct,
    pub contrast: f32,
    pub affine: AffineParams,
}

impl Augmentation {
    /// A realization that leaves both rasters unchanged.
    pub fn identity() -> Self {
        Self {
            order: DEFAULT_ORDER,
            flip: false,
            crop: CropPct::default(),
            contrast: 1.0,
            affine: AffineParams::default(),
        }
    }

    pub fn apply_image(&self, img: &RgbImage) -> RgbImage {
        self.apply(img, false)
    }

    /// Same geometry as [`Self::apply_image`], without photometric steps.
    pub fn apply_label(&self, label: &RgbImage) -> RgbImage {
        self.apply(label, true)
    }

    fn apply(&self, img: &RgbImage, geometric_only: bool) -> RgbImage {
        let mut out = img.clone();
        for step in self.order {
            if geometric_only && !step.is_geometric() {
                continue;
            }
            match step {
                AugmentStep::Flip => {
                    if self.flip {
                        imageops::flip_horizontal_in_place(&mut out);
                    }
                }
                AugmentStep::Crop => {
                    out = crop_and_restore(&out, self.crop);
                }
                AugmentStep::Contrast => {
                    adjust_contrast(&mut out, self.contrast);
                }
                AugmentStep::Affine => {
                    out = affine(&out, &self.affine);
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct AugmentPipeline {
    config: AugmentConfig,
}

impl AugmentPipeline {
    pub fn new(config: AugmentConfig) -> SegResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Augmentation {
        let cfg = &self.config;
        let mut order = DEFAULT_ORDER;
        order.shuffle(rng);

        Augmentation {
            order,
            flip: rng.gen_bool(cfg.flip_prob as f64),
            crop: CropPct {
                top: uniform(rng, cfg.crop_pct_range),
                right: uniform(rng, cfg.crop_pct_range),
                bottom: uniform(rng, cfg.crop_pct_range),
                left: uniform(rng, cfg.crop_pct_range),
            },
            contrast: uniform(rng, cfg.contrast_range),
            affine: AffineParams {
                scale: (uniform(rng, cfg.scale_range), uniform(rng, cfg.scale_range)),
                translate: (uniform(rng, cfg.translate_range), uniform(rng, cfg.translate_range)),
                rotation_deg: uniform(rng, cfg.rotation_range),
            },
        }
    }
}

impl Default for AugmentPipeline {
    fn default() -> Self {
        Self { config: AugmentConfig::default() }
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, (low, high): (f32, f32)) -> f32 {
    if low >= high {
        return low;
    }
    rng.gen_range(low..=high)
}

fn crop_and_restore(img: &RgbImage, crop: CropPct) -> RgbImage {
    let (w, h) = img.dimensions();
    let left = ((w as f32) * crop.left).round() as u32;
    let right = ((w as f32) * crop.right).round() as u32;
    let top = ((h as f32) * crop.top).round() as u32;
    let bottom = ((h as f32) * crop.bottom).round() as u32;
    if left + right == 0 && top + bottom == 0 {
        return img.clone();
    }
    let crop_w = w.saturating_sub(left + right).max(1);
    let crop_h = h.saturating_sub(top + bottom).max(1);
    let cropped = imageops::crop_imm(img, left.min(w - 1), top.min(h - 1), crop_w, crop_h).to_image();
    imageops::resize(&cropped, w, h, FilterType::Nearest)
}

/// Scales distance from mid-grey by `alpha`.
fn adjust_contrast(img: &mut RgbImage, alpha: f32) {
    if alpha == 1.0 {
        return;
    }
    for pixel in img.pixels_mut() {
        for c in 0..3 {
            let v = 128.0 + alpha * ((pixel[c] as f32) - 128.0);
            pixel[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Scale and rotate about the centre, then translate. Uncovered pixels become 0.
fn affine(img: &RgbImage, params: &AffineParams) -> RgbImage {
    if *params == AffineParams::default() {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let (cx, cy) = ((w as f32) / 2.0, (h as f32) / 2.0);
    let (tx, ty) = (params.translate.0 * (w as f32), params.translate.1 * (h as f32));
    let projection =
        Projection::translate(cx + tx, cy + ty) *
        Projection::rotate(params.rotation_deg.to_radians()) *
        Projection::scale(params.scale.0, params.scale.1) *
        Projection::translate(-cx, -cy);
    warp(img, &projection, Interpolation::Nearest, Rgb([0, 0, 0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8]))
    }

    #[test]
    fn identity_changes_nothing() {
        let img = gradient(16, 12);
        let aug = Augmentation::identity();
        assert_eq!(aug.apply_image(&img), img);
        assert_eq!(aug.apply_label(&img), img);
    }

    #[test]
    fn flip_moves_pixel_in_both_rasters() {
        let mut img = RgbImage::new(10, 4);
        img.put_pixel(2, 1, Rgb([255, 255, 255]));
        let aug = Augmentation { flip: true, ..Augmentation::identity() };

        let out_img = aug.apply_image(&img);
        let out_label = aug.apply_label(&img);
        assert_eq!(*out_img.get_pixel(7, 1), Rgb([255, 255, 255]));
        assert_eq!(out_img, out_label);
    }

    #[test]
    fn image_and_label_stay_congruent() {
        let cfg = AugmentConfig {
            contrast_range: (1.0, 1.0),
            ..AugmentConfig::default()
        };
        let pipeline = AugmentPipeline::new(cfg).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let raster = gradient(32, 24);
        for _ in 0..20 {
            let aug = pipeline.sample(&mut rng);
            assert_eq!(aug.apply_image(&raster), aug.apply_label(&raster));
        }
    }

    #[test]
    fn contrast_only_touches_image() {
        let label = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        let aug = Augmentation { contrast: 0.75, ..Augmentation::identity() };
        assert_eq!(aug.apply_label(&label), label);
        assert_eq!(*aug.apply_image(&label).get_pixel(0, 0), Rgb([223, 32, 32]));
    }

    #[test]
    fn samples_stay_within_configured_ranges() {
        let pipeline = AugmentPipeline::default();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let aug = pipeline.sample(&mut rng);
            for v in [aug.crop.top, aug.crop.right, aug.crop.bottom, aug.crop.left] {
                assert!((0.0..=0.1).contains(&v));
            }
            assert!((0.75..=1.5).contains(&aug.contrast));
            assert!((0.8..=1.2).contains(&aug.affine.scale.0));
            assert!((0.8..=1.2).contains(&aug.affine.scale.1));
            assert!((-0.2..=0.2).contains(&aug.affine.translate.0));
            assert!((-15.0..=15.0).contains(&aug.affine.rotation_deg));
            let mut steps = aug.order.to_vec();
            steps.sort_by_key(|s| *s as u8);
            assert_eq!(steps, DEFAULT_ORDER.to_vec());
        }
    }

    #[test]
    fn augmented_size_is_preserved() {
        let pipeline = AugmentPipeline::default();
        let mut rng = StdRng::seed_from_u64(3);
        let img = gradient(40, 20);
        let aug = pipeline.sample(&mut rng);
        assert_eq!(aug.apply_image(&img).dimensions(), (40, 20));
    }

    #[test]
    fn translation_fills_with_zero() {
        let img = RgbImage::from_pixel(10, 10, Rgb([9, 9, 9]));
        let aug = Augmentation {
            affine: AffineParams { translate: (0.5, 0.0), ..AffineParams::default() },
            ..Augmentation::identity()
        };
        let out = aug.apply_label(&img);
        assert_eq!(*out.get_pixel(0, 5), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(9, 5), Rgb([9, 9, 9]));
    }
}
