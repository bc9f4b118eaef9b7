use image::RgbImage;
use log::info;
use ndarray::{ Array2, ArrayView2, ErrorKind, ShapeError };
use std::fs;
use std::path::{ Path, PathBuf };
use std::time::{ SystemTime, UNIX_EPOCH };

use crate::data::{ file_name, get_pngs_in_folder };
use crate::error::{ SegError, SegResult };
use crate::utils::images::{ load_image_and_resize, save_image };

/// Translucent green painted over predicted road pixels (RGBA).
pub const OVERLAY_COLOR: [u8; 4] = [0, 255, 0, 127];
pub const SCORE_THRESHOLD: f32 = 0.5;

/// Anything that scores an image per pixel.
pub trait SegmentationModel {
    /// Probability of the positive class for each pixel, shape `[H, W]`.
    fn predict(&mut self, image: &RgbImage) -> SegResult<Array2<f32>>;
}

/// Alpha-blends [`OVERLAY_COLOR`] wherever `scores > threshold`.
pub fn overlay_segmentation(
    image: &RgbImage,
    scores: ArrayView2<f32>,
    threshold: f32
) -> SegResult<RgbImage> {
    let (width, height) = image.dimensions();
    if scores.dim() != (height as usize, width as usize) {
        return Err(SegError::Shape(ShapeError::from_kind(ErrorKind::IncompatibleShape)));
    }

    let alpha = OVERLAY_COLOR[3] as u32;
    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if scores[[y as usize, x as usize]] <= threshold {
            continue;
        }
        for c in 0..3 {
            let blended = (pixel[c] as u32) * (255 - alpha) + (OVERLAY_COLOR[c] as u32) * alpha;
            pixel[c] = ((blended + 127) / 255) as u8;
        }
    }
    Ok(out)
}

/// Runs `model` over `<data_folder>/image_2/*.png` and yields `(file name, overlay)`.
pub fn gen_test_output<'a, M: SegmentationModel + ?Sized>(
    model: &'a mut M,
    data_folder: &Path,
    image_shape: (u32, u32)
) -> SegResult<impl Iterator<Item = SegResult<(String, RgbImage)>> + 'a> {
    let image_paths = get_pngs_in_folder(&data_folder.join("image_2"))?;
    Ok(
        image_paths.into_iter().map(move |image_file| -> SegResult<(String, RgbImage)> {
            let (image, _) = load_image_and_resize(&image_file, image_shape)?;
            let scores = model.predict(&image)?;
            let street = overlay_segmentation(&image, scores.view(), SCORE_THRESHOLD)?;
            Ok((file_name(&image_file), street))
        })
    )
}

/// Writes overlays for `<data_dir>/data_road/testing` into a fresh
/// `<runs_dir>/<unix time>` folder and returns that folder.
pub fn save_inference_samples<M: SegmentationModel + ?Sized>(
    runs_dir: &Path,
    data_dir: &Path,
    model: &mut M,
    image_shape: (u32, u32)
) -> SegResult<PathBuf> {
    let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
    let output_dir = runs_dir.join(stamp.to_string());
    if output_dir.exists() {
        fs::remove_dir_all(&output_dir).map_err(|e| SegError::io(&output_dir, e))?;
    }
    fs::create_dir_all(&output_dir).map_err(|e| SegError::io(&output_dir, e))?;

    info!("Training Finished. Saving test images to: {}", output_dir.display());
    let testing = data_dir.join("data_road").join("testing");
    for output in gen_test_output(model, &testing, image_shape)? {
        let (name, image) = output?;
        save_image(&image, output_dir.join(name))?;
    }
    Ok(output_dir)
}
