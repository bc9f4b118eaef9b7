use std::path::Path;

use image::{ self, imageops::FilterType, GenericImageView, RgbImage };

use crate::error::{ SegError, SegResult };

/// Decodes `path` as RGB and resizes it to `shape` (height, width).
///
/// Returns the resized raster together with the original (width, height).
pub fn load_image_and_resize<P: AsRef<Path>>(
    path: P,
    shape: (u32, u32)
) -> SegResult<(RgbImage, (u32, u32))> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|e| SegError::image(path, e))?;
    let original_size = img.dimensions();
    let img = img.to_rgb8();
    Ok((resize_to_shape(&img, shape), original_size))
}

/// Nearest-neighbour resize so label rasters keep their exact class colours.
pub fn resize_to_shape(img: &RgbImage, shape: (u32, u32)) -> RgbImage {
    let (height, width) = shape;
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    image::imageops::resize(img, width, height, FilterType::Nearest)
}

pub fn save_image<P: AsRef<Path>>(img: &RgbImage, path: P) -> SegResult<()> {
    let path = path.as_ref();
    img.save(path).map_err(|e| SegError::image(path, e))
}
