//! Per-pixel label encoders.
//!
//! Both encoders are pure functions of the label raster. The binary road
//! encoder tests each pixel against a sentinel background colour; the
//! lane/vehicle encoder maps one channel through a fixed table and drops
//! vehicle pixels at or below the ego-vehicle hood row.

use image::RgbImage;
use ndarray::{ Array2, Array3 };
use serde::{ Deserialize, Serialize };

/// Colour of "not road" pixels in KITTI road ground truth.
pub const ROAD_BACKGROUND: [u8; 3] = [255, 0, 0];

/// First row of the ego-vehicle hood on 600-row CARLA frames.
pub const CARLA_HOOD_ROW: u32 = 496;
pub const CARLA_SOURCE_HEIGHT: u32 = 600;

const LANE_MARKING_VALUES: [u8; 2] = [6, 7];
const VEHICLE_VALUE: u8 = 10;

pub const CLASS_BACKGROUND: u8 = 0;
pub const CLASS_LANE: u8 = 1;
pub const CLASS_VEHICLE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelEncoding {
    /// Two classes: `[is-background, is-not-background]`.
    BinaryRoad { background: [u8; 3] },
    /// Three classes read from `channel`; vehicle pixels in rows `>= hood_row` are background.
    LaneVehicle { channel: usize, hood_row: u32 },
}

impl LabelEncoding {
    pub fn road() -> Self {
        LabelEncoding::BinaryRoad { background: ROAD_BACKGROUND }
    }

    pub fn lane_vehicle() -> Self {
        LabelEncoding::LaneVehicle { channel: 0, hood_row: CARLA_HOOD_ROW }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            LabelEncoding::BinaryRoad { .. } => 2,
            LabelEncoding::LaneVehicle { .. } => 3,
        }
    }

    /// Moves the hood row from a `src_height` raster to a `dst_height` one.
    ///
    /// Nearest resize samples source row `floor((y + 0.5) * src / dst)` for
    /// destination row `y`, so the first hood row is the smallest `y` with
    /// `y >= hood_row * dst / src - 0.5`.
    pub fn rescaled(&self, src_height: u32, dst_height: u32) -> Self {
        match *self {
            LabelEncoding::LaneVehicle { channel, hood_row } if src_height > 0 => {
                let src = src_height as u64;
                let scaled = (2 * (hood_row as u64) * (dst_height as u64))
                    .saturating_sub(src)
                    .div_ceil(2 * src);
                LabelEncoding::LaneVehicle { channel, hood_row: scaled as u32 }
            }
            other => other,
        }
    }

    /// Class index per pixel, shape `[H, W]`.
    pub fn class_map(&self, label: &RgbImage) -> Array2<u8> {
        let (width, height) = label.dimensions();
        match *self {
            LabelEncoding::BinaryRoad { background } =>
                Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
                    let px = label.get_pixel(x as u32, y as u32);
                    if px.0 == background { 0 } else { 1 }
                }),
            LabelEncoding::LaneVehicle { channel, hood_row } =>
                Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
                    let value = label.get_pixel(x as u32, y as u32).0[channel.min(2)];
                    lane_vehicle_class(value, y as u32, hood_row)
                }),
        }
    }

    /// One-hot mask, shape `[H, W, C]`.
    pub fn encode(&self, label: &RgbImage) -> Array3<u8> {
        one_hot(&self.class_map(label), self.num_classes())
    }
}

impl Default for LabelEncoding {
    fn default() -> Self {
        LabelEncoding::road()
    }
}

/// Table lookup for the lane/vehicle convention. Vehicle pixels on the hood are background.
pub fn lane_vehicle_class(value: u8, row: u32, hood_row: u32) -> u8 {
    if LANE_MARKING_VALUES.contains(&value) {
        CLASS_LANE
    } else if value == VEHICLE_VALUE && row < hood_row {
        CLASS_VEHICLE
    } else {
        CLASS_BACKGROUND
    }
}

pub fn encode_binary_road(label: &RgbImage, background: [u8; 3]) -> Array3<u8> {
    LabelEncoding::BinaryRoad { background }.encode(label)
}

pub fn encode_lane_vehicle(label: &RgbImage, channel: usize, hood_row: u32) -> Array3<u8> {
    LabelEncoding::LaneVehicle { channel, hood_row }.encode(label)
}

fn one_hot(classes: &Array2<u8>, num_classes: usize) -> Array3<u8> {
    let (height, width) = classes.dim();
    Array3::from_shape_fn((height, width, num_classes), |(y, x, c)| {
        ((classes[[y, x]] as usize) == c) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::images::resize_to_shape;
    use image::Rgb;
    use ndarray::Axis;

    #[test]
    fn binary_background_is_channel_zero() {
        let mut label = RgbImage::from_pixel(4, 3, Rgb(ROAD_BACKGROUND));
        label.put_pixel(1, 1, Rgb([255, 0, 255]));
        label.put_pixel(2, 0, Rgb([0, 0, 0]));

        let mask = encode_binary_road(&label, ROAD_BACKGROUND);
        assert_eq!(mask.dim(), (3, 4, 2));
        assert_eq!(mask[[0, 0, 0]], 1);
        assert_eq!(mask[[0, 0, 1]], 0);
        assert_eq!(mask[[1, 1, 0]], 0);
        assert_eq!(mask[[1, 1, 1]], 1);
        assert_eq!(mask[[0, 2, 1]], 1);
    }

    #[test]
    fn binary_mask_is_one_hot_everywhere() {
        let label = RgbImage::from_fn(7, 5, |x, y| {
            if (x + y) % 3 == 0 { Rgb(ROAD_BACKGROUND) } else { Rgb([x as u8, y as u8, 9]) }
        });
        let mask = LabelEncoding::road().encode(&label);
        let sums = mask.map(|&v| v as u32).sum_axis(Axis(2));
        assert!(sums.iter().all(|&s| s == 1));
    }

    #[test]
    fn binary_ignores_hood_rows() {
        let label = RgbImage::from_pixel(2, 600, Rgb([0, 0, 0]));
        let mask = LabelEncoding::road().encode(&label);
        assert_eq!(mask[[599, 0, 1]], 1);
    }

    #[test]
    fn lane_vehicle_table() {
        assert_eq!(lane_vehicle_class(6, 10, CARLA_HOOD_ROW), CLASS_LANE);
        assert_eq!(lane_vehicle_class(7, 10, CARLA_HOOD_ROW), CLASS_LANE);
        assert_eq!(lane_vehicle_class(10, 10, CARLA_HOOD_ROW), CLASS_VEHICLE);
        assert_eq!(lane_vehicle_class(3, 10, CARLA_HOOD_ROW), CLASS_BACKGROUND);
        assert_eq!(lane_vehicle_class(10, 495, CARLA_HOOD_ROW), CLASS_VEHICLE);
        assert_eq!(lane_vehicle_class(10, 496, CARLA_HOOD_ROW), CLASS_BACKGROUND);
        assert_eq!(lane_vehicle_class(10, 599, CARLA_HOOD_ROW), CLASS_BACKGROUND);
    }

    #[test]
    fn lane_markings_survive_on_the_hood() {
        assert_eq!(lane_vehicle_class(6, 550, CARLA_HOOD_ROW), CLASS_LANE);
        assert_eq!(lane_vehicle_class(7, CARLA_HOOD_ROW, CARLA_HOOD_ROW), CLASS_LANE);
        assert_eq!(lane_vehicle_class(3, 550, CARLA_HOOD_ROW), CLASS_BACKGROUND);

        let mut label = RgbImage::from_pixel(2, 600, Rgb([0, 0, 0]));
        label.put_pixel(0, 550, Rgb([6, 0, 0]));
        label.put_pixel(1, 550, Rgb([10, 0, 0]));
        let classes = LabelEncoding::lane_vehicle().class_map(&label);
        assert_eq!(classes[[550, 0]], CLASS_LANE);
        assert_eq!(classes[[550, 1]], CLASS_BACKGROUND);
    }

    #[test]
    fn hood_override_wins_over_vehicle() {
        let mut label = RgbImage::from_pixel(3, 600, Rgb([0, 0, 0]));
        label.put_pixel(0, 100, Rgb([10, 0, 0]));
        label.put_pixel(1, 100, Rgb([6, 0, 0]));
        label.put_pixel(2, 100, Rgb([7, 0, 0]));
        label.put_pixel(0, 550, Rgb([10, 0, 0]));

        let enc = LabelEncoding::lane_vehicle();
        let classes = enc.class_map(&label);
        assert_eq!(classes[[100, 0]], CLASS_VEHICLE);
        assert_eq!(classes[[100, 1]], CLASS_LANE);
        assert_eq!(classes[[100, 2]], CLASS_LANE);
        assert_eq!(classes[[550, 0]], CLASS_BACKGROUND);

        let mask = enc.encode(&label);
        assert_eq!(mask.dim(), (600, 3, 3));
        assert_eq!(mask[[100, 0, 2]], 1);
        assert_eq!(mask[[550, 0, 0]], 1);
        assert_eq!(mask[[550, 0, 2]], 0);
    }

    #[test]
    fn lane_vehicle_reads_configured_channel() {
        let label = RgbImage::from_pixel(1, 1, Rgb([0, 10, 0]));
        let mask = encode_lane_vehicle(&label, 1, CARLA_HOOD_ROW);
        assert_eq!(mask[[0, 0, 2]], 1);
    }

    #[test]
    fn hood_row_follows_resize() {
        let enc = LabelEncoding::lane_vehicle().rescaled(CARLA_SOURCE_HEIGHT, 300);
        assert_eq!(enc, LabelEncoding::LaneVehicle { channel: 0, hood_row: 248 });
        assert_eq!(LabelEncoding::road().rescaled(600, 300), LabelEncoding::road());
        assert_eq!(
            LabelEncoding::lane_vehicle().rescaled(CARLA_SOURCE_HEIGHT, 160),
            LabelEncoding::LaneVehicle { channel: 0, hood_row: 132 }
        );
        assert_eq!(
            LabelEncoding::lane_vehicle().rescaled(CARLA_SOURCE_HEIGHT, CARLA_SOURCE_HEIGHT),
            LabelEncoding::lane_vehicle()
        );
    }

    #[test]
    fn rescaled_hood_matches_nearest_resize() {
        let hood_only = RgbImage::from_fn(4, CARLA_SOURCE_HEIGHT, |_, y| {
            if y >= CARLA_HOOD_ROW { Rgb([10, 0, 0]) } else { Rgb([0, 0, 0]) }
        });
        let above_hood = RgbImage::from_fn(4, CARLA_SOURCE_HEIGHT, |_, y| {
            if y < CARLA_HOOD_ROW { Rgb([10, 0, 0]) } else { Rgb([0, 0, 0]) }
        });

        for height in [160, 300, 37, 599] {
            let enc = LabelEncoding::lane_vehicle().rescaled(CARLA_SOURCE_HEIGHT, height);
            let LabelEncoding::LaneVehicle { hood_row, .. } = enc else {
                unreachable!();
            };

            let classes = enc.class_map(&resize_to_shape(&hood_only, (height, 4)));
            assert!(classes.iter().all(|&c| c == CLASS_BACKGROUND), "height {height}");

            let classes = enc.class_map(&resize_to_shape(&above_hood, (height, 4)));
            for (y, row) in classes.outer_iter().enumerate() {
                let expected = if (y as u32) < hood_row { CLASS_VEHICLE } else { CLASS_BACKGROUND };
                assert!(row.iter().all(|&c| c == expected), "height {height} row {y}");
            }
        }
    }
}
