//! Data preparation for road and lane segmentation.
//!
//! - dataset indexing for the KITTI road and CARLA layouts
//! - paired image/label augmentation
//! - binary road and lane/vehicle label encoding
//! - shuffled per-epoch batch generation into `ndarray` arrays
//! - pretrained VGG download, train/validation splits and inference overlays

pub mod augment;
pub mod batch;
pub mod config;
pub mod data;
pub mod download;
pub mod error;
pub mod labels;
pub mod overlay;
pub mod split;
pub mod utils;

pub use augment::{ AugmentPipeline, Augmentation };
pub use batch::{ create_batch_generator, Batch, BatchGenerator, Batches };
pub use config::{ AugmentConfig, GeneratorConfig };
pub use data::{ Dataset, DatasetLayout, SampleKey };
pub use download::{ maybe_download_pretrained_vgg, PretrainedStatus };
pub use error::{ SegError, SegResult };
pub use labels::LabelEncoding;
pub use overlay::{ save_inference_samples, SegmentationModel };
pub use split::{ process_carla, split_data, SplitSummary };
