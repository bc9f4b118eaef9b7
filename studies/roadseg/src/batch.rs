use log::{ debug, info, warn };
use ndarray::Array4;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::HashMap;
use std::path::{ Path, PathBuf };

use crate::augment::AugmentPipeline;
use crate::config::GeneratorConfig;
use crate::data::{ lookup_label, Dataset, SampleKey };
use crate::error::{ SegError, SegResult };
use crate::utils::images::load_image_and_resize;

/// Stacked samples: images `[n, H, W, 3]`, one-hot labels `[n, H, W, C]`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Array4<u8>,
    pub labels: Array4<u8>,
    pub keys: Vec<SampleKey>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.images.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Produces one shuffled epoch of batches per [`BatchGenerator::batches`] call.
#[derive(Debug, Clone)]
pub struct BatchGenerator {
    data_folder: PathBuf,
    config: GeneratorConfig,
    pipeline: AugmentPipeline,
}

/// Generator over `data_folder` with the default layout, encoding and augmentation.
pub fn create_batch_generator<P: AsRef<Path>>(
    data_folder: P,
    image_shape: (u32, u32),
    train: bool
) -> SegResult<BatchGenerator> {
    BatchGenerator::new(data_folder, GeneratorConfig::new(image_shape, train))
}

impl BatchGenerator {
    pub fn new<P: AsRef<Path>>(data_folder: P, config: GeneratorConfig) -> SegResult<Self> {
        config.validate()?;
        let pipeline = AugmentPipeline::new(config.augment.clone())?;
        if config.train {
            debug!("augmentation: {}", config.augment.describe());
        }
        Ok(Self {
            data_folder: data_folder.as_ref().to_path_buf(),
            config,
            pipeline,
        })
    }

    /// Re-indexes the data folder, shuffles it and returns the epoch's batches.
    pub fn batches(&self, batch_size: usize) -> SegResult<Batches<'_>> {
        if batch_size == 0 {
            return Err(SegError::InvalidConfig("batch size must be positive".to_string()));
        }
        let dataset = Dataset::new(&self.data_folder, self.config.layout)?;
        if dataset.is_empty() {
            warn!("no images under {}", self.data_folder.display());
        }
        let (mut image_paths, labels) = dataset.into_parts();
        image_paths.shuffle(&mut thread_rng());

        info!(
            "epoch over {}: {} samples, batch size {}",
            self.data_folder.display(),
            image_paths.len(),
            batch_size
        );

        Ok(Batches {
            generator: self,
            image_paths,
            labels,
            batch_size,
            cursor: 0,
            done: false,
        })
    }
}

/// Pull-based epoch iterator. The first error ends the epoch.
pub struct Batches<'a> {
    generator: &'a BatchGenerator,
    image_paths: Vec<PathBuf>,
    labels: HashMap<SampleKey, PathBuf>,
    batch_size: usize,
    cursor: usize,
    done: bool,
}

impl<'a> Batches<'a> {
    pub fn has_next(&self) -> bool {
        !self.done && self.cursor < self.image_paths.len()
    }

    /// Total number of samples in the epoch
    pub fn len(&self) -> usize {
        self.image_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty()
    }

    /// Number of batches based on the dataset size and batch size
    pub fn len_batch(&self) -> usize {
        self.image_paths.len().div_ceil(self.batch_size)
    }

    fn load_batch(&self, start: usize, end: usize) -> SegResult<Batch> {
        let cfg = &self.generator.config;
        let (height, width) = cfg.image_shape;
        let (h, w) = (height as usize, width as usize);
        let classes = cfg.encoding.num_classes();
        let n = end - start;

        let mut images = Vec::with_capacity(n * h * w * 3);
        let mut labels = Vec::with_capacity(n * h * w * classes);
        let mut keys = Vec::with_capacity(n);
        let mut rng = thread_rng();

        for image_file in &self.image_paths[start..end] {
            let label_file = lookup_label(&self.labels, image_file)?;
            let (image, _) = load_image_and_resize(image_file, cfg.image_shape)?;
            let (label, (_, label_height)) = load_image_and_resize(label_file, cfg.image_shape)?;

            let (image, label) = if cfg.train {
                let aug = self.generator.pipeline.sample(&mut rng);
                (aug.apply_image(&image), aug.apply_label(&label))
            } else {
                (image, label)
            };

            let encoded = cfg.encoding.rescaled(label_height, height).encode(&label);
            images.extend_from_slice(image.as_raw());
            labels.extend(encoded.iter().copied());
            keys.push(SampleKey::for_image(image_file));
        }

        Ok(Batch {
            images: Array4::from_shape_vec((n, h, w, 3), images)?,
            labels: Array4::from_shape_vec((n, h, w, classes), labels)?,
            keys,
        })
    }
}

impl<'a> Iterator for Batches<'a> {
    type Item = SegResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        let start = self.cursor;
        let end = (start + self.batch_size).min(self.image_paths.len());
        let result = self.load_batch(start, end);
        self.cursor = end;
        match &result {
            Ok(batch) => debug!("batch {}..{} ({} samples)", start, end, batch.len()),
            Err(_) => {
                self.done = true;
            }
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if !self.has_next() {
            return (0, Some(0));
        }
        let remaining = (self.image_paths.len() - self.cursor).div_ceil(self.batch_size);
        (1, Some(remaining))
    }
}
