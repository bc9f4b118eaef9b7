//! One-off train/validation splits of the raw datasets.
//!
//! Pairs are moved, not copied. The split is seeded so repeated runs over the
//! same listing assign the same files to validation.

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::{ Path, PathBuf };

use crate::data::{ file_name, Dataset, DatasetLayout };
use crate::error::{ SegError, SegResult };

pub const SPLIT_SEED: u64 = 42;
pub const VALID_FRACTION: f64 = 0.33;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSummary {
    pub train: usize,
    pub valid: usize,
}

/// Shuffles `items` with `seed` and holds out `ceil(test_fraction * n)` of them.
pub fn train_test_split<T>(mut items: Vec<T>, test_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let n = items.len();
    let n_test = ((test_fraction * (n as f64)).ceil() as usize).min(n);
    items.shuffle(&mut StdRng::seed_from_u64(seed));
    let test = items.split_off(n - n_test);
    (items, test)
}

/// Moves `<base>/training` aside to `<base>/full_training` and splits it into
/// `<base>/training` and `<base>/valid`.
///
/// Every image must have a label; otherwise nothing is moved, not even `training`.
pub fn split_data(base_dir: &Path) -> SegResult<SplitSummary> {
    let training = base_dir.join("training");
    let pairs = labelled_pairs(&Dataset::new(&training, DatasetLayout::KittiRoad)?)?;

    let full = base_dir.join("full_training");
    fs::rename(&training, &full).map_err(|e| SegError::io(&training, e))?;
    let pairs = pairs
        .into_iter()
        .map(|(image, label)| (rebase(&image, &training, &full), rebase(&label, &training, &full)))
        .collect();

    split_pairs(pairs, DatasetLayout::KittiRoad, &full, base_dir)
}

/// Splits a CARLA capture folder into `<out_root>/training` and `<out_root>/valid`.
pub fn process_carla(base_dir: &Path, out_root: &Path) -> SegResult<SplitSummary> {
    let pairs = labelled_pairs(&Dataset::new(base_dir, DatasetLayout::Carla)?)?;
    split_pairs(pairs, DatasetLayout::Carla, base_dir, out_root)
}

fn labelled_pairs(dataset: &Dataset) -> SegResult<Vec<(PathBuf, PathBuf)>> {
    let mut pairs = Vec::with_capacity(dataset.len());
    for image in dataset.image_paths() {
        let label = dataset.label_for(image)?;
        pairs.push((image.clone(), label.to_path_buf()));
    }
    Ok(pairs)
}

fn rebase(path: &Path, from: &Path, to: &Path) -> PathBuf {
    match path.strip_prefix(from) {
        Ok(rel) => to.join(rel),
        Err(_) => path.to_path_buf(),
    }
}

fn split_pairs(
    pairs: Vec<(PathBuf, PathBuf)>,
    layout: DatasetLayout,
    source: &Path,
    out_root: &Path
) -> SegResult<SplitSummary> {
    let (train, valid) = train_test_split(pairs, VALID_FRACTION, SPLIT_SEED);
    let summary = SplitSummary { train: train.len(), valid: valid.len() };

    for (split, pairs) in [("training", train), ("valid", valid)] {
        let image_dir = out_root.join(split).join(layout.image_dir());
        let label_dir = out_root.join(split).join(layout.label_dir());
        fs::create_dir_all(&image_dir).map_err(|e| SegError::io(&image_dir, e))?;
        fs::create_dir_all(&label_dir).map_err(|e| SegError::io(&label_dir, e))?;
        for (image, label) in pairs {
            move_into(&image, &image_dir)?;
            move_into(&label, &label_dir)?;
        }
    }

    info!(
        "split {} into {} training / {} validation pairs",
        source.display(),
        summary.train,
        summary.valid
    );
    Ok(summary)
}

fn move_into(file: &Path, dir: &Path) -> SegResult<()> {
    let dest = dir.join(file_name(file));
    fs::rename(file, &dest).map_err(|e| SegError::io(file, e))
}
