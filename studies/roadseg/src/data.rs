use log::debug;
use regex::Regex;
use serde::{ Deserialize, Serialize };
use std::collections::HashMap;
use std::fmt;
use std::fs::read_dir;
use std::path::{ Path, PathBuf };
use std::sync::OnceLock;

use crate::error::{ SegError, SegResult };

/// Directory conventions of the supported road datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetLayout {
    /// KITTI road: `image_2/*.png` with `gt_image_2/*_road_*.png` labels.
    KittiRoad,
    /// CARLA captures: `CameraRGB/*.png` with identically named `CameraSeg/*.png` labels.
    Carla,
}

impl DatasetLayout {
    pub fn image_dir(&self) -> &'static str {
        match self {
            DatasetLayout::KittiRoad => "image_2",
            DatasetLayout::Carla => "CameraRGB",
        }
    }

    pub fn label_dir(&self) -> &'static str {
        match self {
            DatasetLayout::KittiRoad => "gt_image_2",
            DatasetLayout::Carla => "CameraSeg",
        }
    }

    /// Whether a file in the label directory is a ground-truth label for this layout.
    pub fn is_label_name(&self, name: &str) -> bool {
        match self {
            DatasetLayout::KittiRoad => name.contains("_road_"),
            DatasetLayout::Carla => true,
        }
    }

    /// Key under which a label file is indexed.
    pub fn label_key(&self, label_name: &str) -> SampleKey {
        match self {
            DatasetLayout::KittiRoad =>
                SampleKey(label_infix().replace_all(label_name, "_").into_owned()),
            DatasetLayout::Carla => SampleKey(label_name.to_string()),
        }
    }
}

fn label_infix() -> &'static Regex {
    static INFIX: OnceLock<Regex> = OnceLock::new();
    INFIX.get_or_init(|| Regex::new(r"_(lane|road)_").expect("static regex"))
}

/// Normalized filename shared by an image and its label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleKey(String);

impl SampleKey {
    /// Key of an image file: its file name.
    pub fn for_image(path: &Path) -> SampleKey {
        SampleKey(file_name(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct Dataset {
    image_paths: Vec<PathBuf>,
    labels: HashMap<SampleKey, PathBuf>,
}

impl Dataset {
    /// Walks the image and label folders under `root` and indexes labels by key.
    ///
    /// Images without a label are kept; the lookup fails when the sample is consumed.
    pub fn new<T: AsRef<Path>>(root: T, layout: DatasetLayout) -> SegResult<Dataset> {
        let root = root.as_ref();

        let image_paths = get_pngs_in_folder(&root.join(layout.image_dir()))?;
        let mut labels = HashMap::new();
        for label_path in get_pngs_in_folder(&root.join(layout.label_dir()))? {
            let name = file_name(&label_path);
            if layout.is_label_name(&name) {
                labels.insert(layout.label_key(&name), label_path);
            }
        }

        debug!(
            "indexed {} images and {} labels under {}",
            image_paths.len(),
            labels.len(),
            root.display()
        );

        Ok(Dataset { image_paths, labels })
    }

    pub fn image_paths(&self) -> &[PathBuf] {
        &self.image_paths
    }

    pub fn into_parts(self) -> (Vec<PathBuf>, HashMap<SampleKey, PathBuf>) {
        (self.image_paths, self.labels)
    }

    pub fn len(&self) -> usize {
        self.image_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty()
    }

    pub fn label_for(&self, image: &Path) -> SegResult<&Path> {
        lookup_label(&self.labels, image)
    }
}

pub(crate) fn lookup_label<'a>(
    labels: &'a HashMap<SampleKey, PathBuf>,
    image: &Path
) -> SegResult<&'a Path> {
    let key = SampleKey::for_image(image);
    labels
        .get(&key)
        .map(PathBuf::as_path)
        .ok_or_else(|| SegError::SampleNotFound {
            image: image.to_path_buf(),
            key: key.0,
        })
}

/// Lists `*.png` files in `dir`, sorted by name.
pub(crate) fn get_pngs_in_folder(dir: &Path) -> SegResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in read_dir(dir).map_err(|e| SegError::io(dir, e))? {
        let path = entry.map_err(|e| SegError::io(dir, e))?.path();
        let is_png = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("png"))
            .unwrap_or(false);
        if path.is_file() && is_png {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn road_label_key_strips_infix() {
        let layout = DatasetLayout::KittiRoad;
        assert_eq!(layout.label_key("um_road_000012.png").as_str(), "um_000012.png");
        assert_eq!(layout.label_key("umm_lane_000003.png").as_str(), "umm_000003.png");
        assert!(layout.is_label_name("uu_road_000001.png"));
        assert!(!layout.is_label_name("um_lane_000001.png"));
    }

    #[test]
    fn road_label_key_strips_every_infix() {
        let layout = DatasetLayout::KittiRoad;
        assert_eq!(layout.label_key("a_lane_b_road_1.png").as_str(), "a_b_1.png");
        assert_eq!(layout.label_key("um_road_road_7.png").as_str(), "um_road_7.png");
    }

    #[test]
    fn carla_label_key_is_identity() {
        let layout = DatasetLayout::Carla;
        assert_eq!(layout.label_key("0042.png").as_str(), "0042.png");
    }

    #[test]
    fn indexes_only_road_labels() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("image_2/um_000000.png"));
        touch(&root.join("image_2/um_000001.png"));
        touch(&root.join("image_2/notes.txt"));
        touch(&root.join("gt_image_2/um_road_000000.png"));
        touch(&root.join("gt_image_2/um_lane_000000.png"));

        let dataset = Dataset::new(root, DatasetLayout::KittiRoad).unwrap();
        assert_eq!(dataset.len(), 2);

        let label = dataset.label_for(&root.join("image_2/um_000000.png")).unwrap();
        assert_eq!(label, root.join("gt_image_2/um_road_000000.png"));
        let (_, labels) = dataset.into_parts();
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn missing_label_is_reported_on_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("image_2/um_000001.png"));
        fs::create_dir_all(root.join("gt_image_2")).unwrap();

        let dataset = Dataset::new(root, DatasetLayout::KittiRoad).unwrap();
        let err = dataset.label_for(&root.join("image_2/um_000001.png")).unwrap_err();
        match err {
            SegError::SampleNotFound { key, .. } => assert_eq!(key, "um_000001.png"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_folder_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::new(dir.path(), DatasetLayout::Carla).err().unwrap();
        assert!(matches!(err, SegError::Io { .. }));
    }
}
