use std::path::PathBuf;
use thiserror::Error;

pub type SegResult<T> = Result<T, SegError>;

#[derive(Debug, Error)]
pub enum SegError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// An enumerated image has no ground-truth label under the normalized key.
    #[error("no label found for image {image} (key {key})")]
    SampleNotFound { image: PathBuf, key: String },
    #[error("download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} failed: HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("archive error at {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("config parse error at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("batch shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl SegError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SegError::Io { path: path.into(), source }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        SegError::Image { path: path.into(), source }
    }
}
