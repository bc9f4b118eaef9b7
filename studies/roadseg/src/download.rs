//! Download and extraction of the pretrained VGG backbone.

use indicatif::{ ProgressBar, ProgressStyle };
use log::info;
use reqwest::blocking::Client;
use std::fs::{ self, File };
use std::io;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use crate::error::{ SegError, SegResult };

pub const VGG_URL: &str = "https://s3-us-west-1.amazonaws.com/udacity-selfdrivingcar/vgg.zip";
const VGG_ARCHIVE: &str = "vgg.zip";

/// Files that must exist under `<data_dir>/vgg` for the model to load.
pub const VGG_FILES: [&str; 3] = [
    "variables/variables.data-00000-of-00001",
    "variables/variables.index",
    "saved_model.pb",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PretrainedStatus {
    Present,
    Downloaded,
}

/// Copies a remote archive to a local file.
pub trait ArchiveFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> SegResult<()>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Blocking client for `url`; TLS or resolver setup failures surface as [`SegError::Download`].
    pub fn new(url: &str) -> SegResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .user_agent(concat!("roadseg/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| SegError::Download { url: url.to_string(), source })?;
        Ok(Self { client })
    }
}

impl ArchiveFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> SegResult<()> {
        let response = self.client
            .get(url)
            .send()
            .map_err(|source| SegError::Download { url: url.to_string(), source })?;
        if !response.status().is_success() {
            return Err(SegError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let pb = ProgressBar::new(response.content_length().unwrap_or(0));
        pb.set_style(
            ProgressStyle::with_template(
                "{bytes}/{total_bytes} [{wide_bar}] {bytes_per_sec} {eta}"
            ).unwrap_or_else(|_| ProgressStyle::default_bar())
        );

        let mut file = File::create(dest).map_err(|e| SegError::io(dest, e))?;
        io::copy(&mut pb.wrap_read(response), &mut file).map_err(|e| SegError::io(dest, e))?;
        pb.finish_and_clear();
        Ok(())
    }
}

pub fn vgg_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("vgg")
}

pub fn missing_vgg_files(data_dir: &Path) -> Vec<PathBuf> {
    let vgg_path = vgg_dir(data_dir);
    VGG_FILES.iter()
        .map(|f| vgg_path.join(f))
        .filter(|p| !p.exists())
        .collect()
}

/// Download and extract the pretrained vgg model if any of its files is missing.
pub fn maybe_download_pretrained_vgg(data_dir: &Path) -> SegResult<PretrainedStatus> {
    if missing_vgg_files(data_dir).is_empty() {
        return Ok(PretrainedStatus::Present);
    }
    maybe_download_pretrained_vgg_with(data_dir, &HttpFetcher::new(VGG_URL)?)
}

pub fn maybe_download_pretrained_vgg_with<F: ArchiveFetcher + ?Sized>(
    data_dir: &Path,
    fetcher: &F
) -> SegResult<PretrainedStatus> {
    let missing = missing_vgg_files(data_dir);
    if missing.is_empty() {
        return Ok(PretrainedStatus::Present);
    }

    let vgg_path = vgg_dir(data_dir);
    if vgg_path.exists() {
        fs::remove_dir_all(&vgg_path).map_err(|e| SegError::io(&vgg_path, e))?;
    }
    fs::create_dir_all(&vgg_path).map_err(|e| SegError::io(&vgg_path, e))?;

    let archive = vgg_path.join(VGG_ARCHIVE);
    info!("Downloading pre-trained vgg model ({} files missing)...", missing.len());
    fetcher.fetch(VGG_URL, &archive)?;

    info!("Extracting model...");
    extract_zip(&archive, data_dir)?;

    fs::remove_file(&archive).map_err(|e| SegError::io(&archive, e))?;
    Ok(PretrainedStatus::Downloaded)
}

pub fn extract_zip(archive: &Path, dest: &Path) -> SegResult<()> {
    let file = File::open(archive).map_err(|e| SegError::io(archive, e))?;
    let mut zip = zip::ZipArchive
        ::new(file)
        .map_err(|source| SegError::Archive { path: archive.to_path_buf(), source })?;
    zip.extract(dest).map_err(|source| SegError::Archive { path: archive.to_path_buf(), source })
}
