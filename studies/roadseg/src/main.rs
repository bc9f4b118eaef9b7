use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ Context, Result };
use clap::{ Parser, Subcommand, ValueEnum };
use log::info;
use ndarray::Axis;

use roadseg::{
    data::DatasetLayout,
    download::{ maybe_download_pretrained_vgg, vgg_dir },
    labels::LabelEncoding,
    split::{ process_carla, split_data },
    BatchGenerator,
    GeneratorConfig,
    PretrainedStatus,
};

#[derive(Parser, Debug)]
#[command(name = "roadseg", version, about = "Road segmentation data preparation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the pretrained VGG model unless it is already complete
    Download {
        #[arg(default_value = "data")]
        data_dir: PathBuf,
    },
    /// Split KITTI road `training` into `training` and `valid`
    SplitRoad {
        #[arg(default_value = "data_road")]
        base_dir: PathBuf,
    },
    /// Split a CARLA capture folder into `training` and `valid`
    SplitCarla {
        #[arg(default_value = "Train")]
        base_dir: PathBuf,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Run one epoch of the batch generator and report batch statistics
    Batches {
        data_folder: PathBuf,
        /// JSON generator config; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long, default_value_t = 8)]
        batch_size: usize,
        /// Disable augmentation
        #[arg(long)]
        no_train: bool,
        #[arg(long, value_enum)]
        layout: Option<LayoutArg>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LayoutArg {
    Road,
    Carla,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Download { data_dir } => download(data_dir),
        Command::SplitRoad { base_dir } => split_road(base_dir),
        Command::SplitCarla { base_dir, out } => split_carla(base_dir, out),
        Command::Batches { data_folder, config, height, width, batch_size, no_train, layout } => {
            let mut cfg = match config {
                Some(path) =>
                    GeneratorConfig::from_json_file(&path).with_context(||
                        format!("loading {}", path.display())
                    )?,
                None => GeneratorConfig::default(),
            };
            if let Some(h) = height {
                cfg.image_shape.0 = h;
            }
            if let Some(w) = width {
                cfg.image_shape.1 = w;
            }
            if no_train {
                cfg.train = false;
            }
            match layout {
                Some(LayoutArg::Road) => {
                    cfg.layout = DatasetLayout::KittiRoad;
                    cfg.encoding = LabelEncoding::road();
                }
                Some(LayoutArg::Carla) => {
                    cfg.layout = DatasetLayout::Carla;
                    cfg.encoding = LabelEncoding::lane_vehicle();
                }
                None => {}
            }
            batches(data_folder, cfg, batch_size)
        }
    }
}

fn download(data_dir: PathBuf) -> Result<()> {
    let status = maybe_download_pretrained_vgg(&data_dir).with_context(||
        format!("preparing pretrained model in {}", data_dir.display())
    )?;
    match status {
        PretrainedStatus::Present => info!("vgg model already present in {}", vgg_dir(&data_dir).display()),
        PretrainedStatus::Downloaded => info!("vgg model extracted to {}", vgg_dir(&data_dir).display()),
    }
    Ok(())
}

fn split_road(base_dir: PathBuf) -> Result<()> {
    let summary = split_data(&base_dir).with_context(||
        format!("splitting {}", base_dir.display())
    )?;
    info!("training: {} valid: {}", summary.train, summary.valid);
    Ok(())
}

fn split_carla(base_dir: PathBuf, out: PathBuf) -> Result<()> {
    let summary = process_carla(&base_dir, &out).with_context(||
        format!("splitting {}", base_dir.display())
    )?;
    info!("training: {} valid: {}", summary.train, summary.valid);
    Ok(())
}

fn batches(data_folder: PathBuf, cfg: GeneratorConfig, batch_size: usize) -> Result<()> {
    let generator = BatchGenerator::new(&data_folder, cfg)?;
    let epoch = generator.batches(batch_size)?;
    let total_batches = epoch.len_batch();
    let started = Instant::now();

    let mut samples = 0;
    for (i, batch) in epoch.enumerate() {
        let batch = batch.with_context(|| format!("loading batch {}", i + 1))?;
        samples += batch.len();

        let pixels = (batch.labels.len() / batch.labels.dim().3).max(1) as f64;
        let per_class = batch.labels
            .map(|&v| v as u64)
            .sum_axis(Axis(0))
            .sum_axis(Axis(0))
            .sum_axis(Axis(0));
        let fractions: Vec<String> = per_class
            .iter()
            .map(|&count| format!("{:.3}", (count as f64) / pixels))
            .collect();

        info!(
            "batch {}/{} images {:?} labels {:?} class fractions [{}]",
            i + 1,
            total_batches,
            batch.images.dim(),
            batch.labels.dim(),
            fractions.join(", ")
        );
    }

    info!("epoch done: {} samples in {:.2?}", samples, started.elapsed());
    Ok(())
}
