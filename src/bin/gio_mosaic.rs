//! Georeference and mosaic the GIO tiles of one product timeslot.

use anyhow::{Context, Result};
use clap::Parser;
use gio_mosaic::{GdalToolkit, PipelineConfig, TimeslotProcessor};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gio-mosaic")]
#[command(about = "Georeference GIO product tiles and merge them into global mosaics")]
struct Args {
    /// YAML configuration file; command line values override it
    #[arg(short, long, env = "GIO_MOSAIC_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the HDF5 tiles
    #[arg(short, long, env = "GIO_WORKING_DIR")]
    working_dir: Option<PathBuf>,

    /// Product code, e.g. LST
    #[arg(short, long)]
    product: Option<String>,

    /// Timeslot as YYYYMMDDHHMM
    #[arg(short, long)]
    timeslot: Option<String>,

    /// Georeference tiles one at a time
    #[arg(long)]
    sequential: bool,

    /// Verify that all tiles of a group share the same metadata
    #[arg(long)]
    strict_groups: bool,
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => {
                let working_dir = self.working_dir.clone().context("--working-dir is required")?;
                let product = self.product.clone().context("--product is required")?;
                let timeslot = self.timeslot.clone().context("--timeslot is required")?;
                PipelineConfig::new(working_dir, &product, &timeslot)
            }
        };

        if let Some(dir) = self.working_dir {
            config.working_dir = dir;
        }
        if let Some(product) = self.product {
            config.product = product;
        }
        if let Some(timeslot) = self.timeslot {
            config.timeslot = timeslot;
        }
        if self.sequential {
            config.parallel = false;
        }
        if self.strict_groups {
            config.strict_groups = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;
    let toolkit = GdalToolkit::new(config.tools.clone());
    let processor = TimeslotProcessor::new(&config, &toolkit)?;

    let mosaics = processor
        .run()
        .with_context(|| format!("Processing {} {} failed", config.product, config.timeslot))?;

    log::info!("Created {} global mosaics", mosaics.len());
    for path in &mosaics {
        println!("{}", path.display());
    }
    Ok(())
}
