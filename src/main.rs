use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use simple_logger::SimpleLogger;

use args::RasterizeCliArgs;

mod args;

fn run() -> Result<usize> {
    let args = RasterizeCliArgs::parse();

    SimpleLogger::new().with_level(args.log_level).init()?;

    let config = args.to_config();
    info!("Reading {:?}", config.input);

    let summary = gpkg_rasterize::run(&config)?;
    info!("{}", summary);

    Ok(summary.written)
}

fn main() -> ExitCode {
    match run() {
        Ok(0) => {
            error!("No raster was written");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            // the logger may not be installed yet
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
