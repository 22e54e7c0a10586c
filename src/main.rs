use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dicom_dvh::dvh_loader::DvhLoader;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Print the DVH of a region of interest from a DICOM RT Dose file
#[derive(Debug, Parser)]
#[command(name = "dvh-stats", version)]
struct Args {
    /// RT Dose file holding a DVH Sequence
    file: PathBuf,

    /// Referenced ROI Number of the structure
    #[arg(short, long)]
    roi: i32,

    /// Prescription dose in the DVH's absolute dose units
    #[arg(long)]
    rx_dose: Option<f64>,

    /// Structure name
    #[arg(short, long)]
    name: Option<String>,

    /// Statistics to report, e.g. D95 V20Gy D2cc
    #[arg(short, long = "stat", num_args = 1..)]
    stats: Vec<String>,

    /// Render the DVH to this image file
    #[arg(long)]
    plot: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let dvh = match DvhLoader::load_from_file_path(
        &args.file,
        args.roi,
        args.rx_dose,
        args.name.as_deref(),
    ) {
        Ok(dvh) => dvh,
        Err(err) => {
            error!(file = %args.file.display(), %err, "could not load DVH");
            return ExitCode::FAILURE;
        }
    };

    println!("{dvh}");
    let summary = [("min", dvh.min()), ("max", dvh.max()), ("mean", dvh.mean())];
    for (label, dose) in summary {
        match dose {
            Some(dose) => println!("{label}: {dose} {}", dvh.dose_units()),
            None => println!("{label}: -"),
        }
    }

    let mut status = ExitCode::SUCCESS;
    for name in &args.stats {
        match dvh.statistic(name) {
            Ok(value) => println!("{name}: {value}"),
            Err(err) => {
                error!(%err, "could not resolve statistic");
                status = ExitCode::FAILURE;
            }
        }
    }

    if let Some(path) = &args.plot {
        dvh.plot(path);
    }

    status
}
