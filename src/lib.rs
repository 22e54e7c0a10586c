//! # DICOM-DVH library
//!
//! This crate serves a high-level API for dose-volume histograms (DVH) as
//! used to evaluate radiotherapy treatment plans.

//!
//! A DVH records, for one region of interest, how much volume receives at
//! least (cumulative) or exactly (differential) a given dose. DVHs can be
//! built from existing counts and bin edges, from raw per-voxel dose samples,
//! or loaded from the DVH Sequence of a DICOM RT Dose object.
//!
//! Every [`Dvh`] is an immutable value. Conversions between
//!  - cumulative and differential histograms
//!  - absolute and relative (percent of prescription) dose
//!  - absolute and relative (percent of structure) volume
//!
//! return new values. Clinical statistics such as `D90`, `D2cc`, `V100` or
//! `V20Gy` are resolved by name with a nearest-bin lookup.
//!
//! # Examples
//!
//! ## Reading a DVH from an RT Dose file
//!
//! ```no_run
//! # use dicom_dvh::DvhLoader;
//! let dvh = DvhLoader::load_from_file_path("rtdose.dcm", 1, Some(60.0), Some("PTV"))
//!     .expect("should have loaded DVH of ROI 1");
//! println!("{dvh}");
//! println!("D95: {}", dvh.statistic("D95").expect("should resolve D95"));
//! ```
//!
//! ## Building a DVH from counts
//!
//! ```
//! # use dicom_dvh::{Dvh, DvhValue};
//! let dvh = Dvh::new(vec![10.0, 8.0, 5.0, 2.0, 0.0], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
//!     .unwrap()
//!     .with_rx_dose(2.0);
//! assert_eq!(dvh.volume(), 10.0);
//! assert_eq!(dvh.statistic("V100").unwrap(), DvhValue::new(5.0, "cm3"));
//! ```

pub mod dvh;
pub mod dvh_loader;
pub mod enums;
mod lookup;
#[cfg(feature = "plot")]
pub mod plot;
pub mod statistic;
pub mod value;

pub use dvh::{Dvh, DvhError, PlotSeries};
pub use dvh_loader::{DvhLoader, DvhLoaderError};
pub use enums::{DoseUnits, DvhType, VolumeUnits};
pub use statistic::Statistic;
pub use value::DvhValue;
