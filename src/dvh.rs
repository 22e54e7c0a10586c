use crate::enums::{DoseUnits, DvhType, VolumeUnits};
use crate::lookup::BinLookup;

use ndarray::{ArcArray1, Array1, ArrayView1, s};
use rayon::prelude::*;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq)]
pub enum DvhError {
    #[error("DVH has no defined prescription dose")]
    MissingPrescriptionDose,

    #[error("DVH has no absolute structure volume to convert relative volumes")]
    MissingStructureVolume,

    #[error("DVH has no statistic '{0}'")]
    UnknownStatisticName(String),

    #[error("{counts} counts do not match {bins} bin edges")]
    ShapeMismatch { counts: usize, bins: usize },

    #[error("Unknown DVH type '{0}'")]
    UnknownDvhType(String),

    #[error("Unknown dose units '{0}'")]
    UnknownDoseUnits(String),

    #[error("Unknown volume units '{0}'")]
    UnknownVolumeUnits(String),

    #[error("Bin width must be positive, got {0}")]
    InvalidBinWidth(f64),

    #[error("No dose samples to build a histogram from")]
    EmptySamples,

    #[error("Bin edges must increase monotonically, got {0:?}")]
    NonAscendingBins(Vec<f64>),
}

/// Dose-volume histogram.
///
/// `bins` holds N + 1 ascending dose edges starting at 0, `counts` holds one
/// volume per bin interval. A `Dvh` is never mutated: transforms and unit
/// conversions return a new value, or a cheap clone sharing the same arrays
/// when the requested representation is already in place.
#[derive(Debug, Clone)]
pub struct Dvh {
    counts: ArcArray1<f64>,
    bins: ArcArray1<f64>,
    dvh_type: DvhType,
    dose_units: DoseUnits,
    volume_units: VolumeUnits,
    rx_dose: Option<f64>,
    name: Option<String>,
}

/// Everything an external renderer needs to draw one DVH curve.
#[derive(Debug, Clone)]
pub struct PlotSeries {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub x_label: String,
    pub y_label: String,
    pub name: Option<String>,
}

impl Dvh {
    /// Create a cumulative DVH in gy / cm3 from counts and bin edges.
    ///
    /// A leading zero edge is prepended to `bins` when missing.
    ///
    /// # Errors
    ///
    /// Returns [`DvhError::ShapeMismatch`] unless there is exactly one more
    /// bin edge than there are counts.
    pub fn new(
        counts: impl Into<Array1<f64>>,
        bins: impl Into<Array1<f64>>,
    ) -> Result<Self, DvhError> {
        let counts = counts.into();
        let bins = bins.into();
        let bins = if bins.first() == Some(&0.0) {
            bins
        } else {
            std::iter::once(0.0).chain(bins.iter().copied()).collect()
        };

        if counts.len() + 1 != bins.len() {
            return Err(DvhError::ShapeMismatch {
                counts: counts.len(),
                bins: bins.len(),
            });
        }

        Ok(Self {
            counts: counts.into_shared(),
            bins: bins.into_shared(),
            dvh_type: DvhType::default(),
            dose_units: DoseUnits::default(),
            volume_units: VolumeUnits::default(),
            rx_dose: None,
            name: None,
        })
    }

    /// Build a differential DVH by bucketing raw dose samples.
    ///
    /// Edges are spaced `bin_width` apart from 0 up to the maximum sample,
    /// and the maximum itself gets an edge when it is not already one. The
    /// last bin is closed on both sides.
    ///
    /// # Errors
    ///
    /// Returns error if `doses` is empty, `bin_width` is not positive, or the
    /// maximum falls below the last grid edge so the edges would not ascend
    pub fn from_data(doses: &[f64], bin_width: f64) -> Result<Self, DvhError> {
        if !(bin_width > 0.0) {
            return Err(DvhError::InvalidBinWidth(bin_width));
        }
        let max = doses
            .iter()
            .copied()
            .reduce(f64::max)
            .ok_or(DvhError::EmptySamples)?;

        let edges = Self::sample_edges(max, bin_width)?;
        let n_bins = edges.len() - 1;

        let counts: Vec<u64> = doses
            .par_iter()
            .fold(
                || vec![0u64; n_bins],
                |mut acc, &dose| {
                    if let Some(i) = Self::bucket_index(&edges, dose) {
                        acc[i] += 1;
                    }
                    acc
                },
            )
            .reduce(
                || vec![0u64; n_bins],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                    a
                },
            );

        debug!(samples = doses.len(), bins = n_bins, bin_width, "built DVH from dose samples");

        let counts: Array1<f64> = counts.into_iter().map(|c| c as f64).collect();
        Ok(Self::new(counts, edges)?.with_dvh_type(DvhType::Differential))
    }

    fn sample_edges(max: f64, bin_width: f64) -> Result<Vec<f64>, DvhError> {
        let len = ((max + 1.0) / bin_width).ceil().max(0.0) as usize;
        let mut edges: Vec<f64> = (0..len).map(|i| i as f64 * bin_width).collect();
        if edges.len() <= 1 {
            edges = vec![0.0, max];
        }
        if !edges.contains(&max) {
            edges.push(max);
        }
        if edges.windows(2).any(|pair| !(pair[0] < pair[1])) {
            return Err(DvhError::NonAscendingBins(edges));
        }
        Ok(edges)
    }

    fn bucket_index(edges: &[f64], dose: f64) -> Option<usize> {
        let (first, last) = (*edges.first()?, *edges.last()?);
        if dose.is_nan() || dose < first || dose > last {
            return None;
        }
        if dose == last {
            return Some(edges.len() - 2);
        }
        edges
            .partition_point(|&e| e <= dose)
            .checked_sub(1)
            .filter(|&i| i < edges.len() - 1)
    }

    pub fn with_dvh_type(self, dvh_type: DvhType) -> Self {
        Self { dvh_type, ..self }
    }

    pub fn with_dose_units(self, dose_units: DoseUnits) -> Self {
        Self { dose_units, ..self }
    }

    pub fn with_volume_units(self, volume_units: VolumeUnits) -> Self {
        Self {
            volume_units,
            ..self
        }
    }

    pub fn with_rx_dose(self, rx_dose: f64) -> Self {
        Self {
            rx_dose: Some(rx_dose),
            ..self
        }
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    pub fn counts(&self) -> ArrayView1<'_, f64> {
        self.counts.view()
    }

    pub fn bins(&self) -> ArrayView1<'_, f64> {
        self.bins.view()
    }

    pub fn dvh_type(&self) -> DvhType {
        self.dvh_type
    }

    pub fn dose_units(&self) -> DoseUnits {
        self.dose_units
    }

    pub fn volume_units(&self) -> VolumeUnits {
        self.volume_units
    }

    pub fn rx_dose(&self) -> Option<f64> {
        self.rx_dose
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether both values share the same count and bin storage
    pub fn shares_data_with(&self, other: &Dvh) -> bool {
        self.counts.as_ptr() == other.counts.as_ptr() && self.bins.as_ptr() == other.bins.as_ptr()
    }

    fn replace_counts(&self, counts: Array1<f64>) -> Self {
        Self {
            counts: counts.into_shared(),
            ..self.clone()
        }
    }

    fn replace_bins(&self, bins: Array1<f64>) -> Self {
        Self {
            bins: bins.into_shared(),
            ..self.clone()
        }
    }

    // View transforms

    /// Differential form of a cumulative DVH. The last bin is always zero.
    pub fn to_differential(&self) -> Self {
        if self.dvh_type == DvhType::Differential {
            return self.clone();
        }
        let n = self.counts.len();
        let mut diff = Array1::<f64>::zeros(n);
        if n > 1 {
            let steps = &self.counts.slice(s![..-1]) - &self.counts.slice(s![1..]);
            diff.slice_mut(s![..-1]).assign(&steps.mapv(f64::abs));
        }
        debug!(bins = n, "converted cumulative DVH to differential");
        Self {
            dvh_type: DvhType::Differential,
            ..self.replace_counts(diff)
        }
    }

    /// Cumulative form of a differential DVH, summed from the highest dose down.
    pub fn to_cumulative(&self) -> Self {
        if self.dvh_type == DvhType::Cumulative {
            return self.clone();
        }
        let mut cumulative = self.counts.to_owned();
        let mut running = 0.0;
        for count in cumulative.iter_mut().rev() {
            running += *count;
            *count = running;
        }
        debug!(bins = self.counts.len(), "converted differential DVH to cumulative");
        Self {
            dvh_type: DvhType::Cumulative,
            ..self.replace_counts(cumulative)
        }
    }

    // Unit conversions

    fn prescription(&self, rx_dose: Option<f64>) -> Result<f64, DvhError> {
        self.rx_dose
            .filter(|&rx| rx != 0.0)
            .or(rx_dose.filter(|&rx| rx != 0.0))
            .ok_or(DvhError::MissingPrescriptionDose)
    }

    /// DVH with its dose axis in the absolute `dose_units`.
    ///
    /// Relative doses are scaled by the prescription dose, taken from the
    /// instance first and from `rx_dose` otherwise, and read in `dose_units`.
    /// Switching between absolute units needs no prescription dose.
    ///
    /// # Errors
    ///
    /// Returns [`DvhError::MissingPrescriptionDose`] if a relative dose axis
    /// must be converted and no prescription dose is available
    pub fn absolute_dose(&self, rx_dose: Option<f64>, dose_units: DoseUnits) -> Result<Self, DvhError> {
        if self.dose_units == dose_units {
            return Ok(self.clone());
        }
        let factor = match (self.dose_units.gray_per_unit(), dose_units.gray_per_unit()) {
            (_, None) => return self.relative_dose(rx_dose),
            (Some(from), Some(to)) => from / to,
            (None, Some(_)) => self.prescription(rx_dose)? / 100.0,
        };
        debug!(from = %self.dose_units, to = %dose_units, factor, "rescaled DVH dose axis");
        Ok(Self {
            dose_units,
            ..self.replace_bins(self.bins.mapv(|b| b * factor))
        })
    }

    /// DVH with its dose axis in percent of the prescription dose.
    ///
    /// # Errors
    ///
    /// Returns [`DvhError::MissingPrescriptionDose`] if neither the instance
    /// nor the call provides a prescription dose
    pub fn relative_dose(&self, rx_dose: Option<f64>) -> Result<Self, DvhError> {
        if self.dose_units.is_relative() {
            return Ok(self.clone());
        }
        let rx = self.prescription(rx_dose)?;
        debug!(from = %self.dose_units, rx_dose = rx, "normalized DVH dose axis to prescription");
        Ok(Self {
            dose_units: DoseUnits::Percent,
            ..self.replace_bins(self.bins.mapv(|b| 100.0 * b / rx))
        })
    }

    /// DVH with its counts in absolute volume, given the total structure
    /// `volume` the current percentages refer to.
    pub fn absolute_volume(&self, volume: f64, volume_units: VolumeUnits) -> Self {
        if self.volume_units == volume_units {
            return self.clone();
        }
        if volume_units.is_relative() {
            return self.relative_volume();
        }
        debug!(volume, to = %volume_units, "scaled DVH counts to absolute volume");
        Self {
            volume_units,
            ..self.replace_counts(self.counts.mapv(|c| volume * c / 100.0))
        }
    }

    /// DVH with its counts in percent of the total structure volume.
    ///
    /// Differential DVHs are normalized through their cumulative form so the
    /// reference volume is the total structure volume.
    pub fn relative_volume(&self) -> Self {
        if self.volume_units.is_relative() {
            return self.clone();
        }
        if self.dvh_type == DvhType::Differential {
            return self.to_cumulative().relative_volume().to_differential();
        }
        let max = self.counts.iter().copied().fold(0.0, f64::max);
        let scale = if max > 0.0 { 100.0 / max } else { 0.0 };
        debug!(max_volume = max, "normalized DVH counts to percent volume");
        Self {
            volume_units: VolumeUnits::Percent,
            ..self.replace_counts(self.counts.mapv(|c| c * scale))
        }
    }

    // Derived scalars

    /// Midpoint of every bin
    pub fn bincenters(&self) -> Array1<f64> {
        if self.bins.len() < 2 {
            return Array1::zeros(0);
        }
        (&self.bins.slice(s![1..]) + &self.bins.slice(s![..-1])) * 0.5
    }

    /// Minimum dose: the upper edge of the first bin receiving any volume
    pub fn min(&self) -> Option<f64> {
        let diff = self.to_differential();
        diff.counts
            .iter()
            .position(|&c| c > 0.0)
            .map(|i| diff.bins[i + 1])
    }

    /// Maximum dose: the upper edge of the last bin receiving any volume
    pub fn max(&self) -> Option<f64> {
        let diff = self.to_differential();
        diff.counts
            .iter()
            .rposition(|&c| c > 0.0)
            .map(|i| diff.bins[i + 1])
    }

    /// Mean dose, weighting bin centers by their differential volume
    pub fn mean(&self) -> Option<f64> {
        let diff = self.to_differential();
        let volume = diff.counts.sum();
        if volume <= 0.0 {
            return None;
        }
        Some(diff.bincenters().dot(&diff.counts) / volume)
    }

    /// Total structure volume in `volume_units`
    pub fn volume(&self) -> f64 {
        self.to_differential().counts.sum()
    }

    // Rendering

    pub fn plot_series(&self) -> PlotSeries {
        PlotSeries {
            x: self.bincenters(),
            y: self.counts.to_owned(),
            x_label: format!("Dose [{}]", self.dose_units.capitalized()),
            y_label: format!("Volume [{}]", self.volume_units.as_str()),
            name: self.name.clone(),
        }
    }

    /// Render this DVH to an image file at `path`.
    ///
    /// Rendering never fails the caller: if plotting support is not compiled
    /// in or the image cannot be written, a warning is logged instead.
    pub fn plot(&self, path: impl AsRef<Path>) -> &Self {
        #[cfg(feature = "plot")]
        {
            let image = crate::plot::render(&[self.plot_series()], crate::plot::DEFAULT_SIZE);
            if let Err(err) = image.save(path.as_ref()) {
                warn!(path = %path.as_ref().display(), %err, "could not save DVH plot");
            }
        }
        #[cfg(not(feature = "plot"))]
        warn!(
            path = %path.as_ref().display(),
            "plotting support is not available, enable the `plot` feature"
        );
        self
    }
}

impl PartialEq for Dvh {
    fn eq(&self, other: &Self) -> bool {
        self.dvh_type == other.dvh_type
            && self.dose_units == other.dose_units
            && self.volume_units == other.volume_units
            && BinLookup::all_close(self.counts.view(), other.counts.view())
            && BinLookup::all_close(self.bins.view(), other.bins.view())
    }
}

impl fmt::Display for Dvh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bin_min = self.bins.iter().copied().reduce(f64::min).unwrap_or(0.0);
        let bin_max = self.bins.iter().copied().reduce(f64::max).unwrap_or(0.0);
        let name = match &self.name {
            Some(name) => format!("'{name}'"),
            None => "None".to_string(),
        };
        write!(
            f,
            "DVH({}, {} bins: [{:?}:{:?}] {}, volume: {:?} {}, name: {}, rx_dose: {} {})",
            self.dvh_type,
            self.counts.len(),
            bin_min,
            bin_max,
            self.dose_units.capitalized(),
            self.volume(),
            self.volume_units,
            name,
            self.rx_dose.unwrap_or(0.0).trunc() as i64,
            self.dose_units.capitalized(),
        )
    }
}
