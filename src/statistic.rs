//! Clinical dose and volume statistics such as `D90`, `D2cc`, `V100` or
//! `V20Gy`.
//!
//! A statistic name is parsed into a [`Statistic`] and resolved against a
//! [`Dvh`] with a nearest-bin lookup; no interpolation is performed.

use crate::dvh::{Dvh, DvhError};
use crate::enums::{DoseUnits, VolumeUnits};
use crate::lookup::BinLookup;
use crate::value::DvhValue;

use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

static STATISTIC_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\S+)?([dv])(\d+\.?\d*)(gy|cc)?$").expect("statistic pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    /// Minimum dose received by the given volume, e.g. `D90` or `D2cc`
    Dose { volume: f64, absolute: bool },
    /// Volume receiving at least the given dose, e.g. `V100` or `V20Gy`
    Volume { dose: f64, absolute: bool },
}

impl Statistic {
    /// Parse a statistic name.
    ///
    /// Names are `D` or `V`, a number and an optional `cc` / `gy` suffix,
    /// case-insensitive. Without a suffix the number is a percentage.
    ///
    /// # Errors
    ///
    /// Returns [`DvhError::UnknownStatisticName`] if `name` does not follow
    /// that pattern or carries anything in front of the `D` / `V`
    pub fn parse(name: &str) -> Result<Self, DvhError> {
        let unknown = || DvhError::UnknownStatisticName(name.to_string());
        let captures = STATISTIC_NAME.captures(name).ok_or_else(unknown)?;
        if captures.get(1).is_some() {
            return Err(unknown());
        }

        let threshold: f64 = captures[3].parse().map_err(|_| unknown())?;
        let absolute = captures.get(4).is_some();
        match captures[2].to_ascii_lowercase().as_str() {
            "d" => Ok(Statistic::Dose {
                volume: threshold,
                absolute,
            }),
            "v" => Ok(Statistic::Volume {
                dose: threshold,
                absolute,
            }),
            _ => Err(unknown()),
        }
    }
}

impl FromStr for Statistic {
    type Err = DvhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Dvh {
    /// Volume receiving at least `dose`, in this DVH's volume units.
    ///
    /// `dose_units` gives the units of `dose`; `None` means percent of the
    /// prescription dose. Doses past the last bin yield zero volume.
    ///
    /// # Errors
    ///
    /// Returns [`DvhError::MissingPrescriptionDose`] if the lookup needs a
    /// dose axis conversion and this DVH has no prescription dose
    pub fn volume_constraint(
        &self,
        dose: f64,
        dose_units: Option<DoseUnits>,
    ) -> Result<DvhValue, DvhError> {
        let dose_axis = match dose_units {
            Some(units) if !units.is_relative() => self.absolute_dose(None, units)?,
            _ => self.relative_dose(None)?,
        };
        let volume = BinLookup::nearest_index(dose_axis.bins(), dose)
            .and_then(|i| self.counts().get(i).copied())
            .unwrap_or(0.0);
        Ok(DvhValue::new(volume, self.volume_units().as_str()))
    }

    /// Minimum dose received by `volume`, in this DVH's dose units.
    ///
    /// `volume_units` gives the units of `volume`; `None` means percent of
    /// the structure volume. Volumes larger than any in the histogram yield
    /// zero dose.
    ///
    /// # Errors
    ///
    /// Returns [`DvhError::MissingStructureVolume`] if an absolute volume is
    /// requested from a DVH holding relative volumes
    pub fn dose_constraint(
        &self,
        volume: f64,
        volume_units: Option<VolumeUnits>,
    ) -> Result<DvhValue, DvhError> {
        let volume_axis = match volume_units {
            Some(units) if !units.is_relative() => {
                if self.volume_units().is_relative() {
                    return Err(DvhError::MissingStructureVolume);
                }
                self.clone()
            }
            _ => self.relative_volume(),
        };
        let counts = volume_axis.counts();
        let max_volume = counts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let dose = if volume > max_volume {
            0.0
        } else {
            BinLookup::nearest_index(counts, volume)
                .map(|i| self.bins()[i])
                .unwrap_or(0.0)
        };
        Ok(DvhValue::new(dose, self.dose_units().as_str()))
    }

    /// Resolve a parsed statistic against this DVH
    pub fn resolve(&self, statistic: Statistic) -> Result<DvhValue, DvhError> {
        match statistic {
            Statistic::Dose { volume, absolute } => {
                self.dose_constraint(volume, absolute.then_some(VolumeUnits::Cm3))
            }
            Statistic::Volume { dose, absolute } => {
                self.volume_constraint(dose, absolute.then_some(DoseUnits::Gy))
            }
        }
    }

    /// Resolve a statistic by name, e.g. `dvh.statistic("D95")`.
    ///
    /// # Errors
    ///
    /// Returns [`DvhError::UnknownStatisticName`] for names that are not a
    /// dose or volume statistic, or any error of the underlying lookup
    pub fn statistic(&self, name: &str) -> Result<DvhValue, DvhError> {
        let statistic = Statistic::parse(name)?;
        let value = self.resolve(statistic)?;
        debug!(name, %value, "resolved DVH statistic");
        Ok(value)
    }

    /// Resolve several statistics by name, stopping at the first failure
    pub fn statistics<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<(&'a str, DvhValue)>, DvhError> {
        names
            .into_iter()
            .map(|name| Ok((name, self.statistic(name)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cumulative() -> Dvh {
        Dvh::new(vec![10.0, 8.0, 5.0, 2.0, 0.0], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap()
    }

    #[rstest]
    #[case("D90", Statistic::Dose { volume: 90.0, absolute: false })]
    #[case("d2cc", Statistic::Dose { volume: 2.0, absolute: true })]
    #[case("D2.5CC", Statistic::Dose { volume: 2.5, absolute: true })]
    #[case("V100", Statistic::Volume { dose: 100.0, absolute: false })]
    #[case("V20Gy", Statistic::Volume { dose: 20.0, absolute: true })]
    #[case("v20.", Statistic::Volume { dose: 20.0, absolute: false })]
    fn parses_statistic_names(#[case] name: &str, #[case] expected: Statistic) {
        assert_eq!(Statistic::parse(name).unwrap(), expected);
    }

    #[rstest]
    #[case("foo")]
    #[case("")]
    #[case("D")]
    #[case("xD90")]
    #[case("DV20")]
    #[case("D90mm")]
    #[case("D90 ")]
    #[case("Dmean")]
    fn rejects_unknown_names(#[case] name: &str) {
        assert_eq!(
            Statistic::parse(name).unwrap_err(),
            DvhError::UnknownStatisticName(name.to_string())
        );
    }

    #[test]
    fn volume_constraint_in_absolute_dose() {
        let dvh = cumulative();
        assert_eq!(dvh.statistic("V2Gy").unwrap(), DvhValue::new(5.0, "cm3"));
        assert_eq!(dvh.statistic("V0gy").unwrap(), DvhValue::new(10.0, "cm3"));
        assert_eq!(dvh.statistic("V20Gy").unwrap(), DvhValue::new(0.0, "cm3"));
    }

    #[test]
    fn volume_constraint_in_relative_dose_needs_prescription() {
        assert_eq!(
            cumulative().statistic("V100").unwrap_err(),
            DvhError::MissingPrescriptionDose
        );
        let dvh = cumulative().with_rx_dose(2.0);
        assert_eq!(dvh.statistic("V100").unwrap(), DvhValue::new(5.0, "cm3"));
        assert_eq!(dvh.statistic("V150").unwrap(), DvhValue::new(2.0, "cm3"));
    }

    #[test]
    fn dose_constraint_in_relative_volume() {
        let dvh = cumulative();
        assert_eq!(dvh.statistic("D100").unwrap(), DvhValue::new(0.0, "gy"));
        assert_eq!(dvh.statistic("D50").unwrap(), DvhValue::new(2.0, "gy"));
        assert_eq!(dvh.statistic("D20").unwrap(), DvhValue::new(3.0, "gy"));
        assert_eq!(dvh.statistic("D101").unwrap(), DvhValue::new(0.0, "gy"));
    }

    #[test]
    fn dose_constraint_in_absolute_volume() {
        let dvh = cumulative();
        assert_eq!(dvh.statistic("D2cc").unwrap(), DvhValue::new(3.0, "gy"));
        assert_eq!(dvh.statistic("D11cc").unwrap(), DvhValue::new(0.0, "gy"));
        assert_eq!(
            dvh.relative_volume().statistic("D2cc").unwrap_err(),
            DvhError::MissingStructureVolume
        );
    }

    #[test]
    fn statistics_resolves_in_order() {
        let resolved = cumulative().statistics(["D50", "V2Gy"]).unwrap();
        assert_eq!(resolved[0], ("D50", DvhValue::new(2.0, "gy")));
        assert_eq!(resolved[1], ("V2Gy", DvhValue::new(5.0, "cm3")));
        assert!(cumulative().statistics(["D50", "Dmax"]).is_err());
    }
}
