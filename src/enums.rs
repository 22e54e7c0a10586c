use std::fmt;
use std::str::FromStr;

use crate::dvh::DvhError;

/// Representation of the histogram counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DvhType {
    /// `counts[i]` is the volume receiving at least `bins[i]`
    #[default]
    Cumulative,
    /// `counts[i]` is the volume receiving a dose in `[bins[i], bins[i + 1])`
    Differential,
}

impl DvhType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DvhType::Cumulative => "cumulative",
            DvhType::Differential => "differential",
        }
    }
}

impl FromStr for DvhType {
    type Err = DvhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cumulative" => Ok(DvhType::Cumulative),
            "differential" => Ok(DvhType::Differential),
            _ => Err(DvhError::UnknownDvhType(s.to_string())),
        }
    }
}

impl fmt::Display for DvhType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Units of the dose axis (the bin edges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoseUnits {
    #[default]
    Gy,
    CGy,
    /// Percent of the prescription dose
    Percent,
}

impl DoseUnits {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseUnits::Gy => "gy",
            DoseUnits::CGy => "cgy",
            DoseUnits::Percent => "%",
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, DoseUnits::Percent)
    }

    /// Factor that converts a dose in these units to gray.
    /// `None` for relative units.
    pub(crate) fn gray_per_unit(&self) -> Option<f64> {
        match self {
            DoseUnits::Gy => Some(1.0),
            DoseUnits::CGy => Some(0.01),
            DoseUnits::Percent => None,
        }
    }

    /// Label used on plot axes and in the repr, e.g. `Gy`
    pub fn capitalized(&self) -> &'static str {
        match self {
            DoseUnits::Gy => "Gy",
            DoseUnits::CGy => "Cgy",
            DoseUnits::Percent => "%",
        }
    }
}

impl FromStr for DoseUnits {
    type Err = DvhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gy" => Ok(DoseUnits::Gy),
            "cgy" => Ok(DoseUnits::CGy),
            "%" | "percent" | "relative" => Ok(DoseUnits::Percent),
            _ => Err(DvhError::UnknownDoseUnits(s.to_string())),
        }
    }
}

impl fmt::Display for DoseUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Units of the volume axis (the counts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeUnits {
    #[default]
    Cm3,
    /// Percent of the total structure volume
    Percent,
}

impl VolumeUnits {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeUnits::Cm3 => "cm3",
            VolumeUnits::Percent => "%",
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, VolumeUnits::Percent)
    }
}

impl FromStr for VolumeUnits {
    type Err = DvhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cm3" | "cc" => Ok(VolumeUnits::Cm3),
            "%" | "percent" => Ok(VolumeUnits::Percent),
            _ => Err(DvhError::UnknownVolumeUnits(s.to_string())),
        }
    }
}

impl fmt::Display for VolumeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dicom_code_strings() {
        assert_eq!("CUMULATIVE".parse::<DvhType>().unwrap(), DvhType::Cumulative);
        assert_eq!("Differential".parse::<DvhType>().unwrap(), DvhType::Differential);
        assert_eq!("GY".parse::<DoseUnits>().unwrap(), DoseUnits::Gy);
        assert_eq!("RELATIVE".parse::<DoseUnits>().unwrap(), DoseUnits::Percent);
        assert_eq!("CM3".parse::<VolumeUnits>().unwrap(), VolumeUnits::Cm3);
        assert_eq!("PERCENT".parse::<VolumeUnits>().unwrap(), VolumeUnits::Percent);
    }

    #[test]
    fn rejects_unknown_vocabulary() {
        assert!(matches!(
            "NATURAL".parse::<DvhType>(),
            Err(DvhError::UnknownDvhType(s)) if s == "NATURAL"
        ));
        assert!("MM3".parse::<VolumeUnits>().is_err());
        assert!("mgy".parse::<DoseUnits>().is_err());
    }

    #[test]
    fn labels_are_lowercase() {
        assert_eq!(DoseUnits::CGy.to_string(), "cgy");
        assert_eq!(VolumeUnits::Percent.to_string(), "%");
        assert_eq!(DvhType::default().to_string(), "cumulative");
    }
}
