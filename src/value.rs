use std::fmt;

use crate::lookup::BinLookup;

/// A dose or volume statistic together with the units it is expressed in.
///
/// Values compare equal when their units match exactly and their values are
/// within floating point tolerance.
#[derive(Debug, Clone)]
pub struct DvhValue {
    pub value: f64,
    pub units: String,
}

impl DvhValue {
    pub fn new(value: f64, units: impl Into<String>) -> Self {
        Self {
            value,
            units: units.into(),
        }
    }

    /// A value without units
    pub fn unitless(value: f64) -> Self {
        Self::new(value, "")
    }

    /// Canonical repr, e.g. `DvhValue(20.0, 'gy')`
    pub fn repr(&self) -> String {
        format!("DvhValue({:?}, '{}')", self.value, self.units)
    }
}

impl PartialEq for DvhValue {
    fn eq(&self, other: &Self) -> bool {
        self.units == other.units && BinLookup::close(self.value, other.value)
    }
}

impl fmt::Display for DvhValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.units.is_empty() {
            write!(f, "{:?}", self.value)
        } else {
            write!(f, "{:?} {}", self.value, self.units)
        }
    }
}
