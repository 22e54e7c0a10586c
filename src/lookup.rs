use approx::relative_eq;
use ndarray::ArrayView1;

/// Relative tolerance used for every float comparison in the crate
pub(crate) const MAX_RELATIVE: f64 = 1e-5;
/// Absolute tolerance, for values near zero
pub(crate) const EPSILON: f64 = 1e-8;

pub(crate) struct BinLookup;

impl BinLookup {
    /// Index of the element closest to `target`. First index wins on ties,
    /// NaN elements are never selected.
    pub(crate) fn nearest_index(values: ArrayView1<f64>, target: f64) -> Option<usize> {
        values
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .fold(None, |best: Option<(usize, f64)>, (i, &v)| {
                let distance = (v - target).abs();
                match best {
                    Some((_, d)) if d <= distance => best,
                    _ => Some((i, distance)),
                }
            })
            .map(|(i, _)| i)
    }

    #[inline]
    pub(crate) fn close(a: f64, b: f64) -> bool {
        relative_eq!(a, b, epsilon = EPSILON, max_relative = MAX_RELATIVE)
    }

    pub(crate) fn all_close(a: ArrayView1<f64>, b: ArrayView1<f64>) -> bool {
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(&x, &y)| Self::close(x, y))
    }
}
