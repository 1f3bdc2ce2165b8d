//! Sample statistics shared by every metric.

use crate::types::StatsSummary;

/// Immutable descriptive statistics over a finite numeric sample.
///
/// None of the accessors panic: an empty sample yields `0.0` for the mean,
/// standard deviation, maximum and minimum, because the mean's denominator
/// is floored at 1.
///
/// # Examples
///
/// ```
/// use strata_core::DescriptiveStats;
///
/// let stats = DescriptiveStats::new("a1b2c3d4", [1.0, 2.0, 3.0]);
/// assert_eq!(stats.total(), 6.0);
/// assert_eq!(stats.mean(), 2.0);
/// assert_eq!(stats.max_value(), 3.0);
///
/// let empty = DescriptiveStats::new("", []);
/// assert_eq!(empty.mean(), 0.0);
/// assert_eq!(empty.sd(), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptiveStats {
    name: String,
    values: Vec<f64>,
    total: f64,
}

impl DescriptiveStats {
    /// Wrap `values`, labelled with `name` (a revision or a filename).
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = values.into_iter().collect();
        let total = values.iter().sum();
        Self {
            name: name.into(),
            values,
            total,
        }
    }

    /// Label this sample was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying sample, in insertion order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Sum of all values.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Number of values.
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Arithmetic mean; `0.0` for an empty sample.
    pub fn mean(&self) -> f64 {
        self.total / self.protected_count()
    }

    /// Population standard deviation (divides by `n`, not `n - 1`).
    pub fn sd(&self) -> f64 {
        let mean = self.mean();
        let squares: f64 = self.values.iter().map(|v| (v - mean).powi(2)).sum();
        (squares / self.protected_count()).sqrt()
    }

    /// Largest value; `0.0` for an empty sample.
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }

    /// Smallest value; `0.0` for an empty sample.
    pub fn min_value(&self) -> f64 {
        self.values.iter().copied().reduce(f64::min).unwrap_or(0.0)
    }

    /// Collapse into the `{total, mean, sd, max}` shape stored in the cache.
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            total: self.total,
            mean: self.mean(),
            sd: self.sd(),
            max: self.max_value(),
        }
    }

    fn protected_count(&self) -> f64 {
        self.values.len().max(1) as f64
    }
}
