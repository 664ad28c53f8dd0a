//! Discrete distribution over integer bins

use super::{Accumulator, AccumulatorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Count of `add` calls per integer bin
///
/// Adds accumulate discrete counts; the result is the full bin → count
/// distribution. Merging sums counts pointwise over the union of bins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    bins: BTreeMap<i32, u64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count recorded for `bin` (zero if the bin was never hit)
    pub fn count(&self, bin: i32) -> u64 {
        self.bins.get(&bin).copied().unwrap_or(0)
    }

    /// Total number of values added across all bins
    pub fn total(&self) -> u64 {
        self.bins.values().fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    pub fn bins(&self) -> impl Iterator<Item = (i32, u64)> + '_ {
        self.bins.iter().map(|(bin, count)| (*bin, *count))
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

impl FromIterator<i32> for Histogram {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut histogram = Self::new();
        for bin in iter {
            histogram.add(bin);
        }
        histogram
    }
}

impl Accumulator for Histogram {
    type Input = i32;
    type Output = BTreeMap<i32, u64>;

    fn kind() -> AccumulatorKind {
        AccumulatorKind::from_static("histogram")
    }

    fn add(&mut self, bin: i32) {
        let count = self.bins.entry(bin).or_insert(0);
        *count = count.saturating_add(1);
    }

    fn merge(&mut self, other: &Self) {
        for (bin, count) in &other.bins {
            let total = self.bins.entry(*bin).or_insert(0);
            *total = total.saturating_add(*count);
        }
    }

    fn result(&self) -> BTreeMap<i32, u64> {
        self.bins.clone()
    }
}
