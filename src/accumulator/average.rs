//! Running mean

use super::{Accumulator, AccumulatorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mean of all added values, tracked as `(sum, count)` and divided on read
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Average {
    #[serde(with = "super::state")]
    sum: f64,
    count: u64,
}

impl Average {
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }
}

impl Accumulator for Average {
    type Input = f64;
    type Output = f64;

    fn kind() -> AccumulatorKind {
        AccumulatorKind::from_static("average")
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count = self.count.saturating_add(1);
    }

    fn merge(&mut self, other: &Self) {
        self.sum += other.sum;
        self.count = self.count.saturating_add(other.count);
    }

    /// `0.0` when nothing was added
    fn result(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    fn result_value(&self) -> serde_json::Result<Value> {
        super::state::to_value(self.result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_combine_and_finalize() {
        let mut a = Average::default();
        a.add(4.0);
        a.add(6.0);

        let mut b = Average::default();
        b.add(20.0);

        a.merge(&b);
        assert_eq!(a.count(), 3);
        assert_eq!(a.result(), 10.0);
    }

    #[test]
    fn test_empty_average_is_zero() {
        assert_eq!(Average::default().result(), 0.0);
    }
}
