//! Maximum and minimum trackers

use super::{Accumulator, AccumulatorKind, Numeric};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest value seen; `None` until something is added
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Numeric")]
pub struct Maximum<T: Numeric> {
    #[serde(default, with = "super::state::option")]
    value: Option<T>,
}

/// Smallest value seen; `None` until something is added
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Numeric")]
pub struct Minimum<T: Numeric> {
    #[serde(default, with = "super::state::option")]
    value: Option<T>,
}

pub type IntMaximum = Maximum<i32>;
pub type LongMaximum = Maximum<i64>;
pub type DoubleMaximum = Maximum<f64>;
pub type IntMinimum = Minimum<i32>;
pub type LongMinimum = Minimum<i64>;
pub type DoubleMinimum = Minimum<f64>;

fn fold<T: Numeric>(current: Option<T>, value: Option<T>, pick: fn(T, T) -> T) -> Option<T> {
    match (current, value) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

impl<T: Numeric> Accumulator for Maximum<T> {
    type Input = T;
    type Output = Option<T>;

    fn kind() -> AccumulatorKind {
        AccumulatorKind::new(format!("maximum.{}", T::TYPE_NAME))
    }

    fn add(&mut self, value: T) {
        self.value = fold(self.value, Some(value), T::max_of);
    }

    fn merge(&mut self, other: &Self) {
        self.value = fold(self.value, other.value, T::max_of);
    }

    fn result(&self) -> Option<T> {
        self.value
    }

    fn result_value(&self) -> serde_json::Result<Value> {
        super::state::option_to_value(self.value)
    }
}

impl<T: Numeric> Accumulator for Minimum<T> {
    type Input = T;
    type Output = Option<T>;

    fn kind() -> AccumulatorKind {
        AccumulatorKind::new(format!("minimum.{}", T::TYPE_NAME))
    }

    fn add(&mut self, value: T) {
        self.value = fold(self.value, Some(value), T::min_of);
    }

    fn merge(&mut self, other: &Self) {
        self.value = fold(self.value, other.value, T::min_of);
    }

    fn result(&self) -> Option<T> {
        self.value
    }

    fn result_value(&self) -> serde_json::Result<Value> {
        super::state::option_to_value(self.value)
    }
}
