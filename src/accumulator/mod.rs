//! Accumulator kinds and their combine semantics
//!
//! An accumulator holds a partial aggregate that task code mutates with
//! [`Accumulator::add`]. Partial values from different tasks are combined with
//! [`Accumulator::merge`], and [`Accumulator::result`] reads the finalized
//! representation.
//!
//! `merge` must be associative and commutative: the coordinator merges task
//! reports in arrival order, and that order must not affect the result. This
//! is a correctness precondition on custom kinds; it is not checked at runtime
//! beyond matching kinds.
//!
//! Built-in kinds:
//!
//! | kind                  | input | result                 |
//! |-----------------------|-------|------------------------|
//! | `counter.int`         | `i32` | `i32`                  |
//! | `counter.long`        | `i64` | `i64`                  |
//! | `counter.double`      | `f64` | `f64`                  |
//! | `maximum.*`           | `T`   | `Option<T>`            |
//! | `minimum.*`           | `T`   | `Option<T>`            |
//! | `average`             | `f64` | `f64`                  |
//! | `histogram`           | `i32` | `BTreeMap<i32, u64>`   |

pub mod average;
pub mod counter;
pub mod erased;
pub mod extrema;
pub mod histogram;
pub mod kind;
mod state;


pub use average::Average;
pub use counter::{Counter, DoubleCounter, IntCounter, LongCounter, Numeric};
pub use erased::{AccumulatorSnapshot, ErasedAccumulator};
pub use extrema::{
    DoubleMaximum, DoubleMinimum, IntMaximum, IntMinimum, LongMaximum, LongMinimum, Maximum,
    Minimum,
};
pub use histogram::Histogram;
pub use kind::{AccumulatorKind, KindRegistry};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Capability interface every accumulator kind implements
///
/// `Input` is the value type task code adds, `Output` the finalized result
/// exposed to clients. They are equal for counters and differ for composite
/// kinds such as [`Histogram`].
pub trait Accumulator:
    Default + Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    type Input: DeserializeOwned;
    type Output: Serialize;

    /// Tag carried in every report for this kind
    fn kind() -> AccumulatorKind;

    /// Fold one value into the partial aggregate
    fn add(&mut self, value: Self::Input);

    /// Combine another partial aggregate of the same kind into this one
    fn merge(&mut self, other: &Self);

    /// Finalized representation of the aggregate
    fn result(&self) -> Self::Output;

    /// Finalized result as JSON
    ///
    /// Numeric kinds override this so that non-finite floats survive.
    fn result_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self.result())
    }

    /// Return to the identity element
    fn reset(&mut self) {
        *self = Self::default();
    }
}
