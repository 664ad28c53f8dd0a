//! Type-erased accumulators
//!
//! The coordinator handles accumulators of kinds it knows nothing about at
//! compile time. [`ErasedAccumulator`] is the object-safe view of
//! [`Accumulator`], implemented for every kind, and [`AccumulatorSnapshot`]
//! is the serialized form carried in task reports.

use super::{Accumulator, AccumulatorKind};
use crate::error::{AccumulatorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;

/// Serialized accumulator state tagged with its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorSnapshot {
    pub kind: AccumulatorKind,
    pub state: Value,
}

/// Object-safe view of an accumulator
///
/// `name` parameters only provide context for errors.
pub trait ErasedAccumulator: fmt::Debug + Send + Sync {
    fn accumulator_kind(&self) -> AccumulatorKind;

    /// Rust type name of the concrete accumulator
    fn type_name(&self) -> &'static str;

    /// Decode `value` as this kind's input and add it
    fn add_json(&mut self, name: &str, value: Value) -> Result<()>;

    /// Merge `other` into `self`; fails if the concrete kinds differ
    fn merge_erased(&mut self, name: &str, other: &dyn ErasedAccumulator) -> Result<()>;

    /// Finalized result as JSON
    fn result_json(&self, name: &str) -> Result<Value>;

    /// Serialized state for transport
    fn to_snapshot(&self, name: &str) -> Result<AccumulatorSnapshot>;

    fn clone_boxed(&self) -> Box<dyn ErasedAccumulator>;

    fn as_any(&self) -> &dyn Any;
}

impl<A: Accumulator> ErasedAccumulator for A {
    fn accumulator_kind(&self) -> AccumulatorKind {
        A::kind()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<A>()
    }

    fn add_json(&mut self, name: &str, value: Value) -> Result<()> {
        let found = json_type_name(&value);
        let input = serde_json::from_value::<A::Input>(value).map_err(|_| {
            AccumulatorError::TypeMismatch {
                name: name.to_string(),
                expected: format!("input of {}", A::kind()),
                found: found.to_string(),
            }
        })?;
        self.add(input);
        Ok(())
    }

    fn merge_erased(&mut self, name: &str, other: &dyn ErasedAccumulator) -> Result<()> {
        let other = other.as_any().downcast_ref::<A>().ok_or_else(|| {
            AccumulatorError::KindMismatch {
                name: name.to_string(),
                existing: A::kind(),
                incoming: other.accumulator_kind(),
            }
        })?;
        self.merge(other);
        Ok(())
    }

    fn result_json(&self, name: &str) -> Result<Value> {
        self.result_value().map_err(|e| {
            AccumulatorError::serialization(format!("result of accumulator '{name}'"), e)
        })
    }

    fn to_snapshot(&self, name: &str) -> Result<AccumulatorSnapshot> {
        let state = serde_json::to_value(self).map_err(|e| {
            AccumulatorError::serialization(format!("state of accumulator '{name}'"), e)
        })?;
        Ok(AccumulatorSnapshot {
            kind: A::kind(),
            state,
        })
    }

    fn clone_boxed(&self) -> Box<dyn ErasedAccumulator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Clone for Box<dyn ErasedAccumulator> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::{Histogram, LongCounter};
    use serde_json::json;

    #[test]
    fn test_add_json_decodes_input() {
        let mut counter: Box<dyn ErasedAccumulator> = Box::new(LongCounter::new());
        counter.add_json("n", json!(5)).unwrap();
        counter.add_json("n", json!(2)).unwrap();
        assert_eq!(counter.result_json("n").unwrap(), json!(7));
    }

    #[test]
    fn test_add_json_type_mismatch() {
        let mut counter = LongCounter::new();
        let err = counter.add_json("n", json!("five")).unwrap_err();

        match err {
            AccumulatorError::TypeMismatch { name, found, .. } => {
                assert_eq!(name, "n");
                assert_eq!(found, "string");
            }
            other => panic!("Expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_erased_same_kind() {
        let mut a: Box<dyn ErasedAccumulator> = Box::new(LongCounter::with_total(2));
        let b: Box<dyn ErasedAccumulator> = Box::new(LongCounter::with_total(3));

        a.merge_erased("n", b.as_ref()).unwrap();
        assert_eq!(a.result_json("n").unwrap(), json!(5));
    }

    #[test]
    fn test_merge_erased_kind_mismatch() {
        let mut a: Box<dyn ErasedAccumulator> = Box::new(LongCounter::with_total(2));
        let b: Box<dyn ErasedAccumulator> = Box::new(Histogram::new());

        let err = a.merge_erased("x", b.as_ref()).unwrap_err();
        match err {
            AccumulatorError::KindMismatch {
                existing, incoming, ..
            } => {
                assert_eq!(existing.as_str(), "counter.long");
                assert_eq!(incoming.as_str(), "histogram");
            }
            other => panic!("Expected KindMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_carries_kind() {
        let histogram: Histogram = [1, 1, 4].into_iter().collect();
        let snapshot = histogram.to_snapshot("h").unwrap();

        assert_eq!(snapshot.kind.as_str(), "histogram");
        assert_eq!(snapshot.state, json!({ "bins": { "1": 2, "4": 1 } }));
    }
}
