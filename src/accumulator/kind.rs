//! Kind tags and the decoder table used to rebuild accumulators from reports

use super::erased::{AccumulatorSnapshot, ErasedAccumulator};
use super::{
    Average, DoubleCounter, DoubleMaximum, DoubleMinimum, Histogram, IntCounter, IntMaximum,
    IntMinimum, LongCounter, LongMaximum, LongMinimum,
};
use super::Accumulator;
use crate::error::{AccumulatorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Tag identifying the concrete combine/result semantics of an accumulator
///
/// Every serialized accumulator carries its kind so the coordinator can
/// detect mismatches without knowing the task's source types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccumulatorKind(Cow<'static, str>);

impl AccumulatorKind {
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self(tag.into())
    }

    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccumulatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Decoder = fn(Value) -> serde_json::Result<Box<dyn ErasedAccumulator>>;

fn decode_as<A: Accumulator>(state: Value) -> serde_json::Result<Box<dyn ErasedAccumulator>> {
    let value: A = serde_json::from_value(state)?;
    Ok(Box::new(value))
}

/// Table of accumulator kinds a coordinator is able to decode
///
/// Custom kinds become mergeable by registering them here; nothing else in
/// the coordinator changes.
#[derive(Clone, Default)]
pub struct KindRegistry {
    decoders: HashMap<AccumulatorKind, Decoder>,
}

impl KindRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry containing every built-in kind
    pub fn with_builtins() -> Self {
        let mut kinds = Self::new();
        kinds
            .register::<IntCounter>()
            .register::<LongCounter>()
            .register::<DoubleCounter>()
            .register::<IntMaximum>()
            .register::<LongMaximum>()
            .register::<DoubleMaximum>()
            .register::<IntMinimum>()
            .register::<LongMinimum>()
            .register::<DoubleMinimum>()
            .register::<Average>()
            .register::<Histogram>();
        kinds
    }

    /// Make kind `A` decodable
    pub fn register<A: Accumulator>(&mut self) -> &mut Self {
        self.decoders.insert(A::kind(), decode_as::<A>);
        self
    }

    pub fn contains(&self, kind: &AccumulatorKind) -> bool {
        self.decoders.contains_key(kind)
    }

    /// Registered kinds in sorted order
    pub fn kinds(&self) -> Vec<AccumulatorKind> {
        let mut kinds: Vec<_> = self.decoders.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Rebuild the accumulator named `name` from its snapshot
    pub fn decode(
        &self,
        name: &str,
        snapshot: AccumulatorSnapshot,
    ) -> Result<Box<dyn ErasedAccumulator>> {
        let decoder = self
            .decoders
            .get(&snapshot.kind)
            .ok_or_else(|| AccumulatorError::UnknownKind {
                name: name.to_string(),
                kind: snapshot.kind.clone(),
            })?;

        decoder(snapshot.state).map_err(|e| {
            AccumulatorError::serialization(
                format!("state of accumulator '{}' ({})", name, snapshot.kind),
                e,
            )
        })
    }
}

impl fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
